//! Docset bundle layout and boilerplate
//!
//! ```text
//! <name>.docset/
//!   icon.png
//!   Contents/
//!     Info.plist
//!     Resources/
//!       docSet.dsidx
//!       Documents/…
//! ```

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::DocsetError;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Clone)]
pub struct DocsetLayout {
    pub root: PathBuf,
    pub contents: PathBuf,
    pub resources: PathBuf,
    pub documents: PathBuf,
}

impl DocsetLayout {
    pub fn new(dest: &Path, name: &str) -> Self {
        let root = dest.join(format!("{}.docset", name));
        let contents = root.join("Contents");
        let resources = contents.join("Resources");
        let documents = resources.join("Documents");
        Self {
            root,
            contents,
            resources,
            documents,
        }
    }

    pub fn plist(&self) -> PathBuf {
        self.contents.join("Info.plist")
    }

    pub fn index_db(&self) -> PathBuf {
        self.resources.join("docSet.dsidx")
    }
}

/// Metadata written to `Info.plist`
#[derive(Debug, Clone, Default)]
pub struct DocsetMeta {
    pub name: String,
    pub index_page: Option<String>,
    pub online_redirect_url: Option<String>,
    pub playground_url: Option<String>,
    pub enable_js: bool,
    pub full_text_search: FullTextSearch,
}

/// Whether Dash offers full-text search for the docset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FullTextSearch {
    /// Enabled by default
    On,
    /// Available, but the user has to switch it on
    #[default]
    Off,
    /// Not offered at all
    Forbidden,
}

/// Icons copied into the bundle root
#[derive(Debug, Clone, Copy, Default)]
pub struct Icons<'a> {
    pub icon: Option<&'a Path>,
    pub icon_2x: Option<&'a Path>,
}

/// Strip a trailing `.docset` (any case) from a user-supplied name.
pub fn normalize_name(name: &str) -> &str {
    let cut = name.len().saturating_sub(".docset".len());
    match name.get(cut..) {
        Some(suffix) if suffix.eq_ignore_ascii_case(".docset") => &name[..cut],
        _ => name,
    }
}

/// Fail unless `dest` is an existing directory.
pub fn check_destination(dest: &Path) -> Result<(), DocsetError> {
    let meta = fs::metadata(dest).map_err(|source| DocsetError::Destination {
        path: dest.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(DocsetError::NotADirectory(dest.to_path_buf()));
    }
    Ok(())
}

/// Fail unless `icon` is a readable PNG file.
pub fn check_icon(icon: &Path) -> Result<(), DocsetError> {
    let unreadable = |source| DocsetError::IconUnreadable {
        path: icon.to_path_buf(),
        source,
    };

    let mut header = Vec::with_capacity(PNG_SIGNATURE.len());
    fs::File::open(icon)
        .map_err(unreadable)?
        .take(PNG_SIGNATURE.len() as u64)
        .read_to_end(&mut header)
        .map_err(unreadable)?;
    if header != PNG_SIGNATURE {
        return Err(DocsetError::IconNotPng(icon.to_path_buf()));
    }
    Ok(())
}

/// Create the bundle skeleton, write `Info.plist` and copy the docs in.
///
/// An existing bundle is removed first if `force` is set.
pub fn prepare_docset(
    source: &Path,
    layout: &DocsetLayout,
    meta: &DocsetMeta,
    icons: Icons<'_>,
    force: bool,
) -> Result<(), DocsetError> {
    if let Some(page) = &meta.index_page {
        if !source.join(page).is_file() {
            return Err(DocsetError::MissingIndexPage(PathBuf::from(page)));
        }
    }

    if layout.root.exists() {
        if !force {
            return Err(DocsetError::AlreadyExists(layout.root.clone()));
        }
        tracing::info!(path = %layout.root.display(), "deleting existing docset");
        fs::remove_dir_all(&layout.root).map_err(|e| {
            DocsetError::io(format!("removing existing {} failed", layout.root.display()), e)
        })?;
    }

    fs::create_dir_all(&layout.resources)
        .map_err(|e| DocsetError::io("can't create docset directory", e))?;

    fs::write(layout.plist(), render_plist(meta)?)
        .map_err(|e| DocsetError::io("can't create plist file", e))?;

    let copied = copy_tree(source, &layout.documents, &layout.root)?;
    tracing::debug!(files = copied, "copied documentation");

    for (icon, file_name) in [(icons.icon, "icon.png"), (icons.icon_2x, "icon@2x.png")] {
        if let Some(icon) = icon {
            fs::copy(icon, layout.root.join(file_name))
                .map_err(|e| DocsetError::io(format!("can't copy {}", file_name), e))?;
        }
    }

    Ok(())
}

/// Recursively copy `src` into `dest`, leaving out `exclude` (which must
/// exist). Returns the number of files copied.
///
/// `exclude` is the docset being built, which lives inside `src` when
/// the documentation is converted in place.
pub fn copy_tree(src: &Path, dest: &Path, exclude: &Path) -> Result<usize, DocsetError> {
    let canonical = |p: &Path| {
        fs::canonicalize(p).map_err(|e| DocsetError::io(format!("can't resolve {}", p.display()), e))
    };
    let src = canonical(src)?;
    let exclude = canonical(exclude)?;
    let mut copied = 0;

    let walker = WalkDir::new(&src)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.path() != exclude.as_path());

    for entry in walker {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(&src) else {
            continue;
        };
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| DocsetError::io(format!("can't create {}", target.display()), e))?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|e| DocsetError::io(format!("can't copy {}", entry.path().display()), e))?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[derive(Serialize)]
struct InfoPlist<'a> {
    #[serde(rename = "CFBundleIdentifier")]
    bundle_identifier: &'a str,
    #[serde(rename = "CFBundleName")]
    bundle_name: &'a str,
    #[serde(rename = "DocSetPlatformFamily")]
    platform_family: String,
    #[serde(rename = "DashDocSetFamily")]
    family: &'static str,
    #[serde(rename = "DashDocSetDeclaredInStyle")]
    declared_in_style: &'static str,
    #[serde(rename = "isDashDocset")]
    is_dash_docset: bool,
    #[serde(rename = "isJavaScriptEnabled")]
    javascript_enabled: bool,
    #[serde(rename = "dashIndexFilePath", skip_serializing_if = "Option::is_none")]
    index_page: Option<&'a str>,
    #[serde(rename = "DashDocSetFallbackURL", skip_serializing_if = "Option::is_none")]
    fallback_url: Option<&'a str>,
    #[serde(rename = "DashDocSetPlayURL", skip_serializing_if = "Option::is_none")]
    play_url: Option<&'a str>,
    #[serde(rename = "DashDocSetFTSNotSupported", skip_serializing_if = "is_false")]
    fts_not_supported: bool,
    #[serde(rename = "DashDocSetDefaultFTSEnabled", skip_serializing_if = "is_false")]
    fts_enabled: bool,
}

fn is_false(b: &bool) -> bool {
    !b
}

impl<'a> From<&'a DocsetMeta> for InfoPlist<'a> {
    fn from(meta: &'a DocsetMeta) -> Self {
        Self {
            bundle_identifier: &meta.name,
            bundle_name: &meta.name,
            platform_family: meta.name.to_lowercase(),
            family: "dashtoc",
            declared_in_style: "originalName",
            is_dash_docset: true,
            javascript_enabled: meta.enable_js,
            index_page: meta.index_page.as_deref(),
            fallback_url: meta.online_redirect_url.as_deref(),
            play_url: meta.playground_url.as_deref(),
            fts_not_supported: meta.full_text_search == FullTextSearch::Forbidden,
            fts_enabled: meta.full_text_search == FullTextSearch::On,
        }
    }
}

/// Render `Info.plist` for `meta` as XML
pub fn render_plist(meta: &DocsetMeta) -> Result<Vec<u8>, DocsetError> {
    let mut out = Vec::new();
    plist::to_writer_xml(&mut out, &InfoPlist::from(meta))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Flask.docset"), "Flask");
        assert_eq!(normalize_name("Flask.DocSet"), "Flask");
        assert_eq!(normalize_name("Flask"), "Flask");
        assert_eq!(normalize_name(".docset"), "");
        assert_eq!(normalize_name("ä"), "ä");
    }

    #[test]
    fn test_layout() {
        let layout = DocsetLayout::new(Path::new("/out"), "demo");
        assert_eq!(layout.root, PathBuf::from("/out/demo.docset"));
        assert_eq!(
            layout.documents,
            PathBuf::from("/out/demo.docset/Contents/Resources/Documents")
        );
        assert_eq!(
            layout.index_db(),
            PathBuf::from("/out/demo.docset/Contents/Resources/docSet.dsidx")
        );
    }

    fn parse_plist(meta: &DocsetMeta) -> plist::Dictionary {
        let xml = render_plist(meta).unwrap();
        plist::Value::from_reader_xml(xml.as_slice())
            .unwrap()
            .into_dictionary()
            .unwrap()
    }

    fn string<'a>(dict: &'a plist::Dictionary, key: &str) -> Option<&'a str> {
        dict.get(key).and_then(plist::Value::as_string)
    }

    fn boolean(dict: &plist::Dictionary, key: &str) -> Option<bool> {
        dict.get(key).and_then(plist::Value::as_boolean)
    }

    #[test]
    fn test_plist_contents() {
        let meta = DocsetMeta {
            name: "R&D <Docs>".into(),
            index_page: Some("index.html".into()),
            ..Default::default()
        };
        let xml = String::from_utf8(render_plist(&meta).unwrap()).unwrap();
        assert!(xml.contains("R&amp;D &lt;Docs"));

        let dict = parse_plist(&meta);
        assert_eq!(string(&dict, "CFBundleIdentifier"), Some("R&D <Docs>"));
        assert_eq!(string(&dict, "CFBundleName"), Some("R&D <Docs>"));
        assert_eq!(string(&dict, "DocSetPlatformFamily"), Some("r&d <docs>"));
        assert_eq!(string(&dict, "DashDocSetFamily"), Some("dashtoc"));
        assert_eq!(string(&dict, "DashDocSetDeclaredInStyle"), Some("originalName"));
        assert_eq!(boolean(&dict, "isDashDocset"), Some(true));
        assert_eq!(boolean(&dict, "isJavaScriptEnabled"), Some(false));
        assert_eq!(string(&dict, "dashIndexFilePath"), Some("index.html"));
        for absent in [
            "DashDocSetFallbackURL",
            "DashDocSetPlayURL",
            "DashDocSetFTSNotSupported",
            "DashDocSetDefaultFTSEnabled",
        ] {
            assert!(dict.get(absent).is_none(), "{absent}");
        }
    }

    #[test]
    fn test_plist_optional_keys() {
        let mut meta = DocsetMeta {
            name: "demo".into(),
            online_redirect_url: Some("https://docs.example.com/".into()),
            playground_url: Some("https://play.example.com/".into()),
            enable_js: true,
            full_text_search: FullTextSearch::On,
            ..Default::default()
        };
        let dict = parse_plist(&meta);
        assert_eq!(
            string(&dict, "DashDocSetFallbackURL"),
            Some("https://docs.example.com/")
        );
        assert_eq!(
            string(&dict, "DashDocSetPlayURL"),
            Some("https://play.example.com/")
        );
        assert_eq!(boolean(&dict, "isJavaScriptEnabled"), Some(true));
        assert_eq!(boolean(&dict, "DashDocSetDefaultFTSEnabled"), Some(true));
        assert!(dict.get("DashDocSetFTSNotSupported").is_none());

        meta.full_text_search = FullTextSearch::Forbidden;
        let dict = parse_plist(&meta);
        assert_eq!(boolean(&dict, "DashDocSetFTSNotSupported"), Some(true));
        assert!(dict.get("DashDocSetDefaultFTSEnabled").is_none());
    }

    fn write_png(path: &Path) {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(b"\0\0\0\rIHDR");
        fs::write(path, data).unwrap();
    }

    #[test]
    fn test_icons_are_copied() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("index.html"), "<html></html>").unwrap();
        let assets = tempfile::tempdir().unwrap();
        let icon = assets.path().join("small.png");
        let icon_2x = assets.path().join("large.png");
        write_png(&icon);
        write_png(&icon_2x);

        let dest = tempfile::tempdir().unwrap();
        let layout = DocsetLayout::new(dest.path(), "demo");
        let meta = DocsetMeta {
            name: "demo".into(),
            ..Default::default()
        };
        let icons = Icons {
            icon: Some(&icon),
            icon_2x: Some(&icon_2x),
        };
        prepare_docset(src.path(), &layout, &meta, icons, false).unwrap();

        assert!(layout.root.join("icon.png").is_file());
        assert!(layout.root.join("icon@2x.png").is_file());
    }

    #[test]
    fn test_docset_inside_source_is_not_copied_into_itself() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("index.html"), "<html></html>").unwrap();

        let layout = DocsetLayout::new(src.path(), "demo");
        let meta = DocsetMeta {
            name: "demo".into(),
            ..Default::default()
        };
        prepare_docset(src.path(), &layout, &meta, Icons::default(), false).unwrap();

        assert!(layout.documents.join("index.html").is_file());
        assert!(!layout.documents.join("demo.docset").exists());

        // A second run over the same tree still leaves the old bundle out.
        prepare_docset(src.path(), &layout, &meta, Icons::default(), true).unwrap();
        assert!(!layout.documents.join("demo.docset").exists());
    }

    #[test]
    fn test_prepare_copies_tree_and_refuses_overwrite() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("_static")).unwrap();
        fs::write(src.path().join("index.html"), "<html></html>").unwrap();
        fs::write(src.path().join("_static/style.css"), "body {}").unwrap();

        let dest = tempfile::tempdir().unwrap();
        let layout = DocsetLayout::new(dest.path(), "demo");
        let meta = DocsetMeta {
            name: "demo".into(),
            ..Default::default()
        };

        prepare_docset(src.path(), &layout, &meta, Icons::default(), false).unwrap();
        assert!(layout.plist().is_file());
        assert_eq!(
            fs::read_to_string(layout.documents.join("_static/style.css")).unwrap(),
            "body {}"
        );

        let err = prepare_docset(src.path(), &layout, &meta, Icons::default(), false).unwrap_err();
        assert!(matches!(err, DocsetError::AlreadyExists(_)));

        prepare_docset(src.path(), &layout, &meta, Icons::default(), true).unwrap();
        assert!(layout.documents.join("index.html").is_file());
    }

    #[test]
    fn test_missing_index_page() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let meta = DocsetMeta {
            name: "demo".into(),
            index_page: Some("nope.html".into()),
            ..Default::default()
        };
        let err = prepare_docset(
            src.path(),
            &DocsetLayout::new(dest.path(), "demo"),
            &meta,
            Icons::default(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DocsetError::MissingIndexPage(_)));
    }

    #[test]
    fn test_check_icon() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("icon.png");
        write_png(&png);
        check_icon(&png).unwrap();

        let txt = dir.path().join("icon.txt");
        fs::write(&txt, "hello").unwrap();
        assert!(matches!(check_icon(&txt), Err(DocsetError::IconNotPng(_))));

        assert!(matches!(
            check_icon(&dir.path().join("missing.png")),
            Err(DocsetError::IconUnreadable { .. })
        ));
    }

    #[test]
    fn test_check_destination() {
        let dir = tempfile::tempdir().unwrap();
        check_destination(dir.path()).unwrap();

        let file = dir.path().join("f");
        fs::write(&file, "").unwrap();
        assert!(matches!(
            check_destination(&file),
            Err(DocsetError::NotADirectory(_))
        ));
    }
}
