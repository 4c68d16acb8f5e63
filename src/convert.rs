use colored::*;
use std::{
    io::Read,
    path::{Path, PathBuf},
};

use crate::config::Config;
use crate::docset::{self, DocsetLayout, DocsetMeta, FullTextSearch, Icons};
use crate::error::{ConvertError, ParseError};
use crate::index::{IndexDb, decode_path};
use crate::parsers::IntersphinxParser;
use crate::patcher::patch_file;

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub destination: Option<PathBuf>,
    pub name: Option<String>,
    pub force: bool,
    pub icon: Option<PathBuf>,
    pub icon_2x: Option<PathBuf>,
    pub index_page: Option<String>,
    pub online_redirect_url: Option<String>,
    pub playground_url: Option<String>,
    pub enable_js: bool,
    pub full_text_search: FullTextSearch,
}

#[derive(Debug)]
pub struct ConvertContext {
    pub config: Config,
    pub options: ConvertOptions,
    pub verbose: bool,
    pub quiet: bool,
}

impl ConvertContext {
    fn say(&self, line: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", line.as_ref());
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatchSummary {
    pub entries: usize,
    pub files_patched: usize,
    pub anchors_added: usize,
    pub files_missing: usize,
}

#[derive(Debug)]
pub struct ConvertSummary {
    pub docset: PathBuf,
    pub name: String,
    pub stats: PatchSummary,
}

/// Turn the documentation at `source` into a docset.
pub fn convert(ctx: &ConvertContext, source: &Path) -> Result<ConvertSummary, ConvertError> {
    if ctx.quiet && ctx.verbose {
        return Err(ConvertError::QuietAndVerbose);
    }

    let opts = &ctx.options;

    // Cheap checks before the expensive work.
    for icon in opts.icon.iter().chain(&opts.icon_2x) {
        docset::check_icon(icon)?;
    }
    let dest = opts
        .destination
        .clone()
        .unwrap_or_else(|| ctx.config.destination.clone());
    docset::check_destination(&dest)?;

    let parser = match IntersphinxParser::open(source) {
        Ok(parser) => parser.with_unknown_roles(ctx.config.unknown_roles),
        Err(ParseError::FormatNotRecognized) => {
            return Err(ConvertError::UnknownFormat(source.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let name = docset::normalize_name(opts.name.as_deref().unwrap_or(&parser.project)).to_string();
    let layout = DocsetLayout::new(&dest, &name);

    ctx.say(format!(
        "{} Converting {} {} ({})",
        "📚".cyan(),
        parser.project.green().bold(),
        parser.version,
        "intersphinx".yellow()
    ));
    tracing::info!(source = %source.display(), docset = %layout.root.display(), "converting");

    let meta = DocsetMeta {
        name: name.clone(),
        index_page: opts.index_page.clone(),
        online_redirect_url: opts
            .online_redirect_url
            .clone()
            .or_else(|| ctx.config.online_redirect_url.clone()),
        playground_url: opts.playground_url.clone(),
        enable_js: opts.enable_js || ctx.config.enable_js,
        full_text_search: opts.full_text_search,
    };
    let icons = Icons {
        icon: opts.icon.as_deref(),
        icon_2x: opts.icon_2x.as_deref(),
    };
    docset::prepare_docset(source, &layout, &meta, icons, opts.force)?;

    let db = IndexDb::create(&layout.index_db())?;

    ctx.say(format!("{} Indexing and patching...", "🔄".cyan()));
    let stats = index_and_patch(
        parser,
        &db,
        &layout.documents,
        ctx.config.channel_capacity,
        ctx.verbose,
    )?;

    ctx.say(format!(
        "{} Converted {} entries, added {} anchors to {} file(s)",
        "✅".green(),
        stats.entries.to_string().bold(),
        stats.anchors_added,
        stats.files_patched
    ));
    if stats.files_missing > 0 {
        ctx.say(format!(
            "{} {} indexed file(s) not found in the documentation",
            "⚠️".yellow(),
            stats.files_missing
        ));
    }
    ctx.say(format!("{} {}", "📦".cyan(), layout.root.display()));

    Ok(ConvertSummary {
        docset: layout.root,
        name,
        stats,
    })
}

/// Feed every inventory entry into `db`, then patch the files under
/// `documents` that have entries.
pub fn index_and_patch<R: Read + Send + 'static>(
    parser: IntersphinxParser<R>,
    db: &IndexDb,
    documents: &Path,
    capacity: usize,
    verbose: bool,
) -> Result<PatchSummary, ConvertError> {
    let mut summary = PatchSummary::default();

    let mut stream = parser.start_parsing(capacity)?;
    while let Some(entry) = stream.next() {
        if verbose {
            println!("  {} {} ({})", "•".blue(), entry.name, entry.kind);
        }
        tracing::debug!(name = %entry.name, kind = %entry.kind, path = %entry.path_with_anchor(), "entry");

        if let Err(e) = db.add_entry(&entry) {
            stream.cancel();
            return Err(e.into());
        }
        summary.entries += 1;
    }
    stream.finish()?;

    tracing::info!(entries = summary.entries, "inventory indexed");

    for file in db.indexed_files()? {
        let path = documents.join(&*decode_path(&file));
        if !path.is_file() {
            tracing::warn!(file = %file, "indexed file not found, skipping");
            summary.files_missing += 1;
            continue;
        }

        let table = db.entries_for_file(&path)?;
        if table.is_empty() {
            continue;
        }

        let added = patch_file(&path, &table)?;
        if added > 0 {
            summary.files_patched += 1;
            summary.anchors_added += added;
        }
        if verbose {
            println!("  {} {} (+{})", "🔨".cyan(), file, added);
        }
    }

    Ok(summary)
}
