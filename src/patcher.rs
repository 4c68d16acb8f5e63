//! Insert Dash table-of-contents anchors into HTML files
//!
//! Every `<a class="headerlink" href="…">` whose target is in the file's
//! lookup table gets a `dashAnchor` placed right before it. All other bytes
//! are passed through untouched.

use std::{
    fs,
    io::{self, BufWriter, Write},
    path::Path,
};

use crate::error::PatchError;
use crate::index::LookupTable;
use crate::markup::Tokenizer;

/// Class of Sphinx's in-page permalink next to each heading/signature
const HEADERLINK_CLASS: &str = "headerlink";

/// Copy `input` to `out`, inserting anchors. Returns the number added.
///
/// Links that already carry the exact anchor in front of them are left
/// alone, so patching a file twice changes nothing the second time.
pub fn patch_markup<W: Write + ?Sized>(
    input: &[u8],
    table: &LookupTable,
    out: &mut W,
) -> io::Result<usize> {
    let mut added = 0;
    let mut prev: [&[u8]; 2] = [b"", b""];

    for token in Tokenizer::new(input) {
        if token.is_start_tag("a") && token.attr("class") == Some(HEADERLINK_CLASS) {
            if let Some(entry) = token.attr("href").and_then(|href| table.get(href)) {
                let anchor = entry.dash_anchor();
                if !already_anchored(&prev, anchor.as_bytes()) {
                    out.write_all(anchor.as_bytes())?;
                    added += 1;
                }
            }
        }

        out.write_all(token.raw)?;
        prev = [prev[1], token.raw];
    }

    Ok(added)
}

fn already_anchored(prev: &[&[u8]; 2], anchor: &[u8]) -> bool {
    anchor.len() == prev[0].len() + prev[1].len()
        && anchor.starts_with(prev[0])
        && anchor.ends_with(prev[1])
}

/// Patch the file at `path` in place. Returns the number of anchors added.
pub fn patch_file(path: &Path, table: &LookupTable) -> Result<usize, PatchError> {
    let input = fs::read(path).map_err(|source| PatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let added = rewrite_in_place(path, |out| patch_markup(&input, table, out))?;
    if added > 0 {
        tracing::debug!(path = %path.display(), added, "patched");
    } else {
        tracing::debug!(path = %path.display(), "nothing to patch");
    }
    Ok(added)
}

/// Replace `path` with what `write` produces, if it reports any changes.
///
/// The output goes to a temporary file next to `path` that is renamed
/// over it only once `write` has succeeded; on error the original stays
/// as it was and the temporary file is removed.
fn rewrite_in_place<F>(path: &Path, write: F) -> Result<usize, PatchError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<usize>,
{
    let write_err = |source| PatchError::Write {
        path: path.to_path_buf(),
        source,
    };

    let permissions = fs::metadata(path)
        .map_err(|source| PatchError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .permissions();

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let prefix = format!(
        ".{}.",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    let tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;

    let mut out = BufWriter::new(tmp);
    let changed = write(&mut out).map_err(write_err)?;
    let tmp = out
        .into_inner()
        .map_err(|e| write_err(e.into_error()))?;

    if changed == 0 {
        return Ok(0);
    }

    fs::set_permissions(tmp.path(), permissions).map_err(write_err)?;
    tmp.persist(path).map_err(|e| PatchError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(changed)
}
