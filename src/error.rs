//! Error types for every stage of a conversion

use std::{fmt, io, path::PathBuf};
use thiserror::Error;

/// The four fixed lines that open an `objects.inv` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLine {
    Banner,
    Project,
    Version,
    Compression,
}

impl fmt::Display for HeaderLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HeaderLine::Banner => "inventory banner",
            HeaderLine::Project => "`# Project:` line",
            HeaderLine::Version => "`# Version:` line",
            HeaderLine::Compression => "compression notice",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    /// No `objects.inv` under the documentation root
    #[error("documentation format not recognized")]
    FormatNotRecognized,

    /// The inventory exists but one of its header lines is wrong
    #[error("corrupt inventory header: invalid {line} (found {found:?})")]
    Corrupt { line: HeaderLine, found: String },

    /// A body record doesn't follow `name domain:role priority uri display`
    #[error("corrupt inventory record on line {line}: {text:?}")]
    MalformedRecord { line: usize, text: String },

    /// A record uses a role that has no Dash entry type
    #[error("unknown role `{role}` on inventory line {line}")]
    UnmappedRole { role: String, line: usize },

    /// The zlib body could not be inflated or isn't UTF-8
    #[error("can't decompress inventory body: {0}")]
    Decompress(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The consumer stopped the scan
    #[error("parsing cancelled")]
    Cancelled,

    #[error("inventory scan thread panicked")]
    ProducerPanicked,
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index database error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A row whose type column isn't a Dash entry type
    #[error("unknown entry type in index: {0}")]
    UnknownType(String),
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("could not read {} for patching: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write patched copy of {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not replace {} with its patched copy: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum DocsetError {
    #[error("can't access destination path {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("destination {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("destination path {} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),

    #[error("couldn't open icon {}: {source}", path.display())]
    IconUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("icon {} is not a PNG image", .0.display())]
    IconNotPng(PathBuf),

    #[error("index page {} does not exist in the documentation", .0.display())]
    MissingIndexPage(PathBuf),

    #[error("can't copy documentation tree into docset: {0}")]
    Copy(#[from] walkdir::Error),

    #[error("can't write Info.plist: {0}")]
    Plist(#[from] plist::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl DocsetError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        DocsetError::Io {
            context: context.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("can't be quiet and verbose at the same time")]
    QuietAndVerbose,

    #[error("unknown documentation format at {}", .0.display())]
    UnknownFormat(PathBuf),

    #[error("parsing failed: {0}")]
    Parse(#[from] ParseError),

    #[error("indexing failed: {0}")]
    Index(#[from] IndexError),

    #[error("patching failed: {0}")]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Docset(#[from] DocsetError),
}
