//! doc2dash - turn Sphinx documentation into Dash docsets
//!
//! Reads the intersphinx inventory (`objects.inv`) of a built Sphinx site,
//! indexes every documented object into Dash's SQLite search index and
//! patches the HTML so Dash can build a per-page table of contents.

pub mod config;
pub mod convert;
pub mod docset;
pub mod error;
pub mod index;
pub mod init;
pub mod markup;
pub mod parsers;
pub mod patcher;

// Re-export commonly used types
pub use convert::{ConvertContext, ConvertOptions, ConvertSummary, convert, index_and_patch};
pub use error::ConvertError;
pub use parsers::{DocEntry, EntryType, IntersphinxParser};
