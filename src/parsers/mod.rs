//! Documentation parsers
//!
//! Only Sphinx's intersphinx inventories are understood. A parser detects
//! its format under a documentation root, validates the inventory header
//! and then streams [`DocEntry`]s from a background thread.
//!
//! # Usage
//!
//! ```no_run
//! use doc2dash::parsers::IntersphinxParser;
//! use std::path::Path;
//!
//! let parser = IntersphinxParser::open(Path::new("docs/_build/html"))?;
//! println!("{} {}", parser.project, parser.version);
//!
//! let mut stream = parser.start_parsing(64)?;
//! for entry in stream.by_ref() {
//!     println!("{} ({}) -> {}", entry.name, entry.kind, entry.path_with_anchor());
//! }
//! stream.finish()?;
//! # Ok::<(), doc2dash::error::ParseError>(())
//! ```

mod intersphinx;
mod types;

pub use intersphinx::{
    EntryStream, INVENTORY_FILE, IntersphinxParser, UnknownRoles, detect, parse_header,
    parse_record, role_to_type,
};
pub use types::{DocEntry, EntryType};
