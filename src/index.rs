//! Search index using SQLite
//!
//! The schema is the one Dash.app reads from `docSet.dsidx`. Paths are
//! stored with their anchor appended (`api.html#widget.Foo`).

use rusqlite::{Connection, params};
use std::{
    borrow::Cow,
    collections::{BTreeSet, HashMap},
    path::Path,
};

use crate::error::IndexError;
use crate::parsers::{DocEntry, EntryType};

const INIT_SQL: &str = r#"
CREATE TABLE searchIndex(id INTEGER PRIMARY KEY, name TEXT, type TEXT, path TEXT);
CREATE UNIQUE INDEX anchor ON searchIndex (name, type, path);
"#;

const INSERT_SQL: &str = "INSERT OR IGNORE INTO searchIndex(name, type, path) VALUES (?1, ?2, ?3)";

const FILES_SQL: &str = "SELECT DISTINCT path FROM searchIndex";

const ENTRIES_FOR_FILE_SQL: &str = "SELECT name, type, path FROM searchIndex \
     WHERE instr(path, ?1) > 0 OR instr(path, ?2) > 0 ORDER BY id";

/// Decode a percent-encoded inventory path into a file system path.
///
/// Sphinx quotes document names when writing `objects.inv`. Paths that
/// don't decode to UTF-8 are returned as they are.
pub fn decode_path(path: &str) -> Cow<'_, str> {
    urlencoding::decode(path).unwrap_or(Cow::Borrowed(path))
}

/// Entries of one file, keyed by the link targets that point at them.
///
/// Every entry with an anchor is reachable both as `path#anchor` and as
/// the fragment-only `#anchor` used by in-page links.
#[derive(Debug, Default, Clone)]
pub struct LookupTable {
    entries: HashMap<String, DocEntry>,
}

impl LookupTable {
    pub fn insert(&mut self, entry: DocEntry) {
        if entry.anchor.is_empty() {
            return;
        }
        self.entries
            .insert(format!("#{}", entry.anchor), entry.clone());
        self.entries.insert(entry.path_with_anchor(), entry);
    }

    pub fn get(&self, href: &str) -> Option<&DocEntry> {
        self.entries.get(href)
    }

    /// Number of keys, not entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct IndexDb {
    conn: Connection,
}

impl IndexDb {
    /// Create a fresh index database at `path`
    pub fn create(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(path)?;
        // The index is rebuilt from scratch on every run.
        conn.execute_batch("PRAGMA synchronous = OFF; PRAGMA journal_mode = MEMORY;")?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, IndexError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, IndexError> {
        conn.execute_batch(INIT_SQL)?;
        Ok(Self { conn })
    }

    /// Add `entry`. Adding the same entry twice is a no-op.
    pub fn add_entry(&self, entry: &DocEntry) -> Result<(), IndexError> {
        let mut stmt = self.conn.prepare_cached(INSERT_SQL)?;
        stmt.execute(params![
            entry.name,
            entry.kind.as_str(),
            entry.path_with_anchor()
        ])?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM searchIndex", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Paths of all files that contain entries, without fragments and
    /// still percent-encoded as stored
    pub fn indexed_files(&self) -> Result<Vec<String>, IndexError> {
        let mut stmt = self.conn.prepare(FILES_SQL)?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|path| path.map(|p| strip_fragment(&p).to_string()))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(paths.into_iter().collect())
    }

    /// Lookup table for the file at `file_path`.
    ///
    /// `file_path` may live under a different root than the documentation
    /// the index was built from. Files are matched by name; when several
    /// stored paths are suffixes of `file_path` (`api.html` and
    /// `sub/api.html` for `/docs/sub/api.html`), the longest one wins.
    /// Stored paths are compared decoded; the table keeps them encoded
    /// since that is how they appear in `href`s.
    pub fn entries_for_file(&self, file_path: &Path) -> Result<LookupTable, IndexError> {
        let mut table = LookupTable::default();

        let Some(base) = file_path.file_name().map(|n| n.to_string_lossy()) else {
            return Ok(table);
        };

        let mut stmt = self.conn.prepare_cached(ENTRIES_FOR_FILE_SQL)?;
        let mut rows = stmt.query(params![
            format!("{}#", base),
            format!("{}#", urlencoding::encode(&base))
        ])?;

        let mut matched: Vec<(usize, DocEntry)> = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let typ: String = row.get(1)?;
            let path_with_anchor: String = row.get(2)?;

            let Some((path, anchor)) = path_with_anchor.split_once('#') else {
                continue;
            };
            if !file_path.ends_with(&*decode_path(path)) {
                continue;
            }

            let kind: EntryType = typ.parse().map_err(IndexError::UnknownType)?;
            let depth = Path::new(path).components().count();
            matched.push((
                depth,
                DocEntry {
                    name,
                    kind,
                    path: path.to_string(),
                    anchor: anchor.to_string(),
                },
            ));
        }

        let deepest = matched.iter().map(|(depth, _)| *depth).max().unwrap_or(0);
        for (_, entry) in matched.into_iter().filter(|(depth, _)| *depth == deepest) {
            table.insert(entry);
        }

        Ok(table)
    }
}

fn strip_fragment(path: &str) -> &str {
    path.split_once('#').map_or(path, |(p, _)| p)
}
