//! Parser for Sphinx-style `objects.inv`-indexed documentation

use flate2::bufread::ZlibDecoder;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self, BufRead, BufReader, Read},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, SyncSender},
    },
    thread::{self, JoinHandle},
};

use super::types::{DocEntry, EntryType};
use crate::error::{HeaderLine, ParseError};

pub const INVENTORY_FILE: &str = "objects.inv";

const BANNER: &str = "# Sphinx inventory version 2\n";
const COMPRESSION_NOTICE: &str = "# The remainder of this file is compressed using zlib.\n";

/// Longest header line read before giving up on the file
const MAX_HEADER_LINE: u64 = 4096;

lazy_static! {
    static ref PROJECT_RE: Regex = Regex::new(r"^# Project: (.+)").unwrap();
    static ref VERSION_RE: Regex = Regex::new(r"^# Version: (.*)").unwrap();
    static ref RECORD_RE: Regex =
        Regex::new(r"^(.+?)\s+(\S+)\s+(-?\d+)\s+(\S*)\s+(.*)$").unwrap();

    /// Sphinx roles (the part after the last colon) to Dash entry types
    static ref ROLE_TO_TYPE: HashMap<&'static str, EntryType> = HashMap::from([
        ("attribute", EntryType::Attribute),
        ("attr", EntryType::Attribute),
        ("member", EntryType::Attribute),
        ("class", EntryType::Class),
        ("classmethod", EntryType::Method),
        ("method", EntryType::Method),
        ("staticmethod", EntryType::Method),
        ("cmdoption", EntryType::Option),
        ("option", EntryType::Option),
        ("constant", EntryType::Constant),
        ("data", EntryType::Value),
        ("doc", EntryType::Guide),
        ("envvar", EntryType::Environment),
        ("exception", EntryType::Exception),
        ("function", EntryType::Function),
        ("interface", EntryType::Interface),
        ("label", EntryType::Section),
        ("macro", EntryType::Macro),
        ("module", EntryType::Module),
        ("opcode", EntryType::Operator),
        ("property", EntryType::Property),
        ("protocol", EntryType::Protocol),
        ("setting", EntryType::Setting),
        ("term", EntryType::Word),
        ("type", EntryType::Type),
        ("variable", EntryType::Variable),
        ("var", EntryType::Variable),
    ]);
}

/// What to do with inventory records whose role has no Dash type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownRoles {
    /// Stop the scan with [`ParseError::UnmappedRole`]
    #[default]
    Fail,
    /// Log a warning and keep scanning
    Skip,
}

/// Map a `domain:role` string to its entry type.
pub fn role_to_type(role: &str) -> Option<EntryType> {
    let key = role.rsplit(':').next().unwrap_or(role);
    ROLE_TO_TYPE.get(key).copied()
}

/// Check whether `root` holds Sphinx documentation.
///
/// A missing `objects.inv` is not an error; an unreadable one is.
pub fn detect(root: &Path) -> Result<bool, ParseError> {
    match fs::metadata(root.join(INVENTORY_FILE)) {
        Ok(meta) => Ok(meta.is_file() && meta.len() > 0),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ParseError::Io(e)),
    }
}

/// An inventory whose header has been validated and whose body has not
/// been touched yet.
pub struct IntersphinxParser<R> {
    pub project: String,
    pub version: String,
    source: Option<PathBuf>,
    body: BufReader<R>,
    unknown_roles: UnknownRoles,
}

impl IntersphinxParser<File> {
    /// Open `root/objects.inv` and parse its header.
    pub fn open(root: &Path) -> Result<Self, ParseError> {
        if !detect(root)? {
            return Err(ParseError::FormatNotRecognized);
        }

        let path = root.join(INVENTORY_FILE);
        let file = File::open(&path)?;
        let mut parser = Self::from_reader(file)?;
        parser.source = Some(path);
        Ok(parser)
    }
}

impl<R: Read + Send + 'static> IntersphinxParser<R> {
    pub fn from_reader(reader: R) -> Result<Self, ParseError> {
        let mut body = BufReader::new(reader);
        let (project, version) = parse_header(&mut body)?;

        Ok(Self {
            project,
            version,
            source: None,
            body,
            unknown_roles: UnknownRoles::default(),
        })
    }

    pub fn with_unknown_roles(mut self, policy: UnknownRoles) -> Self {
        self.unknown_roles = policy;
        self
    }

    /// Path of the inventory file, if it was opened from disk
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Start scanning the compressed body on a background thread.
    ///
    /// At most `capacity` parsed entries wait in the channel; the scan
    /// blocks until the consumer catches up.
    pub fn start_parsing(self, capacity: usize) -> Result<EntryStream, ParseError> {
        let (entry_tx, entry_rx) = mpsc::sync_channel(capacity);
        let (outcome_tx, outcome_rx) = mpsc::sync_channel(1);
        let cancelled = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&cancelled);
        let policy = self.unknown_roles;
        let body = self.body;

        let worker = thread::Builder::new()
            .name("inventory-scan".to_string())
            .spawn(move || {
                let outcome = scan(body, &entry_tx, &flag, policy);
                // Entries are closed before the outcome is sent.
                drop(entry_tx);
                let _ = outcome_tx.send(outcome);
            })?;

        Ok(EntryStream {
            entries: Some(entry_rx),
            outcome: outcome_rx,
            cancelled,
            worker: Some(worker),
        })
    }
}

/// Receiving end of a running inventory scan.
///
/// Iterate it for entries, then call [`EntryStream::finish`] for the
/// terminal result. Dropping it cancels the scan and joins the thread.
pub struct EntryStream {
    entries: Option<Receiver<DocEntry>>,
    outcome: Receiver<Result<(), ParseError>>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl EntryStream {
    /// Stop the scan. No entry is delivered after this returns.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // Unblocks a producer waiting on a full channel.
        self.entries.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for the scan to end and return its terminal result.
    ///
    /// Entries not yet received are discarded, which stops the scan.
    pub fn finish(mut self) -> Result<(), ParseError> {
        self.entries.take();
        let outcome = self
            .outcome
            .recv()
            .unwrap_or(Err(ParseError::ProducerPanicked));
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                return Err(ParseError::ProducerPanicked);
            }
        }
        outcome
    }
}

impl Iterator for EntryStream {
    type Item = DocEntry;

    fn next(&mut self) -> Option<DocEntry> {
        self.entries.as_ref()?.recv().ok()
    }
}

impl Drop for EntryStream {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.cancel();
            let _ = worker.join();
        }
    }
}

fn scan<R: Read>(
    body: BufReader<R>,
    tx: &SyncSender<DocEntry>,
    cancelled: &AtomicBool,
    policy: UnknownRoles,
) -> Result<(), ParseError> {
    let lines = BufReader::new(ZlibDecoder::new(body)).lines();

    for (idx, line) in lines.enumerate() {
        if cancelled.load(Ordering::SeqCst) {
            return Err(ParseError::Cancelled);
        }

        let line = line.map_err(ParseError::Decompress)?;
        if line.trim().is_empty() {
            continue;
        }

        let entry = match parse_record(&line, idx + 1) {
            Ok(entry) => entry,
            Err(ParseError::UnmappedRole { role, line: line_no })
                if policy == UnknownRoles::Skip =>
            {
                tracing::warn!(%role, line = line_no, "skipping inventory record with unknown role");
                continue;
            }
            Err(e) => return Err(e),
        };

        if cancelled.load(Ordering::SeqCst) || tx.send(entry).is_err() {
            return Err(ParseError::Cancelled);
        }
    }

    Ok(())
}

/// Parse and validate the four header lines, returning project name and
/// version.
pub fn parse_header<R: BufRead>(reader: &mut R) -> Result<(String, String), ParseError> {
    let line = read_header_line(reader, HeaderLine::Banner)?;
    if line != BANNER {
        return Err(corrupt(HeaderLine::Banner, &line));
    }

    let line = read_header_line(reader, HeaderLine::Project)?;
    let project = PROJECT_RE
        .captures(line.trim_end_matches('\n'))
        .map(|c| c[1].to_string())
        .ok_or_else(|| corrupt(HeaderLine::Project, &line))?;

    let line = read_header_line(reader, HeaderLine::Version)?;
    let version = VERSION_RE
        .captures(line.trim_end_matches('\n'))
        .map(|c| c[1].to_string())
        .ok_or_else(|| corrupt(HeaderLine::Version, &line))?;

    let line = read_header_line(reader, HeaderLine::Compression)?;
    if line != COMPRESSION_NOTICE {
        return Err(corrupt(HeaderLine::Compression, &line));
    }

    Ok((project, version))
}

fn read_header_line<R: BufRead>(reader: &mut R, which: HeaderLine) -> Result<String, ParseError> {
    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(MAX_HEADER_LINE)
        .read_until(b'\n', &mut buf)?;
    if !buf.ends_with(b"\n") {
        return Err(corrupt(which, &String::from_utf8_lossy(&buf)));
    }
    String::from_utf8(buf).map_err(|e| corrupt(which, &String::from_utf8_lossy(e.as_bytes())))
}

fn corrupt(line: HeaderLine, found: &str) -> ParseError {
    ParseError::Corrupt {
        line,
        found: found.to_string(),
    }
}

/// Turn one decompressed inventory line into an entry.
///
/// ```text
/// sqlalchemy.dialects.postgresql.pypostgresql py:module 1 dialects/postgresql.html#$ -
/// dict classes std:term -1 glossary.html#term-dict-classes -
/// ```
pub fn parse_record(line: &str, line_no: usize) -> Result<DocEntry, ParseError> {
    let caps = RECORD_RE
        .captures(line)
        .ok_or_else(|| ParseError::MalformedRecord {
            line: line_no,
            text: line.to_string(),
        })?;

    let name = &caps[1];
    let role = &caps[2];
    let uri = &caps[4];
    let display = &caps[5];

    let kind = role_to_type(role).ok_or_else(|| ParseError::UnmappedRole {
        role: role.to_string(),
        line: line_no,
    })?;

    let (path, anchor) = split_uri(uri, name);

    let name = if display == "-" { name } else { display };

    Ok(DocEntry {
        name: name.to_string(),
        kind,
        path,
        anchor,
    })
}

/// Split an inventory URI into file path and anchor.
///
/// A trailing `$` in the anchor stands for the entry's name.
fn split_uri(uri: &str, name: &str) -> (String, String) {
    if let Some(path) = uri.strip_suffix("#$") {
        return (path.to_string(), name.to_string());
    }

    match uri.split_once('#') {
        Some((path, anchor)) => {
            let anchor = match anchor.strip_suffix('$') {
                Some(prefix) => format!("{}{}", prefix, name),
                None => anchor.to_string(),
            };
            (path.to_string(), anchor)
        }
        None => (uri.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::test_support::{DropCounter, build_inventory};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;

    fn entry(name: &str, kind: EntryType, path: &str, anchor: &str) -> DocEntry {
        DocEntry {
            name: name.into(),
            kind,
            path: path.into(),
            anchor: anchor.into(),
        }
    }

    fn collect(lines: &[&str]) -> (Vec<DocEntry>, Result<(), ParseError>) {
        let data = build_inventory("demo", "1.0", lines);
        let parser = IntersphinxParser::from_reader(Cursor::new(data)).unwrap();
        let mut stream = parser.start_parsing(4).unwrap();
        let entries: Vec<_> = stream.by_ref().collect();
        (entries, stream.finish())
    }

    #[test]
    fn test_header_round_trips_name_and_version() {
        let data = build_inventory("Flask", "0.9-dev", &[]);
        let parser = IntersphinxParser::from_reader(Cursor::new(data)).unwrap();
        assert_eq!(parser.project, "Flask");
        assert_eq!(parser.version, "0.9-dev");
    }

    #[test]
    fn test_header_accepts_empty_version() {
        let data = build_inventory("demo", "", &[]);
        let parser = IntersphinxParser::from_reader(Cursor::new(data)).unwrap();
        assert_eq!(parser.version, "");
    }

    #[test]
    fn test_header_names_failing_line() {
        let cases: [(&str, HeaderLine); 4] = [
            ("# Sphinx inventory version 1\n", HeaderLine::Banner),
            ("# Sphinx inventory version 2\n# Projekt: x\n", HeaderLine::Project),
            (
                "# Sphinx inventory version 2\n# Project: x\n# Release: 1\n",
                HeaderLine::Version,
            ),
            (
                "# Sphinx inventory version 2\n# Project: x\n# Version: 1\n",
                HeaderLine::Compression,
            ),
        ];

        for (header, expected) in cases {
            let err = parse_header(&mut Cursor::new(header.as_bytes())).unwrap_err();
            match err {
                ParseError::Corrupt { line, .. } => assert_eq!(line, expected, "{header:?}"),
                other => panic!("unexpected error for {header:?}: {other}"),
            }
        }
    }

    #[test]
    fn test_header_line_length_is_capped() {
        let junk = vec![b'x'; 1 << 20];
        let mut reader = Cursor::new(junk);
        match parse_header(&mut reader).unwrap_err() {
            ParseError::Corrupt { line, found } => {
                assert_eq!(line, HeaderLine::Banner);
                assert_eq!(found.len() as u64, MAX_HEADER_LINE);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(reader.position(), MAX_HEADER_LINE);
    }

    #[test]
    fn test_class_record() {
        let (entries, outcome) = collect(&["widget.Foo py:class 1 api.html#widget.Foo -"]);
        outcome.unwrap();
        assert_eq!(
            entries,
            vec![entry("widget.Foo", EntryType::Class, "api.html", "widget.Foo")]
        );
    }

    #[test]
    fn test_term_with_spaces_in_name() {
        let parsed =
            parse_record("dict classes std:term -1 glossary.html#term-dict-classes -", 1).unwrap();
        assert_eq!(
            parsed,
            entry(
                "dict classes",
                EntryType::Word,
                "glossary.html",
                "term-dict-classes"
            )
        );
    }

    #[test]
    fn test_dollar_suffix_uses_name_as_anchor() {
        let parsed = parse_record(
            "sqlalchemy.dialects.postgresql.pypostgresql py:module 1 dialects/postgresql.html#$ -",
            1,
        )
        .unwrap();
        assert_eq!(parsed.path, "dialects/postgresql.html");
        assert_eq!(parsed.anchor, "sqlalchemy.dialects.postgresql.pypostgresql");
        assert_eq!(parsed.kind, EntryType::Module);
    }

    #[test]
    fn test_dollar_after_prefix_is_expanded() {
        let parsed = parse_record("some_module py:module 0 index.html#module-$ -", 1).unwrap();
        assert_eq!(parsed.anchor, "module-some_module");
    }

    #[test]
    fn test_split_at_first_hash() {
        let parsed = parse_record("x std:label -1 page.html#a#b X label", 1).unwrap();
        assert_eq!(parsed.path, "page.html");
        assert_eq!(parsed.anchor, "a#b");
        assert_eq!(parsed.name, "X label");
    }

    #[test]
    fn test_uri_without_anchor() {
        let parsed = parse_record("glossary std:doc -1 glossary.html A Glossary", 1).unwrap();
        assert_eq!(parsed, entry("A Glossary", EntryType::Guide, "glossary.html", ""));
    }

    #[test]
    fn test_display_override_keeps_anchor_from_name() {
        let parsed = parse_record("genindex std:label -1 genindex.html#$ Index", 1).unwrap();
        assert_eq!(parsed.name, "Index");
        assert_eq!(parsed.anchor, "genindex");
    }

    #[test]
    fn test_malformed_record() {
        let err = parse_record("nonsense", 7).unwrap_err();
        assert!(matches!(err, ParseError::MalformedRecord { line: 7, .. }));
    }

    #[test]
    fn test_unknown_role_fails_by_default() {
        let (entries, outcome) = collect(&[
            "a py:class 1 api.html#$ -",
            "b py:frobnicator 1 api.html#$ -",
            "c py:class 1 api.html#$ -",
        ]);
        assert_eq!(entries.len(), 1);
        match outcome {
            Err(ParseError::UnmappedRole { role, line }) => {
                assert_eq!(role, "py:frobnicator");
                assert_eq!(line, 2);
            }
            other => panic!("expected unmapped role, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_role_can_be_skipped() {
        let data = build_inventory(
            "demo",
            "1.0",
            &[
                "a py:class 1 api.html#$ -",
                "b py:frobnicator 1 api.html#$ -",
                "c py:class 1 api.html#$ -",
            ],
        );
        let parser = IntersphinxParser::from_reader(Cursor::new(data))
            .unwrap()
            .with_unknown_roles(UnknownRoles::Skip);
        let mut stream = parser.start_parsing(0).unwrap();
        let names: Vec<_> = stream.by_ref().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "c"]);
        stream.finish().unwrap();
    }

    #[test]
    fn test_corrupt_body_reports_decompress_error() {
        let mut data = b"# Sphinx inventory version 2\n# Project: demo\n# Version: 1.0\n".to_vec();
        data.extend_from_slice(COMPRESSION_NOTICE.as_bytes());
        data.extend_from_slice(b"this is not zlib data\n");
        let parser = IntersphinxParser::from_reader(Cursor::new(data)).unwrap();
        let mut stream = parser.start_parsing(1).unwrap();
        assert_eq!(stream.by_ref().count(), 0);
        assert!(matches!(stream.finish(), Err(ParseError::Decompress(_))));
    }

    #[test]
    fn test_cancel_stops_delivery_and_closes_stream_once() {
        let lines: Vec<String> = (0..500)
            .map(|i| format!("mod.f{i} py:function 1 api.html#$ -"))
            .collect();
        let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let data = build_inventory("demo", "1.0", &line_refs);

        let drops = Arc::new(AtomicUsize::new(0));
        let reader = DropCounter::new(Cursor::new(data), Arc::clone(&drops));
        let parser = IntersphinxParser::from_reader(reader).unwrap();
        let mut stream = parser.start_parsing(0).unwrap();

        assert!(stream.next().is_some());
        stream.cancel();
        assert!(stream.is_cancelled());
        assert!(stream.next().is_none());

        assert!(matches!(stream.finish(), Err(ParseError::Cancelled)));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropping_stream_joins_producer() {
        let lines: Vec<String> = (0..100)
            .map(|i| format!("mod.C{i} py:class 1 api.html#$ -"))
            .collect();
        let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let data = build_inventory("demo", "1.0", &line_refs);

        let drops = Arc::new(AtomicUsize::new(0));
        let reader = DropCounter::new(Cursor::new(data), Arc::clone(&drops));
        let mut stream = IntersphinxParser::from_reader(reader)
            .unwrap()
            .start_parsing(0)
            .unwrap();
        stream.next();
        drop(stream);

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detect() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!detect(dir.path()).unwrap());

        fs::write(dir.path().join(INVENTORY_FILE), b"").unwrap();
        assert!(!detect(dir.path()).unwrap());

        fs::write(dir.path().join(INVENTORY_FILE), build_inventory("x", "1", &[])).unwrap();
        assert!(detect(dir.path()).unwrap());
    }

    #[test]
    fn test_open_unrecognized_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            IntersphinxParser::open(dir.path()),
            Err(ParseError::FormatNotRecognized)
        ));
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let inv = dir.path().join(INVENTORY_FILE);
        fs::write(&inv, build_inventory("demo", "2.1", &["x py:data 1 a.html#$ -"])).unwrap();

        let parser = IntersphinxParser::open(dir.path()).unwrap();
        assert_eq!(parser.source(), Some(inv.as_path()));
        let mut stream = parser.start_parsing(8).unwrap();
        let entries: Vec<_> = stream.by_ref().collect();
        stream.finish().unwrap();
        assert_eq!(entries, vec![entry("x", EntryType::Value, "a.html", "x")]);
    }
}
