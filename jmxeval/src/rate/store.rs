//! Durable key-value state file shared across invocations.
//!
//! The file is line-oriented `key=value` text. Each run holds an exclusive
//! advisory lock on a sibling `<file>.lock` for its whole read-modify-write,
//! and replaces the file by writing a temporary file in the same directory
//! and renaming it over the old one. A reader therefore never sees a
//! half-written file, and two runs for the same variable cannot interleave.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;
use thiserror::Error;

use super::Sample;

/// Suffix of the key holding a sample's timestamp.
pub const TIMESTAMP_SUFFIX: &str = "_timestamp";

/// Recoverable state file problems.
///
/// None of these abort an evaluation; they degrade a rate to a first
/// observation or leave the stored sample stale.
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("Could not read state file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Could not write state file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Could not lock state file {}: {source}", .path.display())]
    Lock { path: PathBuf, source: io::Error },

    #[error("Ignoring malformed stored sample {key}={value}")]
    MalformedSample { key: String, value: String },
}

/// Contents of the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateFile {
    entries: BTreeMap<String, String>,
}

impl StateFile {
    /// Parse file contents.
    ///
    /// Blank lines and lines starting with `#` or `!` are ignored. The key
    /// ends at the first unescaped `=` or `:`; surrounding whitespace is
    /// trimmed from key and value. A line without a separator is a key with
    /// an empty value. Backslash escapes, including `\uXXXX`, are decoded in
    /// both key and value.
    pub fn parse(content: &str) -> Self {
        let mut entries = BTreeMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let (key, value) = split_entry(line);
            entries.insert(unescape(key.trim_end()), unescape(value.trim()));
        }

        Self { entries }
    }

    /// Decode raw file bytes as ISO-8859-1 and parse them.
    ///
    /// Every byte maps to a character, so a stray non-UTF-8 byte never makes
    /// the rest of the file unreadable.
    pub fn parse_bytes(bytes: &[u8]) -> Self {
        let content: String = bytes.iter().copied().map(char::from).collect();
        Self::parse(&content)
    }

    /// Render the file contents, one entry per line in key order.
    ///
    /// The output is plain ASCII: anything outside printable ASCII is written
    /// as a `\uXXXX` escape.
    pub fn render(&self) -> String {
        let mut out = String::from("# jmxeval rate samples\n");
        for (key, value) in &self.entries {
            escape_into(&mut out, key, true);
            out.push('=');
            escape_into(&mut out, value, false);
            out.push('\n');
        }
        out
    }

    /// Look up a raw entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Set a raw entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the file has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read the sample stored for `variable`.
    ///
    /// A sample only exists when both the value and its timestamp twin are
    /// present; a lone half is treated as absent. An entry that is present
    /// but not an integer is reported as `MalformedSample`.
    pub fn sample(&self, variable: &str) -> Result<Option<Sample>, StateStoreError> {
        let ts_key = timestamp_key(variable);
        let (Some(value), Some(timestamp)) = (self.get(variable), self.get(&ts_key)) else {
            return Ok(None);
        };

        let value = parse_entry(variable, value)?;
        let timestamp_ms = parse_entry(&ts_key, timestamp)?;

        Ok(Some(Sample {
            value,
            timestamp_ms,
        }))
    }

    /// Store a sample for `variable`: value and timestamp together.
    pub fn set_sample(&mut self, variable: &str, sample: Sample) {
        self.set(variable, sample.value.to_string());
        self.set(timestamp_key(variable), sample.timestamp_ms.to_string());
    }
}

/// Key under which a variable's sample timestamp is stored.
pub fn timestamp_key(variable: &str) -> String {
    format!("{}{}", variable, TIMESTAMP_SUFFIX)
}

fn parse_entry(key: &str, value: &str) -> Result<i64, StateStoreError> {
    value
        .parse()
        .map_err(|_| StateStoreError::MalformedSample {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// Split a line at the first unescaped `=` or `:`. Both halves stay escaped.
fn split_entry(line: &str) -> (&str, &str) {
    let mut chars = line.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '=' | ':' => return (&line[..i], &line[i + c.len_utf8()..]),
            _ => {}
        }
    }

    (line, "")
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => match take_hex4(&mut chars) {
                Some(high @ 0xD800..=0xDBFF) => {
                    let mut ahead = chars.clone();
                    let low = if ahead.next() == Some('\\') && ahead.next() == Some('u') {
                        take_hex4(&mut ahead)
                    } else {
                        None
                    };
                    match low {
                        Some(low @ 0xDC00..=0xDFFF) => {
                            chars = ahead;
                            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                            out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                        }
                        _ => out.push(char::REPLACEMENT_CHARACTER),
                    }
                }
                Some(unit) => out.push(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER)),
                // Not a valid escape: keep the letter.
                None => out.push('u'),
            },
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}

/// Consume four hex digits, or nothing if the next four are not hex.
fn take_hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let digits: String = chars.clone().take(4).collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let unit = u32::from_str_radix(&digits, 16).ok()?;
    for _ in 0..4 {
        chars.next();
    }
    Some(unit)
}

fn escape_into(out: &mut String, text: &str, is_key: bool) {
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0_u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04X}", unit));
                }
            }
        }
    }
}

/// Location of the state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store backed by the file at `path`.
    ///
    /// Nothing is touched on disk until the first lock, load or save.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sibling lock file.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Take the exclusive cross-process lock, blocking until it is free.
    ///
    /// Creates the parent directory if needed. The lock is released when the
    /// returned guard is dropped.
    pub fn lock(&self) -> Result<StoreLock, StateStoreError> {
        let lock_path = self.lock_path();
        let lock_err = |source: io::Error| StateStoreError::Lock {
            path: lock_path.clone(),
            source,
        };

        self.create_parent().map_err(lock_err)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;

        Ok(StoreLock { file })
    }

    /// Read the state file. A missing file reads as empty.
    pub fn load(&self) -> Result<StateFile, StateStoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(StateFile::parse_bytes(&bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(StateFile::default()),
            Err(source) => Err(StateStoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Atomically replace the state file with `state`.
    pub fn save(&self, state: &StateFile) -> Result<(), StateStoreError> {
        self.write_atomically(state).map_err(|source| StateStoreError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn write_atomically(&self, state: &StateFile) -> io::Result<()> {
        let dir = self.create_parent()?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(state.render().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn create_parent(&self) -> io::Result<&Path> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir)?;
                Ok(dir)
            }
            _ => Ok(Path::new(".")),
        }
    }
}

/// Held exclusive lock on a state file.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let file = StateFile::parse(
            "#Mon Oct 19 10:00:00 UTC 2026\n\n! legacy\nA=1\nB : 2\n  C=  3  \n",
        );
        assert_eq!(file.len(), 3);
        assert_eq!(file.get("A"), Some("1"));
        assert_eq!(file.get("B"), Some("2"));
        assert_eq!(file.get("C"), Some("3"));
    }

    #[test]
    fn parse_handles_escaped_separators_in_keys() {
        let file = StateFile::parse("a\\=b=1\nno_separator\n");
        assert_eq!(file.get("a=b"), Some("1"));
        assert_eq!(file.get("no_separator"), Some(""));
    }

    #[test]
    fn parse_decodes_unicode_escapes() {
        let file = StateFile::parse("caf\\u00E9PerMinute=1\nemoji\\uD83D\\uDE00=2\nbad\\uZZ=3\n");
        assert_eq!(file.get("caf\u{e9}PerMinute"), Some("1"));
        assert_eq!(file.get("emoji\u{1F600}"), Some("2"));
        assert_eq!(file.get("baduZZ"), Some("3"));
    }

    #[test]
    fn non_ascii_keys_render_as_unicode_escapes() {
        let mut file = StateFile::default();
        file.set("caf\u{e9}PerMinute", "1");
        file.set("emoji\u{1F600}", "2");

        let rendered = file.render();
        assert!(rendered.is_ascii());
        assert!(rendered.contains("caf\\u00E9PerMinute=1"));
        assert!(rendered.contains("emoji\\uD83D\\uDE00=2"));
        assert_eq!(StateFile::parse(&rendered), file);
    }

    #[test]
    fn bytes_are_read_as_latin1() {
        let file = StateFile::parse_bytes(b"# \xff\ncaf\xe9=1\n");
        assert_eq!(file.len(), 1);
        assert_eq!(file.get("caf\u{e9}"), Some("1"));
    }

    #[test]
    fn render_then_parse_keeps_entries() {
        let mut file = StateFile::default();
        file.set("Requests PerMinute", "5");
        file.set("b", "2");
        file.set("path", "C:\\tmp\tx");
        assert_eq!(StateFile::parse(&file.render()), file);
    }

    #[test]
    fn sample_requires_both_halves() {
        let file = StateFile::parse("RequestsPerMinute=100\n");
        assert_eq!(file.sample("RequestsPerMinute").unwrap(), None);

        let file = StateFile::parse("RequestsPerMinute=100\nRequestsPerMinute_timestamp=5\n");
        assert_eq!(
            file.sample("RequestsPerMinute").unwrap(),
            Some(Sample {
                value: 100,
                timestamp_ms: 5
            })
        );
    }

    #[test]
    fn malformed_sample_is_reported() {
        let file = StateFile::parse("X=abc\nX_timestamp=5\n");
        match file.sample("X") {
            Err(StateStoreError::MalformedSample { key, value }) => {
                assert_eq!(key, "X");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let file = StateFile::parse("X=1\nX_timestamp=yesterday\n");
        assert!(matches!(
            file.sample("X"),
            Err(StateStoreError::MalformedSample { key, .. }) if key == "X_timestamp"
        ));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.txt"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/state.txt");
        let store = StateStore::new(&path);

        let mut state = StateFile::default();
        state.set_sample(
            "RequestsPerMinute",
            Sample {
                value: 220,
                timestamp_ms: 1000,
            },
        );
        store.save(&state).unwrap();

        assert!(path.exists());
        let loaded = store.load().unwrap();
        assert_eq!(loaded.get("RequestsPerMinute"), Some("220"));
        assert_eq!(loaded.get("RequestsPerMinute_timestamp"), Some("1000"));
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.txt"));

        let mut state = StateFile::default();
        state.set("a", "1");
        store.save(&state).unwrap();
        state.set("a", "2");
        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap().get("a"), Some("2"));
        // Only the state file and nothing left over from the temp file.
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn lock_creates_sibling_lock_file() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("sub/state.txt"));

        let guard = store.lock().unwrap();
        assert!(dir.path().join("sub/state.txt.lock").exists());
        drop(guard);

        // Re-acquirable once released.
        let _again = store.lock().unwrap();
    }

    #[test]
    fn unreadable_state_file_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        // A directory in place of the file cannot be read as text.
        let path = dir.path().join("state.txt");
        fs::create_dir(&path).unwrap();

        let store = StateStore::new(&path);
        assert!(matches!(store.load(), Err(StateStoreError::Read { .. })));
    }
}
