//! The durable, deduplicated record set of one pipeline.
//!
//! A [`Store`] is a CSV file holding every record ever seen for one
//! [`RecordKind`], keyed by identity. Loading never fails: a missing file is
//! an empty store and an unreadable one is set aside and treated as empty.
//! Writing goes through a temporary file in the same directory followed by a
//! rename, so a failed or interrupted write leaves the previous file intact.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use scout_common::{Candidate, Digest, Fields, Record, RecordKind, ScoutError};
use tempfile::NamedTempFile;

const KEY_COL: &str = "identity_key";
const SEEN_COL: &str = "first_seen_at";
const SOURCE_COL: &str = "source_url";
/// Column names written by the older scripts.
const LEGACY_SOURCE_COL: &str = "source";
const LEGACY_SEEN_COL: &str = "found_at";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not replace {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

impl From<StoreError> for ScoutError {
    fn from(e: StoreError) -> Self {
        ScoutError::Persistence(e.to_string())
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    kind: RecordKind,
    path: PathBuf,
    records: Vec<Record>,
    keys: HashSet<String>,
}

impl Store {
    pub fn empty(kind: RecordKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            records: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// Location of the store for `kind` inside `data_dir`.
    pub fn path_for(data_dir: &Path, kind: RecordKind) -> PathBuf {
        data_dir.join(kind.store_file())
    }

    /// Load the store for `kind` from `data_dir`.
    pub fn open(data_dir: &Path, kind: RecordKind) -> Self {
        Self::load(Self::path_for(data_dir, kind), kind)
    }

    /// Read persisted records from `path`.
    ///
    /// Returns an empty store when the file is absent. A file that cannot be
    /// parsed is copied to `<name>.corrupt-<timestamp>` (best effort) and an
    /// empty store is returned.
    pub fn load(path: impl Into<PathBuf>, kind: RecordKind) -> Self {
        let path = path.into();
        let now = Utc::now();
        let text = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path=%path.display(), kind=%kind, "store.load.absent");
                return Self::empty(kind, path);
            }
            Err(e) => {
                tracing::error!(path=%path.display(), error=%e, "store.load.unreadable");
                set_aside(&path, now);
                return Self::empty(kind, path);
            }
        };

        let mut store = Self::empty(kind, path);
        match store.read_rows(&text, now) {
            Ok(skipped) => {
                tracing::info!(
                    path=%store.path.display(),
                    kind=%kind,
                    records=store.len(),
                    skipped,
                    "store.loaded"
                );
                store
            }
            Err(e) => {
                tracing::error!(path=%store.path.display(), error=%e, "store.load.corrupt");
                set_aside(&store.path, now);
                Self::empty(kind, store.path)
            }
        }
    }

    /// Parse CSV rows into this store. Returns how many rows were skipped.
    fn read_rows(&mut self, bytes: &[u8], now: DateTime<Utc>) -> Result<usize, csv::Error> {
        let mut reader = csv::ReaderBuilder::new().from_reader(bytes);
        let headers = reader.headers()?.clone();
        let mut skipped = 0;
        for row in reader.records() {
            let row = row?;
            let mut fields = Fields::new();
            let mut key = None;
            let mut seen = None;
            let mut source = None;
            for (name, value) in headers.iter().zip(row.iter()) {
                let name = name.trim();
                match name {
                    KEY_COL => key = Some(value.trim().to_string()),
                    SEEN_COL | LEGACY_SEEN_COL => seen = Some(value.trim().to_string()),
                    SOURCE_COL | LEGACY_SOURCE_COL => source = Some(value.to_string()),
                    _ => {
                        fields.insert(name.to_string(), value.to_string());
                    }
                }
            }
            let source = source.unwrap_or_default();
            let key = key
                .filter(|k| !k.is_empty())
                .or_else(|| scout_web::identity_key(self.kind, &fields, &source));
            let Some(key) = key else {
                tracing::warn!(path=%self.path.display(), "store.row.unkeyed");
                skipped += 1;
                continue;
            };
            let first_seen_at = seen.as_deref().and_then(parse_timestamp).unwrap_or(now);
            let record = Record {
                identity_key: key,
                kind: self.kind,
                fields,
                first_seen_at,
                source_url: source,
            };
            if !self.insert(record) {
                skipped += 1;
            }
        }
        Ok(skipped)
    }

    fn insert(&mut self, record: Record) -> bool {
        if !self.keys.insert(record.identity_key.clone()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.identity_key.as_str())
    }

    /// Split `candidates` into those whose identity is new and those already
    /// known. New ones are appended to the store and returned as the digest,
    /// in the order given; the first candidate with a given key wins.
    /// Existing records are never modified.
    pub fn diff_and_merge<I>(mut self, candidates: I, now: DateTime<Utc>) -> (Digest, Store)
    where
        I: IntoIterator<Item = Candidate>,
    {
        let mut digest = Digest::empty(self.kind);
        for candidate in candidates {
            if candidate.kind != self.kind {
                tracing::warn!(expected=%self.kind, got=%candidate.kind, "store.merge.kind_mismatch");
                continue;
            }
            let Some(key) = scout_web::normalize(&candidate) else {
                tracing::debug!(source=%candidate.source_url, "store.merge.unkeyed");
                continue;
            };
            if self.keys.contains(&key) {
                continue;
            }
            let record = Record::from_candidate(candidate, key, now);
            digest.records.push(record.clone());
            self.insert(record);
        }
        tracing::debug!(kind=%self.kind, new=digest.len(), total=self.len(), "store.merged");
        (digest, self)
    }

    /// Column order: key, timestamp, source, the kind's fields, then any
    /// other field names present, sorted.
    fn columns(&self) -> Vec<String> {
        let known = self.kind.fields();
        let extra: BTreeSet<&str> = self
            .records
            .iter()
            .flat_map(|r| r.fields.keys())
            .map(String::as_str)
            .filter(|f| !known.contains(f))
            .collect();
        [KEY_COL, SEEN_COL, SOURCE_COL]
            .into_iter()
            .chain(known.iter().copied())
            .chain(extra)
            .map(str::to_string)
            .collect()
    }

    /// Write the full store atomically. Creates the parent directory if
    /// needed. Returns the path written.
    pub fn persist(&self) -> Result<PathBuf, StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let tmp = NamedTempFile::new_in(&dir).map_err(io_err(&dir))?;
        let columns = self.columns();
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());
            writer.write_record(&columns)?;
            for record in &self.records {
                let row = columns.iter().map(|col| match col.as_str() {
                    KEY_COL => record.identity_key.clone(),
                    SEEN_COL => record
                        .first_seen_at
                        .to_rfc3339_opts(SecondsFormat::AutoSi, true),
                    SOURCE_COL => record.source_url.clone(),
                    field => record.field(field).to_string(),
                });
                writer.write_record(row)?;
            }
            writer.flush().map_err(io_err(tmp.path()))?;
        }
        tmp.as_file().sync_all().map_err(io_err(tmp.path()))?;
        tmp.persist(&self.path).map_err(|source| StoreError::Replace {
            path: self.path.clone(),
            source,
        })?;

        tracing::info!(path=%self.path.display(), records=self.len(), "store.persisted");
        Ok(self.path.clone())
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn set_aside(path: &Path, now: DateTime<Utc>) {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    let target = path.with_file_name(format!("{name}.corrupt-{}", now.format("%Y%m%dT%H%M%SZ")));
    match fs::copy(path, &target) {
        Ok(_) => tracing::warn!(path=%target.display(), "store.corrupt.saved"),
        Err(e) => tracing::warn!(path=%target.display(), error=%e, "store.corrupt.save_failed"),
    }
}
