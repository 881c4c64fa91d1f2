//! Flat-file persistence.
//!
//! One UTF-8 text file per entity kind:
//!
//! ```text
//! ===== LIST OF PRODUCTS =====
//! ----------------------------------------
//! Computer [ID: C001, Name: Dell XPS, ...]
//! ----------------------------------------
//! ```
//!
//! The header and delimiter lines are structural noise and are dropped on read.
//! Every read goes back to the file; nothing is cached between calls. Writes
//! build the whole document in memory first and then replace the file in one
//! step, so an interrupted write never leaves a half-written document behind.

use crate::codec::Record;
use crate::error::Result;
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Line written after the header and after every entry.
pub const DELIMITER: &str = "----------------------------------------";

/// The kinds of file the store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Product,
    Customer,
    Employee,
    Invoice,
}

impl EntityKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            EntityKind::Product => "products.txt",
            EntityKind::Customer => "customers.txt",
            EntityKind::Employee => "employees.txt",
            EntityKind::Invoice => "invoices.txt",
        }
    }

    /// Section header placed on the first line of a freshly created file.
    pub fn header(&self) -> String {
        let plural = match self {
            EntityKind::Product => "PRODUCTS",
            EntityKind::Customer => "CUSTOMERS",
            EntityKind::Employee => "EMPLOYEES",
            EntityKind::Invoice => "INVOICES",
        };
        format!("===== LIST OF {} =====", plural)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Product => "Product",
            EntityKind::Customer => "Customer",
            EntityKind::Employee => "Employee",
            EntityKind::Invoice => "Invoice",
        };
        f.write_str(label)
    }
}

/// How a write treats the bytes already on file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Keep existing content and add the new entries at the end.
    Append,

    /// Replace the whole file with exactly the given entries.
    Overwrite,
}

/// Returns `true` for header, delimiter and blank lines.
pub fn is_structural(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with("=====") || trimmed.starts_with("----")
}

/// Builds the full document that results from writing `entries` with `mode`.
///
/// An entry may span several lines (ledger blocks); each is followed by a delimiter.
pub fn compose(kind: EntityKind, existing: Option<&str>, entries: &[String], mode: WriteMode) -> String {
    let mut doc = match (mode, existing) {
        (WriteMode::Append, Some(current)) if !current.trim().is_empty() => {
            let mut doc = current.to_string();
            if !doc.ends_with('\n') {
                doc.push('\n');
            }
            let ends_with_delimiter = doc
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .is_some_and(|l| l.trim().starts_with("----"));
            if !ends_with_delimiter {
                doc.push_str(DELIMITER);
                doc.push('\n');
            }
            doc
        }
        _ => format!("{}\n{}\n", kind.header(), DELIMITER),
    };

    for entry in entries {
        doc.push_str(entry.trim_end_matches('\n'));
        doc.push('\n');
        doc.push_str(DELIMITER);
        doc.push('\n');
    }
    doc
}

/// Storage backend for entity files.
///
/// The repositories and the invoice engine only talk to this trait, so the
/// flat-file layout can be swapped for another backend without touching them.
pub trait RecordStore {
    /// Returns the raw document for `kind`, or `None` if nothing was ever written.
    fn read_raw(&self, kind: EntityKind) -> Result<Option<String>>;

    /// Writes `entries` for `kind` using `mode`.
    fn write(&self, kind: EntityKind, entries: &[String], mode: WriteMode) -> Result<()>;

    /// Returns the data lines of `kind` in file order, structural noise removed.
    fn read_lines(&self, kind: EntityKind) -> Result<Vec<String>> {
        Ok(self
            .read_raw(kind)?
            .map(|doc| {
                doc.lines()
                    .filter(|line| !is_structural(line))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Decodes every record of kind `R`, skipping lines that fail to decode.
    fn load<R: Record>(&self) -> Result<Vec<R>>
    where
        Self: Sized,
    {
        let lines = self.read_lines(R::KIND)?;
        let mut records = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            match R::decode(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("{} entry {}: skipping line: {}", R::KIND, idx + 1, e),
            }
        }
        debug!("Loaded {} {} record(s)", records.len(), R::KIND);
        Ok(records)
    }

    /// Encodes and writes `records` with `mode`.
    fn save<R: Record>(&self, records: &[R], mode: WriteMode) -> Result<()>
    where
        Self: Sized,
    {
        let entries: Vec<String> = records.iter().map(Record::encode).collect();
        self.write(R::KIND, &entries, mode)
    }
}

/// Stores each entity kind as a text file inside one data directory.
#[derive(Debug, Clone)]
pub struct FlatFileStore {
    root: PathBuf,
}

impl FlatFileStore {
    /// Creates a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FlatFileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, kind: EntityKind) -> PathBuf {
        self.root.join(kind.file_name())
    }
}

impl RecordStore for FlatFileStore {
    fn read_raw(&self, kind: EntityKind) -> Result<Option<String>> {
        match fs::read_to_string(self.path_of(kind)) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, kind: EntityKind, entries: &[String], mode: WriteMode) -> Result<()> {
        let existing = match mode {
            WriteMode::Append => self.read_raw(kind)?,
            WriteMode::Overwrite => None,
        };
        let doc = compose(kind, existing.as_deref(), entries, mode);

        fs::create_dir_all(&self.root)?;
        let target = self.path_of(kind);
        let staging = self.root.join(format!(".{}.tmp", kind.file_name()));
        fs::write(&staging, doc.as_bytes())?;
        fs::rename(&staging, &target)?;

        debug!("{:?}: {} entries to {}", mode, entries.len(), target.display());
        Ok(())
    }
}

/// Keeps the same text documents in memory.
///
/// Clones share the same documents, mirroring several handles onto one data
/// directory. Writes to a kind can be switched off with [`MemoryStore::reject_writes`]
/// to exercise failure handling.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: Rc<RefCell<HashMap<EntityKind, String>>>,
    rejected: Rc<Cell<Option<EntityKind>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write to `kind` fail with an I/O error.
    pub fn reject_writes(&self, kind: EntityKind) {
        self.rejected.set(Some(kind));
    }

    /// Re-enables writes to every kind.
    pub fn accept_writes(&self) {
        self.rejected.set(None);
    }
}

impl RecordStore for MemoryStore {
    fn read_raw(&self, kind: EntityKind) -> Result<Option<String>> {
        Ok(self.docs.borrow().get(&kind).cloned())
    }

    fn write(&self, kind: EntityKind, entries: &[String], mode: WriteMode) -> Result<()> {
        if self.rejected.get() == Some(kind) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("writes to {} are rejected", kind.file_name()),
            )
            .into());
        }
        let mut docs = self.docs.borrow_mut();
        let doc = compose(kind, docs.get(&kind).map(String::as_str), entries, mode);
        docs.insert(kind, doc);
        Ok(())
    }
}
