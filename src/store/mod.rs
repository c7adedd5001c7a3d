//! Flat-file store for summary, detail and pending-detail batches.
//!
//! Every batch is one CSV file under the store root. Record kinds are told
//! apart by filename prefix (`safesum`, `safedtl`, `safetoupd<code>`), and a
//! logical table is the concatenation of every file sharing a prefix. Files
//! are UTF-8 with a BOM and carry a leading, unnamed row-index column.

pub mod csv;
pub mod table;

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

pub use table::{Row, Table};

/// File extension for store files.
pub const EXTENSION: &str = "csv";

/// Prefix of persisted summary batches.
pub const SUMMARY_PREFIX: &str = "safesum";
/// Prefix of persisted detail batches.
pub const DETAIL_PREFIX: &str = "safedtl";
/// Prefix of per-region pending-detail snapshots.
pub const PENDING_PREFIX: &str = "safetoupd";
/// Prefix of penalty amount tables.
pub const AMOUNT_PREFIX: &str = "safecat";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed store file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only table store rooted at one directory, plus a checkpoint area.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    checkpoint_dir: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>, checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            checkpoint_dir: checkpoint_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Concatenate every file under the root whose name starts with `prefix`.
    ///
    /// Returns an empty table when nothing matches.
    pub fn load(&self, prefix: &str) -> StoreResult<Table> {
        load_prefixed(&self.root, prefix)
    }

    /// Load exactly one named file, or an empty table if it does not exist.
    pub fn load_named(&self, name: &str) -> StoreResult<Table> {
        let path = self.root.join(file_name(name));
        if !path.exists() {
            return Ok(Table::default());
        }
        read_table(&path)
    }

    /// Write `table` as a new file. An existing file of the same name is never
    /// overwritten; a numeric suffix is added instead.
    pub fn append(&self, table: &Table, name: &str) -> StoreResult<PathBuf> {
        let path = unique_path(&self.root, name);
        write_table(&path, table)?;
        info!("Appended {} rows to {}", table.len(), path.display());
        Ok(path)
    }

    /// Write `table` to `name`, replacing whatever was there.
    pub fn replace(&self, table: &Table, name: &str) -> StoreResult<PathBuf> {
        let path = self.root.join(file_name(name));
        write_table(&path, table)?;
        info!("Replaced {} with {} rows", path.display(), table.len());
        Ok(path)
    }

    /// Write an unmerged recovery batch into `checkpoint_dir/<subdir>`.
    pub fn checkpoint(&self, table: &Table, subdir: &str, name: &str) -> StoreResult<PathBuf> {
        let path = self.checkpoint_dir.join(subdir).join(file_name(name));
        write_table(&path, table)?;
        debug!("Checkpoint of {} rows at {}", table.len(), path.display());
        Ok(path)
    }
}

fn file_name(name: &str) -> String {
    format!("{}.{}", name, EXTENSION)
}

/// First free path for `name` in `dir`: `<name>.csv`, then `<name>-2.csv`, ...
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let first = dir.join(file_name(name));
    if !first.exists() {
        return first;
    }
    (2..)
        .map(|n| dir.join(format!("{}-{}.{}", name, n, EXTENSION)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Recursively collect files under `dir` whose name starts with `prefix`.
fn collect_prefixed(dir: &Path, prefix: &str, out: &mut Vec<PathBuf>) -> StoreResult<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StoreError::io(dir, e)),
    };

    for entry in entries {
        let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
        if path.is_dir() {
            collect_prefixed(&path, prefix, out)?;
            continue;
        }
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix))
            && path.extension().and_then(|e| e.to_str()) == Some(EXTENSION);
        if matches {
            out.push(path);
        }
    }
    Ok(())
}

/// Load and concatenate every matching file under `dir`.
pub fn load_prefixed(dir: &Path, prefix: &str) -> StoreResult<Table> {
    let mut paths = Vec::new();
    collect_prefixed(dir, prefix, &mut paths)?;
    paths.sort();

    let tables = paths
        .iter()
        .map(|p| read_table(p))
        .collect::<StoreResult<Vec<_>>>()?;
    debug!(
        "Loaded {} file(s) with prefix {} from {}",
        tables.len(),
        prefix,
        dir.display()
    );
    Ok(Table::concat(tables))
}

/// Read one store file, dropping the leading index column.
pub fn read_table(path: &Path) -> StoreResult<Table> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    let mut rows = csv::parse_rows(&text).into_iter();

    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    if header.is_empty() {
        return Err(StoreError::Malformed {
            path: path.to_path_buf(),
            reason: "empty header row".to_string(),
        });
    }

    let mut table = Table::new(header.into_iter().skip(1));
    for row in rows {
        table.push_row(row.into_iter().skip(1).collect());
    }
    Ok(table)
}

/// Serialise a table with a fresh 0-based index column.
pub fn write_csv<W: Write>(mut w: W, table: &Table) -> std::io::Result<()> {
    write!(w, "{}", csv::BOM)?;
    let header: Vec<String> = std::iter::once(String::new())
        .chain(table.columns().iter().cloned())
        .collect();
    csv::write_row(&mut w, &header)?;
    for (idx, cells) in table.raw_rows().iter().enumerate() {
        let row: Vec<String> = std::iter::once(idx.to_string())
            .chain(cells.iter().cloned())
            .collect();
        csv::write_row(&mut w, &row)?;
    }
    Ok(())
}

/// Write a table to `path`, creating parent directories.
pub fn write_table(path: &Path, table: &Table) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
    }
    let file = fs::File::create(path).map_err(|e| StoreError::io(path, e))?;
    let mut out = BufWriter::new(file);
    write_csv(&mut out, table).map_err(|e| StoreError::io(path, e))?;
    out.flush().map_err(|e| StoreError::io(path, e))?;
    Ok(())
}
