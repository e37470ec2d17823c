use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use bpaf::Bpaf;
use lmt_aggregate::{DataFormatError, Dataset, TIME_COLUMN};
use log::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The width of an LMT statistics export
pub const EXPECTED_COLUMNS: usize = 46;
const TABULAR_EXTENSION: &str = "csv";

#[derive(Bpaf, Clone, Debug, PartialEq)]
pub struct StoreConfig {
    /// Number of columns an uploaded file must have
    #[bpaf(long, argument("N"), fallback(EXPECTED_COLUMNS), display_fallback)]
    pub expected_columns: usize,
}

impl Default for StoreConfig {
    fn default() -> StoreConfig {
        StoreConfig {
            expected_columns: EXPECTED_COLUMNS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provenance {
    /// Read from the backing file at startup
    Original,
    Uploaded { filename: String },
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Provenance::Original => f.write_str("the original file"),
            Provenance::Uploaded { filename } => write!(f, "upload {:?}", filename),
        }
    }
}

#[derive(Debug)]
pub struct Snapshot {
    pub dataset: Dataset,
    pub provenance: Provenance,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{0:?} is not a .csv file")]
    Extension(String),
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },
    #[error("missing required column \"{0}\"")]
    MissingColumn(&'static str),
    #[error("malformed upload: {0}")]
    Malformed(#[from] DataFormatError),
}

/// Holds the dataset every view is computed from.
///
/// Readers take a snapshot with `current()` and keep it for as long as they
/// like; `replace()` swaps in a whole new snapshot in one step, so nobody
/// ever sees a half-replaced table.
pub struct Store {
    path: PathBuf,
    config: StoreConfig,
    current: ArcSwap<Snapshot>,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>, config: StoreConfig) -> Result<Store, DataFormatError> {
        let path = path.into();
        let dataset = Dataset::from_path(&path)?;
        info!(
            "Loaded {} records ({} columns, {} OS columns) from {}",
            dataset.len(),
            dataset.schema().len(),
            dataset.schema().os_columns().count(),
            path.display()
        );
        let snapshot = Snapshot {
            dataset,
            provenance: Provenance::Original,
        };
        Ok(Store {
            path,
            config,
            current: ArcSwap::from_pointee(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Checks an uploaded file and, if it passes, makes it the current
    /// dataset.  On failure the current dataset is left untouched.
    pub fn replace(&self, bytes: &[u8], filename: &str) -> Result<Arc<Snapshot>, ValidationError> {
        let snapshot = match self.validate(bytes, filename) {
            Ok(x) => Arc::new(x),
            Err(e) => {
                warn!("Rejected upload {:?}: {}", filename, e);
                return Err(e);
            }
        };
        self.current.store(Arc::clone(&snapshot));
        info!(
            "Replaced dataset with {} records from {:?}",
            snapshot.dataset.len(),
            filename
        );
        Ok(snapshot)
    }

    fn validate(&self, bytes: &[u8], filename: &str) -> Result<Snapshot, ValidationError> {
        let is_tabular = Path::new(filename)
            .extension()
            .map_or(false, |x| x.eq_ignore_ascii_case(TABULAR_EXTENSION));
        if !is_tabular {
            return Err(ValidationError::Extension(filename.to_string()));
        }
        let mut rdr = csv::Reader::from_reader(bytes);
        let headers = rdr.headers().map_err(DataFormatError::from)?;
        if headers.len() != self.config.expected_columns {
            return Err(ValidationError::ColumnCount {
                expected: self.config.expected_columns,
                found: headers.len(),
            });
        }
        if !headers.iter().any(|x| x.trim() == TIME_COLUMN) {
            return Err(ValidationError::MissingColumn(TIME_COLUMN));
        }
        Ok(Snapshot {
            dataset: Dataset::from_reader(bytes)?,
            provenance: Provenance::Uploaded {
                filename: filename.to_string(),
            },
        })
    }

    /// Overwrites the backing file with the current dataset
    pub fn persist(&self) -> Result<()> {
        self.persist_to(&self.path)
    }

    pub fn persist_to(&self, path: &Path) -> Result<()> {
        let snapshot = self.current();
        let file = File::create(path).with_context(|| format!("Couldn't create {}", path.display()))?;
        snapshot
            .dataset
            .write_csv(BufWriter::new(file))
            .with_context(|| format!("Couldn't write {}", path.display()))?;
        info!("Wrote {} records to {}", snapshot.dataset.len(), path.display());
        Ok(())
    }
}

/// Validates a replacement file against FILE's store and swaps it in
#[derive(Bpaf)]
pub struct Options {
    #[bpaf(external(store_config))]
    store: StoreConfig,
    /// Overwrite FILE with the accepted upload
    persist: bool,
    /// The dataset currently in use
    #[bpaf(positional("FILE"))]
    file: PathBuf,
    /// The replacement
    #[bpaf(positional("UPLOAD"))]
    upload: PathBuf,
}

pub fn upload(opts: Options) -> Result<()> {
    let store = Store::open(opts.file.clone(), opts.store)?;
    let bytes = std::fs::read(&opts.upload)
        .with_context(|| format!("Couldn't read {}", opts.upload.display()))?;
    let filename = opts
        .upload
        .file_name()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_default();
    let before = store.current();
    let after = store
        .replace(&bytes, &filename)
        .with_context(|| format!("{} was not accepted", opts.upload.display()))?;
    println!(
        "Replaced {} records from {} with {} records from {}",
        before.dataset.len(),
        before.provenance,
        after.dataset.len(),
        after.provenance
    );
    if opts.persist {
        store.persist()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, row};
    use tempfile::TempDir;

    fn open(rows: &[fixtures::Row]) -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let path = fixtures::write(dir.path(), "stats.csv", rows);
        let store = Store::open(path, StoreConfig::default()).unwrap();
        (dir, store)
    }

    #[test]
    fn opens_original() {
        let (_dir, store) = open(&[row("2023-01-01", 5, 1), row("2023-02-01", 6, 0)]);
        let snap = store.current();
        assert_eq!(snap.dataset.len(), 2);
        assert_eq!(snap.provenance, Provenance::Original);
    }

    #[test]
    fn missing_file() {
        assert!(Store::open("/nonexistent/stats.csv", StoreConfig::default()).is_err());
    }

    #[test]
    fn accepts_replacement() {
        let (_dir, store) = open(&[row("2023-01-01", 5, 1)]);
        let upload = fixtures::csv(&[row("2024-01-01", 7, 0), row("2024-02-01", 8, 0)]);
        let snap = store.replace(upload.as_bytes(), "new.CSV").unwrap();
        assert_eq!(snap.dataset.len(), 2);
        assert_eq!(store.current().dataset.len(), 2);
        assert_eq!(
            store.current().provenance,
            Provenance::Uploaded {
                filename: "new.CSV".into()
            }
        );
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let (_dir, store) = open(&[row("2023-01-01", 5, 1)]);
        let held = store.current();
        let upload = fixtures::csv(&[row("2024-01-01", 7, 0), row("2024-02-01", 8, 0)]);
        store.replace(upload.as_bytes(), "new.csv").unwrap();
        assert_eq!(held.dataset.len(), 1);
        assert_eq!(store.current().dataset.len(), 2);
    }

    #[test]
    fn rejects_missing_timestamp_column() {
        let (_dir, store) = open(&[row("2023-01-01", 5, 1)]);
        let before = store.current();
        let upload = fixtures::csv_renaming(&[row("2024-01-01", 7, 0)], TIME_COLUMN, "collected_at");
        match store.replace(upload.as_bytes(), "new.csv") {
            Err(ValidationError::MissingColumn(TIME_COLUMN)) => (),
            x => panic!("unexpected: {:?}", x),
        }
        assert!(Arc::ptr_eq(&before, &store.current()));
    }

    #[test]
    fn rejects_wrong_shape() {
        let (_dir, store) = open(&[row("2023-01-01", 5, 1)]);
        let rows = [row("2024-01-01", 7, 0)];
        let good = fixtures::csv(&rows);
        assert!(matches!(
            store.replace(good.as_bytes(), "new.xlsx"),
            Err(ValidationError::Extension(_))
        ));
        assert!(matches!(
            store.replace(good.as_bytes(), "csv"),
            Err(ValidationError::Extension(_))
        ));
        let narrow = fixtures::csv_without(&rows, "extra_01");
        assert!(matches!(
            store.replace(narrow.as_bytes(), "new.csv"),
            Err(ValidationError::ColumnCount {
                expected: 46,
                found: 45
            })
        ));
        let bad_time = fixtures::csv(&[row("someday", 7, 0)]);
        assert!(matches!(
            store.replace(bad_time.as_bytes(), "new.csv"),
            Err(ValidationError::Malformed(DataFormatError::Timestamp { .. }))
        ));
        assert_eq!(store.current().provenance, Provenance::Original);
        assert_eq!(store.current().dataset.len(), 1);
    }

    #[test]
    fn persist_round_trips() {
        let (dir, store) = open(&[row("2023-01-01", 5, 1)]);
        let upload = fixtures::csv(&[row("2024-01-01", 7, 0), row("2024-02-01", 8, 3)]);
        store.replace(upload.as_bytes(), "new.csv").unwrap();
        store.persist().unwrap();
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), upload);

        let reopened = Store::open(dir.path().join("stats.csv"), StoreConfig::default()).unwrap();
        assert_eq!(reopened.current().dataset, store.current().dataset);
    }

    #[test]
    fn persist_surfaces_errors() {
        let (_dir, store) = open(&[row("2023-01-01", 5, 1)]);
        assert!(store.persist_to(Path::new("/nonexistent/dir/out.csv")).is_err());
    }
}
