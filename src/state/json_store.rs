use crate::error::{AppError, Result};
use crate::models::RawVehicleRecord;
use crate::state::{InMemoryStore, VehicleStore};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Vehicle records backed by a JSON array file.
///
/// The file is read once on open; saves update memory and rewrite the file.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: InMemoryStore,
}

impl JsonFileStore {
    /// Open an existing records file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("Records file {} not found", path.display()))
            } else {
                AppError::Io(e)
            }
        })?;

        let records: Vec<RawVehicleRecord> = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::Serialization(format!("Invalid records file {}: {}", path.display(), e))
        })?;

        let duplicates = duplicate_vehicle_ids(&records);
        if !duplicates.is_empty() {
            tracing::warn!(
                path = %path.display(),
                duplicates = ?duplicates,
                "Records file repeats vehicle ids"
            );
            return Err(AppError::Validation(format!(
                "Records file {} repeats vehicle ids: {}",
                path.display(),
                duplicates.join(", ")
            )));
        }

        tracing::info!(path = %path.display(), records = records.len(), "Records file loaded");

        Ok(Self {
            inner: InMemoryStore::from_records(records)?,
            path,
        })
    }

    /// Open, or start empty if the file does not exist yet
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Ok(Self {
                path: path.to_path_buf(),
                inner: InMemoryStore::new(),
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let records = self.inner.list_records()?;
        let json = serde_json::to_vec_pretty(&records)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl VehicleStore for JsonFileStore {
    fn save_record(&self, record: &RawVehicleRecord) -> Result<()> {
        self.inner.save_record(record)?;
        self.persist()
    }

    fn get_record(&self, vehicle_id: &str) -> Result<Option<RawVehicleRecord>> {
        self.inner.get_record(vehicle_id)
    }

    fn list_records(&self) -> Result<Vec<RawVehicleRecord>> {
        self.inner.list_records()
    }

    fn count_records(&self) -> Result<usize> {
        self.inner.count_records()
    }
}

/// Vehicle ids that occur more than once, in first-repeat order
fn duplicate_vehicle_ids(records: &[RawVehicleRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for id in records.iter().filter_map(RawVehicleRecord::vehicle_id) {
        if !seen.insert(id.clone()) && !duplicates.contains(&id) {
            duplicates.push(id);
        }
    }
    duplicates
}
