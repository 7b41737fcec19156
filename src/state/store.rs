use crate::error::Result;
use crate::models::RawVehicleRecord;
use crate::state::VehicleStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory vehicle store (for the CLI and testing)
#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<DashMap<u64, RawVehicleRecord>>,
    vehicle_index: Arc<DashMap<String, u64>>,
    next_seq: Arc<AtomicU64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `records` in the given order
    pub fn from_records(records: impl IntoIterator<Item = RawVehicleRecord>) -> Result<Self> {
        let store = Self::new();
        for record in records {
            store.save_record(&record)?;
        }
        Ok(store)
    }
}

impl VehicleStore for InMemoryStore {
    fn save_record(&self, record: &RawVehicleRecord) -> Result<()> {
        let Some(vehicle_id) = record.vehicle_id() else {
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            self.records.insert(seq, record.clone());
            tracing::debug!("Anonymous vehicle record saved");
            return Ok(());
        };

        // The index entry stays locked until the record is in place
        match self.vehicle_index.entry(vehicle_id.clone()) {
            Entry::Occupied(entry) => {
                // Replace in place so the record keeps its position
                self.records.insert(*entry.get(), record.clone());
                tracing::debug!(vehicle_id = %vehicle_id, "Vehicle record replaced");
            }
            Entry::Vacant(entry) => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                self.records.insert(seq, record.clone());
                entry.insert(seq);
                tracing::debug!(vehicle_id = %vehicle_id, "Vehicle record saved");
            }
        }

        Ok(())
    }

    fn get_record(&self, vehicle_id: &str) -> Result<Option<RawVehicleRecord>> {
        Ok(self
            .vehicle_index
            .get(vehicle_id)
            .and_then(|seq| self.records.get(&*seq).map(|entry| entry.clone())))
    }

    fn list_records(&self) -> Result<Vec<RawVehicleRecord>> {
        let mut records: Vec<(u64, RawVehicleRecord)> = self
            .records
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        records.sort_by_key(|(seq, _)| *seq);
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    fn count_records(&self) -> Result<usize> {
        Ok(self.records.len())
    }
}
