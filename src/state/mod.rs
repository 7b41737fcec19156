pub mod json_store;
pub mod store;

pub use json_store::JsonFileStore;
pub use store::InMemoryStore;

use crate::error::Result;
use crate::models::RawVehicleRecord;

/// Trait for vehicle record storage
pub trait VehicleStore: Send + Sync {
    /// Insert a record, replacing any record with the same vehicle id
    fn save_record(&self, record: &RawVehicleRecord) -> Result<()>;

    /// Get a record by vehicle id
    fn get_record(&self, vehicle_id: &str) -> Result<Option<RawVehicleRecord>>;

    /// All records in insertion order
    fn list_records(&self) -> Result<Vec<RawVehicleRecord>>;

    /// Records owned by a user, in insertion order
    fn records_for_user(&self, user_id: &str) -> Result<Vec<RawVehicleRecord>> {
        Ok(self
            .list_records()?
            .into_iter()
            .filter(|record| record.user_id().as_deref() == Some(user_id))
            .collect())
    }

    /// Number of stored records
    fn count_records(&self) -> Result<usize>;
}
