use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type FuelTypeId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuelType {
    pub id: FuelTypeId,
    pub name: String,
    pub code_1c: Option<String>,
    pub created_at: DateTime<Utc>,
}
