use serde::{Deserialize, Serialize};

pub const DEFAULT_DURATION_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub category: String,
    pub duration_minutes: i64,
    /// Minor currency units.
    pub price: i64,
}
