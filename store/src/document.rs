use datt_types::Timestamp;
use serde::{Deserialize, Serialize};

/// One stored record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Milliseconds since the Unix epoch; the indexed field.
    pub time: Timestamp,
    pub body: serde_json::Value,
}

impl Document {
    pub fn new(id: impl Into<String>, time: Timestamp, body: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            time,
            body,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub name: String,
    pub doc_count: u64,
}
