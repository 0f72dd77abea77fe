//! Liveness and capability report for `GET /`

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub timestamp: i64,
    pub utility: String,
    pub utility_available: bool,
}

impl StatusReport {
    pub fn new(utility: &str, utility_available: bool) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            utility: utility.to_string(),
            utility_available,
        }
    }

    /// Name of the capability flag, e.g. `libcamera_jpeg_available`.
    pub fn availability_key(&self) -> String {
        format!("{}_available", self.utility.replace(['-', '.'], "_"))
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("status".to_string(), Value::from("ok"));
        body.insert("timestamp".to_string(), Value::from(self.timestamp));
        body.insert(self.availability_key(), Value::from(self.utility_available));
        Value::Object(body)
    }
}
