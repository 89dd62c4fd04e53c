//! Core event model for the bus. Domain-agnostic about payload shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One published event. `event_id` is assigned by the bus at publish time —
/// callers always construct with an empty string, which `EventBus::publish`
/// overwrites with a monotonic, lexically-ordered id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub event_id: String,
    pub event_type: String,
    pub subtype: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub system_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub tgid: Option<i64>,
    pub unit_id: Option<i64>,
    pub emergency: bool,
    pub payload: serde_json::Value,
}

impl BusEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: String::new(),
            event_type: event_type.into(),
            subtype: None,
            timestamp: Utc::now(),
            system_id: None,
            site_id: None,
            tgid: None,
            unit_id: None,
            emergency: false,
            payload,
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_system(mut self, system_id: Uuid) -> Self {
        self.system_id = Some(system_id);
        self
    }

    pub fn with_site(mut self, site_id: Uuid) -> Self {
        self.site_id = Some(site_id);
        self
    }

    pub fn with_tgid(mut self, tgid: i64) -> Self {
        self.tgid = Some(tgid);
        self
    }

    pub fn with_unit(mut self, unit_id: i64) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    pub fn with_emergency(mut self, emergency: bool) -> Self {
        self.emergency = emergency;
        self
    }
}
