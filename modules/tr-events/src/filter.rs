//! Subscriber filter semantics: AND across dimensions, OR within a
//! dimension. Compound `base:subtype` tokens in `types` narrow to one
//! subtype without pulling in its siblings.

use crate::types::BusEvent;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub systems: Vec<Uuid>,
    pub sites: Vec<Uuid>,
    pub tgids: Vec<i64>,
    pub units: Vec<i64>,
    /// Plain tokens (`"call_start"`) or compound `base:subtype` tokens
    /// (`"unit_event:call"`).
    pub types: Vec<String>,
    pub emergency_only: bool,
}

impl Filter {
    pub fn matches(&self, event: &BusEvent) -> bool {
        if self.emergency_only && !event.emergency {
            return false;
        }
        if !matches_dim(&self.systems, event.system_id) {
            return false;
        }
        if !matches_dim(&self.sites, event.site_id) {
            return false;
        }
        if !matches_dim(&self.tgids, event.tgid) {
            return false;
        }
        if !matches_dim(&self.units, event.unit_id) {
            return false;
        }
        if !self.types.is_empty() && !self.types.iter().any(|t| matches_type_token(t, event)) {
            return false;
        }
        true
    }
}

/// A zero/absent field on the event matches anything along that dimension
/// (spec.md §4.8 — e.g. recorder updates are not system-scoped). An empty
/// filter list means the dimension is unconstrained.
fn matches_dim<T: PartialEq + Copy>(filter_values: &[T], event_value: Option<T>) -> bool {
    match event_value {
        None => true,
        Some(v) => filter_values.is_empty() || filter_values.contains(&v),
    }
}

fn matches_type_token(token: &str, event: &BusEvent) -> bool {
    match token.split_once(':') {
        Some((base, subtype)) => event.event_type == base && event.subtype.as_deref() == Some(subtype),
        None => event.event_type == token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn event(event_type: &str, subtype: Option<&str>) -> BusEvent {
        BusEvent {
            event_id: "1".into(),
            event_type: event_type.into(),
            subtype: subtype.map(String::from),
            timestamp: Utc::now(),
            system_id: None,
            site_id: None,
            tgid: None,
            unit_id: None,
            emergency: false,
            payload: json!({}),
        }
    }

    #[test]
    fn compound_type_excludes_siblings() {
        let filter = Filter {
            types: vec!["unit_event:call".into(), "call_start".into()],
            ..Default::default()
        };
        assert!(filter.matches(&event("unit_event", Some("call"))));
        assert!(filter.matches(&event("call_start", None)));
        assert!(!filter.matches(&event("unit_event", Some("end"))));
    }

    #[test]
    fn absent_event_field_matches_any_filter_value() {
        let filter = Filter {
            systems: vec![Uuid::new_v4()],
            ..Default::default()
        };
        let mut e = event("recorders", None);
        e.system_id = None;
        assert!(filter.matches(&e));
    }

    #[test]
    fn present_field_must_be_in_nonempty_filter_list() {
        let allowed = Uuid::new_v4();
        let other = Uuid::new_v4();
        let filter = Filter {
            systems: vec![allowed],
            ..Default::default()
        };
        let mut e = event("call_start", None);
        e.system_id = Some(other);
        assert!(!filter.matches(&e));
        e.system_id = Some(allowed);
        assert!(filter.matches(&e));
    }

    #[test]
    fn emergency_only_excludes_non_emergency() {
        let filter = Filter {
            emergency_only: true,
            ..Default::default()
        };
        assert!(!filter.matches(&event("call_start", None)));
    }
}
