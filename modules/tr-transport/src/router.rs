//! Prefix-agnostic router. Matches on the trailing topic segment only, so
//! broker-namespace rewrites by operators never require code changes
//! (spec.md §4.2, §9). Pure — owns no state.

const UNIT_EVENT_SUBTYPES: &[&str] = &["on", "off", "call", "end", "join", "location", "ackresp", "data"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discriminator {
    CallStart,
    CallEnd,
    UnitEvent(String),
    Recorders,
    Rates,
    TrunkingMessage,
    ConsoleLog,
    Status,
    Config,
    AudioNotice,
    /// No known tail matched. The caller decides, from configuration,
    /// whether to archive it under the `_unknown` sentinel.
    Unknown,
}

pub fn route(topic: &str) -> Discriminator {
    let tail = topic.rsplit('/').next().unwrap_or(topic);
    match tail {
        "call_start" => Discriminator::CallStart,
        "call_end" => Discriminator::CallEnd,
        "recorders" => Discriminator::Recorders,
        "rates" => Discriminator::Rates,
        "message" => Discriminator::TrunkingMessage,
        "console" => Discriminator::ConsoleLog,
        "status" => Discriminator::Status,
        "config" => Discriminator::Config,
        "audio_notice" => Discriminator::AudioNotice,
        other if UNIT_EVENT_SUBTYPES.contains(&other) => Discriminator::UnitEvent(other.to_string()),
        _ => Discriminator::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_trailing_segment_regardless_of_prefix() {
        assert_eq!(route("rdio/BEE00/calls/call_start"), Discriminator::CallStart);
        assert_eq!(route("a/totally/different/namespace/call_start"), Discriminator::CallStart);
        assert_eq!(route("call_start"), Discriminator::CallStart);
    }

    #[test]
    fn unit_event_subtype_comes_from_the_trailing_segment() {
        assert_eq!(route("tr1/348/call"), Discriminator::UnitEvent("call".into()));
        assert_eq!(route("tr1/348/end"), Discriminator::UnitEvent("end".into()));
    }

    #[test]
    fn unknown_tail_falls_to_sentinel() {
        assert_eq!(route("tr1/348/mystery"), Discriminator::Unknown);
    }

    #[test]
    fn trunk_recorder_console_and_status() {
        assert_eq!(route("trunk_recorder/console"), Discriminator::ConsoleLog);
        assert_eq!(route("trunk_recorder/status"), Discriminator::Status);
    }
}
