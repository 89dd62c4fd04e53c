pub mod call_frequencies;
pub mod call_groups;
pub mod call_transmissions;
pub mod calls;
pub mod checkpoints;
pub mod console_logs;
pub mod decode_rates;
pub mod merge_audit;
pub mod raw_archive;
pub mod recorder_snapshots;
pub mod sites;
pub mod systems;
pub mod talkgroups;
pub mod trunking_messages;
pub mod unit_events;
pub mod units;
