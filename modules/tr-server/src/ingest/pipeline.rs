//! Frame dispatch: warmup gating, identity resolution, active-call
//! tracking, dedup, affiliation updates, recorder enrichment, event-bus
//! publication, and persistence (spec.md §4.2-§4.8).

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use tokio::sync::{mpsc, watch};
use tr_calls::{assign_dedup_group, ActiveCall};
use tr_core::file_config::RawArchiveMode;
use tr_core::{Call, CallCheckpoint, ConsoleLog, DecodeRate, RawArchiveRow, RecorderSnapshot, TagProvenance, TrunkingMessage, UnitEventType};
use tr_events::BusEvent;
use tr_transport::router::{route, Discriminator};
use tr_transport::InboundFrame;
use tr_storage::repo::{call_transmissions, calls, checkpoints, talkgroups, unit_events, units};
use uuid::Uuid;

use crate::ingest::payload::{bool_field, epoch_field, f64_field, i64_array_field, i64_field, parse_payload, str_field};
use crate::state::ServerState;

/// Canonical handler-name strings. `raw_archive.mode`'s allowlist/denylist
/// matches against these, including the `_unknown` sentinel for frames no
/// discriminator claims.
pub fn handler_name(discriminator: &Discriminator) -> &'static str {
    match discriminator {
        Discriminator::CallStart => "call_start",
        Discriminator::CallEnd => "call_end",
        Discriminator::UnitEvent(_) => "unit_event",
        Discriminator::Recorders => "recorders",
        Discriminator::Rates => "rates",
        Discriminator::TrunkingMessage => "trunking_message",
        Discriminator::ConsoleLog => "console_log",
        Discriminator::Status => "status",
        Discriminator::Config => "config",
        Discriminator::AudioNotice => "audio_notice",
        Discriminator::Unknown => "_unknown",
    }
}

pub fn should_archive(mode: &RawArchiveMode, handler: &str) -> bool {
    match mode {
        RawArchiveMode::Disabled => false,
        RawArchiveMode::Allowlist(handlers) => handlers.iter().any(|h| h == handler),
        RawArchiveMode::Denylist(handlers) => !handlers.iter().any(|h| h == handler),
    }
}

/// Derives the active-call tracker key from the message's own `start`
/// field, rounded to a tenth of a second. Two messages that agree on this
/// field down to 100ms (the common case) derive the same id; drift beyond
/// that falls through to the tracker's fuzzy match (spec.md §4.4).
fn derive_call_id(system_id: Uuid, tgid: i64, start: DateTime<Utc>) -> Uuid {
    let tenths = start.timestamp_millis().div_euclid(100);
    let name = format!("{system_id}:{tgid}:{tenths}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

async fn resolve_system(state: &ServerState, payload: &Value) -> anyhow::Result<Option<Uuid>> {
    if let (Some(sysid), Some(wacn)) = (i64_field(payload, "sysid"), str_field(payload, "wacn")) {
        return state.identity.resolve_trunked_system(state.pool(), sysid, wacn).await;
    }
    if let (Some(instance), Some(name)) = (str_field(payload, "instance"), str_field(payload, "name")) {
        return state
            .identity
            .resolve_conventional_system(state.pool(), instance, name)
            .await
            .map(Some);
    }
    Ok(None)
}

async fn resolve_site(state: &ServerState, system_id: Uuid, payload: &Value) -> anyhow::Result<Option<Uuid>> {
    let (Some(instance), Some(short_name)) = (str_field(payload, "instance"), str_field(payload, "site")) else {
        return Ok(None);
    };
    let site_number = i64_field(payload, "site_num");
    let nac = str_field(payload, "nac");
    state
        .identity
        .resolve_site(state.pool(), system_id, instance, short_name, site_number, nac)
        .await
        .map(Some)
}

/// Catches a panicking handler so one malformed frame never takes the
/// ingest loop down with it (spec.md §7: "a handler panic is never
/// allowed to kill the service").
async fn run_guarded(future: impl Future<Output = anyhow::Result<()>>) -> anyhow::Result<()> {
    match std::panic::AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("ingest handler panicked")),
    }
}

/// Entry point for one inbound frame. Archives first (if configured),
/// then either dispatches immediately or, on a cold start, buffers
/// behind the warmup gate.
pub async fn dispatch_frame(state: &ServerState, frame: InboundFrame) {
    let (payload, ok) = parse_payload(&frame.payload);
    if !ok {
        state.stats.record_malformed_payload();
    }

    let discriminator = route(&frame.topic);
    let handler = handler_name(&discriminator);

    if should_archive(&state.file_config.raw_archive.mode, handler) {
        let row = RawArchiveRow {
            id: Uuid::new_v4(),
            topic: frame.topic.clone(),
            handler: handler.to_string(),
            received_at: frame.received_at,
            payload: payload.clone(),
        };
        if let Err(error) = state.batchers.raw_archive.enqueue(row).await {
            tracing::error!(%error, topic = %frame.topic, "failed to enqueue raw archive row");
        }
    }

    let identity_bearing = matches!(discriminator, Discriminator::Status | Discriminator::Config);

    if identity_bearing || state.warmup.is_released() {
        if let Err(error) = run_guarded(process(state, discriminator, &frame, payload)).await {
            tracing::error!(%error, topic = %frame.topic, "ingest handler failed");
        }
        return;
    }

    let deferred_state = state.clone();
    let deferred_frame = frame.clone();
    let topic = frame.topic.clone();
    state
        .warmup
        .defer(move || async move {
            if let Err(error) = run_guarded(process(&deferred_state, discriminator, &deferred_frame, payload)).await {
                tracing::error!(%error, topic = %topic, "deferred ingest handler failed");
            }
        })
        .await;

    // The gate may have released between the check above and the defer()
    // call landing; drain immediately rather than waiting on the next
    // frame to flush this one.
    if state.warmup.is_released() {
        state.warmup.drain().await;
    }
}

async fn process(state: &ServerState, discriminator: Discriminator, frame: &InboundFrame, payload: Value) -> anyhow::Result<()> {
    match discriminator {
        Discriminator::CallStart => handle_call_start(state, frame, payload).await,
        Discriminator::CallEnd => handle_call_end(state, frame, payload).await,
        Discriminator::UnitEvent(subtype) => handle_unit_event(state, &subtype, frame, payload).await,
        Discriminator::Recorders => handle_recorders(state, payload).await,
        Discriminator::Rates => handle_rates(state, payload).await,
        Discriminator::TrunkingMessage => handle_trunking_message(state, payload).await,
        Discriminator::ConsoleLog => handle_console_log(state, payload).await,
        Discriminator::Status | Discriminator::Config => handle_identity_message(state, payload).await,
        Discriminator::AudioNotice => Ok(()),
        Discriminator::Unknown => {
            state.stats.record_unknown_topic();
            tracing::debug!(topic = %frame.topic, "no discriminator matched trailing topic segment");
            Ok(())
        }
    }
}

async fn handle_call_start(state: &ServerState, frame: &InboundFrame, payload: Value) -> anyhow::Result<()> {
    let (Some(tgid), Some(start)) = (i64_field(&payload, "tgid"), epoch_field(&payload, "start")) else {
        state.stats.record_malformed_payload();
        return Ok(());
    };

    let Some(system_id) = resolve_system(state, &payload).await? else {
        state.stats.record_identity_failure();
        tracing::warn!(tgid, topic = %frame.topic, "call_start with unresolved system identity");
        return Ok(());
    };

    let site_id = resolve_site(state, system_id, &payload).await?;
    let call_id = derive_call_id(system_id, tgid, start);
    let emergency = bool_field(&payload, "emergency").unwrap_or(false);
    let unit_ids = i64_array_field(&payload, "units");
    let freq_hz = i64_field(&payload, "freq");

    if str_field(&payload, "alpha_tag").is_some()
        || str_field(&payload, "description").is_some()
        || str_field(&payload, "tag").is_some()
        || str_field(&payload, "group_name").is_some()
    {
        talkgroups::upsert(
            state.pool(),
            system_id,
            tgid,
            str_field(&payload, "alpha_tag"),
            str_field(&payload, "description"),
            str_field(&payload, "tag"),
            str_field(&payload, "group_name"),
            TagProvenance::Stream,
        )
        .await?;
    }

    for &unit_id in &unit_ids {
        units::upsert(state.pool(), system_id, unit_id, None, TagProvenance::Stream).await?;
    }

    let call = Call {
        call_id,
        system_id,
        tgid,
        site_id,
        start_time: start,
        stop_time: None,
        duration_secs: None,
        audio_file: None,
        call_group_id: None,
        is_primary: true,
        emergency,
        unit_ids: unit_ids.clone(),
        extra: payload.clone(),
    };
    calls::insert(state.pool(), &call).await?;

    state.tracker.start(ActiveCall { call_id, system_id, tgid, site_id, start_time: start, unit_ids, emergency, freq_hz });

    let mut event = BusEvent::new("call_start", payload).with_system(system_id).with_tgid(tgid).with_emergency(emergency);
    if let Some(site_id) = site_id {
        event = event.with_site(site_id);
    }
    state.bus.publish(event);
    Ok(())
}

async fn handle_call_end(state: &ServerState, frame: &InboundFrame, payload: Value) -> anyhow::Result<()> {
    let (Some(tgid), Some(start)) = (i64_field(&payload, "tgid"), epoch_field(&payload, "start")) else {
        state.stats.record_malformed_payload();
        return Ok(());
    };

    let Some(system_id) = resolve_system(state, &payload).await? else {
        state.stats.record_identity_failure();
        tracing::warn!(tgid, topic = %frame.topic, "call_end with unresolved system identity");
        return Ok(());
    };

    let call_id = derive_call_id(system_id, tgid, start);
    let Some(active) = state.tracker.end(system_id, call_id, tgid, start) else {
        state.stats.record_fuzzy_miss();
        tracing::info!(%system_id, tgid, "call_end matched no active call, exact or fuzzy");
        return Ok(());
    };

    let stop_time = epoch_field(&payload, "stop").unwrap_or_else(Utc::now);
    let audio_file = str_field(&payload, "audio_file");
    let persisted = calls::close(state.pool(), active.call_id, active.start_time, stop_time, audio_file).await?;

    if let Err(error) = call_transmissions::close_all_for_call(state.pool(), active.call_id, active.start_time, stop_time).await {
        tracing::warn!(%error, call_id = %active.call_id, "failed to close open call transmissions");
    }

    if let Some(call) = &persisted {
        if let Err(error) = assign_dedup_group(state.pool(), system_id, tgid, call.call_id, call.start_time).await {
            tracing::warn!(%error, call_id = %call.call_id, "dedup assignment failed for closed call");
        }
    }

    let event = BusEvent::new("call_end", payload).with_system(system_id).with_tgid(tgid).with_emergency(active.emergency);
    state.bus.publish(event);
    Ok(())
}

async fn handle_unit_event(state: &ServerState, subtype: &str, frame: &InboundFrame, payload: Value) -> anyhow::Result<()> {
    let Some(unit_id) = i64_field(&payload, "unit") else {
        state.stats.record_malformed_payload();
        return Ok(());
    };

    let Some(system_id) = resolve_system(state, &payload).await? else {
        state.stats.record_identity_failure();
        tracing::warn!(unit_id, subtype, topic = %frame.topic, "unit_event with unresolved system identity");
        return Ok(());
    };

    let tgid = i64_field(&payload, "tgid");
    let occurred_at = epoch_field(&payload, "time").unwrap_or_else(Utc::now);

    let event_type = match subtype {
        "on" => UnitEventType::On,
        "off" => UnitEventType::Off,
        "call" => UnitEventType::Call,
        "end" => UnitEventType::End,
        "join" => UnitEventType::Join,
        "location" => UnitEventType::Location,
        "ackresp" => UnitEventType::Ackresp,
        _ => UnitEventType::Data,
    };

    // Deaffiliation (`end`) may trail `call_end` by several seconds; this
    // only touches liveness, it never clears the current tgid on its own
    // (spec.md §4.4 upstream quirk 1 — coalescing is a consumer concern).
    match subtype {
        "call" | "on" | "join" => {
            if let Some(tgid) = tgid {
                state.affiliation.record_affiliated(system_id, unit_id, tgid, occurred_at);
            }
        }
        "off" => state.affiliation.record_off(system_id, unit_id, occurred_at),
        _ => state.affiliation.touch(system_id, unit_id, occurred_at),
    }

    // A `call` unit event is a unit actively transmitting within the
    // in-flight call on this tgid — the per-source transmission record
    // spec.md §3 describes a call as owning. No active call (e.g. a unit
    // event trailing the call by enough to have already closed it) just
    // means nothing to attach the transmission to; that is not an error.
    if subtype == "call" {
        if let Some(tgid) = tgid {
            if let Some((call_id, call_start_time)) = state.tracker.find_active(system_id, tgid) {
                match call_transmissions::has_open_for_unit(state.pool(), call_id, call_start_time, unit_id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        if let Err(error) = call_transmissions::insert(state.pool(), call_id, call_start_time, Some(unit_id), occurred_at).await {
                            tracing::warn!(%error, %call_id, unit_id, "failed to record call transmission");
                        }
                    }
                    Err(error) => tracing::warn!(%error, %call_id, unit_id, "failed to check for open call transmission"),
                }
            }
        }
    }

    unit_events::insert(state.pool(), system_id, unit_id, event_type, tgid, occurred_at).await?;

    let mut event = BusEvent::new("unit_event", payload).with_subtype(subtype).with_system(system_id).with_unit(unit_id);
    if let Some(tgid) = tgid {
        event = event.with_tgid(tgid);
    }
    state.bus.publish(event);
    Ok(())
}

async fn handle_recorders(state: &ServerState, payload: Value) -> anyhow::Result<()> {
    let (Some(instance), Some(recorder_id)) = (str_field(&payload, "instance"), str_field(&payload, "recorder_id")) else {
        state.stats.record_malformed_payload();
        return Ok(());
    };

    // Recorder snapshots aren't system-scoped (spec.md §4.8); fall back to
    // a nil sentinel when no system identity is present, which harmlessly
    // fails every frequency-match lookup rather than erroring.
    let system_id = resolve_system(state, &payload).await?.unwrap_or(Uuid::nil());

    let snapshot = RecorderSnapshot {
        id: Uuid::new_v4(),
        instance: instance.to_string(),
        recorder_id: recorder_id.to_string(),
        recorder_type: str_field(&payload, "recorder_type").map(str::to_string),
        freq_hz: i64_field(&payload, "freq"),
        rec_state: str_field(&payload, "rec_state").map(str::to_string),
        enriched_tgid: None,
        enriched_unit_id: None,
        observed_at: Utc::now(),
        extra: payload.clone(),
    };

    let enriched = state.recorders.record(system_id, &state.tracker, snapshot);
    state.batchers.recorder_snapshots.enqueue(enriched).await?;
    state.bus.publish(BusEvent::new("recorders", payload));
    Ok(())
}

async fn handle_rates(state: &ServerState, payload: Value) -> anyhow::Result<()> {
    let (Some(instance), Some(decoderate)) = (str_field(&payload, "instance"), f64_field(&payload, "decoderate")) else {
        state.stats.record_malformed_payload();
        return Ok(());
    };

    let row = DecodeRate {
        id: Uuid::new_v4(),
        instance: instance.to_string(),
        decoderate,
        control_channel: i64_field(&payload, "control_channel"),
        observed_at: Utc::now(),
        extra: payload,
    };
    state.batchers.decode_rates.enqueue(row).await?;
    Ok(())
}

async fn handle_trunking_message(state: &ServerState, payload: Value) -> anyhow::Result<()> {
    let system_id = resolve_system(state, &payload).await?;
    let message = str_field(&payload, "message")
        .or_else(|| str_field(&payload, "raw"))
        .unwrap_or_default()
        .to_string();

    let row = TrunkingMessage { id: Uuid::new_v4(), system_id, message, observed_at: Utc::now(), extra: payload };
    state.batchers.trunking_messages.enqueue(row).await?;
    Ok(())
}

async fn handle_console_log(state: &ServerState, payload: Value) -> anyhow::Result<()> {
    let message = str_field(&payload, "message")
        .or_else(|| str_field(&payload, "raw"))
        .unwrap_or_default()
        .to_string();

    let row = ConsoleLog {
        id: Uuid::new_v4(),
        instance: str_field(&payload, "instance").map(str::to_string),
        level: str_field(&payload, "level").map(str::to_string),
        message,
        observed_at: Utc::now(),
        extra: payload,
    };
    state.batchers.console_logs.enqueue(row).await?;
    Ok(())
}

/// `status`/`config` are the identity-bearing messages the warmup gate
/// waits for (spec.md §4.3: "system registration, configuration").
async fn handle_identity_message(state: &ServerState, payload: Value) -> anyhow::Result<()> {
    if let Some(system_id) = resolve_system(state, &payload).await? {
        resolve_site(state, system_id, &payload).await?;
    }
    state.warmup.release();
    state.warmup.drain().await;
    Ok(())
}

/// Races the warmup gate's own timeout against live frame delivery so a
/// quiet broker (no identity-bearing message ever arrives) still releases
/// buffered frames after the bound elapses.
pub fn spawn_warmup_drain(state: ServerState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        state.warmup.wait().await;
        state.warmup.drain().await;
    })
}

/// Consumes frames until the broker channel closes or shutdown is
/// signaled, then checkpoints every still-active call for crash recovery
/// (spec.md §4.4).
pub async fn run(state: ServerState, mut frames: mpsc::Receiver<InboundFrame>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            frame = frames.recv() => {
                match frame {
                    Some(frame) => dispatch_frame(&state, frame).await,
                    None => break,
                }
            }
        }
    }

    checkpoint_active_calls(&state).await;
}

async fn checkpoint_active_calls(state: &ServerState) {
    let active = state.tracker.snapshot();
    tracing::info!(count = active.len(), "checkpointing active calls before shutdown");
    for call in active {
        let checkpoint = CallCheckpoint {
            call_id: call.call_id,
            system_id: call.system_id,
            tgid: call.tgid,
            start_time: call.start_time,
            site_id: call.site_id,
            checkpointed_at: Utc::now(),
            state: serde_json::json!({
                "unit_ids": call.unit_ids,
                "emergency": call.emergency,
                "freq_hz": call.freq_hz,
            }),
        };
        if let Err(error) = checkpoints::upsert(state.pool(), &checkpoint).await {
            tracing::error!(%error, call_id = %call.call_id, "failed to checkpoint active call");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_name_covers_every_discriminator() {
        assert_eq!(handler_name(&Discriminator::CallStart), "call_start");
        assert_eq!(handler_name(&Discriminator::UnitEvent("call".into())), "unit_event");
        assert_eq!(handler_name(&Discriminator::Unknown), "_unknown");
    }

    #[test]
    fn should_archive_denylist_excludes_named_handlers() {
        let mode = RawArchiveMode::Denylist(vec!["call_start".to_string()]);
        assert!(!should_archive(&mode, "call_start"));
        assert!(should_archive(&mode, "recorders"));
    }

    #[test]
    fn should_archive_allowlist_includes_only_named_handlers() {
        let mode = RawArchiveMode::Allowlist(vec!["_unknown".to_string()]);
        assert!(should_archive(&mode, "_unknown"));
        assert!(!should_archive(&mode, "call_start"));
    }

    #[test]
    fn should_archive_disabled_excludes_everything() {
        assert!(!should_archive(&RawArchiveMode::Disabled, "call_start"));
    }

    #[test]
    fn derive_call_id_is_stable_within_a_tenth_of_a_second() {
        let system_id = Uuid::new_v4();
        let a = "2026-01-01T00:00:00.00Z".parse::<DateTime<Utc>>().unwrap();
        let b = "2026-01-01T00:00:00.05Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(derive_call_id(system_id, 100, a), derive_call_id(system_id, 100, b));
    }

    #[test]
    fn derive_call_id_changes_when_start_drifts_by_seconds() {
        let system_id = Uuid::new_v4();
        let a = "2026-01-01T00:00:00.0Z".parse::<DateTime<Utc>>().unwrap();
        let b = "2026-01-01T00:00:02.0Z".parse::<DateTime<Utc>>().unwrap();
        assert_ne!(derive_call_id(system_id, 100, a), derive_call_id(system_id, 100, b));
    }
}
