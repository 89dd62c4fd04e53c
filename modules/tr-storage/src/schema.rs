//! Schema bootstrap and idempotent migrations (spec.md §4.9). On startup:
//! if `systems` (the canonical entity table) is absent, run the full
//! bootstrap script; otherwise run every migration in order. Every
//! statement is itself idempotent (`IF NOT EXISTS`), so re-running the
//! full list on an already-migrated database is a no-op — the same shape
//! as the Cypher constraint loop this was translated from.

use sqlx::PgPool;
use tracing::info;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// Returns `true` if the canonical entity table already exists.
pub async fn is_bootstrapped(pool: &PgPool) -> anyhow::Result<bool> {
    let row: (Option<String>,) = sqlx::query_as("SELECT to_regclass('public.systems')::text")
        .fetch_one(pool)
        .await?;
    Ok(row.0.is_some())
}

pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    if !is_bootstrapped(pool).await? {
        info!("systems table absent, running bootstrap script");
        sqlx::raw_sql(BOOTSTRAP).execute(pool).await?;
        info!("bootstrap complete");
    }

    for migration in MIGRATIONS {
        sqlx::raw_sql(migration.sql).execute(pool).await?;
        info!(migration = migration.name, "migration applied");
    }

    Ok(())
}

const BOOTSTRAP: &str = r#"
CREATE EXTENSION IF NOT EXISTS pg_trgm;

CREATE TABLE IF NOT EXISTS systems (
    system_id    uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    sysid        bigint,
    wacn         text,
    instance     text,
    name         text,
    system_type  text NOT NULL DEFAULT 'trunked',
    deleted_at   timestamptz,
    created_at   timestamptz NOT NULL DEFAULT now(),
    extra        jsonb NOT NULL DEFAULT '{}'::jsonb
);
CREATE UNIQUE INDEX IF NOT EXISTS systems_trunked_natural_key
    ON systems (sysid, wacn) WHERE deleted_at IS NULL AND sysid IS NOT NULL AND wacn IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS systems_conventional_natural_key
    ON systems (instance, name) WHERE deleted_at IS NULL AND sysid IS NULL;

CREATE TABLE IF NOT EXISTS sites (
    site_id      uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    system_id    uuid NOT NULL REFERENCES systems (system_id),
    instance     text NOT NULL,
    short_name   text NOT NULL,
    site_number  bigint,
    nac          text,
    created_at   timestamptz NOT NULL DEFAULT now(),
    extra        jsonb NOT NULL DEFAULT '{}'::jsonb,
    UNIQUE (system_id, instance, short_name)
);

CREATE TABLE IF NOT EXISTS talkgroups (
    system_id    uuid NOT NULL REFERENCES systems (system_id),
    tgid         bigint NOT NULL,
    alpha_tag    text,
    description  text,
    tag          text,
    group_name   text,
    provenance   text NOT NULL DEFAULT 'stream',
    updated_at   timestamptz NOT NULL DEFAULT now(),
    extra        jsonb NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (system_id, tgid)
);
CREATE INDEX IF NOT EXISTS talkgroups_tgid_idx ON talkgroups (tgid);
CREATE INDEX IF NOT EXISTS talkgroups_description_trgm
    ON talkgroups USING gin (description gin_trgm_ops);

CREATE TABLE IF NOT EXISTS units (
    system_id    uuid NOT NULL REFERENCES systems (system_id),
    unit_id      bigint NOT NULL,
    label        text,
    provenance   text NOT NULL DEFAULT 'stream',
    updated_at   timestamptz NOT NULL DEFAULT now(),
    extra        jsonb NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (system_id, unit_id)
);
CREATE INDEX IF NOT EXISTS units_unit_id_idx ON units (unit_id);

CREATE TABLE IF NOT EXISTS call_groups (
    call_group_id          uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    system_id              uuid NOT NULL REFERENCES systems (system_id),
    tgid                   bigint NOT NULL,
    start_time_bucket      timestamptz NOT NULL,
    primary_call_id        uuid,
    primary_call_start_time timestamptz,
    created_at             timestamptz NOT NULL DEFAULT now(),
    UNIQUE (system_id, tgid, start_time_bucket)
);

CREATE TABLE IF NOT EXISTS calls (
    call_id         uuid NOT NULL DEFAULT gen_random_uuid(),
    system_id       uuid NOT NULL,
    tgid            bigint NOT NULL,
    site_id         uuid,
    start_time      timestamptz NOT NULL,
    stop_time       timestamptz,
    duration_secs   double precision,
    audio_file      text,
    call_group_id   uuid,
    is_primary      boolean NOT NULL DEFAULT false,
    emergency       boolean NOT NULL DEFAULT false,
    extra           jsonb NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (call_id, start_time)
) PARTITION BY RANGE (start_time);
CREATE INDEX IF NOT EXISTS calls_system_tgid_idx ON calls (system_id, tgid, start_time);
CREATE INDEX IF NOT EXISTS calls_call_group_idx ON calls (call_group_id);

CREATE TABLE IF NOT EXISTS call_transmissions (
    id               uuid NOT NULL DEFAULT gen_random_uuid(),
    call_id          uuid NOT NULL,
    call_start_time  timestamptz NOT NULL,
    unit_id          bigint,
    start_time       timestamptz NOT NULL,
    stop_time        timestamptz,
    extra            jsonb NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (id, call_start_time)
) PARTITION BY RANGE (call_start_time);
CREATE INDEX IF NOT EXISTS call_transmissions_call_idx ON call_transmissions (call_id, call_start_time);

CREATE TABLE IF NOT EXISTS call_frequencies (
    id               uuid NOT NULL DEFAULT gen_random_uuid(),
    call_id          uuid NOT NULL,
    call_start_time  timestamptz NOT NULL,
    freq_hz          bigint NOT NULL,
    signal           double precision,
    noise            double precision,
    observed_at      timestamptz NOT NULL DEFAULT now(),
    extra            jsonb NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (id, call_start_time)
) PARTITION BY RANGE (call_start_time);
CREATE INDEX IF NOT EXISTS call_frequencies_call_idx ON call_frequencies (call_id, call_start_time);

CREATE TABLE IF NOT EXISTS unit_events (
    id           uuid NOT NULL DEFAULT gen_random_uuid(),
    system_id    uuid NOT NULL,
    unit_id      bigint NOT NULL,
    event_type   text NOT NULL,
    tgid         bigint,
    occurred_at  timestamptz NOT NULL,
    extra        jsonb NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (id, occurred_at)
) PARTITION BY RANGE (occurred_at);
CREATE INDEX IF NOT EXISTS unit_events_unit_idx ON unit_events (system_id, unit_id, occurred_at);

CREATE TABLE IF NOT EXISTS trunking_messages (
    id           uuid NOT NULL DEFAULT gen_random_uuid(),
    system_id    uuid,
    message      text NOT NULL,
    observed_at  timestamptz NOT NULL,
    extra        jsonb NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (id, observed_at)
) PARTITION BY RANGE (observed_at);

CREATE TABLE IF NOT EXISTS recorder_snapshots (
    id               uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    instance         text NOT NULL,
    recorder_id      text NOT NULL,
    recorder_type    text,
    freq_hz          bigint,
    rec_state        text,
    enriched_tgid    bigint,
    enriched_unit_id bigint,
    observed_at      timestamptz NOT NULL DEFAULT now(),
    extra            jsonb NOT NULL DEFAULT '{}'::jsonb
);
CREATE INDEX IF NOT EXISTS recorder_snapshots_latest_idx
    ON recorder_snapshots (instance, recorder_id, observed_at DESC);

CREATE TABLE IF NOT EXISTS decode_rates (
    id               uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    instance         text NOT NULL,
    decoderate       double precision NOT NULL,
    control_channel  bigint,
    observed_at      timestamptz NOT NULL DEFAULT now(),
    extra            jsonb NOT NULL DEFAULT '{}'::jsonb
);
CREATE INDEX IF NOT EXISTS decode_rates_instance_idx ON decode_rates (instance, observed_at DESC);

CREATE TABLE IF NOT EXISTS console_logs (
    id           uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    instance     text,
    level        text,
    message      text NOT NULL,
    observed_at  timestamptz NOT NULL DEFAULT now(),
    extra        jsonb NOT NULL DEFAULT '{}'::jsonb
);
CREATE INDEX IF NOT EXISTS console_logs_message_fts
    ON console_logs USING gin (to_tsvector('english', message));

CREATE TABLE IF NOT EXISTS raw_archive (
    id           uuid NOT NULL DEFAULT gen_random_uuid(),
    topic        text NOT NULL,
    handler      text NOT NULL,
    received_at  timestamptz NOT NULL DEFAULT now(),
    payload      jsonb NOT NULL,
    PRIMARY KEY (id, received_at)
) PARTITION BY RANGE (received_at);

CREATE TABLE IF NOT EXISTS merge_audit (
    id                 uuid PRIMARY KEY DEFAULT gen_random_uuid(),
    source_system_id   uuid NOT NULL,
    target_system_id   uuid NOT NULL,
    merged_at          timestamptz NOT NULL DEFAULT now(),
    merged_tables      jsonb NOT NULL DEFAULT '{}'::jsonb
);

CREATE TABLE IF NOT EXISTS call_checkpoints (
    call_id           uuid NOT NULL,
    system_id         uuid NOT NULL,
    tgid              bigint NOT NULL,
    start_time        timestamptz NOT NULL,
    site_id           uuid,
    checkpointed_at   timestamptz NOT NULL DEFAULT now(),
    state             jsonb NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (call_id, start_time)
);
"#;

/// Applied, in order, after bootstrap (or on every startup of an already
/// bootstrapped database). Additive only — never rewrite a past migration,
/// add a new one.
const MIGRATIONS: &[Migration] = &[Migration {
    name: "0001_calls_unit_ids_array",
    sql: "ALTER TABLE calls ADD COLUMN IF NOT EXISTS unit_ids bigint[] NOT NULL DEFAULT '{}'; \
          CREATE INDEX IF NOT EXISTS calls_unit_ids_gin ON calls USING gin (unit_ids);",
}];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_script_is_nonempty_and_mentions_systems_table() {
        assert!(BOOTSTRAP.contains("CREATE TABLE IF NOT EXISTS systems"));
    }

    #[test]
    fn every_migration_statement_is_conditional() {
        for m in MIGRATIONS {
            assert!(
                m.sql.contains("IF NOT EXISTS") || m.sql.contains("IF EXISTS"),
                "migration {} is not obviously idempotent",
                m.name
            );
        }
    }
}
