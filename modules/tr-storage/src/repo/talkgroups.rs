//! Talkgroup upsert honoring tag provenance precedence: manual > csv >
//! stream (spec.md §3). A lower-precedence write never clobbers a
//! higher-precedence one already on the row.

use sqlx::PgPool;
use tr_core::{TagProvenance, Talkgroup};
use uuid::Uuid;

fn rank(p: TagProvenance) -> i16 {
    match p {
        TagProvenance::Stream => 0,
        TagProvenance::Csv => 1,
        TagProvenance::Manual => 2,
    }
}

pub async fn upsert(
    pool: &PgPool,
    system_id: Uuid,
    tgid: i64,
    alpha_tag: Option<&str>,
    description: Option<&str>,
    tag: Option<&str>,
    group_name: Option<&str>,
    provenance: TagProvenance,
) -> Result<Talkgroup, sqlx::Error> {
    sqlx::query_as::<_, Talkgroup>(
        "INSERT INTO talkgroups (system_id, tgid, alpha_tag, description, tag, group_name, provenance, updated_at, extra) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, now(), '{}'::jsonb) \
         ON CONFLICT (system_id, tgid) DO UPDATE SET \
            alpha_tag = EXCLUDED.alpha_tag, \
            description = EXCLUDED.description, \
            tag = EXCLUDED.tag, \
            group_name = EXCLUDED.group_name, \
            provenance = EXCLUDED.provenance, \
            updated_at = now() \
         WHERE $8 >= CASE talkgroups.provenance \
            WHEN 'manual' THEN 2 WHEN 'csv' THEN 1 ELSE 0 END \
         RETURNING system_id, tgid, alpha_tag, description, tag, group_name, provenance, updated_at, extra",
    )
    .bind(system_id)
    .bind(tgid)
    .bind(alpha_tag)
    .bind(description)
    .bind(tag)
    .bind(group_name)
    .bind(provenance)
    .bind(rank(provenance))
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &PgPool, system_id: Uuid, tgid: i64) -> anyhow::Result<Option<Talkgroup>> {
    let row = sqlx::query_as::<_, Talkgroup>(
        "SELECT system_id, tgid, alpha_tag, description, tag, group_name, provenance, updated_at, extra \
         FROM talkgroups WHERE system_id = $1 AND tgid = $2",
    )
    .bind(system_id)
    .bind(tgid)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn find_by_tgid_across_systems(pool: &PgPool, tgid: i64) -> anyhow::Result<Vec<Talkgroup>> {
    let rows = sqlx::query_as::<_, Talkgroup>(
        "SELECT system_id, tgid, alpha_tag, description, tag, group_name, provenance, updated_at, extra \
         FROM talkgroups WHERE tgid = $1",
    )
    .bind(tgid)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// `order_by` must come from a caller-side allowlist (spec.md §6).
pub async fn list_for_system(pool: &PgPool, system_id: Uuid, limit: i64, order_by: &str) -> anyhow::Result<Vec<Talkgroup>> {
    let sql = format!(
        "SELECT system_id, tgid, alpha_tag, description, tag, group_name, provenance, updated_at, extra \
         FROM talkgroups WHERE system_id = $1 ORDER BY {order_by} LIMIT $2"
    );
    let rows = sqlx::query_as::<_, Talkgroup>(&sql).bind(system_id).bind(limit).fetch_all(pool).await?;
    Ok(rows)
}

/// Merge B := A ∪ B, keeping B's row on conflict unless B's provenance is
/// lower-ranked than A's (spec.md §4.3 merge: "preserving manual tag edits
/// on the target").
pub async fn merge_into(conn: &mut sqlx::PgConnection, from_system: Uuid, to_system: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO talkgroups (system_id, tgid, alpha_tag, description, tag, group_name, provenance, updated_at, extra) \
         SELECT $2, tgid, alpha_tag, description, tag, group_name, provenance, updated_at, extra \
         FROM talkgroups WHERE system_id = $1 \
         ON CONFLICT (system_id, tgid) DO UPDATE SET \
            alpha_tag = EXCLUDED.alpha_tag, \
            description = EXCLUDED.description, \
            tag = EXCLUDED.tag, \
            group_name = EXCLUDED.group_name, \
            provenance = EXCLUDED.provenance, \
            updated_at = now() \
         WHERE CASE EXCLUDED.provenance WHEN 'manual' THEN 2 WHEN 'csv' THEN 1 ELSE 0 END \
             >= CASE talkgroups.provenance WHEN 'manual' THEN 2 WHEN 'csv' THEN 1 ELSE 0 END",
    )
    .bind(from_system)
    .bind(to_system)
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM talkgroups WHERE system_id = $1")
        .bind(from_system)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_rank_orders_manual_highest() {
        assert!(rank(TagProvenance::Manual) > rank(TagProvenance::Csv));
        assert!(rank(TagProvenance::Csv) > rank(TagProvenance::Stream));
    }
}
