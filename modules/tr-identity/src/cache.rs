//! In-memory natural-key → surrogate-id cache fronting `tr-storage`'s
//! system/site repos (spec.md §4.3). Read-mostly, guarded by
//! `std::sync::RwLock`; writes are serialized through the resolve path,
//! which resolves unique-constraint races by re-reading rather than
//! failing.

use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::RwLock;
use tr_core::{Site, System};
use tr_storage::repo::{sites, systems};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TrunkedKey {
    sysid: i64,
    wacn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConventionalKey {
    instance: String,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SiteKey {
    system_id: Uuid,
    instance: String,
    short_name: String,
}

pub struct IdentityCache {
    trunked: RwLock<HashMap<TrunkedKey, Uuid>>,
    conventional: RwLock<HashMap<ConventionalKey, Uuid>>,
    sites: RwLock<HashMap<SiteKey, Uuid>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self {
            trunked: RwLock::new(HashMap::new()),
            conventional: RwLock::new(HashMap::new()),
            sites: RwLock::new(HashMap::new()),
        }
    }

    /// Cold-start detection for the warmup gate: true only if nothing has
    /// ever been resolved in this process. A restart with a warm cache
    /// (via [`Self::seed_system`]/[`Self::seed_site`]) skips the gate.
    pub fn is_empty(&self) -> bool {
        self.trunked.read().expect("identity cache lock poisoned").is_empty()
            && self.conventional.read().expect("identity cache lock poisoned").is_empty()
    }

    pub fn seed_system(&self, system: &System) {
        if let (Some(sysid), Some(wacn)) = (system.sysid, system.wacn.as_deref()) {
            self.trunked
                .write()
                .expect("identity cache lock poisoned")
                .insert(TrunkedKey { sysid, wacn: wacn.to_string() }, system.system_id);
        } else if let (Some(instance), Some(name)) = (system.instance.as_deref(), system.name.as_deref()) {
            self.conventional
                .write()
                .expect("identity cache lock poisoned")
                .insert(
                    ConventionalKey { instance: instance.to_string(), name: name.to_string() },
                    system.system_id,
                );
        }
    }

    pub fn seed_site(&self, site: &Site) {
        self.sites.write().expect("identity cache lock poisoned").insert(
            SiteKey {
                system_id: site.system_id,
                instance: site.instance.clone(),
                short_name: site.short_name.clone(),
            },
            site.site_id,
        );
    }

    /// Resolve a trunked system's surrogate id, upserting on miss. `sysid
    /// = 0` or an absent/empty wacn is an unknown key per spec.md §4.3 and
    /// returns `None` without touching storage.
    pub async fn resolve_trunked_system(&self, pool: &PgPool, sysid: i64, wacn: &str) -> anyhow::Result<Option<Uuid>> {
        if sysid == 0 || wacn.is_empty() {
            return Ok(None);
        }
        let key = TrunkedKey { sysid, wacn: wacn.to_string() };
        if let Some(id) = self.trunked.read().expect("identity cache lock poisoned").get(&key) {
            return Ok(Some(*id));
        }

        if let Some(system) = systems::find_by_trunked_key(pool, sysid, wacn).await? {
            self.trunked.write().expect("identity cache lock poisoned").insert(key, system.system_id);
            return Ok(Some(system.system_id));
        }

        let system = match systems::insert_trunked(pool, sysid, wacn).await {
            Ok(system) => system,
            Err(err) if systems::is_unique_violation(&err) => systems::find_by_trunked_key(pool, sysid, wacn)
                .await?
                .ok_or(err)?,
            Err(err) => return Err(err.into()),
        };
        self.trunked
            .write()
            .expect("identity cache lock poisoned")
            .insert(key, system.system_id);
        Ok(Some(system.system_id))
    }

    pub async fn resolve_conventional_system(&self, pool: &PgPool, instance: &str, name: &str) -> anyhow::Result<Uuid> {
        let key = ConventionalKey { instance: instance.to_string(), name: name.to_string() };
        if let Some(id) = self.conventional.read().expect("identity cache lock poisoned").get(&key) {
            return Ok(*id);
        }

        if let Some(system) = systems::find_by_conventional_key(pool, instance, name).await? {
            self.conventional
                .write()
                .expect("identity cache lock poisoned")
                .insert(key, system.system_id);
            return Ok(system.system_id);
        }

        let system = match systems::insert_conventional(pool, instance, name).await {
            Ok(system) => system,
            Err(err) if systems::is_unique_violation(&err) => systems::find_by_conventional_key(pool, instance, name)
                .await?
                .ok_or(err)?,
            Err(err) => return Err(err.into()),
        };
        self.conventional
            .write()
            .expect("identity cache lock poisoned")
            .insert(key, system.system_id);
        Ok(system.system_id)
    }

    /// Resolve a site's surrogate id, upserting on miss. `site_number` is
    /// advisory only (spec.md §3) and never participates in the key.
    pub async fn resolve_site(
        &self,
        pool: &PgPool,
        system_id: Uuid,
        instance: &str,
        short_name: &str,
        site_number: Option<i64>,
        nac: Option<&str>,
    ) -> anyhow::Result<Uuid> {
        let key = SiteKey { system_id, instance: instance.to_string(), short_name: short_name.to_string() };
        if let Some(id) = self.sites.read().expect("identity cache lock poisoned").get(&key) {
            return Ok(*id);
        }

        if let Some(site) = sites::find_by_key(pool, system_id, instance, short_name).await? {
            self.sites.write().expect("identity cache lock poisoned").insert(key, site.site_id);
            return Ok(site.site_id);
        }

        let site = match sites::insert(pool, system_id, instance, short_name, site_number, nac).await {
            Ok(site) => site,
            Err(err) if systems::is_unique_violation(&err) => sites::find_by_key(pool, system_id, instance, short_name)
                .await?
                .ok_or(err)?,
            Err(err) => return Err(err.into()),
        };
        self.sites.write().expect("identity cache lock poisoned").insert(key, site.site_id);
        Ok(site.site_id)
    }

    /// Drops every cache entry pointing at `from`. Called after a merge
    /// commits so later lookups re-resolve to the target through storage
    /// (spec.md §4.3: "invalidates the in-memory cache").
    pub fn invalidate_system(&self, from: Uuid) {
        self.trunked.write().expect("identity cache lock poisoned").retain(|_, id| *id != from);
        self.conventional.write().expect("identity cache lock poisoned").retain(|_, id| *id != from);
        self.sites.write().expect("identity cache lock poisoned").retain(|_, id| *id != from);
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_reports_empty() {
        let cache = IdentityCache::new();
        assert!(cache.is_empty());
    }

    #[test]
    fn seeding_a_system_makes_cache_non_empty() {
        let cache = IdentityCache::new();
        cache.seed_system(&System {
            system_id: Uuid::new_v4(),
            sysid: Some(348),
            wacn: Some("BEE00".to_string()),
            instance: None,
            name: None,
            system_type: "trunked".to_string(),
            created_at: chrono::Utc::now(),
            extra: serde_json::json!({}),
        });
        assert!(!cache.is_empty());
    }

    #[test]
    fn invalidate_removes_only_the_source_system() {
        let cache = IdentityCache::new();
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        cache.trunked.write().unwrap().insert(TrunkedKey { sysid: 1, wacn: "A".into() }, keep);
        cache.trunked.write().unwrap().insert(TrunkedKey { sysid: 2, wacn: "B".into() }, drop);
        cache.invalidate_system(drop);
        let map = cache.trunked.read().unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.values().any(|id| *id == keep));
    }
}
