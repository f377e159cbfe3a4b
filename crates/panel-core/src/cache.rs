//! Interview result cache using moka
//!
//! Keyed by a BLAKE3 hash of everything that shapes an interview: the persona
//! profile (without its run-local id), the question list, the business context,
//! the response style and the depth. Cached interviews are re-stamped with the
//! caller's persona and group ids on the way out.

use crate::config::{Depth, ResponseStyle};
use crate::types::{BusinessContext, Persona, SimulatedInterview, StakeholderGroup};
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable 32-byte cache key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derive the key of one interview invocation
    #[must_use]
    pub fn derive(
        persona: &Persona,
        group: &StakeholderGroup,
        context: &BusinessContext,
        style: ResponseStyle,
        depth: Depth,
    ) -> Self {
        #[derive(Serialize)]
        struct Material<'a> {
            name: &'a str,
            age: u32,
            background: &'a str,
            motivations: &'a [String],
            pain_points: &'a [String],
            communication_style: &'a str,
            demographic_details: &'a serde_json::Map<String, serde_json::Value>,
            group_id: &'a str,
            questions: &'a [String],
            context: &'a BusinessContext,
            style: ResponseStyle,
            depth: Depth,
        }

        let material = Material {
            name: &persona.name,
            age: persona.age,
            background: &persona.background,
            motivations: &persona.motivations,
            pain_points: &persona.pain_points,
            communication_style: &persona.communication_style,
            demographic_details: &persona.demographic_details,
            group_id: &group.id,
            questions: &group.questions,
            context,
            style,
            depth,
        };

        // Struct fields serialize in declaration order and the details map is
        // sorted, so the encoding is canonical.
        let bytes = serde_json::to_vec(&material).unwrap_or_default();
        Self(*blake3::hash(&bytes).as_bytes())
    }

    /// Short hex form (first 16 chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.short())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub entry_count: u64,
    pub capacity: u64,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Bounded interview cache with LRU eviction
#[derive(Debug, Clone)]
pub struct InterviewCache {
    inner: Cache<CacheKey, Arc<SimulatedInterview>>,
    capacity: u64,
    counters: Arc<Counters>,
}

impl InterviewCache {
    /// Create cache with max capacity
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            capacity,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Look up an interview, re-stamped for `persona`
    pub async fn get(&self, key: &CacheKey, persona: &Persona) -> Option<SimulatedInterview> {
        match self.inner.get(key).await {
            Some(cached) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("panel_cache_hits_total").increment(1);
                let mut interview = SimulatedInterview::clone(&cached);
                interview.persona_id = persona.id;
                interview.stakeholder_group_id = persona.stakeholder_group_id.clone();
                Some(interview)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("panel_cache_misses_total").increment(1);
                None
            }
        }
    }

    /// Store an interview
    pub async fn insert(&self, key: CacheKey, interview: SimulatedInterview) {
        self.inner.insert(key, Arc::new(interview)).await;
    }

    /// Drop every entry and reset counters
    pub async fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.misses.store(0, Ordering::Relaxed);
    }

    /// Current statistics
    pub async fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks().await;
        CacheStats {
            enabled: true,
            entry_count: self.inner.entry_count(),
            capacity: self.capacity,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for InterviewCache {
    /// Create cache with default capacity (256 interviews)
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PersonaId, Sentiment};

    fn persona(name: &str) -> Persona {
        Persona {
            id: PersonaId::new(),
            name: name.to_string(),
            age: 50,
            background: "Retired librarian".to_string(),
            motivations: vec![],
            pain_points: vec![],
            communication_style: "Warm".to_string(),
            demographic_details: serde_json::Map::new(),
            stakeholder_group_id: "retirees".to_string(),
        }
    }

    fn group() -> StakeholderGroup {
        StakeholderGroup::new("retirees", "Retirees").with_question("How do you travel?")
    }

    fn interview(persona: &Persona) -> SimulatedInterview {
        SimulatedInterview {
            persona_id: persona.id,
            stakeholder_group_id: persona.stakeholder_group_id.clone(),
            responses: vec![],
            duration_minutes: 12,
            overall_sentiment: Sentiment::Neutral,
        }
    }

    fn key(persona: &Persona, style: ResponseStyle) -> CacheKey {
        CacheKey::derive(
            persona,
            &group(),
            &BusinessContext::new("Rail passes"),
            style,
            Depth::Quick,
        )
    }

    #[test]
    fn key_ignores_run_local_id() {
        let a = persona("Lou");
        let mut b = a.clone();
        b.id = PersonaId::new();
        assert_eq!(key(&a, ResponseStyle::Realistic), key(&b, ResponseStyle::Realistic));
    }

    #[test]
    fn key_changes_with_inputs() {
        let a = persona("Lou");
        assert_ne!(key(&a, ResponseStyle::Realistic), key(&a, ResponseStyle::Critical));
        assert_ne!(
            key(&a, ResponseStyle::Realistic),
            key(&persona("Max"), ResponseStyle::Realistic)
        );
    }

    #[tokio::test]
    async fn hit_is_restamped_for_caller() {
        let cache = InterviewCache::new(10);
        let original = persona("Lou");
        let k = key(&original, ResponseStyle::Realistic);
        cache.insert(k, interview(&original)).await;

        let mut again = original.clone();
        again.id = PersonaId::new();
        let hit = cache.get(&k, &again).await.unwrap();
        assert_eq!(hit.persona_id, again.id);
        assert_eq!(hit.duration_minutes, 12);
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache = InterviewCache::new(10);
        let p = persona("Lou");
        let k = key(&p, ResponseStyle::Realistic);

        assert!(cache.get(&k, &p).await.is_none());
        cache.insert(k, interview(&p)).await;
        assert!(cache.get(&k, &p).await.is_some());

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn clear_empties_cache() {
        let cache = InterviewCache::default();
        let p = persona("Lou");
        let k = key(&p, ResponseStyle::Realistic);
        cache.insert(k, interview(&p)).await;

        cache.clear().await;

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 0);
        assert!(cache.get(&k, &p).await.is_none());
    }
}
