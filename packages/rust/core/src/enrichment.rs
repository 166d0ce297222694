//! Caller-side bookkeeping for source detail fetches.
//!
//! [`SourceRegistry::enrich`] is idempotent but does nothing to stop two
//! fetches for the same document from being in flight at once. Hosts that
//! fetch details asynchronously keep one [`EnrichmentTracker`] per turn and
//! ask it before starting a request.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::registry::SourceRegistry;

/// Counters for one turn's enrichment traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    /// Fetches actually started.
    pub requested: usize,
    /// `begin` calls refused because the id was already in flight.
    pub deduplicated: usize,
    /// Fetches reported done.
    pub completed: usize,
}

/// In-flight and completed fetch ids for one turn.
#[derive(Debug, Default)]
pub struct EnrichmentTracker {
    in_flight: HashSet<String>,
    completed: HashSet<String>,
    stats: EnrichmentStats,
}

impl EnrichmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for a fetch. Returns `false` if a fetch for it is already
    /// running; the caller should then skip its own request.
    pub fn begin(&mut self, id: &str) -> bool {
        if self.in_flight.contains(id) {
            self.stats.deduplicated += 1;
            debug!(%id, "enrichment already in flight");
            return false;
        }
        self.in_flight.insert(id.to_string());
        self.stats.requested += 1;
        true
    }

    /// Release `id` after its fetch finished (successfully or not).
    pub fn complete(&mut self, id: &str) {
        if self.in_flight.remove(id) {
            self.completed.insert(id.to_string());
            self.stats.completed += 1;
        }
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    /// Sources that still lack excerpts and have no fetch running or done,
    /// in registry order.
    pub fn pending_sources(&self, registry: &SourceRegistry) -> Vec<String> {
        registry
            .iter()
            .filter(|s| s.excerpts.is_empty())
            .filter(|s| !self.in_flight.contains(&s.id) && !self.completed.contains(&s.id))
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn stats(&self) -> EnrichmentStats {
        self.stats
    }

    /// Log the counters once the turn is over.
    pub fn log_summary(&self) {
        info!(
            requested = self.stats.requested,
            deduplicated = self.stats.deduplicated,
            completed = self.stats.completed,
            in_flight = self.in_flight.len(),
            "enrichment summary"
        );
    }
}
