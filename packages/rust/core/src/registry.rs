//! Per-turn document registry.
//!
//! Sources arrive piecemeal: a citation names a file, a context update adds
//! excerpts, an enrichment fetch fills in the x-ray. The registry keeps one
//! [`Source`] per derived id and merges every later mention into it without
//! ever overwriting a populated field.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, trace, warn};

use answerflow_extract::SourceFields;
use answerflow_shared::Source;

/// Result of [`SourceRegistry::enrich`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// At least one absent field was filled in.
    Updated,
    /// Every field in the payload was already populated.
    Unchanged,
    /// No source with that id exists in this registry.
    UnknownSource,
}

/// Insertion-ordered source store with id and alias lookup.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    /// Sources in order of first appearance.
    sources: Vec<Source>,
    /// Canonical ids and aliases to positions in `sources`.
    index: HashMap<String, usize>,
    /// Slots registered under a bare file name and not yet claimed by an
    /// explicit id.
    provisional: HashSet<usize>,
    /// Slots registered with a positional fallback id.
    anonymous: HashSet<usize>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    /// Owned copy for answer snapshots.
    pub fn snapshot(&self) -> Vec<Source> {
        self.sources.clone()
    }

    // -----------------------------------------------------------------------
    // Upsert
    // -----------------------------------------------------------------------

    /// Register or merge a raw source-like object; returns its canonical id.
    ///
    /// A bare string is a file name. Objects with neither id nor file name
    /// are registered as `doc-{n}`, `n` being their registry position.
    pub fn upsert(&mut self, raw: &Value) -> String {
        let fields = match raw {
            Value::String(name) => SourceFields {
                file_name: Some(name.trim().to_string()).filter(|n| !n.is_empty()),
                ..SourceFields::default()
            },
            other => SourceFields::from_value(other),
        };
        self.upsert_fields(fields)
    }

    /// Register or merge already-extracted fields.
    pub fn upsert_fields(&mut self, fields: SourceFields) -> String {
        let derived = fields.derived_id().map(str::to_string);

        if let Some(slot) = self.slot_for(derived.as_deref(), &fields) {
            if let Some(alias) = derived {
                if !self.index.contains_key(&alias) {
                    trace!(%alias, id = %self.sources[slot].id, "recorded source alias");
                    self.index.insert(alias, slot);
                }
            }
            if fields.id.is_some() {
                self.provisional.remove(&slot);
            }
            let source = &mut self.sources[slot];
            if merge(source, &fields) {
                trace!(id = %source.id, "merged source fields");
            }
            return source.id.clone();
        }

        let slot = self.sources.len();
        let id = match derived {
            Some(id) => id,
            None => self.fallback_id(),
        };
        match (&fields.id, &fields.file_name) {
            (None, Some(_)) => {
                self.provisional.insert(slot);
            }
            (None, None) => {
                self.anonymous.insert(slot);
            }
            _ => {}
        }

        let mut source = Source::new(id.clone());
        merge(&mut source, &fields);
        debug!(%id, file_name = %source.file_name, "registered source");
        self.index.insert(id.clone(), slot);
        self.sources.push(source);
        id
    }

    /// Existing slot an incoming object belongs to, if any.
    ///
    /// Besides an exact id hit, a name-only mention joins the source already
    /// carrying that file name, and an explicit id claims a source that was
    /// registered under the bare name. Only the first explicit id claims it;
    /// two different explicit ids never merge. Anonymous objects join an
    /// anonymous source with identical excerpts.
    fn slot_for(&self, derived: Option<&str>, fields: &SourceFields) -> Option<usize> {
        if let Some(&slot) = derived.and_then(|id| self.index.get(id)) {
            return Some(slot);
        }
        match (&fields.id, &fields.file_name) {
            (Some(_), Some(name)) => self
                .index
                .get(name.as_str())
                .copied()
                .filter(|slot| self.provisional.contains(slot)),
            (None, Some(name)) => self.sources.iter().position(|s| &s.file_name == name),
            (None, None) => (0..self.sources.len()).find(|slot| {
                self.anonymous.contains(slot) && self.sources[*slot].excerpts == fields.excerpts
            }),
            (Some(_), None) => None,
        }
    }

    /// `doc-{position + 1}`, skipping ids a backend already used.
    fn fallback_id(&self) -> String {
        let mut n = self.sources.len() + 1;
        loop {
            let id = format!("doc-{n}");
            if !self.index.contains_key(&id) {
                return id;
            }
            n += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Look up by canonical id or recorded alias.
    pub fn get(&self, id: &str) -> Option<&Source> {
        self.index.get(id).map(|&slot| &self.sources[slot])
    }

    /// Exact file name first, then a case-insensitive basename match so that
    /// `a.pdf` finds a source named `docs/A.pdf` or by URL.
    pub fn find_by_file_name(&self, name: &str) -> Option<&Source> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        if let Some(source) = self.sources.iter().find(|s| s.display_name() == name) {
            return Some(source);
        }
        let wanted = basename(name).to_lowercase();
        self.sources
            .iter()
            .find(|s| basename(s.display_name()).to_lowercase() == wanted)
    }

    /// Zero-based position in insertion order.
    pub fn find_by_position(&self, position: usize) -> Option<&Source> {
        self.sources.get(position)
    }

    // -----------------------------------------------------------------------
    // Enrichment
    // -----------------------------------------------------------------------

    /// Merge a detail payload into an existing source. Idempotent; never
    /// creates a source and never changes an id.
    pub fn enrich(&mut self, id: &str, partial: &Value) -> EnrichOutcome {
        let Some(&slot) = self.index.get(id) else {
            warn!(%id, "enrichment for unknown source ignored");
            return EnrichOutcome::UnknownSource;
        };
        let fields = SourceFields::from_value(partial);
        if merge(&mut self.sources[slot], &fields) {
            debug!(%id, "source enriched");
            EnrichOutcome::Updated
        } else {
            EnrichOutcome::Unchanged
        }
    }
}

// ---------------------------------------------------------------------------
// Merge rules
// ---------------------------------------------------------------------------

/// Fill absent fields of `source` from `fields`. Returns whether anything
/// changed. Populated fields are never overwritten.
fn merge(source: &mut Source, fields: &SourceFields) -> bool {
    let mut changed = false;

    if source.file_name.is_empty() {
        if let Some(name) = &fields.file_name {
            source.file_name = name.clone();
            changed = true;
        }
    }
    if source.score.is_none() && fields.score.is_some() {
        source.score = fields.score;
        changed = true;
    }
    if source.url.is_none() && fields.url.is_some() {
        source.url = fields.url.clone();
        changed = true;
    }
    if source.xray.is_none() {
        if let Some(raw) = &fields.xray {
            source.xray = Some(normalize_xray(raw));
            changed = true;
        }
    }
    changed |= fill_list(&mut source.excerpts, &fields.excerpts);
    changed |= fill_list(&mut source.highlights, &fields.highlights);
    changed |= fill_list(&mut source.page_images, &fields.page_images);

    for (key, value) in &fields.metadata {
        if !source.metadata.contains_key(key) {
            source.metadata.insert(key.clone(), value.clone());
            changed = true;
        }
    }

    changed
}

/// Populate an empty list, deduplicated with first-seen order kept.
fn fill_list(target: &mut Vec<String>, incoming: &[String]) -> bool {
    if !target.is_empty() || incoming.is_empty() {
        return false;
    }
    let mut seen = HashSet::new();
    target.extend(incoming.iter().filter(|s| seen.insert(s.as_str())).cloned());
    true
}

/// Decode an x-ray value. Literal JSON is kept; a JSON-encoded string is
/// parsed; a doubly-encoded string gets one extra unwrap. Anything that does
/// not parse stays verbatim.
pub fn normalize_xray(raw: &Value) -> Value {
    let Value::String(text) = raw else {
        return raw.clone();
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::String(inner)) => {
            serde_json::from_str::<Value>(&inner).unwrap_or(Value::String(inner))
        }
        Ok(parsed) => parsed,
        Err(_) => raw.clone(),
    }
}

/// Last path component without query or fragment.
fn basename(name: &str) -> &str {
    let name = name.split(['?', '#']).next().unwrap_or(name);
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}
