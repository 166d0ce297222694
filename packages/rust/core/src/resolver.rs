//! Citation marker resolution.
//!
//! Answer text references documents in three ways:
//!
//! | Grammar | Example | Lookup |
//! |---|---|---|
//! | file | `[a.pdf]`, `[a.pdf#page=3]` | registry file name |
//! | cite tag | `<cite index="1-2">text</cite>` | zero-based position |
//! | numbered | `[Document 2]`, `[Doc 2]` | one-based position |
//!
//! One scanner recognizes all three, and every marker goes through the same
//! dedup table, so a document gets one citation index however it is cited.
//! Markers that match nothing become synthetic citations; they are upgraded
//! in place once the registry learns about their document.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, trace};

use answerflow_shared::{Citation, ReferenceStyle, Source};

use crate::registry::SourceRegistry;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        \[(?P<file>[^\[\]\n^]+?\.[A-Za-z][A-Za-z0-9]{0,4})(?:\#page=(?P<page>\d+))?\](?P<link>\()?
        |
        <cite\b[^>]*?\bindex=["'](?P<cite>\d+)(?:-\d+)?["'][^>]*>(?:(?P<inner>(?s:.*?))</cite>)?
        |
        \[(?i:document|doc)\s*(?P<doc>\d+)\]
        "#,
    )
    .expect("valid regex")
});

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

/// How a marker finds its document.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    FileName(String),
    /// Zero-based registry position.
    Position(usize),
    /// A position that can never exist (`[Document 0]`).
    Nowhere,
}

impl Lookup {
    fn find<'r>(&self, registry: &'r SourceRegistry) -> Option<&'r Source> {
        match self {
            Self::FileName(name) => registry.find_by_file_name(name),
            Self::Position(position) => registry.find_by_position(*position),
            Self::Nowhere => None,
        }
    }
}

/// One recognized marker.
#[derive(Debug)]
struct Marker<'t> {
    lookup: Lookup,
    /// Marker text without delimiters; the synthetic id when unresolved.
    raw: String,
    page: Option<u32>,
    /// Text wrapped by a cite tag, kept in the output.
    inner: Option<&'t str>,
}

impl<'t> Marker<'t> {
    /// `None` for matches that only look like markers (markdown links).
    fn from_captures(caps: &Captures<'t>) -> Option<Self> {
        if let Some(file) = caps.name("file") {
            if caps.name("link").is_some() {
                return None;
            }
            let name = file.as_str().trim();
            return Some(Self {
                lookup: Lookup::FileName(name.to_string()),
                raw: name.to_string(),
                page: caps.name("page").and_then(|p| p.as_str().parse().ok()),
                inner: None,
            });
        }
        if let Some(cite) = caps.name("cite") {
            let position: usize = cite.as_str().parse().ok()?;
            return Some(Self {
                lookup: Lookup::Position(position),
                raw: format!("Document {}", position + 1),
                page: None,
                inner: caps.name("inner").map(|m| m.as_str()),
            });
        }
        let number: usize = caps.name("doc")?.as_str().parse().ok()?;
        Some(Self {
            lookup: match number.checked_sub(1) {
                Some(position) => Lookup::Position(position),
                None => Lookup::Nowhere,
            },
            raw: format!("Document {number}"),
            page: None,
            inner: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Turn-scoped citation list with stable, contiguous 1-based indices.
#[derive(Debug, Clone, Default)]
pub struct CitationResolver {
    citations: Vec<Citation>,
    /// Dedup keys (resolved source id, or raw marker text) to list slots.
    by_key: HashMap<String, usize>,
    /// Unresolved slots and how to retry them.
    pending: Vec<(usize, Lookup)>,
}

impl CitationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Citations in index order.
    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    /// Rewrite every marker in `text` as an inline reference, creating or
    /// reusing citations left to right.
    pub fn resolve(
        &mut self,
        text: &str,
        registry: &SourceRegistry,
        style: ReferenceStyle,
    ) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in MARKER_RE.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(marker) = Marker::from_captures(&caps) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);

            let index = self.cite_marker(&marker, registry);
            if let Some(inner) = marker.inner {
                out.push_str(inner);
            }
            out.push_str(&style.render(index));
            last = whole.end();
        }

        out.push_str(&text[last..]);
        out
    }

    /// Record an explicit citation of a registered source, returning its
    /// index. `None` when the id is unknown.
    pub fn cite_source(
        &mut self,
        id: &str,
        registry: &SourceRegistry,
        page: Option<u32>,
    ) -> Option<usize> {
        let source = registry.get(id)?;
        Some(self.bind(source, &source.file_name, page))
    }

    /// Retry unresolved citations against the current registry. Returns
    /// whether any citation changed.
    pub fn refresh(&mut self, registry: &SourceRegistry) -> bool {
        let mut changed = false;
        let pending = std::mem::take(&mut self.pending);

        for (slot, lookup) in pending {
            let Some(source) = lookup.find(registry) else {
                self.pending.push((slot, lookup));
                continue;
            };
            match self.by_key.get(&source.id) {
                Some(&existing) if existing != slot => {
                    // Already cited under another index; later markers go there.
                    let raw = self.citations[slot].id.clone();
                    self.by_key.insert(raw, existing);
                }
                _ => {
                    self.upgrade(slot, source);
                    changed = true;
                }
            }
        }

        // Resolved citations pick up details their source gained since.
        for citation in &mut self.citations {
            let Some(source) = citation
                .resolved_source_id
                .as_deref()
                .and_then(|id| registry.get(id))
            else {
                continue;
            };
            if citation.url.is_none() && source.url.is_some() {
                citation.url = source.url.clone();
                changed = true;
            }
            if citation.file_name != source.display_name() && citation.file_name == citation.id {
                citation.file_name = source.display_name().to_string();
                changed = true;
            }
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn cite_marker(&mut self, marker: &Marker<'_>, registry: &SourceRegistry) -> usize {
        match marker.lookup.find(registry) {
            Some(source) => self.bind(source, &marker.raw, marker.page),
            None => self.synthetic(marker),
        }
    }

    /// Citation for a known source: existing by source id, an upgraded
    /// synthetic with the same raw text, or a new one.
    fn bind(&mut self, source: &Source, raw: &str, page: Option<u32>) -> usize {
        if let Some(&slot) = self.by_key.get(&source.id) {
            return self.citations[slot].index;
        }
        if let Some(&slot) = self.by_key.get(raw) {
            if self.citations[slot].resolved_source_id.is_none() {
                self.upgrade(slot, source);
                return self.citations[slot].index;
            }
        }

        let index = self.citations.len() + 1;
        self.citations.push(Citation {
            id: source.id.clone(),
            file_name: source.display_name().to_string(),
            index,
            page,
            url: source.url.clone(),
            resolved_source_id: Some(source.id.clone()),
        });
        self.by_key.insert(source.id.clone(), index - 1);
        if !raw.is_empty() {
            self.by_key.entry(raw.to_string()).or_insert(index - 1);
        }
        debug!(id = %source.id, index, "citation resolved");
        index
    }

    fn synthetic(&mut self, marker: &Marker<'_>) -> usize {
        if let Some(&slot) = self.by_key.get(&marker.raw) {
            return self.citations[slot].index;
        }
        let index = self.citations.len() + 1;
        self.citations.push(Citation {
            id: marker.raw.clone(),
            file_name: marker.raw.clone(),
            index,
            page: marker.page,
            url: None,
            resolved_source_id: None,
        });
        self.by_key.insert(marker.raw.clone(), index - 1);
        self.pending.push((index - 1, marker.lookup.clone()));
        trace!(raw = %marker.raw, index, "synthetic citation");
        index
    }

    fn upgrade(&mut self, slot: usize, source: &Source) {
        let citation = &mut self.citations[slot];
        debug!(raw = %citation.id, id = %source.id, index = citation.index, "citation upgraded");
        citation.id = source.id.clone();
        citation.file_name = source.display_name().to_string();
        citation.url = source.url.clone();
        citation.resolved_source_id = Some(source.id.clone());
        self.by_key.insert(source.id.clone(), slot);
        self.pending.retain(|(pending, _)| *pending != slot);
    }
}
