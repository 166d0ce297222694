//! Per-turn answer accumulator.
//!
//! Drives the whole pipeline for one chat turn: raw chunks go through the
//! tokenizer and classifier, each record is applied through the extractors
//! into the registry, the citation resolver and the answer fields, and a
//! snapshot is published to subscribers whenever it changed.
//!
//! State machine: `Empty -> Streaming -> Finalized`, with `Aborted` as the
//! caller's way out of a stream that died. Terminal states ignore records.

use std::collections::{HashSet, VecDeque};

use serde_json::{Value, json};
use tracing::{debug, instrument, trace, warn};

use answerflow_extract::{
    SourceFields, extract_citations, extract_content, extract_followups, extract_inline,
    extract_sources, extract_supporting, extract_thoughts, from_citation_record,
    from_thought_record, has_dumpable_fields, structural_dump,
};
use answerflow_shared::{Answer, AnswerState, PipelineConfig, SupportingContentItem};
use answerflow_stream::{ChunkTokenizer, Record, Token, TokenBatch, classify, delta_text};

use crate::registry::{EnrichOutcome, SourceRegistry};
use crate::resolver::CitationResolver;

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// Receives a fresh snapshot each time the answer changes.
pub trait AnswerSubscriber: Send {
    fn on_update(&mut self, answer: &Answer);
}

impl<F> AnswerSubscriber for F
where
    F: FnMut(&Answer) + Send,
{
    fn on_update(&mut self, answer: &Answer) {
        self(answer)
    }
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Single-writer aggregate for one turn's answer.
pub struct AnswerAccumulator {
    config: PipelineConfig,
    state: AnswerState,

    content: String,
    thought_process: String,
    supporting_content: Vec<SupportingContentItem>,
    supporting_keys: HashSet<(String, String)>,
    followup_questions: Vec<String>,
    /// Non-JSON lines; fallback content when no record supplied any.
    prose: String,

    tokenizer: ChunkTokenizer,
    registry: SourceRegistry,
    resolver: CitationResolver,

    /// Unclassifiable records, newest last.
    unknown: VecDeque<Value>,
    subscribers: Vec<Box<dyn AnswerSubscriber>>,
    last_published: Option<Answer>,
}

impl Default for AnswerAccumulator {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl std::fmt::Debug for AnswerAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerAccumulator")
            .field("state", &self.state)
            .field("content_len", &self.content.len())
            .field("sources", &self.registry.len())
            .field("citations", &self.resolver.citations().len())
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl AnswerAccumulator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            state: AnswerState::Empty,
            content: String::new(),
            thought_process: String::new(),
            supporting_content: Vec::new(),
            supporting_keys: HashSet::new(),
            followup_questions: Vec::new(),
            prose: String::new(),
            tokenizer: ChunkTokenizer::new(),
            registry: SourceRegistry::new(),
            resolver: CitationResolver::new(),
            unknown: VecDeque::new(),
            subscribers: Vec::new(),
            last_published: None,
        }
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub fn state(&self) -> AnswerState {
        self.state
    }

    /// Snapshot of the answer as it stands. While streaming with no record
    /// content yet, prose lines stand in for it.
    pub fn current_answer(&self) -> Answer {
        let content = if self.state == AnswerState::Streaming && self.content.trim().is_empty() {
            self.prose.trim_end().to_string()
        } else {
            self.content.clone()
        };
        Answer {
            content,
            thought_process: self.thought_process.clone(),
            supporting_content: self.supporting_content.clone(),
            citations: self.resolver.citations().to_vec(),
            sources: self.registry.snapshot(),
            followup_questions: self.followup_questions.clone(),
            is_streaming: self.state == AnswerState::Streaming,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Records no classifier rule matched, oldest first.
    pub fn unknown_records(&self) -> impl Iterator<Item = &Value> {
        self.unknown.iter()
    }

    pub fn subscribe(&mut self, subscriber: impl AnswerSubscriber + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Feed one raw chunk of the response stream.
    #[instrument(skip_all, fields(len = chunk.len(), state = self.state.as_str()))]
    pub fn push_chunk(&mut self, chunk: &str) {
        if self.reject_when_terminal("chunk") {
            return;
        }
        self.start_streaming();
        let batch = self.tokenizer.push(chunk);
        self.apply_tokens(batch);
        self.settle();
    }

    /// Apply an already-classified record.
    #[instrument(skip_all, fields(kind = record.kind().as_str()))]
    pub fn apply(&mut self, record: Record) {
        if self.reject_when_terminal(record.kind().as_str()) {
            return;
        }
        self.start_streaming();
        self.apply_record(record);
        self.settle();
    }

    /// Apply a complete, non-streamed response. The payload is treated as a
    /// terminal record whatever its `type` says.
    #[instrument(skip_all, fields(state = self.state.as_str()))]
    pub fn apply_final(&mut self, payload: &Value) {
        if self.reject_when_terminal("final payload") {
            return;
        }
        self.start_streaming();
        self.complete(payload);
        self.publish();
    }

    /// End the turn normally. Held stream text is flushed first, so a record
    /// still waiting for its newline is not lost.
    #[instrument(skip_all, fields(state = self.state.as_str()))]
    pub fn finalize(&mut self) {
        if self.state.is_terminal() {
            debug!(state = self.state.as_str(), "finalize on terminal answer ignored");
            return;
        }
        let tail = self.tokenizer.finish();
        self.apply_tokens(tail);
        if !self.state.is_terminal() {
            self.freeze(None);
        }
        self.publish();
    }

    /// Give up on the stream. Content stays as last applied.
    #[instrument(skip_all, fields(state = self.state.as_str()))]
    pub fn abort(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        debug!(held = self.tokenizer.held_len(), "answer aborted");
        self.state = AnswerState::Aborted;
        self.publish();
    }

    /// Merge a detail fetch into a registered source. Allowed in every state;
    /// never changes the state.
    #[instrument(skip_all, fields(%id))]
    pub fn enrich_source(&mut self, id: &str, payload: &Value) -> EnrichOutcome {
        let outcome = self.registry.enrich(id, payload);
        if outcome == EnrichOutcome::Updated {
            if self.state == AnswerState::Streaming {
                self.resolver.refresh(&self.registry);
            }
            self.publish();
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Record application
    // -----------------------------------------------------------------------

    fn reject_when_terminal(&self, what: &str) -> bool {
        if self.state.is_terminal() {
            warn!(state = self.state.as_str(), what, "input after end of answer ignored");
            return true;
        }
        false
    }

    fn start_streaming(&mut self) {
        if self.state == AnswerState::Empty {
            debug!("answer streaming");
            self.state = AnswerState::Streaming;
        }
    }

    /// Apply each token and publish after it, so subscribers see every
    /// record even when one chunk carries several.
    fn apply_tokens(&mut self, batch: TokenBatch) {
        for token in batch.tokens {
            if self.state.is_terminal() {
                debug!("discarding stream text after terminal record");
                break;
            }
            match token {
                Token::Prose(line) => {
                    self.prose.push_str(&line);
                    self.prose.push('\n');
                }
                Token::Record(value) => self.apply_record(classify(value)),
            }
            self.settle();
        }
    }

    fn apply_record(&mut self, record: Record) {
        trace!(kind = record.kind().as_str(), "applying record");
        match record {
            Record::PlainDelta { text } => self.content.push_str(&text),
            Record::Citation { payload } => {
                self.absorb_supporting(&payload);
                self.absorb_citations(from_citation_record(&payload));
            }
            Record::SupportingContent { payload } => {
                self.absorb_sources(&payload);
                self.absorb_supporting(&payload);
            }
            Record::ThoughtProcess { payload } => {
                if let Some(thoughts) = from_thought_record(&payload) {
                    self.merge_thoughts(&thoughts);
                }
            }
            Record::ContextUpdate { payload } => {
                self.absorb(&payload);
                if let Some(delta) = delta_text(&payload) {
                    self.content.push_str(delta);
                }
            }
            Record::Done { payload } => self.complete(&payload),
            Record::Unknown { payload } => self.keep_unknown(payload),
        }
    }

    /// Everything but content, in registry declaration order.
    fn absorb(&mut self, payload: &Value) {
        self.absorb_sources(payload);
        self.absorb_supporting(payload);
        self.absorb_citations(extract_citations(payload));
        if let Some(thoughts) = extract_thoughts(payload) {
            self.merge_thoughts(&thoughts);
        }
        self.merge_followups(extract_followups(payload));
    }

    fn absorb_sources(&mut self, payload: &Value) {
        for raw in extract_sources(payload) {
            self.registry.upsert(&raw);
        }
    }

    /// Supporting items; named ones also declare their source.
    fn absorb_supporting(&mut self, payload: &Value) {
        for item in extract_supporting(payload) {
            if let Some(name) = &item.source {
                let raw = json!({ "fileName": name, "excerpts": [item.content] });
                self.registry.upsert(&raw);
            }
            if self.supporting_keys.insert(item.dedup_key()) {
                self.supporting_content.push(item);
            }
        }
    }

    fn absorb_citations(&mut self, raws: Vec<Value>) {
        for raw in &raws {
            let page = SourceFields::from_value(raw).page;
            let id = self.registry.upsert(raw);
            self.resolver.cite_source(&id, &self.registry, page);
        }
    }

    /// Thought steps are merged line-wise. Text that extends everything so
    /// far, or just the last step, replaces it; a step already present as a
    /// whole line, or an earlier snapshot of the last step, is skipped;
    /// anything else is a new line.
    fn merge_thoughts(&mut self, incoming: &str) {
        let incoming = incoming.trim();
        if incoming.is_empty() {
            return;
        }
        if self.thought_process.is_empty() || incoming.starts_with(self.thought_process.as_str()) {
            self.thought_process = incoming.to_string();
            return;
        }

        let known = incoming.lines().all(|step| {
            self.thought_process
                .lines()
                .any(|line| line.trim() == step.trim())
        });
        let last = self.thought_process.lines().last().unwrap_or_default();
        if known || last.starts_with(incoming) {
            return;
        }

        if !last.is_empty() && !incoming.contains('\n') && incoming.starts_with(last) {
            let keep = self.thought_process.len() - last.len();
            self.thought_process.truncate(keep);
        } else {
            self.thought_process.push('\n');
        }
        self.thought_process.push_str(incoming);
    }

    fn merge_followups(&mut self, questions: Vec<String>) {
        for question in questions {
            if !self.followup_questions.contains(&question) {
                self.followup_questions.push(question);
            }
        }
    }

    fn keep_unknown(&mut self, payload: Value) {
        debug!("unclassified record retained");
        if self.config.max_unknown_records == 0 {
            return;
        }
        if self.unknown.len() == self.config.max_unknown_records {
            self.unknown.pop_front();
        }
        self.unknown.push_back(payload);
    }

    // -----------------------------------------------------------------------
    // Termination
    // -----------------------------------------------------------------------

    /// Terminal record: merge its fields, let its content replace the
    /// streamed text, then freeze.
    fn complete(&mut self, payload: &Value) {
        self.absorb(payload);
        if let Some(content) = extract_content(payload) {
            trace!(len = content.len(), "terminal content replaces streamed text");
            self.content = content;
        }
        self.freeze(Some(payload));
    }

    fn freeze(&mut self, terminal: Option<&Value>) {
        if self.content.trim().is_empty() && !self.prose.trim().is_empty() {
            self.content = self.prose.trim_end().to_string();
        }

        if self.config.extract_inline_followups {
            let (content, questions) = extract_inline(&self.content);
            self.content = content;
            self.merge_followups(questions);
        }

        self.resolver.refresh(&self.registry);
        self.content =
            self.resolver
                .resolve(&self.content, &self.registry, self.config.reference_style);

        if self.content.trim().is_empty() {
            self.content = match terminal {
                Some(payload) if self.config.structural_dump && has_dumpable_fields(payload) => {
                    debug!("no content alias matched, using structural dump");
                    structural_dump(payload)
                }
                _ => {
                    warn!("no content could be extracted, using placeholder");
                    self.config.placeholder.clone()
                }
            };
        }

        self.state = AnswerState::Finalized;
        debug!(
            citations = self.resolver.citations().len(),
            sources = self.registry.len(),
            "answer finalized"
        );
    }

    // -----------------------------------------------------------------------
    // Publication
    // -----------------------------------------------------------------------

    /// Post-record bookkeeping while streaming.
    fn settle(&mut self) {
        if self.state == AnswerState::Streaming {
            self.resolver.refresh(&self.registry);
        }
        self.publish();
    }

    fn publish(&mut self) {
        let snapshot = self.current_answer();
        if self.last_published.as_ref() == Some(&snapshot) {
            return;
        }
        for subscriber in &mut self.subscribers {
            subscriber.on_update(&snapshot);
        }
        self.last_published = Some(snapshot);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use answerflow_shared::ReferenceStyle;

    fn feed(acc: &mut AnswerAccumulator, lines: &[&str]) {
        for line in lines {
            acc.push_chunk(line);
            acc.push_chunk("\n");
        }
    }

    fn recorder(acc: &mut AnswerAccumulator) -> Arc<Mutex<Vec<Answer>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        acc.subscribe(move |answer: &Answer| sink.lock().expect("lock").push(answer.clone()));
        seen
    }

    // -- Scenarios ----------------------------------------------------------

    #[test]
    fn citation_record_then_done() {
        let mut acc = AnswerAccumulator::default();
        feed(
            &mut acc,
            &[
                r#"{"type":"citation","citation":{"fileName":"a.pdf","text":"x"}}"#,
                r#"{"type":"done","answer":{"content":"See [a.pdf]."}}"#,
            ],
        );

        assert_eq!(acc.state(), AnswerState::Finalized);
        let answer = acc.current_answer();
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].file_name, "a.pdf");
        assert_eq!(answer.citations[0].index, 1);
        assert_eq!(answer.content, "See [^1].");
        assert!(!answer.is_streaming);
    }

    #[test]
    fn context_thoughts_are_joined() {
        let mut acc = AnswerAccumulator::default();
        feed(&mut acc, &[r#"{"context":{"thoughts":["step1","step2"]}}"#]);
        assert_eq!(acc.current_answer().thought_process, "step1\nstep2");
    }

    #[test]
    fn document_marker_resolves_to_second_source() {
        let mut acc = AnswerAccumulator::default();
        feed(
            &mut acc,
            &[r#"{"sources":[{"id":"s1","fileName":"one.pdf"},{"id":"s2","fileName":"two.pdf"}]}"#],
        );
        acc.apply_final(&json!({"content": "The handbook [Document 2] states the rule."}));

        let answer = acc.current_answer();
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].resolved_source_id.as_deref(), Some("s2"));
        assert_eq!(answer.citations[0].index, 1);
        assert_eq!(answer.content, "The handbook [^1] states the rule.");
    }

    #[test]
    fn source_merge_is_non_regressive() {
        let mut acc = AnswerAccumulator::default();
        feed(
            &mut acc,
            &[
                r#"{"sources":[{"id":"d","excerpts":["A"]}]}"#,
                r#"{"sources":[{"id":"d","excerpts":["B"],"score":0.9}]}"#,
            ],
        );
        let sources = acc.current_answer().sources;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].excerpts, vec!["A"]);
        assert_eq!(sources[0].score, Some(0.9));
    }

    #[test]
    fn truncated_record_completed_later() {
        let mut acc = AnswerAccumulator::default();
        acc.push_chunk(r#"{"type":"citation""#);
        assert!(acc.current_answer().citations.is_empty());
        assert!(acc.unknown_records().next().is_none());

        acc.push_chunk(",\"citation\":{\"fileName\":\"a.pdf\"}}\n");
        let answer = acc.current_answer();
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].file_name, "a.pdf");
        assert!(acc.unknown_records().next().is_none());
        assert_eq!(acc.prose, "");
    }

    // -- Properties ---------------------------------------------------------

    #[test]
    fn repeated_records_are_idempotent() {
        let mut acc = AnswerAccumulator::default();
        let supporting = r#"{"type":"supporting_content","supporting_content":[{"title":"a.pdf","content":"body"}]}"#;
        let citation = r#"{"type":"citation","citation":{"fileName":"a.pdf"}}"#;
        feed(&mut acc, &[supporting, citation, supporting, citation]);

        let answer = acc.current_answer();
        assert_eq!(answer.supporting_content.len(), 1);
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.sources.len(), 1);
    }

    #[test]
    fn content_is_append_only_while_streaming() {
        let mut acc = AnswerAccumulator::default();
        let seen = recorder(&mut acc);
        feed(
            &mut acc,
            &[r#"{"delta":"Hel"}"#, r#"{"delta":"lo"}"#, r#"{"content":" world"}"#],
        );

        let snapshots = seen.lock().expect("lock");
        for pair in snapshots.windows(2) {
            assert!(pair[1].content.starts_with(&pair[0].content));
        }
        assert_eq!(acc.current_answer().content, "Hello world");
        assert!(acc.current_answer().is_streaming);
    }

    #[test]
    fn done_content_replaces_stream_once() {
        let mut acc = AnswerAccumulator::default();
        feed(
            &mut acc,
            &[
                r#"{"delta":"draft"}"#,
                r#"{"type":"done","content":"final"}"#,
                r#"{"delta":" late"}"#,
            ],
        );
        assert_eq!(acc.current_answer().content, "final");
    }

    #[test]
    fn citation_index_is_stable_across_registry_growth() {
        let mut acc = AnswerAccumulator::default();
        feed(
            &mut acc,
            &[
                r#"{"type":"citation","citation":{"id":"d2","fileName":"b.pdf"}}"#,
                r#"{"sources":[{"id":"d1","fileName":"a.pdf"}]}"#,
                r#"{"type":"citation","citation":{"id":"d1"}}"#,
                r#"{"type":"citation","citation":{"id":"d2"}}"#,
            ],
        );
        let citations = acc.current_answer().citations;
        let pairs: Vec<_> = citations
            .iter()
            .map(|c| (c.resolved_source_id.clone().unwrap_or_default(), c.index))
            .collect();
        assert_eq!(pairs, vec![("d2".to_string(), 1), ("d1".to_string(), 2)]);
    }

    #[test]
    fn malformed_lines_are_kept_as_fallback_content() {
        let mut acc = AnswerAccumulator::default();
        feed(&mut acc, &["The answer is 42.", "{not json"]);
        acc.finalize();
        assert_eq!(acc.current_answer().content, "The answer is 42.\n{not json");
    }

    // -- Lifecycle ----------------------------------------------------------

    #[test]
    fn states_and_streaming_flag() {
        let mut acc = AnswerAccumulator::default();
        assert_eq!(acc.state(), AnswerState::Empty);
        assert!(!acc.current_answer().is_streaming);

        acc.push_chunk("{\"delta\":\"x\"}");
        assert_eq!(acc.state(), AnswerState::Streaming);
        assert!(acc.current_answer().is_streaming);

        acc.finalize();
        assert_eq!(acc.state(), AnswerState::Finalized);
        assert!(!acc.current_answer().is_streaming);
        assert_eq!(acc.current_answer().content, "x");
    }

    #[test]
    fn records_after_finalize_are_ignored() {
        let mut acc = AnswerAccumulator::default();
        feed(&mut acc, &[r#"{"delta":"one"}"#]);
        acc.finalize();
        let frozen = acc.current_answer();

        feed(&mut acc, &[r#"{"delta":" two"}"#]);
        acc.apply(Record::PlainDelta { text: "three".into() });
        acc.apply_final(&json!({"content": "replaced"}));
        assert_eq!(acc.current_answer(), frozen);
    }

    #[test]
    fn abort_keeps_content() {
        let mut acc = AnswerAccumulator::default();
        feed(&mut acc, &[r#"{"delta":"partial"}"#]);
        acc.abort();
        let answer = acc.current_answer();
        assert_eq!(acc.state(), AnswerState::Aborted);
        assert_eq!(answer.content, "partial");
        assert!(!answer.is_streaming);
        acc.finalize();
        assert_eq!(acc.state(), AnswerState::Aborted);
    }

    #[test]
    fn empty_done_uses_placeholder() {
        let mut acc = AnswerAccumulator::default();
        feed(&mut acc, &[r#"{"type":"done"}"#]);
        assert_eq!(
            acc.current_answer().content,
            PipelineConfig::default().placeholder
        );
    }

    #[test]
    fn unknown_final_shape_is_dumped() {
        let mut acc = AnswerAccumulator::default();
        acc.apply_final(&json!({"result": {"weird": true}}));
        let content = acc.current_answer().content;
        assert!(content.contains("\"weird\": true"));
    }

    #[test]
    fn dump_can_be_disabled() {
        let config = PipelineConfig {
            structural_dump: false,
            ..PipelineConfig::default()
        };
        let mut acc = AnswerAccumulator::new(config.clone());
        acc.apply_final(&json!({"result": {"weird": true}}));
        assert_eq!(acc.current_answer().content, config.placeholder);
    }

    #[test]
    fn inline_followups_move_out_of_content() {
        let mut acc = AnswerAccumulator::default();
        acc.apply_final(&json!({
            "answer": "Twenty days [a.pdf]. <<How do I apply?>>",
            "followup_questions": ["Is it paid?"]
        }));
        let answer = acc.current_answer();
        assert_eq!(answer.content, "Twenty days [^1].");
        assert_eq!(answer.followup_questions, vec!["Is it paid?", "How do I apply?"]);
        assert!(!answer.citations[0].is_resolved());
    }

    #[test]
    fn bracket_reference_style() {
        let config = PipelineConfig {
            reference_style: ReferenceStyle::Bracket,
            ..PipelineConfig::default()
        };
        let mut acc = AnswerAccumulator::new(config);
        acc.apply_final(&json!({"content": "See [a.pdf]."}));
        assert_eq!(acc.current_answer().content, "See [1].");
    }

    #[test]
    fn subscribers_only_see_changes() {
        let mut acc = AnswerAccumulator::default();
        let seen = recorder(&mut acc);
        feed(&mut acc, &[r#"{"delta":"a"}"#]);
        let after_first = seen.lock().expect("lock").len();
        // Unknown records change nothing visible.
        feed(&mut acc, &[r#"{"type":"ping"}"#, r#"{"type":"ping"}"#]);
        assert_eq!(seen.lock().expect("lock").len(), after_first);
        assert_eq!(acc.unknown_records().count(), 2);
    }

    #[test]
    fn unknown_records_are_bounded() {
        let config = PipelineConfig {
            max_unknown_records: 2,
            ..PipelineConfig::default()
        };
        let mut acc = AnswerAccumulator::new(config);
        feed(
            &mut acc,
            &[r#"{"type":"a"}"#, r#"{"type":"b"}"#, r#"{"type":"c"}"#],
        );
        let kept: Vec<_> = acc
            .unknown_records()
            .filter_map(|v| v.get("type").and_then(Value::as_str))
            .collect();
        assert_eq!(kept, vec!["b", "c"]);
    }

    #[test]
    fn enrich_after_finalize_keeps_state() {
        let mut acc = AnswerAccumulator::default();
        feed(&mut acc, &[r#"{"sources":[{"id":"d","fileName":"a.pdf"}]}"#]);
        acc.finalize();
        let seen = recorder(&mut acc);

        let outcome = acc.enrich_source("d", &json!({"excerpts": ["full text"]}));
        assert_eq!(outcome, EnrichOutcome::Updated);
        assert_eq!(acc.state(), AnswerState::Finalized);
        assert_eq!(acc.current_answer().sources[0].excerpts, vec!["full text"]);
        assert_eq!(seen.lock().expect("lock").len(), 1);

        assert_eq!(
            acc.enrich_source("d", &json!({"excerpts": ["other"]})),
            EnrichOutcome::Unchanged
        );
        assert_eq!(
            acc.enrich_source("zzz", &json!({})),
            EnrichOutcome::UnknownSource
        );
        assert_eq!(seen.lock().expect("lock").len(), 1);
    }

    #[test]
    fn late_source_details_reach_existing_citation() {
        let mut acc = AnswerAccumulator::default();
        feed(&mut acc, &[r#"{"type":"citation","citation":"late.pdf"}"#]);
        // A bare name registers a provisional source right away.
        assert!(acc.current_answer().citations[0].is_resolved());

        feed(
            &mut acc,
            &[r#"{"sources":[{"id":"L","fileName":"late.pdf","url":"https://x/late.pdf"}]}"#],
        );
        let answer = acc.current_answer();
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.sources[0].url.as_deref(), Some("https://x/late.pdf"));
        assert_eq!(answer.citations[0].url.as_deref(), Some("https://x/late.pdf"));
    }

    #[test]
    fn thoughts_merge_without_duplication() {
        let mut acc = AnswerAccumulator::default();
        feed(
            &mut acc,
            &[
                r#"{"type":"thought_process","content":"Searching"}"#,
                r#"{"type":"thought_process","content":"Searching the index"}"#,
                r#"{"type":"thought_process","content":"Searching"}"#,
                r#"{"type":"thought_process","content":"Ranking"}"#,
            ],
        );
        assert_eq!(acc.current_answer().thought_process, "Searching the index\nRanking");
    }

    #[test]
    fn short_step_inside_earlier_text_is_kept() {
        let mut acc = AnswerAccumulator::default();
        feed(
            &mut acc,
            &[
                r#"{"type":"thought_process","content":"Search the index for the PTO policy"}"#,
                r#"{"type":"thought_process","content":"PTO"}"#,
                r#"{"type":"thought_process","content":"PTO"}"#,
            ],
        );
        assert_eq!(
            acc.current_answer().thought_process,
            "Search the index for the PTO policy\nPTO"
        );
    }

    #[test]
    fn growing_last_step_replaces_it() {
        let mut acc = AnswerAccumulator::default();
        feed(
            &mut acc,
            &[
                r#"{"type":"thought_process","content":"Plan"}"#,
                r#"{"type":"thought_process","content":"Rank"}"#,
                r#"{"type":"thought_process","content":"Ranking results"}"#,
            ],
        );
        assert_eq!(acc.current_answer().thought_process, "Plan\nRanking results");
    }

    #[test]
    fn every_record_in_one_chunk_is_published() {
        let mut acc = AnswerAccumulator::default();
        let seen = recorder(&mut acc);
        acc.push_chunk("{\"delta\":\"a\"}\n{\"delta\":\"b\"}\n{\"delta\":\"c\"}\n");

        let contents: Vec<String> = seen
            .lock()
            .expect("lock")
            .iter()
            .map(|answer| answer.content.clone())
            .collect();
        assert_eq!(contents, vec!["a", "ab", "abc"]);
    }

    #[test]
    fn prose_is_visible_while_streaming() {
        let mut acc = AnswerAccumulator::default();
        feed(&mut acc, &["Plain text answer,", "second line."]);
        let answer = acc.current_answer();
        assert!(answer.is_streaming);
        assert_eq!(answer.content, "Plain text answer,\nsecond line.");

        acc.finalize();
        assert_eq!(acc.current_answer().content, "Plain text answer,\nsecond line.");
    }

    #[test]
    fn record_content_takes_over_from_prose() {
        let mut acc = AnswerAccumulator::default();
        feed(&mut acc, &["warming up", r#"{"delta":"Real answer"}"#]);
        assert_eq!(acc.current_answer().content, "Real answer");
        acc.finalize();
        assert_eq!(acc.current_answer().content, "Real answer");
    }

    #[test]
    fn anonymous_sources_from_different_records_stay_apart() {
        let mut acc = AnswerAccumulator::default();
        feed(
            &mut acc,
            &[
                r#"{"sources":[{"excerpts":["A"]}]}"#,
                r#"{"type":"citation","citation":{"text":"B quote","score":0.3}}"#,
            ],
        );
        let sources = acc.current_answer().sources;
        let summary: Vec<_> = sources
            .iter()
            .map(|s| (s.id.as_str(), s.excerpts.clone(), s.score))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("doc-1", vec!["A".to_string()], None),
                ("doc-2", vec!["B quote".to_string()], Some(0.3)),
            ]
        );
    }

    #[test]
    fn chat_completion_shape() {
        let mut acc = AnswerAccumulator::default();
        feed(
            &mut acc,
            &[
                r#"{"choices":[{"delta":{"role":"assistant"},"context":{"data_points":{"text":["info.txt: Twenty days"]},"thoughts":"Looked up PTO"}}]}"#,
                r#"{"choices":[{"delta":{"content":"You get twenty days "}}]}"#,
                r#"{"choices":[{"delta":{"content":"[info.txt]."}}]}"#,
            ],
        );
        acc.finalize();

        let answer = acc.current_answer();
        assert_eq!(answer.thought_process, "Looked up PTO");
        assert_eq!(answer.supporting_content.len(), 1);
        assert_eq!(answer.sources[0].file_name, "info.txt");
        assert_eq!(answer.sources[0].excerpts, vec!["Twenty days"]);
        assert_eq!(answer.content, "You get twenty days [^1].");
        assert!(answer.citations[0].is_resolved());
    }

    #[test]
    fn sse_stream_with_done_sentinel() {
        let mut acc = AnswerAccumulator::default();
        acc.push_chunk("event: message\ndata: {\"delta\":\"Hi\"}\n\n");
        acc.push_chunk("data: [DONE]\n");
        assert_eq!(acc.state(), AnswerState::Finalized);
        assert_eq!(acc.current_answer().content, "Hi");
    }
}
