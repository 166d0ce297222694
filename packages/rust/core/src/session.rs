//! Chat sessions: ordered turns, one accumulator and registry each.

use std::collections::VecDeque;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, instrument};

use answerflow_shared::{
    AnswerFlowError, AnswerState, AppConfig, PipelineConfig, Result, TurnId, TurnMeta,
};

use crate::accumulator::{AnswerAccumulator, AnswerSubscriber};
use crate::registry::EnrichOutcome;

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// One question/answer exchange. Owns its own registry through its
/// accumulator; nothing is shared between turns.
#[derive(Debug)]
pub struct Turn {
    meta: TurnMeta,
    accumulator: AnswerAccumulator,
}

impl Turn {
    fn new(config: PipelineConfig) -> Self {
        Self {
            meta: TurnMeta {
                id: TurnId::new(),
                started_at: Utc::now(),
                finished_at: None,
            },
            accumulator: AnswerAccumulator::new(config),
        }
    }

    pub fn id(&self) -> TurnId {
        self.meta.id
    }

    pub fn meta(&self) -> &TurnMeta {
        &self.meta
    }

    pub fn accumulator(&self) -> &AnswerAccumulator {
        &self.accumulator
    }

    pub fn state(&self) -> AnswerState {
        self.accumulator.state()
    }

    pub fn push_chunk(&mut self, chunk: &str) {
        self.accumulator.push_chunk(chunk);
        self.stamp();
    }

    pub fn apply_final(&mut self, payload: &Value) {
        self.accumulator.apply_final(payload);
        self.stamp();
    }

    pub fn finalize(&mut self) {
        self.accumulator.finalize();
        self.stamp();
    }

    pub fn abort(&mut self) {
        self.accumulator.abort();
        self.stamp();
    }

    pub fn enrich_source(&mut self, id: &str, payload: &Value) -> EnrichOutcome {
        self.accumulator.enrich_source(id, payload)
    }

    pub fn subscribe(&mut self, subscriber: impl AnswerSubscriber + 'static) {
        self.accumulator.subscribe(subscriber);
    }

    /// Record when the answer reached a terminal state.
    fn stamp(&mut self) {
        if self.meta.finished_at.is_none() && self.accumulator.state().is_terminal() {
            self.meta.finished_at = Some(Utc::now());
        }
    }
}

// ---------------------------------------------------------------------------
// ChatSession
// ---------------------------------------------------------------------------

/// Ordered turns of one conversation, bounded by a retention limit.
#[derive(Debug)]
pub struct ChatSession {
    pipeline: PipelineConfig,
    max_retained_turns: usize,
    turns: VecDeque<Turn>,
}

impl ChatSession {
    /// `max_retained_turns` is clamped to at least one.
    pub fn new(pipeline: PipelineConfig, max_retained_turns: usize) -> Self {
        Self {
            pipeline,
            max_retained_turns: max_retained_turns.max(1),
            turns: VecDeque::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(PipelineConfig::from(config), config.session.max_retained_turns)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn latest(&self) -> Option<&Turn> {
        self.turns.back()
    }

    /// Start a new turn with a fresh accumulator and registry.
    #[instrument(skip_all, fields(turns = self.turns.len()))]
    pub fn begin_turn(&mut self) -> TurnId {
        let turn = Turn::new(self.pipeline.clone());
        let id = turn.id();
        self.turns.push_back(turn);
        debug!(%id, "turn started");
        self.enforce_retention();
        id
    }

    pub fn turn(&self, id: TurnId) -> Result<&Turn> {
        self.turns
            .iter()
            .find(|t| t.id() == id)
            .ok_or_else(|| AnswerFlowError::UnknownTurn(id.to_string()))
    }

    pub fn turn_mut(&mut self, id: TurnId) -> Result<&mut Turn> {
        self.turns
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or_else(|| AnswerFlowError::UnknownTurn(id.to_string()))
    }

    /// Drop a turn explicitly, e.g. when it scrolls out of view.
    pub fn remove_turn(&mut self, id: TurnId) -> Result<Turn> {
        let position = self
            .turns
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| AnswerFlowError::UnknownTurn(id.to_string()))?;
        self.turns
            .remove(position)
            .ok_or_else(|| AnswerFlowError::UnknownTurn(id.to_string()))
    }

    /// Evict until within the limit: oldest finished turns first, then the
    /// oldest turn overall. The newest turn is never evicted.
    fn enforce_retention(&mut self) {
        while self.turns.len() > self.max_retained_turns {
            let newest = self.turns.len() - 1;
            let victim = self
                .turns
                .iter()
                .take(newest)
                .position(|t| t.state().is_terminal())
                .unwrap_or(0);
            if let Some(turn) = self.turns.remove(victim) {
                info!(
                    id = %turn.id(),
                    state = turn.state().as_str(),
                    "turn evicted by retention limit"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(max: usize) -> ChatSession {
        ChatSession::new(PipelineConfig::default(), max)
    }

    #[test]
    fn turns_have_independent_registries() {
        let mut session = session(10);
        let first = session.begin_turn();
        let second = session.begin_turn();

        session
            .turn_mut(first)
            .expect("first turn")
            .push_chunk("{\"sources\":[{\"id\":\"d1\"}]}\n");

        assert_eq!(session.turn(first).expect("first").accumulator().registry().len(), 1);
        assert!(session.turn(second).expect("second").accumulator().registry().is_empty());
    }

    #[test]
    fn unknown_turn_is_an_error() {
        let session = session(10);
        let err = session.turn(TurnId::new()).expect_err("no such turn");
        assert!(matches!(err, AnswerFlowError::UnknownTurn(_)));
    }

    #[test]
    fn finished_at_is_stamped_on_terminal_state() {
        let mut session = session(10);
        let id = session.begin_turn();
        let turn = session.turn_mut(id).expect("turn");
        turn.push_chunk("{\"delta\":\"hi\"}\n");
        assert!(turn.meta().finished_at.is_none());
        turn.finalize();
        assert!(turn.meta().finished_at.is_some());
        assert!(turn.meta().finished_at >= Some(turn.meta().started_at));
    }

    #[test]
    fn retention_prefers_finished_turns() {
        let mut session = session(2);
        let streaming = session.begin_turn();
        session.turn_mut(streaming).expect("turn").push_chunk("{\"delta\":\"a\"}\n");
        let done = session.begin_turn();
        session.turn_mut(done).expect("turn").apply_final(&json!({"content": "b"}));

        let newest = session.begin_turn();
        assert_eq!(session.len(), 2);
        assert!(session.turn(done).is_err());
        assert!(session.turn(streaming).is_ok());
        assert_eq!(session.latest().map(Turn::id), Some(newest));
    }

    #[test]
    fn retention_falls_back_to_oldest() {
        let mut session = session(1);
        let first = session.begin_turn();
        let second = session.begin_turn();
        assert!(session.turn(first).is_err());
        assert!(session.turn(second).is_ok());
    }

    #[test]
    fn remove_turn_returns_it() {
        let mut session = session(3);
        let id = session.begin_turn();
        let removed = session.remove_turn(id).expect("removed");
        assert_eq!(removed.id(), id);
        assert!(session.is_empty());
        assert!(session.remove_turn(id).is_err());
    }

    #[test]
    fn from_config_uses_session_section() {
        let mut config = AppConfig::default();
        config.session.max_retained_turns = 1;
        let mut session = ChatSession::from_config(&config);
        session.begin_turn();
        session.begin_turn();
        assert_eq!(session.len(), 1);
    }
}
