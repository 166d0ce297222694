//! Answer pipeline orchestration for answerflow.
//!
//! This crate ties tokenization, classification and extraction together
//! into one accumulator per chat turn:
//! - [`registry`]: per-turn source registry with non-regressive merges
//! - [`resolver`]: citation marker resolution and index assignment
//! - [`accumulator`]: the per-turn state machine and snapshot publisher
//! - [`enrichment`]: in-flight dedup for source detail fetches
//! - [`session`]: ordered turns with a retention limit

pub mod accumulator;
pub mod enrichment;
pub mod registry;
pub mod resolver;
pub mod session;

pub use accumulator::{AnswerAccumulator, AnswerSubscriber};
pub use enrichment::{EnrichmentStats, EnrichmentTracker};
pub use registry::{EnrichOutcome, SourceRegistry, normalize_xray};
pub use resolver::CitationResolver;
pub use session::{ChatSession, Turn};
