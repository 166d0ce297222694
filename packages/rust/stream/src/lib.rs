//! Stream tokenization and record classification.
//!
//! The first two pipeline stages: raw text chunks become [`Token`]s (parsed
//! JSON objects or prose lines), and each object becomes a typed [`Record`].

pub mod classifier;
pub mod tokenizer;

pub use classifier::{DELTA_PATHS, Record, RecordKind, classify, delta_text};
pub use tokenizer::{ChunkTokenizer, Token, TokenBatch};
