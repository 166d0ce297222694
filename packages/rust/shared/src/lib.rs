//! Shared types, error model, and configuration for answerflow.
//!
//! This crate is the foundation depended on by all other answerflow crates.
//! It provides:
//! - [`AnswerFlowError`]: the unified error type
//! - The canonical answer model ([`Answer`], [`Source`], [`Citation`],
//!   [`SupportingContentItem`], [`TurnId`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)
//! - Dotted-path lookup into raw JSON payloads ([`path`])

pub mod config;
pub mod error;
pub mod path;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, PipelineConfig, PipelineSection, ReferenceStyle, SessionSection, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{AnswerFlowError, Result};
pub use types::{
    Answer, AnswerState, Citation, SUPPORTING_KEY_CHARS, Sanitizer, Source,
    SupportingContentItem, TurnId, TurnMeta,
};
