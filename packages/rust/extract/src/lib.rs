//! Field extractors for raw backend payloads.
//!
//! This crate provides:
//! - [`chain`]: ordered `(path, reader)` alias chains
//! - One chain per answer entity: [`content`], [`thoughts`], [`supporting`],
//!   [`citations`] (citations and source lists), [`followups`]
//! - [`sources`]: per-field alias chains for a single source-like object
//!
//! Every extractor is pure and infallible: a shape mismatch advances to the
//! next alias, and an exhausted chain means "absent".

pub mod chain;
pub mod citations;
pub mod content;
pub mod followups;
pub mod sources;
pub mod supporting;
pub mod thoughts;

pub use chain::{Alias, AliasChain, Reader};
pub use citations::{extract_citations, extract_sources, from_citation_record};
pub use content::{extract_content, has_dumpable_fields, structural_dump};
pub use followups::{extract_followups, extract_inline};
pub use sources::{SourceFields, file_name_from_url};
pub use supporting::extract_supporting;
pub use thoughts::{extract_thoughts, from_thought_record};
