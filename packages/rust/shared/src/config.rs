//! Application configuration for answerflow.
//!
//! User config lives at `~/.answerflow/answerflow.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AnswerFlowError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "answerflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".answerflow";

// ---------------------------------------------------------------------------
// Config structs (matching answerflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Answer pipeline behavior.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Chat session retention.
    #[serde(default)]
    pub session: SessionSection,
}

/// How resolved citation markers are written back into the answer text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceStyle {
    /// Markdown footnote reference: `[^1]`.
    #[default]
    Footnote,
    /// Plain bracketed number: `[1]`.
    Bracket,
}

impl ReferenceStyle {
    /// Render the inline reference for a 1-based citation index.
    pub fn render(self, index: usize) -> String {
        match self {
            Self::Footnote => format!("[^{index}]"),
            Self::Bracket => format!("[{index}]"),
        }
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Text shown when nothing at all could be extracted from a response.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Inline reference style used when annotating finalized content.
    #[serde(default)]
    pub reference_style: ReferenceStyle,

    /// Fall back to a pretty-printed dump of the terminal payload when no
    /// content alias matched.
    #[serde(default = "default_true")]
    pub structural_dump: bool,

    /// How many unclassifiable records to retain for diagnostics.
    #[serde(default = "default_max_unknown")]
    pub max_unknown_records: usize,

    /// Move `<<question>>` spans out of the final content into follow-ups.
    #[serde(default = "default_true")]
    pub extract_inline_followups: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            placeholder: default_placeholder(),
            reference_style: ReferenceStyle::default(),
            structural_dump: true,
            max_unknown_records: default_max_unknown(),
            extract_inline_followups: true,
        }
    }
}

fn default_placeholder() -> String {
    "Sorry, no answer could be extracted from the response.".into()
}
fn default_true() -> bool {
    true
}
fn default_max_unknown() -> usize {
    64
}

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Maximum number of chat turns kept in memory per session.
    #[serde(default = "default_max_turns")]
    pub max_retained_turns: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_retained_turns: default_max_turns(),
        }
    }
}

fn default_max_turns() -> usize {
    50
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration consumed by the answer accumulator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Generic placeholder for responses with no extractable content.
    pub placeholder: String,
    /// Inline reference style for resolved citation markers.
    pub reference_style: ReferenceStyle,
    /// Whether the terminal payload may be dumped as content.
    pub structural_dump: bool,
    /// Cap on retained unknown records.
    pub max_unknown_records: usize,
    /// Whether `<<question>>` spans become follow-up questions.
    pub extract_inline_followups: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            placeholder: config.pipeline.placeholder.clone(),
            reference_style: config.pipeline.reference_style,
            structural_dump: config.pipeline.structural_dump,
            max_unknown_records: config.pipeline.max_unknown_records,
            extract_inline_followups: config.pipeline.extract_inline_followups,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.answerflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AnswerFlowError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.answerflow/answerflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AnswerFlowError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        AnswerFlowError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AnswerFlowError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AnswerFlowError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AnswerFlowError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject settings the pipeline cannot work with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.session.max_retained_turns == 0 {
        return Err(AnswerFlowError::validation(
            "session.max_retained_turns must be at least 1",
        ));
    }
    if config.pipeline.placeholder.trim().is_empty() {
        return Err(AnswerFlowError::validation(
            "pipeline.placeholder must not be empty",
        ));
    }
    Ok(())
}
