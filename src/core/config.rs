use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::services::llm::{CompletionOptions, LlmConfig};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_sessions")]
    pub session_folder: String,

    pub llm: LlmConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub handoff: HandoffConfig,
}

/// Per-call sampling settings for the interviewer and each pipeline stage.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_interview")]
    pub interview: CompletionOptions,
    #[serde(default = "default_extraction")]
    pub extraction: CompletionOptions,
    #[serde(default = "default_outline")]
    pub outline: CompletionOptions,
    #[serde(default = "default_draft")]
    pub draft: CompletionOptions,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            interview: default_interview(),
            extraction: default_extraction(),
            outline: default_outline(),
            draft: default_draft(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HandoffConfig {
    #[serde(default = "default_handoff_ttl")]
    pub ttl_minutes: u64,
}

impl HandoffConfig {
    /// Saturates instead of overflowing for absurd settings.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes.saturating_mul(60))
    }
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_handoff_ttl(),
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_sessions() -> String {
    "sessions".to_string()
}
fn default_interview() -> CompletionOptions {
    CompletionOptions::new(0.7, 1024)
}
fn default_extraction() -> CompletionOptions {
    CompletionOptions::new(0.2, 2048)
}
fn default_outline() -> CompletionOptions {
    CompletionOptions::new(0.5, 2048)
}
fn default_draft() -> CompletionOptions {
    CompletionOptions::new(0.9, 8192)
}
fn default_handoff_ttl() -> u64 {
    60
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Path::new("config.yml");
        if !path.exists() {
            anyhow::bail!("config.yml not found. Please create one.");
        }

        let content = fs::read_to_string(path).context("Failed to read config.yml")?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml_ng::from_str(content).context("Failed to parse config.yml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        fs::create_dir_all(&self.session_folder)?;
        Ok(())
    }

    /// Creative latitude must widen down the pipeline.
    pub fn validate(&self) -> Result<()> {
        let g = &self.generation;
        if !(g.extraction.temperature < g.outline.temperature
            && g.outline.temperature < g.draft.temperature)
        {
            anyhow::bail!(
                "generation temperatures must increase extraction < outline < draft (got {} / {} / {})",
                g.extraction.temperature,
                g.outline.temperature,
                g.draft.temperature
            );
        }
        Ok(())
    }
}
