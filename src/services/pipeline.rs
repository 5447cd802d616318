//! Interview transcript → article draft, in three sequential stages.
//!
//! 1. key-point extraction (strict JSON, low temperature)
//! 2. structural outline (strict JSON, medium temperature)
//! 3. templated draft (free text with blanks, high temperature)
//!
//! Stages 1 and 2 degrade to fallback values on a failed call or malformed
//! JSON; stage 3 failures become the draft content itself. Only a too-short
//! conversation is a hard error.

use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;

use crate::core::config::GenerationConfig;
use crate::core::error::InterviewError;
use crate::core::state::{
    ArticleOutline, ConversationTurn, GeneratedDraft, KeyPointExtract, PipelineStage,
    SteeringContext,
};
use crate::services::llm::{CompletionOptions, LlmClient};
use crate::services::prompts::{
    draft_prompt, extraction_prompt, flatten_transcript, outline_prompt, strip_code_blocks,
    DRAFT_FAILURE_PREFIX, FALLBACK_EXCERPT, FALLBACK_TITLE, PLACEHOLDER, SECTION_MARKERS,
};

pub const MIN_CONVERSATION_TURNS: usize = 4;
pub const SUMMARY_MAX_CHARS: usize = 200;

/// A stage that fell back instead of producing its own output.
#[derive(Debug)]
pub struct StageFallback {
    pub stage: PipelineStage,
    pub error: InterviewError,
}

#[derive(Debug)]
pub struct PipelineRun {
    pub draft: GeneratedDraft,
    pub key_points: KeyPointExtract,
    pub outline: Option<ArticleOutline>,
    pub fallbacks: Vec<StageFallback>,
}

impl PipelineRun {
    pub fn degraded(&self) -> bool {
        !self.fallbacks.is_empty()
    }
}

pub struct ArticlePipeline {
    llm: Arc<dyn LlmClient>,
    extraction: CompletionOptions,
    outline: CompletionOptions,
    draft: CompletionOptions,
}

impl ArticlePipeline {
    pub fn new(llm: Arc<dyn LlmClient>, generation: &GenerationConfig) -> Self {
        Self {
            llm,
            extraction: generation.extraction.clone(),
            outline: generation.outline.clone(),
            draft: generation.draft.clone(),
        }
    }

    pub async fn generate(
        &self,
        turns: &[ConversationTurn],
        steering: &SteeringContext,
    ) -> Result<GeneratedDraft, InterviewError> {
        Ok(self.generate_detailed(turns, steering).await?.draft)
    }

    pub async fn generate_detailed(
        &self,
        turns: &[ConversationTurn],
        steering: &SteeringContext,
    ) -> Result<PipelineRun, InterviewError> {
        if turns.len() < MIN_CONVERSATION_TURNS {
            return Err(InterviewError::InsufficientConversation {
                required: MIN_CONVERSATION_TURNS,
                actual: turns.len(),
            });
        }

        let transcript = flatten_transcript(turns);
        let mut fallbacks = Vec::new();

        let key_points = match self.extract_key_points(&transcript).await {
            Ok(k) => k,
            Err(error) => {
                warn!("Key-point extraction fell back to an empty extract: {}", error);
                fallbacks.push(StageFallback {
                    stage: PipelineStage::Extraction,
                    error,
                });
                KeyPointExtract::default()
            }
        };

        let outline = match self.build_outline(&key_points).await {
            Ok(o) => Some(o),
            Err(error) => {
                warn!("Outline fell back to default title and excerpt: {}", error);
                fallbacks.push(StageFallback {
                    stage: PipelineStage::Outline,
                    error,
                });
                None
            }
        };

        let empty_outline = ArticleOutline::default();
        let content = self
            .write_draft(&transcript, outline.as_ref().unwrap_or(&empty_outline), steering)
            .await;

        let (title, excerpt) = match &outline {
            Some(o) => (
                non_blank_or(&o.title, FALLBACK_TITLE),
                non_blank_or(&o.excerpt, FALLBACK_EXCERPT),
            ),
            None => (FALLBACK_TITLE.to_string(), FALLBACK_EXCERPT.to_string()),
        };

        Ok(PipelineRun {
            draft: GeneratedDraft {
                title,
                excerpt,
                content,
                generated_at: Utc::now(),
            },
            key_points,
            outline,
            fallbacks,
        })
    }

    async fn extract_key_points(&self, transcript: &str) -> Result<KeyPointExtract, InterviewError> {
        debug!("Stage 1: extracting key points ({} chars of transcript)", transcript.len());
        let raw = self
            .llm
            .complete(&extraction_prompt(transcript), &self.extraction)
            .await
            .map_err(InterviewError::GenerationCallFailed)?;
        parse_key_points(&raw)
    }

    async fn build_outline(&self, key_points: &KeyPointExtract) -> Result<ArticleOutline, InterviewError> {
        debug!("Stage 2: building outline");
        let key_points_json = serde_json::to_string_pretty(key_points).unwrap_or_default();
        let raw = self
            .llm
            .complete(&outline_prompt(&key_points_json), &self.outline)
            .await
            .map_err(InterviewError::GenerationCallFailed)?;
        parse_outline(&raw)
    }

    /// Never fails: errors and empty output become the content so the
    /// contributor always has something to edit.
    async fn write_draft(&self, transcript: &str, outline: &ArticleOutline, steering: &SteeringContext) -> String {
        match steering {
            SteeringContext::WithMatch(m) => debug!(
                "Stage 3: persona template for {}/{}",
                m.writer_type_id, m.reader_persona_id
            ),
            SteeringContext::NoMatch => debug!("Stage 3: generic template"),
        }

        let prompt = draft_prompt(transcript, outline, steering);
        match self.llm.complete(&prompt, &self.draft).await {
            Ok(text) if text.trim().is_empty() => {
                warn!("Draft stage returned empty output");
                format!("{}: 空の応答", DRAFT_FAILURE_PREFIX)
            }
            Ok(text) => {
                let missing = missing_markers(&text);
                if !missing.is_empty() {
                    warn!("Draft is missing template markers: {}", missing.join(", "));
                }
                text
            }
            Err(e) => {
                warn!("Draft stage failed: {:#}", e);
                format!("{}: {:#}", DRAFT_FAILURE_PREFIX, e)
            }
        }
    }
}

pub fn parse_key_points(raw: &str) -> Result<KeyPointExtract, InterviewError> {
    let clean_json = strip_code_blocks(raw);
    let mut key_points: KeyPointExtract =
        serde_json::from_str(&clean_json).map_err(|source| InterviewError::MalformedStageOutput {
            stage: PipelineStage::Extraction,
            source,
        })?;
    if key_points.summary.chars().count() > SUMMARY_MAX_CHARS {
        key_points.summary = key_points.summary.chars().take(SUMMARY_MAX_CHARS).collect();
    }
    Ok(key_points)
}

pub fn parse_outline(raw: &str) -> Result<ArticleOutline, InterviewError> {
    let clean_json = strip_code_blocks(raw);
    serde_json::from_str(&clean_json).map_err(|source| InterviewError::MalformedStageOutput {
        stage: PipelineStage::Outline,
        source,
    })
}

/// Template markers absent from a draft body.
pub fn missing_markers(content: &str) -> Vec<&'static str> {
    SECTION_MARKERS
        .iter()
        .chain(std::iter::once(&PLACEHOLDER))
        .copied()
        .filter(|marker| !content.contains(marker))
        .collect()
}

fn non_blank_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
