use crate::core::state::{PipelineStage, SessionState};
use thiserror::Error;

/// Errors surfaced by the interview engine and the generation pipeline.
///
/// `NotFound`, `SessionConcluded`, `InvalidSessionState` and
/// `InsufficientConversation` are caller errors. `MalformedStageOutput` is
/// recovered inside the pipeline and only shows up in
/// [`PipelineRun::fallbacks`](crate::services::pipeline::PipelineRun).
#[derive(Debug, Error)]
pub enum InterviewError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("session is concluded and accepts no further turns")]
    SessionConcluded,

    #[error("operation not allowed while the session is {state:?}")]
    InvalidSessionState { state: SessionState },

    #[error("conversation too short: {actual} turns, at least {required} required")]
    InsufficientConversation { required: usize, actual: usize },

    #[error("text generation failed: {0:#}")]
    GenerationCallFailed(#[source] anyhow::Error),

    #[error("{stage} stage returned malformed JSON: {source}")]
    MalformedStageOutput {
        stage: PipelineStage,
        #[source]
        source: serde_json::Error,
    },
}

impl InterviewError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether the contributor can simply try the same action again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::GenerationCallFailed(_))
    }
}

/// Data errors detected while building a persona catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("writer type '{0}' has no reader persona match")]
    MissingMatch(String),

    #[error("duplicate match for pair ({writer_type_id}, {reader_persona_id})")]
    DuplicatePair {
        writer_type_id: String,
        reader_persona_id: String,
    },

    #[error("match references unknown {kind} '{id}'")]
    UnknownProfile { kind: &'static str, id: String },

    #[error("match ({writer_type_id}, {reader_persona_id}) has no focus questions")]
    NoFocusQuestions {
        writer_type_id: String,
        reader_persona_id: String,
    },

    #[error("duplicate {kind} id '{id}'")]
    DuplicateProfile { kind: &'static str, id: String },
}
