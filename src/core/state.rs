use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// --- Persona catalog records ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WriterTypeProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub characteristics: Vec<String>,
    pub strengths: Vec<String>,
    pub challenges: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReaderPersonaProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub target_life_stage: String,
    pub situation_tags: Vec<String>,
    pub unspoken_concerns: Vec<String>,
    pub desired_information: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PersonaMatch {
    pub writer_type_id: String,
    pub reader_persona_id: String,
    pub match_rationale: String,
    /// Ordered; the first entry opens the interview.
    pub focus_questions: Vec<String>,
    pub focus_areas: Vec<String>,
}

/// What steers the interviewer and the templated draft.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "kind", content = "match", rename_all = "snake_case")]
pub enum SteeringContext {
    #[default]
    NoMatch,
    WithMatch(PersonaMatch),
}

impl SteeringContext {
    pub fn persona_match(&self) -> Option<&PersonaMatch> {
        match self {
            SteeringContext::NoMatch => None,
            SteeringContext::WithMatch(m) => Some(m),
        }
    }
}

impl From<Option<PersonaMatch>> for SteeringContext {
    fn from(value: Option<PersonaMatch>) -> Self {
        value.map_or(SteeringContext::NoMatch, SteeringContext::WithMatch)
    }
}

// --- Conversation ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Contributor,
    Interviewer,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Speaker::Contributor => "投稿者",
            Speaker::Interviewer => "インタビュアー",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Selecting,
    Steering,
    Active,
    Concluded,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InterviewSession {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub state: SessionState,
    pub writer_type_id: Option<String>,
    pub steering: SteeringContext,
    pub turns: Vec<ConversationTurn>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InterviewSession {
    pub fn new(owner_id: &str, title: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            state: SessionState::Selecting,
            writer_type_id: None,
            steering: SteeringContext::NoMatch,
            turns: Vec::new(),
            summary: None,
            created_at: Utc::now(),
        }
    }

    pub fn active_match(&self) -> Option<&PersonaMatch> {
        self.steering.persona_match()
    }

    pub fn last_turn(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn contributor_turns(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.speaker == Speaker::Contributor)
            .count()
    }
}

// --- Pipeline stage schemas ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Extraction,
    Outline,
    Draft,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Extraction => "extraction",
            PipelineStage::Outline => "outline",
            PipelineStage::Draft => "draft",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct EmotionalPeak {
    pub emotion: String,
    pub episode: String,
}

/// Stage-1 output. Field names follow the JSON the model is asked for.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyPointExtract {
    pub summary: String,
    pub emotional_peaks: Vec<EmotionalPeak>,
    pub key_takeaways: Vec<String>,
    pub symbolic_quotes: Vec<String>,
    pub target_readers: Vec<String>,
}

impl KeyPointExtract {
    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty()
            && self.emotional_peaks.is_empty()
            && self.key_takeaways.is_empty()
            && self.symbolic_quotes.is_empty()
            && self.target_readers.is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutlineSection {
    pub heading: String,
    pub purpose: String,
    pub key_elements: Vec<String>,
}

/// Stage-2 output.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleOutline {
    pub title: String,
    pub excerpt: String,
    pub lead_text: String,
    pub sections: Vec<OutlineSection>,
    pub call_to_action: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GeneratedDraft {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub generated_at: DateTime<Utc>,
}
