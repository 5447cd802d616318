use log::{debug, info, warn};
use std::sync::Arc;

use crate::core::error::InterviewError;
use crate::core::state::{
    ConversationTurn, GeneratedDraft, InterviewSession, SessionState, Speaker, SteeringContext,
};
use crate::services::llm::{CompletionOptions, LlmClient};
use crate::services::persona::PersonaCatalog;
use crate::services::pipeline::ArticlePipeline;
use crate::services::prompts::{generic_opening, interview_prompt, opening_message};

/// Drives the automated interviewer for any number of sessions.
///
/// The engine holds no per-session state; each call takes the session it
/// acts on, so one engine can serve concurrent sessions.
pub struct InterviewEngine {
    catalog: Arc<PersonaCatalog>,
    llm: Arc<dyn LlmClient>,
    options: CompletionOptions,
}

impl InterviewEngine {
    pub fn new(catalog: Arc<PersonaCatalog>, llm: Arc<dyn LlmClient>, options: CompletionOptions) -> Self {
        Self { catalog, llm, options }
    }

    pub fn catalog(&self) -> &PersonaCatalog {
        &self.catalog
    }

    pub fn start_session(&self, owner_id: &str, title: &str) -> InterviewSession {
        let session = InterviewSession::new(owner_id, title);
        info!("Started interview session {} for {}", session.id, owner_id);
        session
    }

    pub fn select_writer_type(
        &self,
        session: &mut InterviewSession,
        writer_type_id: &str,
    ) -> Result<(), InterviewError> {
        ensure_selectable(session)?;
        self.catalog.writer_type(writer_type_id)?;
        session.writer_type_id = Some(writer_type_id.to_string());
        session.state = SessionState::Steering;
        Ok(())
    }

    /// Locks in the match and opens the interview with its first focus
    /// question.
    pub fn select_reader_persona<'s>(
        &self,
        session: &'s mut InterviewSession,
        reader_persona_id: &str,
    ) -> Result<&'s ConversationTurn, InterviewError> {
        ensure_selectable(session)?;
        let writer_type_id = match (&session.state, &session.writer_type_id) {
            (SessionState::Steering, Some(id)) => id.clone(),
            _ => {
                return Err(InterviewError::InvalidSessionState {
                    state: session.state,
                })
            }
        };

        let persona_match = self.catalog.find_match(&writer_type_id, reader_persona_id)?;
        let writer = self.catalog.writer_type(&writer_type_id)?;
        let reader = self.catalog.reader_persona(reader_persona_id)?;
        let opening = opening_message(writer, reader, persona_match);

        session.steering = SteeringContext::WithMatch(persona_match.clone());
        session.state = SessionState::Active;
        debug!(
            "Session {} steering on {}/{}",
            session.id, writer_type_id, reader_persona_id
        );
        Ok(push_turn(session, Speaker::Interviewer, opening))
    }

    /// Skips persona selection; the draft will use the generic template.
    pub fn begin_without_match<'s>(
        &self,
        session: &'s mut InterviewSession,
    ) -> Result<&'s ConversationTurn, InterviewError> {
        ensure_selectable(session)?;
        session.steering = SteeringContext::NoMatch;
        session.state = SessionState::Active;
        Ok(push_turn(session, Speaker::Interviewer, generic_opening()))
    }

    /// Appends the contributor's turn, then the interviewer's reply.
    ///
    /// If the collaborator fails, the contributor turn stays and the error is
    /// recoverable through [`retry_reply`](Self::retry_reply).
    pub async fn submit_turn<'s>(
        &self,
        session: &'s mut InterviewSession,
        text: &str,
    ) -> Result<&'s ConversationTurn, InterviewError> {
        ensure_active(session)?;
        push_turn(session, Speaker::Contributor, text.to_string());
        self.reply(session).await
    }

    /// Requests a reply to the trailing contributor turn again.
    pub async fn retry_reply<'s>(
        &self,
        session: &'s mut InterviewSession,
    ) -> Result<&'s ConversationTurn, InterviewError> {
        ensure_active(session)?;
        let pending = matches!(session.last_turn(), Some(t) if t.speaker == Speaker::Contributor);
        if pending {
            return self.reply(session).await;
        }
        // Nothing is waiting for a reply; hand back the latest turn.
        session.last_turn().ok_or(InterviewError::InvalidSessionState {
            state: session.state,
        })
    }

    pub fn conclude(&self, session: &mut InterviewSession) {
        if session.state != SessionState::Concluded {
            info!("Concluding session {} after {} turns", session.id, session.turns.len());
            session.state = SessionState::Concluded;
        }
    }

    /// Concludes the session and runs the article pipeline on it. The
    /// extraction summary is kept on the session.
    pub async fn hand_off(
        &self,
        session: &mut InterviewSession,
        pipeline: &ArticlePipeline,
    ) -> Result<GeneratedDraft, InterviewError> {
        if session.state == SessionState::Concluded {
            return Err(InterviewError::SessionConcluded);
        }
        let run = pipeline
            .generate_detailed(&session.turns, &session.steering)
            .await?;
        self.conclude(session);
        if !run.key_points.summary.is_empty() {
            session.summary = Some(run.key_points.summary.clone());
        }
        Ok(run.draft)
    }

    async fn reply<'s>(&self, session: &'s mut InterviewSession) -> Result<&'s ConversationTurn, InterviewError> {
        let prompt = interview_prompt(&session.turns, &session.steering);
        match self.llm.complete(&prompt, &self.options).await {
            Ok(text) if text.trim().is_empty() => {
                warn!("Interviewer reply for session {} was empty", session.id);
                Err(InterviewError::GenerationCallFailed(anyhow::anyhow!("empty reply")))
            }
            Ok(text) => Ok(push_turn(session, Speaker::Interviewer, text.trim().to_string())),
            Err(e) => {
                warn!("Interviewer reply failed for session {}: {:#}", session.id, e);
                Err(InterviewError::GenerationCallFailed(e))
            }
        }
    }
}

fn push_turn(session: &mut InterviewSession, speaker: Speaker, text: String) -> &ConversationTurn {
    session.turns.push(ConversationTurn::new(speaker, text));
    &session.turns[session.turns.len() - 1]
}

fn ensure_selectable(session: &InterviewSession) -> Result<(), InterviewError> {
    match session.state {
        SessionState::Selecting | SessionState::Steering => Ok(()),
        SessionState::Concluded => Err(InterviewError::SessionConcluded),
        SessionState::Active => Err(InterviewError::InvalidSessionState {
            state: session.state,
        }),
    }
}

fn ensure_active(session: &InterviewSession) -> Result<(), InterviewError> {
    match session.state {
        SessionState::Active => Ok(()),
        SessionState::Concluded => Err(InterviewError::SessionConcluded),
        state => Err(InterviewError::InvalidSessionState { state }),
    }
}
