use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use interview2article::core::config::GenerationConfig;
use interview2article::core::error::InterviewError;
use interview2article::core::io::NativeStorage;
use interview2article::core::state::SessionState;
use interview2article::services::handoff::{ArticleEditor, DraftHandoff};
use interview2article::services::interview::InterviewEngine;
use interview2article::services::llm::{CompletionOptions, LlmClient};
use interview2article::services::persona::PersonaCatalog;
use interview2article::services::pipeline::ArticlePipeline;
use interview2article::services::prompts::{PLACEHOLDER, SECTION_MARKERS};
use interview2article::services::session_store::SessionStore;

/// Plays interviewer and all three pipeline stages, keyed on prompt wording.
#[derive(Debug, Default)]
struct FakeModel {
    calls: Mutex<Vec<f32>>,
}

#[async_trait]
impl LlmClient for FakeModel {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        self.calls.lock().unwrap().push(options.temperature);
        if prompt.contains("要点を抽出") {
            return Ok(r#"{
                "summary": "3年のブランクを経て、娘の一言で職場に戻った。",
                "emotionalPeaks": [{"emotion": "不安", "episode": "初出社の朝"}],
                "keyTakeaways": ["完璧を目指さない"],
                "symbolicQuotes": ["止まっても終わりじゃない"],
                "targetReaders": ["両立に悩む親"]
            }"#
            .to_string());
        }
        if prompt.contains("構成案を作成") {
            return Ok(r#"```json
{"title": "止まった3年が、私を強くした理由", "excerpt": "両立に悩むあなたへ。", "leadText": "朝7時、玄関で泣く娘を前に、私は何を選んだのか。", "sections": [], "callToAction": "感想を聞かせてください"}
```"#
                .to_string());
        }
        if prompt.contains("記事の下書きを作成") {
            let body: Vec<String> = SECTION_MARKERS
                .iter()
                .map(|m| format!("{}\n例: 私も同じでした。{}", m, PLACEHOLDER))
                .collect();
            return Ok(body.join("\n\n"));
        }
        Ok("ありがとうございます。そのとき、どんな気持ちでしたか？".to_string())
    }
}

#[tokio::test]
async fn test_comeback_interview_to_editor() -> Result<()> {
    let catalog = Arc::new(PersonaCatalog::builtin()?);
    let matches = catalog.recommended_matches("comeback")?;
    let chosen = matches
        .iter()
        .find(|m| m.reader_persona_id == "struggling_parent")
        .expect("comeback should recommend struggling_parent");
    assert!(!chosen.match_rationale.is_empty());
    assert!(!chosen.focus_questions.is_empty());

    let model = Arc::new(FakeModel::default());
    let generation = GenerationConfig::default();
    let engine = InterviewEngine::new(catalog.clone(), model.clone(), generation.interview.clone());
    let pipeline = ArticlePipeline::new(model.clone(), &generation);

    let mut session = engine.start_session("user-42", "復職の体験");
    engine.select_writer_type(&mut session, "comeback")?;
    engine.select_reader_persona(&mut session, "struggling_parent")?;
    engine
        .submit_turn(&mut session, "育児で3年間仕事を離れていました。")
        .await?;
    engine
        .submit_turn(&mut session, "娘に「ママはお仕事しないの？」と聞かれたのがきっかけです。")
        .await?;
    assert!(session.turns.len() >= 4);

    let draft = engine.hand_off(&mut session, &pipeline).await?;
    let title_len = draft.title.chars().count();
    assert!((1..=60).contains(&title_len));
    for marker in SECTION_MARKERS {
        assert!(draft.content.contains(marker), "missing {}", marker);
    }
    assert!(draft.content.contains(PLACEHOLDER));
    assert_eq!(session.state, SessionState::Concluded);
    assert!(session.summary.is_some());

    // two interviewer replies, then three stages with rising temperature
    let temps = model.calls.lock().unwrap().clone();
    assert_eq!(temps.len(), 5);
    assert!(temps[2] < temps[3] && temps[3] < temps[4]);

    assert!(matches!(
        engine.submit_turn(&mut session, "追加です").await,
        Err(InterviewError::SessionConcluded)
    ));

    let handoff = DraftHandoff::new(Duration::from_secs(60));
    handoff.store(draft.clone());
    let mut editor = ArticleEditor::new();
    assert!(editor.seed_from(&handoff));
    assert!(!editor.seed_from(&handoff));
    assert!(handoff.consume().is_none());
    assert_eq!(editor.title, draft.title);
    assert_eq!(editor.content, draft.content);

    let temp_dir = tempfile::tempdir()?;
    let store = SessionStore::new(
        Arc::new(NativeStorage::new()),
        temp_dir.path().to_str().unwrap(),
    );
    store.save(&session).await?;
    let restored = store.load(&session.id.to_string()).await?.unwrap();
    assert_eq!(restored.turns.len(), session.turns.len());
    assert_eq!(
        restored.active_match().map(|m| m.reader_persona_id.as_str()),
        Some("struggling_parent")
    );
    Ok(())
}

#[tokio::test]
async fn test_generate_rejects_short_transcripts_before_any_call() -> Result<()> {
    let model = Arc::new(FakeModel::default());
    let pipeline = ArticlePipeline::new(model.clone(), &GenerationConfig::default());
    let catalog = Arc::new(PersonaCatalog::builtin()?);
    let engine = InterviewEngine::new(catalog, model.clone(), CompletionOptions::new(0.7, 128));

    let mut session = engine.start_session("user-1", "短い");
    engine.begin_without_match(&mut session)?;
    let err = pipeline
        .generate(&session.turns, &session.steering)
        .await
        .unwrap_err();
    assert!(matches!(err, InterviewError::InsufficientConversation { actual: 1, .. }));
    assert!(model.calls.lock().unwrap().is_empty());
    Ok(())
}
