use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Select, Text};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use interview2article::core::config::Config;
use interview2article::core::io::{NativeStorage, Storage};
use interview2article::core::state::InterviewSession;
use interview2article::services::handoff::{ArticleEditor, DraftHandoff};
use interview2article::services::interview::InterviewEngine;
use interview2article::services::llm::create_llm;
use interview2article::services::persona::PersonaCatalog;
use interview2article::services::pipeline::{ArticlePipeline, MIN_CONVERSATION_TURNS};
use interview2article::services::session_store::SessionStore;

struct Choice {
    id: Option<String>,
    label: String,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM settings.");
            return Err(e);
        }
    };
    config.ensure_directories()?;

    let llm = create_llm(&config)?;
    let catalog = Arc::new(PersonaCatalog::builtin()?);
    let engine = InterviewEngine::new(catalog, llm.clone(), config.generation.interview.clone());
    let pipeline = ArticlePipeline::new(llm, &config.generation);

    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
    let sessions = SessionStore::new(storage.clone(), &config.session_folder);
    let handoff = DraftHandoff::new(config.handoff.ttl());

    let owner = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
    let title = Text::new("記事の仮タイトル:").with_default("私の体験").prompt()?;
    let mut session = engine.start_session(&owner, &title);

    choose_steering(&engine, &mut session)?;

    if !run_interview(&engine, &mut session).await? {
        println!("インタビューを中断しました。");
        return Ok(());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message("記事の下書きを生成しています...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    let generated = engine.hand_off(&mut session, &pipeline).await;
    spinner.finish_and_clear();
    handoff.store(generated?);

    let record = sessions.save(&session).await?;
    println!("セッションを保存しました: {}", record);

    let mut editor = ArticleEditor::new();
    if !editor.seed_from(&handoff) {
        bail!("下書きを受け取れませんでした");
    }

    let export_path = Path::new(&config.output_folder)
        .join(format!("{}.md", session.id))
        .to_string_lossy()
        .to_string();
    storage
        .write(&export_path, render_markdown(&editor).as_bytes())
        .await?;
    println!("下書きを書き出しました: {}", export_path);

    Ok(())
}

fn choose_steering(engine: &InterviewEngine, session: &mut InterviewSession) -> Result<()> {
    let catalog = engine.catalog();
    let writer_choices: Vec<Choice> = catalog
        .list_writer_types()
        .iter()
        .map(|w| Choice {
            id: Some(w.id.clone()),
            label: format!("{} - {}", w.name, w.description),
        })
        .collect();
    let writer = Select::new("あなたに近い書き手タイプを選んでください:", writer_choices).prompt()?;
    let writer_type_id = writer.id.unwrap_or_default();

    let mut reader_choices = Vec::new();
    for m in catalog.recommended_matches(&writer_type_id)? {
        let persona = catalog.reader_persona(&m.reader_persona_id)?;
        reader_choices.push(Choice {
            id: Some(persona.id.clone()),
            label: format!("{} - {}", persona.name, m.match_rationale),
        });
    }
    reader_choices.push(Choice {
        id: None,
        label: "指定しない".to_string(),
    });
    let reader = Select::new("誰に向けて書きますか？", reader_choices).prompt()?;

    engine.select_writer_type(session, &writer_type_id)?;
    let opening = match reader.id {
        Some(reader_persona_id) => engine.select_reader_persona(session, &reader_persona_id)?,
        None => engine.begin_without_match(session)?,
    };
    println!("\nインタビュアー: {}\n", opening.text);
    Ok(())
}

/// Returns `false` if the contributor quit without finishing.
async fn run_interview(engine: &InterviewEngine, session: &mut InterviewSession) -> Result<bool> {
    println!("（/done で記事を生成、/retry で応答を再取得、/quit で中断）");
    loop {
        let input = Text::new("あなた:").prompt()?;
        match input.trim() {
            "" => continue,
            "/quit" => return Ok(false),
            "/done" => {
                if session.turns.len() < MIN_CONVERSATION_TURNS {
                    println!("記事にするにはもう少しお話を聞かせてください。");
                    continue;
                }
                return Ok(true);
            }
            "/retry" => match engine.retry_reply(session).await {
                Ok(turn) => println!("\nインタビュアー: {}\n", turn.text),
                Err(e) => eprintln!("{}", e),
            },
            text => match engine.submit_turn(session, text).await {
                Ok(turn) => println!("\nインタビュアー: {}\n", turn.text),
                Err(e) if e.is_recoverable() => eprintln!("{}（/retry で再試行できます）", e),
                Err(e) => return Err(e.into()),
            },
        }
    }
}

fn render_markdown(editor: &ArticleEditor) -> String {
    format!("# {}\n\n> {}\n\n{}\n", editor.title, editor.excerpt, editor.content)
}
