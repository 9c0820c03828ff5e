use anyhow::{Context as _, Result};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::assistant::HttpAssistant;
use crate::config::Config;
use crate::documents::{self, DocumentStore, HttpDocumentStore, UploadedFile};
use crate::history::PLACEHOLDER_TEXT;
use crate::profile::{Profile, ProfileField};
use crate::session::{ConversationSession, TurnOutcome};
use crate::slash::{self, SlashCommand};
use crate::storage::{SessionStore, StorageManager};
use crate::types::{Context, Message, Sender};

fn storage(config: &Config) -> Result<StorageManager> {
    let storage = StorageManager::new(&config.data_dir);
    storage.ensure_directories()
        .context("Failed to create data directory")?;
    Ok(storage)
}

fn build_session(config: &Config) -> Result<ConversationSession> {
    let storage = storage(config)?;
    let assistant = HttpAssistant::new(config)
        .context("Failed to create HTTP client")?;

    Ok(ConversationSession::new(
        Arc::new(assistant),
        Arc::new(storage.context_store()),
        Arc::new(storage.profile_store()),
        config.greeting.clone(),
    ))
}

fn render_message(message: &Message) -> String {
    let who = match message.sender {
        Sender::User => "U",
        Sender::Bot => "AI",
    };
    format!("{}: {}", who, message.text)
}

fn render_file(file: &UploadedFile) -> String {
    let mut line = format!("📄 {} ({} bytes, {})", file.name, file.size, file.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(link) = &file.link {
        line.push_str(&format!("\n   🔗 {}", link));
    }
    line
}

fn render_profile(profile: &Profile) -> String {
    let mut out = String::new();
    for field in [
        ProfileField::FullName,
        ProfileField::PersonalNumber,
        ProfileField::Department,
        ProfileField::Contact,
    ] {
        let value = profile
            .get(field.key())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or("—");
        out.push_str(&format!("{}: {}\n", field.caption(), value));
    }
    out
}

fn render_context(context: &Context) -> String {
    if context.is_empty() {
        return "Context is empty.".to_string();
    }
    context
        .iter()
        .map(|entry| format!("[{}] {}", entry.role, entry.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Interactive chat on stdin/stdout
pub async fn run_chat(config: &Config) -> Result<()> {
    let mut session = build_session(config)?;
    let documents = HttpDocumentStore::new(config)
        .context("Failed to create HTTP client")?;

    println!("💬 MedAssist chat ({}). Type /help for commands.", config.base_url);
    println!("{}", "=".repeat(50));
    for message in session.messages() {
        println!("{}", render_message(message));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read user input")? else {
            break;
        };

        if let Some(command) = slash::parse_slash_command(&line) {
            if command.command == SlashCommand::Bye {
                break;
            }
            if let Err(e) = handle_slash_command(&mut session, &documents, command).await {
                println!("❌ {:#}", e);
            }
            continue;
        }

        session.set_input(line);
        let Some(pending) = session.begin_input_turn() else {
            continue;
        };

        print!("AI: {}", PLACEHOLDER_TEXT);
        io::stdout().flush()?;

        let result = session.run_exchange(&pending).await;
        let outcome = session.finish_turn(pending, result);

        // overwrite the placeholder line
        print!("\r\x1b[2K");
        let id = match outcome {
            TurnOutcome::Replied { id, .. } | TurnOutcome::Failed { id } => id,
            TurnOutcome::Ignored => continue,
        };
        if let Some(message) = session.messages().iter().find(|m| m.id == id) {
            println!("{}", render_message(message));
        }
    }

    println!("👋 Bye!");
    Ok(())
}

async fn handle_slash_command(
    session: &mut ConversationSession,
    store: &dyn DocumentStore,
    command: slash::ParsedCommand,
) -> Result<()> {
    if command.command.requires_argument() && command.argument().is_none() {
        println!("Usage: /{} - {}", command.command.command(), command.command.description());
        return Ok(());
    }

    match command.command {
        SlashCommand::Profile => {
            print!("{}", render_profile(&session.profile()?));
        }
        SlashCommand::Set => {
            if let Some((field, value)) = command.field_assignment() {
                let mut profile = session.profile()?;
                set_field(&mut profile, field, value)?;
                session.save_profile(&profile)?;
                println!("✅ Profile saved.");
            }
        }
        SlashCommand::Unset => {
            session.save_profile(&Profile::new())?;
            println!("🗑️  Profile deleted.");
        }
        SlashCommand::Files => {
            print_files(store).await?;
        }
        SlashCommand::Upload => {
            if let Some(path) = command.argument() {
                let uploaded = documents::upload_path(store, Path::new(path)).await?;
                println!("✅ File uploaded successfully: {}", uploaded.name);
            }
        }
        SlashCommand::Context => {
            println!("{}", render_context(&session.context()?));
        }
        SlashCommand::Clear => {
            session.reset();
            session.clear_context()?;
            for message in session.messages() {
                println!("{}", render_message(message));
            }
        }
        SlashCommand::Help => {
            println!("{}", slash::get_help_text());
        }
        SlashCommand::Bye => {}
    }
    Ok(())
}

fn set_field(profile: &mut Profile, field: &str, value: &str) -> Result<()> {
    let field = ProfileField::parse(field).ok_or_else(|| {
        anyhow::anyhow!("Unknown profile field '{}' (use fullName, personalNumber, department or contact)", field)
    })?;
    profile.set(field.key(), value);
    Ok(())
}

async fn print_files(store: &dyn DocumentStore) -> Result<()> {
    let files = store.list_files().await
        .context("Failed to list uploaded files")?;

    if files.is_empty() {
        println!("📭 No documents uploaded yet.");
        return Ok(());
    }

    println!("📁 Uploaded documents:");
    for file in &files {
        println!("{}", render_file(file));
    }
    Ok(())
}

/// Send a single message and print the answer
pub async fn send_message(config: &Config, text: &str) -> Result<()> {
    let mut session = build_session(config)?;
    match session.submit(text).await {
        TurnOutcome::Ignored => println!("Nothing to send."),
        TurnOutcome::Replied { text, .. } => println!("{}", text),
        TurnOutcome::Failed { id } => {
            if let Some(message) = session.messages().iter().find(|m| m.id == id) {
                println!("{}", message.text);
            }
        }
    }
    Ok(())
}

pub async fn upload_document(config: &Config, path: &Path) -> Result<()> {
    let documents = HttpDocumentStore::new(config)
        .context("Failed to create HTTP client")?;
    let uploaded = documents::upload_path(&documents, path).await
        .with_context(|| format!("Failed to upload {}", path.display()))?;
    println!("✅ File uploaded successfully!");
    println!("{}", render_file(&uploaded));
    Ok(())
}

pub async fn list_files(config: &Config) -> Result<()> {
    let documents = HttpDocumentStore::new(config)
        .context("Failed to create HTTP client")?;
    print_files(&documents).await
}

pub fn show_profile(config: &Config) -> Result<()> {
    let profile = storage(config)?.profile_store().load()?;
    print!("{}", render_profile(&profile));
    Ok(())
}

pub fn set_profile_field(config: &Config, field: &str, value: &str) -> Result<()> {
    let store = storage(config)?.profile_store();
    let mut profile = store.load()?;
    set_field(&mut profile, field, value)?;
    store.save(&profile)?;
    println!("✅ Profile saved.");
    Ok(())
}

pub fn clear_profile(config: &Config) -> Result<()> {
    storage(config)?.profile_store().save(&Profile::new())?;
    println!("🗑️  Profile deleted.");
    Ok(())
}

pub fn show_context(config: &Config) -> Result<()> {
    let context = storage(config)?.context_store().load()?;
    println!("{}", render_context(&context));
    Ok(())
}

pub fn clear_context(config: &Config) -> Result<()> {
    storage(config)?.context_store().save(&Context::new())?;
    println!("🗑️  Context cleared.");
    Ok(())
}

pub fn init_config(config: &Config, path: &Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    config.save(path)?;
    println!("✅ Wrote {}", path.display());
    Ok(())
}

pub fn show_config(config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .context("Failed to serialize config")?;
    println!("{}", content);
    Ok(())
}
