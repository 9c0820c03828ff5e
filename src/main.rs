use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use medassist::Config;
use medassist::commands;

#[derive(Parser)]
#[command(name = "medassist")]
#[command(version)]
#[command(about = "Chat with the MedAssist assistant server", long_about = None)]
struct Cli {
    /// Server address, overrides config and MEDASSIST_URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Directory holding the context and profile
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file to use instead of ~/.medassist/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Send a single message and print the reply
    Send {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Upload a document
    Upload { path: PathBuf },
    /// List uploaded documents
    Files,
    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },
    /// Show or clear the conversation context
    Context {
        #[command(subcommand)]
        action: Option<ContextAction>,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    Show,
    /// Set a field: fullName, personalNumber, department or contact
    Set { field: String, value: String },
    Clear,
}

#[derive(Subcommand)]
enum ContextAction {
    Show,
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the current settings to the config file
    Init,
    Show,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?
        .with_base_url(cli.url)
        .with_data_dir(cli.data_dir);
    tracing::debug!(path = %config_path.display(), url = %config.base_url, "Configuration loaded");

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => commands::run_chat(&config).await,
        Commands::Send { text } => commands::send_message(&config, &text.join(" ")).await,
        Commands::Upload { path } => commands::upload_document(&config, &path).await,
        Commands::Files => commands::list_files(&config).await,
        Commands::Profile { action } => match action.unwrap_or(ProfileAction::Show) {
            ProfileAction::Show => commands::show_profile(&config),
            ProfileAction::Set { field, value } => commands::set_profile_field(&config, &field, &value),
            ProfileAction::Clear => commands::clear_profile(&config),
        },
        Commands::Context { action } => match action.unwrap_or(ContextAction::Show) {
            ContextAction::Show => commands::show_context(&config),
            ContextAction::Clear => commands::clear_context(&config),
        },
        Commands::Config { action } => match action {
            ConfigAction::Init => commands::init_config(&config, &config_path),
            ConfigAction::Show => commands::show_config(&config),
        },
    }
}
