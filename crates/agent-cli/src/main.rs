use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent_config::{settings_path_in, ProviderSettings, Settings, SettingsStore};
use agent_core::{ContextAssembler, ContextOptions, ListingMode};
use agent_llm::{
    default_registry, LLMError, MockAIProvider, OllamaProvider, OpenAIProvider,
    ProviderRegistry,
};
use agent_orchestrator::Orchestrator;
use agent_tools::{ApprovalWorkflow, LocalFs, ProjectFs, ShellEvent, ShellSessions};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::mpsc;

mod review;

#[derive(Parser)]
#[command(name = "agent-desk")]
#[command(about = "AI coding assistant with a human approval gate")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Project root
    #[arg(long, short = 'C', default_value = ".")]
    project: PathBuf,

    /// Directory holding settings.json
    #[arg(long, env = "AGENT_DESK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// List project files recursively in the prompt context
    #[arg(long)]
    recursive_context: bool,

    /// Use package.json as project metadata when .vibe.json is absent
    #[arg(long)]
    metadata_fallback: bool,

    /// Ollama generate endpoint
    #[arg(long, env = "OLLAMA_ENDPOINT")]
    ollama_endpoint: Option<String>,

    /// OpenAI chat completions endpoint
    #[arg(long, env = "OPENAI_ENDPOINT")]
    openai_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session
    Chat {
        /// File open in the editor, relative to the project root
        #[arg(long, short)]
        file: Option<String>,
    },
    /// Send a single prompt and print the structured response
    Ask {
        prompt: String,
        #[arg(long, short)]
        file: Option<String>,
    },
    /// Inspect or change provider settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Print the project file listing
    Files,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show the current settings
    Show,
    /// Select the active provider
    Use { id: String },
    /// Update a provider's configuration
    Set {
        id: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
    },
}

fn init_logging(debug: bool) {
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::init();
        return;
    }
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn build_registry(cli: &Cli) -> ProviderRegistry {
    if cli.ollama_endpoint.is_none() && cli.openai_endpoint.is_none() {
        return default_registry();
    }

    let mut ollama = OllamaProvider::new();
    if let Some(endpoint) = &cli.ollama_endpoint {
        ollama = ollama.with_endpoint(endpoint);
    }
    let mut openai = OpenAIProvider::new();
    if let Some(endpoint) = &cli.openai_endpoint {
        openai = openai.with_endpoint(endpoint);
    }

    let mut registry = ProviderRegistry::new();
    registry.register(ollama);
    registry.register(openai);
    registry.register(MockAIProvider::new());
    registry
}

fn context_options(cli: &Cli) -> ContextOptions {
    let listing = if cli.recursive_context {
        ListingMode::Recursive {
            max_depth: Some(agent_core::listing::DEFAULT_MAX_DEPTH),
        }
    } else {
        ListingMode::Flat
    };
    ContextOptions::default()
        .with_listing(listing)
        .with_metadata_fallback(cli.metadata_fallback)
}

fn mask_key(key: Option<&str>) -> String {
    match key {
        None => "(not set)".to_string(),
        Some("") => "(empty)".to_string(),
        Some(key) if key.chars().count() <= 4 => "****".to_string(),
        Some(key) => {
            let tail: String = key.chars().skip(key.chars().count() - 4).collect();
            format!("****{}", tail)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let project_root = std::fs::canonicalize(&cli.project)
        .with_context(|| format!("Project root {} not found", cli.project.display()))?;

    let store = Arc::new(match &cli.data_dir {
        Some(dir) => SettingsStore::new(settings_path_in(dir)),
        None => SettingsStore::open_default(),
    });
    log::debug!("Settings file: {}", store.path().display());

    let orchestrator = Orchestrator::new(
        build_registry(&cli),
        store.clone(),
        ContextAssembler::new(context_options(&cli)),
    );
    let applied = orchestrator
        .initialize()
        .await
        .context("Failed to load settings")?;
    warn_rejected(&applied.rejected);

    match cli.command {
        Commands::Chat { file } => run_chat(&orchestrator, &project_root, file).await,
        Commands::Ask { prompt, file } => {
            let response = orchestrator
                .handle_prompt(&prompt, file.as_deref(), &project_root)
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Commands::Settings { action } => run_settings(&orchestrator, &store, action).await,
        Commands::Files => {
            for file in LocalFs.list_files(&project_root).await? {
                println!("{}", file);
            }
            Ok(())
        }
    }
}

async fn run_settings(
    orchestrator: &Orchestrator,
    store: &SettingsStore,
    action: SettingsAction,
) -> anyhow::Result<()> {
    let mut settings = orchestrator.get_settings().await?;
    match action {
        SettingsAction::Show => {
            print_settings(orchestrator, store, &settings).await;
            return Ok(());
        }
        SettingsAction::Use { id } => {
            let providers = orchestrator.providers().await;
            if !providers.iter().any(|p| p.id == id) {
                let ids: Vec<&str> = providers.iter().map(|p| p.id.as_str()).collect();
                bail!("Unknown provider '{}'. Available: {}", id, ids.join(", "));
            }
            settings.active_provider_id = id;
        }
        SettingsAction::Set { id, model, api_key } => {
            let entry: &mut ProviderSettings = settings.provider_mut(&id);
            if let Some(model) = model {
                entry.model = model;
            }
            if let Some(api_key) = api_key {
                entry.api_key = Some(api_key);
            }
        }
    }

    let rejected = orchestrator.save_settings(settings.clone()).await?;
    println!("{}", "✅ Settings saved".green());
    warn_rejected(&rejected);
    print_settings(orchestrator, store, &settings).await;
    Ok(())
}

fn warn_rejected(rejected: &[LLMError]) {
    for error in rejected {
        eprintln!("{} {}", "⚠️  Provider settings not applied:".yellow(), error);
    }
}

async fn print_settings(orchestrator: &Orchestrator, store: &SettingsStore, settings: &Settings) {
    println!("{} {}", "Settings file:".dimmed(), store.path().display());
    let active = orchestrator.active_provider_id().await;
    for provider in orchestrator.providers().await {
        let marker = if active.as_deref() == Some(provider.id.as_str()) {
            "*".green().bold()
        } else {
            " ".normal()
        };
        let config = settings.provider(&provider.id);
        let model = config.map(|c| c.model.as_str()).unwrap_or("");
        let key = config.and_then(|c| c.api_key.as_deref());
        print!("{} {} ({})  model: {}", marker, provider.id.bold(), provider.name, model);
        if key.is_some() {
            print!("  apiKey: {}", mask_key(key));
        }
        println!();
    }
}

fn spawn_shell_printer(mut events: mpsc::UnboundedReceiver<ShellEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ShellEvent::Data { data, .. } => {
                    print!("{}", data.dimmed());
                    let _ = io::stdout().flush();
                }
                ShellEvent::Exit { id, code } => {
                    println!(
                        "{}",
                        format!("[shell {} exited: {:?}]", id, code).dimmed()
                    );
                }
            }
        }
    });
}

async fn run_chat(
    orchestrator: &Orchestrator,
    project_root: &Path,
    mut active_file: Option<String>,
) -> anyhow::Result<()> {
    let (sessions, events) = ShellSessions::new();
    spawn_shell_printer(events);

    println!("{}", "🤖 Agent Desk".cyan().bold());
    println!("{}", format!("Project: {}", project_root.display()).dimmed());
    if let Some(id) = orchestrator.active_provider_id().await {
        println!("{}", format!("Provider: {}", id).dimmed());
    }
    println!(
        "{}",
        "Type 'exit' to leave, '/file <path>' to set the active file, '/clear' to reset history"
            .dimmed()
    );
    println!();

    loop {
        print!("{} ", "You:".cyan().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("{}", "👋 Goodbye!".cyan());
            break;
        }
        if input.is_empty() {
            continue;
        }
        if input == "/clear" {
            orchestrator.clear_history().await;
            println!("{}", "History cleared.".dimmed());
            continue;
        }
        if let Some(path) = input.strip_prefix("/file") {
            let path = path.trim();
            active_file = (!path.is_empty()).then(|| path.to_string());
            println!(
                "{}",
                format!("Active file: {}", active_file.as_deref().unwrap_or("(none)")).dimmed()
            );
            continue;
        }

        let response = match orchestrator
            .handle_prompt(input, active_file.as_deref(), project_root)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                println!("{}", format!("❌ Error: {}", e).red());
                continue;
            }
        };

        println!("{} {}", "Assistant:".green().bold(), response.summary);
        let mut workflow = ApprovalWorkflow::new(project_root, Arc::new(LocalFs))
            .with_refresh_hook(Arc::new(|| log::debug!("Project files changed")));
        workflow.propose(&response);
        review::review_response(&mut workflow, &sessions).await?;
        println!();
    }

    for id in sessions.session_ids() {
        sessions.kill(&id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_key_keeps_last_four() {
        assert_eq!(mask_key(None), "(not set)");
        assert_eq!(mask_key(Some("")), "(empty)");
        assert_eq!(mask_key(Some("abc")), "****");
        assert_eq!(mask_key(Some("sk-123456")), "****3456");
    }

    #[test]
    fn cli_parses_settings_set() {
        let cli = Cli::try_parse_from([
            "agent-desk",
            "settings",
            "set",
            "openai",
            "--model",
            "gpt-4o",
            "--api-key",
            "sk-x",
        ])
        .unwrap();
        match cli.command {
            Commands::Settings {
                action: SettingsAction::Set { id, model, api_key },
            } => {
                assert_eq!(id, "openai");
                assert_eq!(model.as_deref(), Some("gpt-4o"));
                assert_eq!(api_key.as_deref(), Some("sk-x"));
            }
            _ => panic!("expected settings set"),
        }
    }

    #[test]
    fn recursive_flag_selects_recursive_listing() {
        let cli = Cli::try_parse_from(["agent-desk", "--recursive-context", "files"]).unwrap();
        assert!(matches!(
            context_options(&cli).listing,
            ListingMode::Recursive { max_depth: Some(3) }
        ));
    }
}
