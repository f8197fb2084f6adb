//! anymind: one question, every model, one answer
//!
//! Usage:
//!   anymind                               → chat REPL
//!   anymind ask "mensaje" -p groq -p mistral
//!   anymind classify "texto"              → ranking as JSON
//!   anymind providers | status            → provider table, self-analysis
//!   anymind memory <list|search|write|…>  → dynamic memory CRUD
//!   anymind personality <show|add-trait|…>
//!   anymind dump-config                   → effective config as TOML

use anymind_consciousness::Orchestrator;
use anymind_core::{AppConfig, ProviderId};
use anymind_memory::{MemoryCategory, MemoryRecord, MemoryUpdate, SearchQuery};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "anymind",
    about = "Personal assistant that asks every configured model and keeps the best answer",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file (TOML). Default: <data-dir>/config.toml
    #[arg(long, global = true)]
    config: Option<String>,

    /// Directory for memory and personality files (overrides config)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat in the terminal (default)
    Chat,
    /// Ask a single question and exit
    Ask {
        message: Vec<String>,
        /// Only consult these providers (repeatable)
        #[arg(short, long)]
        provider: Vec<String>,
    },
    /// Show how a message would be routed
    Classify { text: Vec<String> },
    /// List every provider and whether it is usable
    Providers,
    /// Self-analysis report
    Status,
    /// Dynamic memory
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },
    /// Self-generated personality
    Personality {
        #[command(subcommand)]
        action: PersonalityCommand,
    },
    /// Print the effective configuration as TOML
    DumpConfig,
}

#[derive(Subcommand)]
enum MemoryCommand {
    List {
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    Search {
        text: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        tag: Vec<String>,
        #[arg(long, default_value_t = 1)]
        min_importance: u8,
    },
    Write {
        content: Vec<String>,
        #[arg(short, long, default_value = "facts")]
        category: String,
        #[arg(short, long, default_value_t = 5)]
        importance: u8,
        #[arg(short, long)]
        tag: Vec<String>,
    },
    Read { id: String },
    Update {
        id: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        importance: Option<u8>,
        /// Replaces every tag when given
        #[arg(short, long)]
        tag: Vec<String>,
    },
    Delete { id: String },
    Stats,
    Export { path: PathBuf },
    Import { path: PathBuf },
}

#[derive(Subcommand)]
enum PersonalityCommand {
    Show,
    AddTrait {
        name: String,
        description: String,
        #[arg(short, long, default_value_t = 5)]
        strength: u8,
    },
    AddValue {
        value: String,
        #[arg(short, long, default_value_t = 5)]
        importance: u8,
    },
    /// Print the system prompt the personality currently produces
    Prompt,
    Export { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    let config = load_config(&cli);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::DumpConfig => print!("{}", config.to_toml()),
        Commands::Classify { text } => {
            let orchestrator = Orchestrator::open(&config)?;
            let result = orchestrator.classify(&text.join(" "));
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Providers => {
            let orchestrator = Orchestrator::open(&config)?;
            print_providers(&orchestrator);
        }
        Commands::Status => {
            let orchestrator = Orchestrator::open(&config)?;
            println!("{}", orchestrator.status_report());
        }
        Commands::Ask { message, provider } => {
            let orchestrator = Orchestrator::open(&config)?;
            let allowed: Vec<ProviderId> = provider.into_iter().map(ProviderId::from).collect();
            let allowed = (!allowed.is_empty()).then_some(allowed.as_slice());
            ask(&orchestrator, &message.join(" "), allowed).await;
        }
        Commands::Memory { action } => {
            let orchestrator = Orchestrator::open(&config)?;
            run_memory(&orchestrator, action)?;
        }
        Commands::Personality { action } => {
            let orchestrator = Orchestrator::open(&config)?;
            run_personality(&orchestrator, action)?;
        }
        Commands::Chat => {
            let orchestrator = Orchestrator::open(&config)?;
            chat(&orchestrator).await?;
        }
    }

    Ok(())
}

fn init_tracing(log_file: Option<&str>) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let path = expand_tilde(path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            std::fs::create_dir_all(dir)?;
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("--log-file needs a file name"))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anymind=info,anymind_consciousness=info,anymind_llm=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(guard)
}

fn load_config(cli: &Cli) -> AppConfig {
    let data_dir = cli.data_dir.as_deref().map(expand_tilde);
    let config_path = cli.config.as_deref().map(expand_tilde).unwrap_or_else(|| {
        data_dir
            .clone()
            .unwrap_or_else(anymind_core::default_data_dir)
            .join("config.toml")
    });

    let mut config = AppConfig::load(&config_path);
    config.apply_env();
    if let Some(dir) = data_dir {
        config.memory.data_dir = dir;
    }
    config
}

async fn ask(orchestrator: &Orchestrator, message: &str, allowed: Option<&[ProviderId]>) {
    let result = orchestrator.synthesize(message, allowed).await;
    println!("{}", result.text);
    if let Some(analysis) = &result.analysis {
        eprintln!(
            "[{} | {}/{} answered | {}]",
            analysis.selected_provider, analysis.success_count, analysis.total_responses, analysis.query_type
        );
    }
    for id in &result.newly_blocked {
        eprintln!("[{} hit its quota and is paused]", id);
    }
}

async fn chat(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    let name = orchestrator.stores().personality.snapshot().core_identity.name;
    println!("{} v{}. Commands: /memory /status /providers /personality, exit to quit", name, env!("CARGO_PKG_VERSION"));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"\nyou> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" | "salir" => break,
            "/memory" => {
                let compressed = orchestrator.stores().compressed.render_full_context();
                if compressed.is_empty() {
                    println!("(compressed memory is empty)");
                } else {
                    println!("{}", compressed);
                }
                println!("{}", orchestrator.stores().dynamic.context_summary(20)?);
            }
            "/status" => println!("{}", orchestrator.status_report()),
            "/providers" => print_providers(orchestrator),
            "/personality" => println!("{}", orchestrator.personality_summary()),
            message => {
                let result = orchestrator.synthesize(message, None).await;
                let from = result
                    .analysis
                    .as_ref()
                    .map(|a| a.selected_provider.to_string())
                    .unwrap_or_else(|| "-".into());
                println!("\n{} [{}]> {}", name, from, result.text);
            }
        }
    }
    Ok(())
}

fn print_providers(orchestrator: &Orchestrator) {
    println!("{:<20} {:<8} {:<11} {:<10} MODEL", "PROVIDER", "ENABLED", "CONFIGURED", "COST");
    for status in orchestrator.providers() {
        println!(
            "{:<20} {:<8} {:<11} {:<10} {}",
            status.id.as_str(),
            if status.enabled { "yes" } else { "no" },
            if status.configured { "yes" } else { "no" },
            status.cost_tier,
            status.model
        );
    }
}

fn run_memory(orchestrator: &Orchestrator, action: MemoryCommand) -> anyhow::Result<()> {
    let dynamic = &orchestrator.stores().dynamic;
    match action {
        MemoryCommand::List { category, limit } => {
            let category = category.as_deref().map(str::parse::<MemoryCategory>).transpose()?;
            let mut records = dynamic.all(category);
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            records.iter().take(limit).for_each(print_record);
        }
        MemoryCommand::Search { text, category, tag, min_importance } => {
            let query = SearchQuery {
                text,
                category: category.as_deref().map(str::parse::<MemoryCategory>).transpose()?,
                tags: tag,
                min_importance,
            };
            let hits = orchestrator.recall_memory(&query)?;
            if hits.is_empty() {
                println!("No memories match.");
            }
            hits.iter().for_each(print_record);
        }
        MemoryCommand::Write { content, category, importance, tag } => {
            let category: MemoryCategory = category.parse()?;
            let id = orchestrator.save_memory(&content.join(" "), category, importance, tag)?;
            println!("{}", id);
        }
        MemoryCommand::Read { id } => match dynamic.read(&id)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => anyhow::bail!("no memory with id {}", id),
        },
        MemoryCommand::Update { id, content, importance, tag } => {
            let update = MemoryUpdate {
                content,
                importance,
                tags: (!tag.is_empty()).then_some(tag),
            };
            let record = dynamic.update(&id, update)?;
            print_record(&record);
        }
        MemoryCommand::Delete { id } => {
            let record = dynamic.delete(&id)?;
            println!("Deleted {}", record.id);
        }
        MemoryCommand::Stats => {
            println!("{}", serde_json::to_string_pretty(&dynamic.stats())?);
            println!("{}", serde_json::to_string_pretty(&orchestrator.stores().compressed.stats())?);
            println!("{}", serde_json::to_string_pretty(&orchestrator.consciousness_summary())?);
        }
        MemoryCommand::Export { path } => {
            dynamic.export(&expand_tilde(&path.to_string_lossy()))?;
            println!("Exported {} memories", dynamic.len());
        }
        MemoryCommand::Import { path } => {
            let added = dynamic.import(&expand_tilde(&path.to_string_lossy()))?;
            println!("Imported {} new memories", added);
        }
    }
    Ok(())
}

fn print_record(record: &MemoryRecord) {
    let tags = if record.tags.is_empty() {
        String::new()
    } else {
        format!(" #{}", record.tags.join(" #"))
    };
    println!(
        "{}  [{}] {}/10  {}{}",
        record.id, record.category, record.importance, record.content, tags
    );
}

fn run_personality(orchestrator: &Orchestrator, action: PersonalityCommand) -> anyhow::Result<()> {
    let personality = &orchestrator.stores().personality;
    match action {
        PersonalityCommand::Show => println!("{}", orchestrator.personality_summary()),
        PersonalityCommand::AddTrait { name, description, strength } => {
            personality.add_trait(&name, &description, strength)?;
            println!("Trait {} added", name);
        }
        PersonalityCommand::AddValue { value, importance } => {
            if personality.add_value(&value, importance)? {
                println!("Value adopted");
            } else {
                println!("Already held: {}", value);
            }
        }
        PersonalityCommand::Prompt => println!("{}", personality.system_prompt()),
        PersonalityCommand::Export { path } => {
            personality.export(&expand_tilde(&path.to_string_lossy()))?;
        }
    }
    Ok(())
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
