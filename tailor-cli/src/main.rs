use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tailor_core::{ChatManager, Config, KnowledgeBase, QueryOutcome, Retriever, Strategy};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tailor")]
#[command(about = "Hybrid retrieval and tool-calling assistant", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Ingest every document under a directory")]
    Index {
        #[arg(help = "Directory to ingest (defaults to storage.docs_path)")]
        dir: Option<PathBuf>,
    },

    #[command(about = "Search the knowledge base")]
    Search {
        query: String,

        #[arg(long, value_enum, default_value_t = Mode::Hybrid)]
        mode: Mode,

        #[arg(short, help = "Number of results (defaults to rag.semantic_k)")]
        k: Option<usize>,

        #[arg(long, help = "Lexical candidates kept before re-ranking")]
        fuzzy_k: Option<usize>,
    },

    #[command(about = "Ask a question, letting the model use tools")]
    Ask { question: String },

    #[command(about = "Configuration commands")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Set the chat model")]
    SetModel {
        #[arg(help = "Model name (e.g., 'gpt-4o-mini' or 'llama3.2:latest')")]
        model: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Lexical,
    Semantic,
    Hybrid,
}

impl From<Mode> for Strategy {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Lexical => Strategy::Lexical,
            Mode::Semantic => Strategy::Semantic,
            Mode::Hybrid => Strategy::Hybrid,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index { dir } => index(&cli.config, dir).await,
        Commands::Search {
            query,
            mode,
            k,
            fuzzy_k,
        } => search(&cli.config, &query, mode.into(), k, fuzzy_k).await,
        Commands::Ask { question } => ask(&cli.config, &question).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => show_config(&cli.config),
            ConfigCommands::SetModel { model } => set_model(&cli.config, &model),
        },
    }
}

/// Load `path` when it exists, defaults otherwise.
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        return Config::load(path).with_context(|| format!("Failed to load {}", path.display()));
    }

    let config = Config::default();
    config.validate().context("Default configuration is invalid")?;
    Ok(config)
}

async fn open_knowledge_base(config: &Config) -> Result<KnowledgeBase> {
    KnowledgeBase::from_config(config)
        .await
        .context("Failed to open knowledge base")
}

async fn index(config_path: &Path, dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let dir = dir.unwrap_or_else(|| config.storage.docs_path.clone());
    let kb = open_knowledge_base(&config).await?;

    println!("{} Indexing {}...", "→".blue(), dir.display());
    let report = kb
        .ingest_directory(&dir)
        .await
        .with_context(|| format!("Failed to index {}", dir.display()))?;

    println!(
        "{} {} documents, {} new sources",
        "✓".green().bold(),
        report.documents,
        report.new_sources
    );
    println!("  Lexical chunks added:  {}", report.lexical_chunks);
    println!("  Semantic chunks added: {}", report.semantic_chunks);
    println!("  Total chunks:          {}", kb.count().await);

    Ok(())
}

async fn search(
    config_path: &Path,
    query: &str,
    strategy: Strategy,
    k: Option<usize>,
    fuzzy_k: Option<usize>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(fuzzy_k) = fuzzy_k {
        config.rag.fuzzy_k = fuzzy_k;
    }
    let k = k.unwrap_or(config.rag.semantic_k);
    let kb = open_knowledge_base(&config).await?;

    let corrected = kb.correct(query).await;
    if corrected != query.to_lowercase() {
        println!("{} {}", "Searching for:".dimmed(), corrected.cyan());
    }

    let results = kb
        .retriever(strategy)
        .retrieve(query, k)
        .await
        .context("Search failed")?;

    if results.is_empty() {
        println!("{}", "No matching passages.".yellow());
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{} {} {}",
            format!("[{}]", i + 1).bold(),
            result.chunk.id.cyan(),
            format!("({} {:.4})", result.strategy, result.score).dimmed()
        );
        println!("    {}", result.content().trim());
    }

    Ok(())
}

async fn ask(config_path: &Path, question: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let kb = Arc::new(open_knowledge_base(&config).await?);
    let registry = Arc::new(tailor_std::standard_registry(kb.clone()));

    let manager = ChatManager::from_config(&config, registry)
        .context("Failed to create chat manager")?
        .with_knowledge_base(kb);

    match manager.query(question).await.context("Query failed")? {
        QueryOutcome::Answer(answer) => println!("{}", answer),
        QueryOutcome::Exceeded { tool_call_count } => println!(
            "{} Gave up after {} tool rounds without an answer",
            "!".yellow().bold(),
            tool_call_count
        ),
    }

    Ok(())
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Provider:       {:?}", config.llm.provider);
    println!("  Model:          {}", config.llm.model.cyan());
    println!("  Base URL:       {}", config.llm.base_url);
    println!("  Temperature:    {}", config.llm.temperature);
    println!("  Context Window: {}", config.llm.context_window);
    println!("  Max Retries:    {}", config.llm.max_retries);
    println!("  Max Tool Calls: {}", config.llm.max_tool_calls);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Embedding Model: {}", config.rag.embedding.model.cyan());
    println!("  Chunk Size:      {}", config.rag.chunk_size);
    println!("  Chunk Overlap:   {}", config.rag.chunk_overlap);
    println!("  Fuzzy K:         {}", config.rag.fuzzy_k);
    println!("  Semantic K:      {}", config.rag.semantic_k);
    println!("  Allow Degraded:  {}", config.rag.allow_degraded);
    println!();
    println!("{}", "Storage:".bold());
    println!("  Data:            {}", config.storage.data_path.display());
    println!("  Documents:       {}", config.storage.docs_path.display());

    Ok(())
}

fn set_model(config_path: &Path, model: &str) -> Result<()> {
    let content = std::fs::read_to_string(config_path).context("Failed to read config file")?;

    let mut config: serde_yaml::Value = serde_yaml::from_str(&content).context("Failed to parse config")?;
    let root = config
        .as_mapping_mut()
        .context("Config file must be a YAML mapping")?;
    let llm = root
        .entry(serde_yaml::Value::String("llm".to_string()))
        .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
    let llm = llm.as_mapping_mut().context("`llm` must be a YAML mapping")?;
    llm.insert(
        serde_yaml::Value::String("model".to_string()),
        serde_yaml::Value::String(model.to_string()),
    );

    let updated_content = serde_yaml::to_string(&config).context("Failed to serialize config")?;
    std::fs::write(config_path, updated_content).context("Failed to write config file")?;

    println!("{} Model updated to: {}", "✓".green().bold(), model.cyan());

    Ok(())
}
