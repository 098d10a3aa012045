use querykit::cli::{self, render, Cli, Commands, ConfigAction, DbAction, DocsAction, SqlAction};
use querykit::config::{env, Config};
use querykit::documents::{self, DocumentQueryEngine, IngestRequest, NO_INDEX_MESSAGE};
use querykit::error::{QueryError, Result};
use querykit::runtime::ExecutionContext;
use querykit::sql::{error_string, InventoryAssistant, InventoryDatabase, ERROR_PREFIX, SAMPLE_QUESTIONS};
use querykit::store::Trust;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    if let Err(e) = run(cli) {
        eprintln!("{}", render::fatal_error(&e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);
    env::load_dotenv();

    match cli.command {
        Commands::Sql { action } => cmd_sql(cli.config, action)?,
        Commands::Docs { action } => cmd_docs(cli.config, action)?,
        Commands::Db { action } => cmd_db(action)?,
        Commands::Config { action } => cmd_config(cli.config, action)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "querykit=debug" } else { "querykit=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_sql(config_path: Option<PathBuf>, action: SqlAction) -> Result<()> {
    match action {
        SqlAction::Samples => {
            println!("{}", render::samples(SAMPLE_QUESTIONS));
        }
        SqlAction::Ask {
            question,
            sample,
            top_k,
        } => {
            let question = cli::resolve_question(question.as_deref(), sample)?;
            let config = Config::load_or_default(config_path.as_deref())?;
            let context = Arc::new(ExecutionContext::new());
            let mut assistant = InventoryAssistant::from_config(&config, context)?;

            let top_k = top_k.unwrap_or_else(|| assistant.default_top_k());
            let answer = assistant.query_inventory(&question, top_k);
            if answer.starts_with(ERROR_PREFIX) {
                eprintln!("{}", answer);
            } else {
                println!("{}", render::sql_answer(&question, &answer));
            }
        }
    }
    Ok(())
}

fn cmd_docs(config_path: Option<PathBuf>, action: DocsAction) -> Result<()> {
    // Sources are checked before any credentials are read
    let request = match &action {
        DocsAction::Ask { index: Some(_), .. } => None,
        DocsAction::Ask { sources, .. } if sources.request().is_none() => {
            eprintln!("{}", NO_INDEX_MESSAGE);
            return Ok(());
        }
        DocsAction::Ask { sources, .. } | DocsAction::Ingest { sources, .. } => {
            match sources.checked_request() {
                Ok(request) => Some(request),
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    tracing::warn!("Rejected sources: {}", e);
                    eprintln!("{}", error_string(&e));
                    return Ok(());
                }
            }
        }
    };

    let config = Config::load_or_default(config_path.as_deref())?;
    let context = Arc::new(ExecutionContext::new());
    let mut engine = DocumentQueryEngine::from_config(&config, Arc::clone(&context))?;

    match action {
        DocsAction::Ask {
            question,
            index,
            trust_index,
            save,
            ..
        } => {
            if let Some(dir) = index {
                let trust = if trust_index {
                    Trust::TrustSerialized
                } else {
                    Trust::Refuse
                };
                engine.load_index(&dir, trust)?;
            } else if let Some(request) = &request {
                if !ingest(&config, context, &mut engine, request)? {
                    return Ok(());
                }
                if let Some(dir) = save {
                    save_index(&engine, &dir)?;
                }
            }

            let answer = engine.ask(&question);
            if answer.is_error() {
                eprintln!("{}", answer.answer);
            } else {
                println!(
                    "{}",
                    render::document_answer(&answer, config.documents.preview_chars)
                );
            }
        }
        DocsAction::Ingest { save, .. } => {
            if let Some(request) = &request {
                if ingest(&config, context, &mut engine, request)? {
                    save_index(&engine, &save)?;
                }
            }
        }
    }
    Ok(())
}

/// Ingest a request; failures are reported and leave the engine unchanged.
/// Returns whether ingestion succeeded.
fn ingest(
    config: &Config,
    context: Arc<ExecutionContext>,
    engine: &mut DocumentQueryEngine,
    request: &IngestRequest,
) -> Result<bool> {
    let loader = documents::loader_from_config(config, context)?;
    match engine.process(&loader, request) {
        Ok(count) => {
            println!("Indexed {} chunk(s)", count);
            Ok(true)
        }
        Err(e) if e.is_configuration() => Err(e),
        Err(e) => {
            tracing::warn!("Ingestion failed: {}", e);
            eprintln!("{}", error_string(&e));
            Ok(false)
        }
    }
}

fn save_index(engine: &DocumentQueryEngine, dir: &Path) -> Result<()> {
    let manifest = engine.save_index(dir)?;
    println!("{}", render::manifest(&manifest));
    println!("Saved to {}", dir.display());
    Ok(())
}

fn cmd_db(action: DbAction) -> Result<()> {
    match action {
        DbAction::Init { path, force } => {
            InventoryDatabase::init_file(&path, force)?;
            println!("✓ Demo inventory created at: {}", path.display());
            println!("  Point DATABASE_URL at sqlite://{} to use it", path.display());
        }
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load_or_default(config_path.as_deref())?;
            let text = toml::to_string_pretty(&config)?;
            println!("{}", text);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    QueryError::io(e, format!("Failed to create config directory: {:?}", parent))
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }
    Ok(())
}
