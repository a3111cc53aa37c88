//! CLI bootstrap - Initialize the Scriptlink stack.
//!
//! `initialize` builds the `CliContext` used by one-shot, batch and REPL
//! modes. Every missing piece (table, column mapping, API key) is fatal here.
//! `initialize_service` is the lenient variant the HTTP server uses: it keeps
//! going without a dataset or generator and lets each turn report the
//! not-initialized reply instead.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::ai::{create_backend, BackendConfig, LlmPlanGenerator, LlmProvider, PlanGenerator};
use crate::chat::{ChatService, ChatSession, Dataset};
use crate::query::aliases::ColumnAliases;
use crate::query::executor::PlanExecutor;
use crate::settings::{default_model_for, get_with_env_fallback, ScriptlinkSettings, SettingsManager};

use super::args::Args;

/// Context for CLI execution: one service and the single conversation the
/// CLI drives through it.
pub struct CliContext {
    /// Shared turn pipeline
    pub service: ChatService,

    /// The conversation; batch files and the REPL reuse it across turns
    pub session: ChatSession,

    /// Settings manager
    pub settings_manager: Arc<SettingsManager>,

    /// Command-line arguments
    pub args: Args,
}

/// Initialize the CLI context. Fails when the table cannot be loaded, no
/// conceptual column maps onto it, or the provider has no API key.
pub async fn initialize(args: &Args) -> Result<CliContext> {
    let (settings_manager, settings) = prepare(args).await?;

    let dataset = load_dataset(args, &settings)?;
    if dataset.aliases().is_empty() {
        anyhow::bail!(
            "None of the known column names were found in {}. Check [columns.aliases] in {}",
            data_path(args, &settings).display(),
            settings_manager.path().display()
        );
    }

    let generator = create_generator(args, &settings)?;
    let service = build_service(args, &settings, Some(Arc::new(dataset)), Some(generator));
    let session = service.new_session();

    Ok(CliContext {
        service,
        session,
        settings_manager,
        args: args.clone(),
    })
}

/// Initialize a service that tolerates a missing table or backend.
pub async fn initialize_service(args: &Args) -> Result<(ChatService, ScriptlinkSettings)> {
    let (_, settings) = prepare(args).await?;

    let dataset = match load_dataset(args, &settings) {
        Ok(dataset) => Some(Arc::new(dataset)),
        Err(e) => {
            tracing::error!("Registry table unavailable: {:#}", e);
            None
        }
    };
    let generator = match create_generator(args, &settings) {
        Ok(generator) => Some(generator),
        Err(e) => {
            tracing::error!("Language model unavailable: {:#}", e);
            None
        }
    };

    let service = build_service(args, &settings, dataset, generator);
    if !service.is_initialized() {
        tracing::warn!("Starting without a usable dataset or language model; turns will report not initialized");
    }
    Ok((service, settings))
}

/// Load `.env`, settings and logging, in that order.
async fn prepare(args: &Args) -> Result<(Arc<SettingsManager>, ScriptlinkSettings)> {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Failed to load .env file: {}", e);
        }
    }

    let settings_manager = Arc::new(
        match &args.config {
            Some(path) => SettingsManager::with_path(path.clone()).await,
            None => SettingsManager::new().await,
        }
        .context("Failed to initialize settings manager")?,
    );

    // Only the default location gets a first-run template.
    if args.config.is_none() {
        if let Err(e) = settings_manager.ensure_settings_file().await {
            eprintln!("Failed to create settings template: {}", e);
        }
    }

    let settings = settings_manager.get().await;
    init_logging(args, &settings)?;

    tracing::debug!("Settings loaded from {}", settings_manager.path().display());
    Ok((settings_manager, settings))
}

fn init_logging(args: &Args, settings: &ScriptlinkSettings) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        settings.advanced.log_level.as_str()
    };
    let directive: tracing_subscriber::filter::Directive = format!("scriptlink={}", log_level)
        .parse()
        .with_context(|| format!("Invalid log level '{}'", log_level))?;

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .try_init();
    Ok(())
}

fn data_path(args: &Args, settings: &ScriptlinkSettings) -> PathBuf {
    args.data
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.data.path))
}

fn column_aliases(settings: &ScriptlinkSettings) -> ColumnAliases {
    ColumnAliases::default().merged(&settings.columns.aliases)
}

fn load_dataset(args: &Args, settings: &ScriptlinkSettings) -> Result<Dataset> {
    let path = data_path(args, settings);
    let sheet = args.sheet.as_deref().or(settings.data.sheet.as_deref());

    Dataset::load(&path, sheet, &column_aliases(settings))
        .with_context(|| format!("Failed to load registry table from {}", path.display()))
}

/// Resolve provider, model and key (CLI flag > settings > env > default)
/// and build the plan generator.
fn create_generator(args: &Args, settings: &ScriptlinkSettings) -> Result<Arc<dyn PlanGenerator>> {
    let provider: LlmProvider = args
        .provider
        .as_deref()
        .unwrap_or(settings.ai.provider.as_str())
        .parse()?;

    let model = args
        .model
        .clone()
        .or_else(|| settings.ai.model.clone())
        .unwrap_or_else(|| default_model_for(provider.as_str()).to_string());

    let config = BackendConfig {
        provider,
        model,
        api_key: resolve_api_key(settings, provider, args),
        base_url: base_url(settings, provider),
        temperature: settings.ai.temperature,
    };

    tracing::info!("Using {} model '{}'", config.provider, config.model);
    let backend = create_backend(&config)?;
    Ok(Arc::new(LlmPlanGenerator::new(backend)))
}

/// Resolve API key from CLI args, settings, or environment variables.
fn resolve_api_key(settings: &ScriptlinkSettings, provider: LlmProvider, args: &Args) -> Option<String> {
    if let Some(ref key) = args.api_key {
        return Some(key.clone());
    }

    match provider {
        LlmProvider::Gemini => get_with_env_fallback(
            &settings.ai.gemini.api_key,
            &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            None,
        ),
        LlmProvider::OpenAi => {
            get_with_env_fallback(&settings.ai.openai.api_key, &["OPENAI_API_KEY"], None)
        }
        LlmProvider::Ollama => None,
    }
}

fn base_url(settings: &ScriptlinkSettings, provider: LlmProvider) -> Option<String> {
    match provider {
        LlmProvider::Gemini => settings.ai.gemini.base_url.clone(),
        LlmProvider::OpenAi => settings.ai.openai.base_url.clone(),
        LlmProvider::Ollama => Some(settings.ai.ollama.base_url.clone()),
    }
}

fn build_service(
    args: &Args,
    settings: &ScriptlinkSettings,
    dataset: Option<Arc<Dataset>>,
    generator: Option<Arc<dyn PlanGenerator>>,
) -> ChatService {
    let timeout = args
        .timeout()
        .unwrap_or(Duration::from_secs(settings.ai.timeout_secs));
    let executor = PlanExecutor::new().with_default_display(settings.columns.default_display.clone());

    ChatService::new(dataset, generator)
        .with_timeout(timeout)
        .with_max_history(settings.ai.max_history_messages)
        .with_executor(executor)
}
