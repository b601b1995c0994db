//! `docsage ask`: answer one documentation question.

use std::sync::Arc;

use docsage_agent::{Orchestrator, RetrievalSource, RunOutcome};
use docsage_config::AppConfig;
use docsage_core::{DomainEvent, EventBus, Provider, RefinementKind, RetrievalMode, RunStatus};
use docsage_providers::{
    build_from_config, resolve_model, GatedProvider, Generator, RateGate, TokenBucketGate,
};
use docsage_retrieval::{LocalIndex, TavilySearch};
use docsage_telemetry::{AnswerDocument, JsonFileSink, MemorySink, RunArtifacts, TraceSink};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Providers that run without an API key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm"];

/// Command-line overrides for one run.
pub struct AskOptions {
    pub question: String,
    pub mode: Option<RetrievalMode>,
    pub save: bool,
    pub max_retrieval_attempts: Option<u32>,
    pub max_quality_attempts: Option<u32>,
    pub max_iterations: Option<u32>,
    pub threshold: Option<u8>,
    pub verbose: bool,
}

impl AskOptions {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(mode) = self.mode {
            config.retrieval.mode = mode;
        }
        if let Some(n) = self.max_retrieval_attempts {
            config.agent.max_retrieval_attempts = n;
        }
        if let Some(n) = self.max_quality_attempts {
            config.agent.max_quality_attempts = n;
        }
        if let Some(n) = self.max_iterations {
            config.agent.max_total_iterations = n;
        }
        if let Some(n) = self.threshold {
            config.agent.quality_threshold = n;
        }
        if !self.save {
            config.output.save = false;
        }
    }
}

pub async fn run(options: AskOptions) -> Result<(), Box<dyn std::error::Error>> {
    let question = options.question.trim().to_string();
    if question.is_empty() {
        return Err("The question is empty.".into());
    }

    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    options.apply(&mut config);
    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {e}"))?;

    if !config.has_api_key() && !KEYLESS_PROVIDERS.contains(&config.default_provider.as_str()) {
        eprintln!();
        eprintln!("  ERROR: No API key configured for '{}'!", config.default_provider);
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GOOGLE_API_KEY=...    (Gemini, the default provider)");
        eprintln!("    OPENAI_API_KEY=...    (OpenAI)");
        eprintln!("    DOCSAGE_API_KEY=...   (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let mode = config.retrieval.mode;
    let provider = build_from_config(&config)
        .default()
        .ok_or("No default provider configured")?;
    // One gate for every call this run makes, embeddings included
    let gate: Arc<dyn RateGate> = Arc::new(TokenBucketGate::from_config(&config.rate_limit));
    let generator = Generator::new(provider.clone(), gate.clone(), resolve_model(&config))
        .with_max_tokens(config.default_max_tokens);
    let embedder: Arc<dyn Provider> = Arc::new(GatedProvider::new(provider, gate));
    let source = build_source(&config, Some(embedder));

    let event_bus = Arc::new(EventBus::default());
    let progress = options
        .verbose
        .then(|| tokio::spawn(print_progress(event_bus.subscribe())));

    let orchestrator =
        Orchestrator::from_config(&config, generator, source).with_event_bus(event_bus.clone());

    let artifacts = if config.output.save {
        Some(RunArtifacts::create(&config.output.dir, chrono::Local::now())?)
    } else {
        None
    };
    let sink: Box<dyn TraceSink> = match &artifacts {
        Some(run_dir) => Box::new(JsonFileSink::new(run_dir.trace_path())),
        None => Box::new(MemorySink::new()),
    };

    let outcome = orchestrator.run(&question, mode, sink.as_ref()).await;

    // Close the bus so the progress printer drains and exits
    drop(orchestrator);
    drop(event_bus);
    if let Some(handle) = progress {
        let _ = handle.await;
    }

    println!("\n{}\n", outcome.answer.trim_end());
    print_summary(&outcome);

    if let Some(run_dir) = &artifacts {
        save_artifacts(run_dir, &question, mode, &outcome)?;
        println!("📁 Saved run to {}", run_dir.dir().display());
    }

    if outcome.is_failure() {
        return Err("The run failed; no answer could be produced.".into());
    }
    Ok(())
}

// ── Wiring ──

fn build_source(config: &AppConfig, embedder: Option<Arc<dyn Provider>>) -> RetrievalSource {
    let retrieval = &config.retrieval;

    let mut index = LocalIndex::new(&retrieval.index_path);
    if let Some(embedder) = embedder {
        index = index.with_embedder(embedder);
    }
    if !index.is_available() {
        warn!(
            path = %retrieval.index_path.display(),
            "Local index not found; offline retrieval will come back empty"
        );
    }

    let mut source = RetrievalSource::new()
        .with_local(Arc::new(index))
        .with_official_domains(retrieval.official_domains.clone())
        .with_result_limits(retrieval.local_top_k, retrieval.web_max_results);

    if retrieval.mode == RetrievalMode::Web {
        let web = TavilySearch::new(retrieval.web_api_key.clone())
            .with_base_url(&retrieval.web_api_url);
        if !web.is_configured() {
            warn!("TAVILY_API_KEY is not set; web mode will use the local index");
        }
        source = source.with_web(Arc::new(web));
    }
    source
}

// ── Output ──

async fn print_progress(mut events: broadcast::Receiver<Arc<DomainEvent>>) {
    loop {
        match events.recv().await {
            Ok(event) => match event.as_ref() {
                DomainEvent::RunStarted { mode, .. } => {
                    eprintln!("  🔎 Starting run ({mode} mode)");
                }
                DomainEvent::ActionDecided { action, step, .. } => {
                    eprintln!("  → step {step}: {action}");
                }
                DomainEvent::RefinementRecorded { record, .. } => {
                    let kind = match record.kind {
                        RefinementKind::Search => "search",
                        RefinementKind::Quality => "quality",
                    };
                    eprintln!("    ↻ {kind} refinement #{}: {}", record.iteration, record.reason);
                }
                DomainEvent::SafetyStop { reason, .. } => {
                    eprintln!("    ⚠️  safety guard: {reason}");
                }
                DomainEvent::RunFinished { status, steps, .. } => {
                    eprintln!("  ✔ finished after {steps} steps ({})", status_label(*status));
                }
            },
            Err(RecvError::Lagged(missed)) => {
                eprintln!("    ({missed} progress events skipped)");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Accepted => "accepted",
        RunStatus::Degraded => "degraded",
        RunStatus::Declined => "declined",
        RunStatus::Failed => "failed",
    }
}

fn print_summary(outcome: &RunOutcome) {
    let icon = match outcome.status {
        RunStatus::Accepted => "✅",
        RunStatus::Degraded | RunStatus::Declined => "⚠️ ",
        RunStatus::Failed => "❌",
    };
    let score = outcome
        .quality_score
        .map(|s| format!(", quality {s}/10"))
        .unwrap_or_default();
    println!(
        "{icon} {}{score}, {} steps",
        status_label(outcome.status),
        outcome.trace.steps.len()
    );
    for reason in &outcome.degradation {
        println!("   - {reason}");
    }
    if outcome.fallback_used {
        println!("   - web search was unavailable; answered from the local index");
    }
    if !outcome.sources.is_empty() {
        println!("   Sources:");
        for source in &outcome.sources {
            println!("     {source}");
        }
    }
}

fn save_artifacts(
    run_dir: &RunArtifacts,
    question: &str,
    mode: RetrievalMode,
    outcome: &RunOutcome,
) -> Result<(), Box<dyn std::error::Error>> {
    run_dir.write_answer(&AnswerDocument {
        question,
        answer: &outcome.answer,
        status: outcome.status,
        disclaimer: outcome.disclaimer.as_deref(),
        degradation: &outcome.degradation,
        quality_score: outcome.quality_score,
    })?;
    if let Some(prompt) = &outcome.final_prompt {
        run_dir.write_chat(prompt, &outcome.answer)?;
    }
    if !outcome.context.is_empty() {
        run_dir.write_context(mode, &outcome.context)?;
    }
    Ok(())
}
