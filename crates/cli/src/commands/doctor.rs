//! `docsage doctor`: check configuration, API keys and retrieval backends.

use docsage_config::AppConfig;
use docsage_providers::build_from_config;
use docsage_retrieval::IndexFile;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 docsage doctor");
    println!("=================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file; using defaults (run `docsage init`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 blocking issue found.");
            return Ok(());
        }
    };

    match config.validate() {
        Ok(()) => println!("  ✅ Config valid"),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    // Generation service
    if config.has_api_key() {
        println!(
            "  ✅ API key configured for {} ({})",
            config.default_provider,
            docsage_providers::resolve_model(&config)
        );
        match build_from_config(&config).default() {
            Some(provider) => match provider.health_check().await {
                Ok(true) => println!("  ✅ {} reachable", provider.name()),
                Ok(false) => {
                    println!("  ⚠️  {} answered but rejected the request", provider.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ {} unreachable: {e}", provider.name());
                    issues += 1;
                }
            },
            None => {
                println!("  ❌ No provider registered for {}", config.default_provider);
                issues += 1;
            }
        }
    } else {
        println!(
            "  ❌ No API key for {}: set GOOGLE_API_KEY or api_key in config.toml",
            config.default_provider
        );
        issues += 1;
    }

    // Local index
    let index_path = &config.retrieval.index_path;
    match IndexFile::read(index_path) {
        Ok(index) => {
            let ranking = match &index.embedding_model {
                Some(model) => format!("embeddings from {model}"),
                None => "lexical ranking".to_string(),
            };
            println!(
                "  ✅ Local index: {} chunks ({ranking}) at {}",
                index.chunks.len(),
                index_path.display()
            );
            if index.chunks.is_empty() {
                println!("  ⚠️  Local index is empty");
                issues += 1;
            }
        }
        Err(e) => {
            println!("  ❌ Local index unusable: {e}");
            issues += 1;
        }
    }

    // Web search
    if config.retrieval.web_api_key.is_some() {
        println!(
            "  ✅ Web search key configured (official domains: {})",
            config.retrieval.official_domains.join(", ")
        );
    } else {
        println!("  ⚠️  No TAVILY_API_KEY: --mode web will fall back to the local index");
        issues += 1;
    }

    println!(
        "  ✅ Limits: {} retrieval / {} quality attempts, {} iterations, threshold {}",
        config.agent.max_retrieval_attempts,
        config.agent.max_quality_attempts,
        config.agent.max_total_iterations,
        config.agent.quality_threshold
    );

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
