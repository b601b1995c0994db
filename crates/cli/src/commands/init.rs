//! `docsage init`: write the default configuration.

use docsage_config::AppConfig;
use std::path::Path;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();

    println!("📚 docsage: first-time setup");
    println!("============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let config_path = config_dir.join("config.toml");
    if write_default_config(&config_path)? {
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Export GOOGLE_API_KEY (or set api_key in config.toml)");
        println!("   2. Export TAVILY_API_KEY for --mode web");
        println!("   3. Point retrieval.index_path at your documentation index");
        println!("   4. Run: docsage doctor");
    } else {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.\n");
    }

    Ok(())
}

/// Write the default config unless one exists. Returns whether it was written.
fn write_default_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}
