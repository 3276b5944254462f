//! `dirflow doctor` — Diagnose configuration and credentials.

use std::path::Path;

use dirflow_config::{AppConfig, ProviderRegistry};
use dirflow_core::provider::ProviderKind;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Dirflow Doctor — System Diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    if config_path.exists() {
        println!("  [ok]   Config file found at {}", config_path.display());
    } else {
        println!("  [info] No config file at {}, using defaults", config_path.display());
    }

    let config = match AppConfig::load_with_env(&config_path) {
        Ok(config) => {
            println!("  [ok]   Configuration valid");
            config
        }
        Err(e) => {
            println!("  [fail] Configuration invalid: {e}");
            println!("\n  1 issue found. Fix the configuration and run again.");
            return Ok(());
        }
    };

    let registry = ProviderRegistry::from_config(&config)?;
    for kind in ProviderKind::ALL {
        let Some(entry) = registry.get(kind) else {
            continue;
        };
        if entry.is_available() {
            println!("  [ok]   {} ready ({})", kind, entry.default_model);
        } else if kind == registry.default_provider() {
            println!("  [fail] {kind} is the default provider but has no credential");
            issues += 1;
        } else {
            println!("  [warn] {kind} has no credential");
        }
    }

    if Path::new(&config.security.sandbox_root).is_absolute() {
        println!("  [ok]   Sandbox root {}", config.security.sandbox_root);
    } else {
        println!("  [warn] Sandbox root {} is not absolute", config.security.sandbox_root);
        issues += 1;
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
