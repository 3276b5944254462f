//! `dirflow providers` — Show configured providers and their availability.

use dirflow_config::{AppConfig, ProviderRegistry};
use dirflow_core::provider::ProviderKind;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ProviderRegistry::from_config(&config)?;

    println!("Configured LLM Providers");
    println!("========================");
    println!();
    for line in render(&registry) {
        println!("{line}");
    }
    println!();
    println!("  Environment variables:");
    println!("    ANTHROPIC_API_KEY, OPENAI_API_KEY, GOOGLE_API_KEY");
    println!("    DIRFLOW_PROVIDER, DIRFLOW_PORT");

    Ok(())
}

fn render(registry: &ProviderRegistry) -> Vec<String> {
    ProviderKind::ALL
        .iter()
        .filter_map(|kind| registry.get(*kind))
        .map(|entry| {
            let marker = if entry.kind == registry.default_provider() { "*" } else { " " };
            let status = if entry.is_available() { "ready" } else { "no key" };
            format!(
                "  {marker} {:<8} {:<8} {:<28} {}",
                entry.kind.as_str(),
                status,
                entry.default_model,
                entry.api_url
            )
        })
        .collect()
}
