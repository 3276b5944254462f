//! `dirflow chat` — Run a single exchange and print the result.

use dirflow_config::AppConfig;
use dirflow_core::context::{ChatRequest, RawContext};
use dirflow_pipeline::Orchestrator;
use tracing::debug;

pub async fn run(
    config: AppConfig,
    message: String,
    provider: Option<String>,
    model: Option<String>,
    path: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = Orchestrator::from_config(&config)?;

    let request = build_request(message, provider, model, path);
    debug!(provider = request.provider.as_deref().unwrap_or("default"), "Running single exchange");
    let result = orchestrator.process(request).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn build_request(
    message: String,
    provider: Option<String>,
    model: Option<String>,
    path: Option<String>,
) -> ChatRequest {
    ChatRequest {
        message,
        provider,
        model,
        context: RawContext {
            current_path: path,
            ..RawContext::default()
        },
    }
}
