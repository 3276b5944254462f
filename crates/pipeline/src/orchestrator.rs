//! The orchestrator: one caller message in, one [`OrchestrationResult`] out.
//!
//! Flow per exchange:
//! 1. Resolve provider and model (unknown ones are configuration errors)
//! 2. Prepare context and pick a persona
//! 3. Build the provider request and call the gateway exactly once
//! 4. Parse the reply into a structured intent
//! 5. Validate each proposed command, dropping and reporting rejections
//! 6. Optionally execute `web_search` commands server-side
//! 7. Assemble and annotate the result
//!
//! Any gateway failure short-circuits to the fallback responder, so callers
//! only ever see an `Err` for configuration mistakes, malformed input or
//! cancellation.

use std::sync::Arc;

use dirflow_config::{AppConfig, ProviderRegistry};
use dirflow_core::command::Command;
use dirflow_core::context::ChatRequest;
use dirflow_core::error::{Error, GatewayError, Result};
use dirflow_core::provider::ProviderKind;
use dirflow_core::search::SearchBackend;
use dirflow_providers::{ProviderGateway, build_from_config};
use dirflow_security::{CommandValidator, ValidationPolicy};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::context::ContextPreparer;
use crate::fallback::FallbackResponder;
use crate::parser;
use crate::prompt::{BASE_PROMPT, PromptBuilder};
use crate::response::OrchestrationResult;
use crate::router::{AgentUsed, PersonaRouter};
use crate::search::{self, SearchOutcome};

#[derive(Debug, Clone, Copy)]
enum Stage {
    ContextPrepared,
    Dispatched,
    Parsed,
    Validated,
    Fallback,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Self::ContextPrepared => "context_prepared",
            Self::Dispatched => "dispatched",
            Self::Parsed => "parsed",
            Self::Validated => "validated",
            Self::Fallback => "fallback",
        }
    }
}

/// Runs exchanges against shared, read-only collaborators.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    gateway: Arc<ProviderGateway>,
    validator: Arc<CommandValidator>,
    preparer: ContextPreparer,
    prompts: PromptBuilder,
    router: PersonaRouter,
    fallback: FallbackResponder,
    search: Option<Arc<dyn SearchBackend>>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        gateway: Arc<ProviderGateway>,
        validator: Arc<CommandValidator>,
    ) -> Self {
        Self {
            registry,
            gateway,
            validator,
            preparer: ContextPreparer::default(),
            prompts: PromptBuilder::default(),
            router: PersonaRouter::default(),
            fallback: FallbackResponder,
            search: None,
        }
    }

    /// Build every collaborator from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let registry = ProviderRegistry::from_config(config)?;
        let gateway = build_from_config(config, &registry);
        let validator = CommandValidator::new(ValidationPolicy::from(&config.security));
        let limits = config.history.limits();

        info!(
            default_provider = %registry.default_provider(),
            timeout_secs = config.request_timeout_secs,
            routing = config.routing.enabled,
            "Orchestrator configured"
        );

        Ok(Self::new(Arc::new(registry), Arc::new(gateway), Arc::new(validator))
            .with_context_preparer(ContextPreparer::from_config(&config.history))
            .with_prompt_builder(PromptBuilder::new(limits.max_items))
            .with_router(PersonaRouter::new(config.routing.enabled)))
    }

    /// Execute `web_search` commands server-side with this backend.
    pub fn with_search_backend(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.search = Some(backend);
        self
    }

    pub fn with_router(mut self, router: PersonaRouter) -> Self {
        self.router = router;
        self
    }

    pub fn with_context_preparer(mut self, preparer: ContextPreparer) -> Self {
        self.preparer = preparer;
        self
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    pub fn preparer(&self) -> &ContextPreparer {
        &self.preparer
    }

    pub fn router(&self) -> &PersonaRouter {
        &self.router
    }

    pub fn has_search_backend(&self) -> bool {
        self.search.is_some()
    }

    /// Run one exchange to completion.
    pub async fn process(&self, request: ChatRequest) -> Result<OrchestrationResult> {
        self.process_with_cancel(request, &CancellationToken::new()).await
    }

    /// Run one exchange, aborting cooperatively when `cancel` fires.
    pub async fn process_with_cancel(
        &self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<OrchestrationResult> {
        let request_id = Uuid::new_v4();
        self.run(request, request_id, cancel)
            .instrument(info_span!("exchange", request_id = %request_id))
            .await
    }

    async fn run(
        &self,
        request: ChatRequest,
        request_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<OrchestrationResult> {
        let ChatRequest {
            message,
            provider,
            model,
            context,
        } = request;

        if message.trim().is_empty() {
            return Err(Error::InvalidRequest("message must not be empty".into()));
        }

        let kind = self.registry.resolve_provider(provider.as_deref())?;
        let model = self.registry.resolve_model(kind, model.as_deref())?;
        let context = self.preparer.prepare(context);
        let persona = self.router.route(&message);
        trace_stage(Stage::ContextPrepared, kind);

        let base_template = persona.map_or(BASE_PROMPT, |p| p.template);
        let provider_request = self.prompts.build(kind, &context, base_template, &message);

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(provider = %kind, "Exchange cancelled during provider call");
                return Err(Error::Cancelled);
            }
            reply = self.gateway.call(provider_request, kind, &model) => reply,
        };
        trace_stage(Stage::Dispatched, kind);

        let raw = match reply {
            Ok(text) if text.trim().is_empty() => Err(GatewayError::BadResponseShape {
                provider: kind.to_string(),
                message: "empty reply".into(),
            }),
            other => other,
        };

        let raw = match raw {
            Ok(raw) => raw,
            Err(err) => {
                warn!(provider = %kind, model = %model, error = %err, "Provider call failed, using fallback");
                trace_stage(Stage::Fallback, kind);
                let reply = self.fallback.respond(&message, &context, &err);
                let mut result = OrchestrationResult::fallback(request_id, kind, model, reply);
                result.history_count = context.conversation_history.len();
                result.should_suggest_new_chat = self.preparer.should_suggest_new_chat(&context);
                return Ok(result);
            }
        };

        let intent = parser::parse(&raw);
        trace_stage(Stage::Parsed, kind);

        if cancel.is_cancelled() {
            info!(provider = %kind, "Exchange cancelled before validation");
            return Err(Error::Cancelled);
        }

        let batch = self.validator.validate_all(&intent.commands);
        trace_stage(Stage::Validated, kind);

        let (commands, search_results) = self.run_searches(batch.accepted).await;

        let mut warnings: Vec<String> = intent.warning.into_iter().collect();
        warnings.extend(batch.advisories);
        if !batch.rejected.is_empty() {
            warnings.push(format!("{} proposed command(s) were rejected", batch.rejected.len()));
        }

        let custom_prompt = context.active_custom_prompt();
        let mut result = OrchestrationResult::new(request_id, kind, model, intent.message);
        result.commands = commands;
        result.parse_success = intent.success;
        result.warning = (!warnings.is_empty()).then(|| warnings.join("; "));
        result.should_suggest_new_chat = self.preparer.should_suggest_new_chat(&context);
        result.history_count = context.conversation_history.len();
        result.validation_errors = batch.rejected;
        result.custom_prompt_used = custom_prompt.is_some();
        result.custom_prompt_name = custom_prompt.map(|p| p.name.clone());
        result.agent_used = persona.map(AgentUsed::from);
        result.search_results = search_results;
        result.annotate();

        info!(
            provider = %kind,
            commands = result.commands.len(),
            rejected = result.validation_errors.len(),
            parse_success = result.parse_success,
            "Exchange completed"
        );

        Ok(result)
    }

    /// Execute `web_search` commands when a backend is attached.
    ///
    /// Executed searches are removed from the returned command list.
    async fn run_searches(&self, commands: Vec<Command>) -> (Vec<Command>, Vec<SearchOutcome>) {
        let Some(backend) = &self.search else {
            return (commands, Vec::new());
        };

        let mut remaining = Vec::with_capacity(commands.len());
        let mut queries = Vec::new();
        for command in commands {
            match command {
                Command::WebSearch { query, options } => {
                    queries.push((query, options.unwrap_or_default()))
                }
                other => remaining.push(other),
            }
        }

        if queries.is_empty() {
            return (remaining, Vec::new());
        }

        debug!(backend = backend.name(), searches = queries.len(), "Executing web searches");
        let outcomes = join_all(
            queries
                .iter()
                .map(|(query, options)| search::execute(backend.as_ref(), query, options)),
        )
        .await;

        (remaining, outcomes)
    }
}

fn trace_stage(stage: Stage, provider: ProviderKind) {
    debug!(stage = stage.as_str(), provider = %provider, "Stage reached");
}
