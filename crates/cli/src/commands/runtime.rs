//! Wiring shared by `run` and `chat`: provider, tools, approval gate,
//! usage tracker, and the front-end loop around one agent run.

use std::future::Future;
use std::sync::Arc;
use scribe_agent::{AgentLoop, RunOutcome};
use scribe_config::AppConfig;
use scribe_core::approval::{ApprovalBroker, ApprovalDecision, ApprovalRequest};
use scribe_core::event::{AgentEvent, EventSink};
use scribe_core::session::SessionStore;
use scribe_telemetry::{PricingTable, UsageTracker};
use scribe_tools::BackendClient;
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use super::approval;

/// The single session the terminal front end talks to.
pub const SESSION_KEY: &str = "terminal";

pub struct Runtime {
    pub config: AppConfig,
    pub provider_name: String,
    pub model: String,
    pub approval_enabled: bool,
    agent: Arc<AgentLoop>,
    sessions: Arc<SessionStore>,
    broker: Arc<ApprovalBroker>,
    approvals: mpsc::UnboundedReceiver<ApprovalRequest>,
    tracker: Arc<UsageTracker>,
}

impl Runtime {
    /// Load configuration and assemble everything a run needs.
    pub fn build(profile: Option<&str>, skip_approval: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
        let settings = config.provider_settings(profile)?;

        if settings.api_key.is_none() {
            eprintln!();
            eprintln!("  ERROR: No API key configured for {}!", settings.kind);
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    {}", settings.env_key_var());
            eprintln!("    SCRIBE_API_KEY   (generic)");
            eprintln!();
            eprintln!("  Or add it to your config file:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            return Err("No API key found. See above for setup instructions.".into());
        }

        let provider = scribe_providers::build_provider(settings)?;
        let model = settings.model_name();

        let backend = Arc::new(BackendClient::from_settings(&config.backend)?);
        let tools = Arc::new(scribe_tools::default_registry(backend.clone()));

        let broker = Arc::new(ApprovalBroker::new());
        let (approval_tx, approvals) = mpsc::unbounded_channel();
        let approval_enabled = config.agent.require_approval && !skip_approval;

        let mut agent = AgentLoop::new(provider.clone(), &model, tools)
            .with_settings(&config.agent)
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens)
            .with_resource_fetcher(backend);
        if approval_enabled {
            agent = agent.with_approval(
                broker.clone(),
                Arc::new(move |request: ApprovalRequest| {
                    // The front end is gone only when the process is exiting.
                    let _ = approval_tx.send(request);
                }),
            );
        }

        let pricing = Arc::new(PricingTable::from_settings(&config.telemetry));
        let tracker = Arc::new(UsageTracker::new(&model, pricing));

        Ok(Self {
            provider_name: provider.name().to_string(),
            model,
            approval_enabled,
            agent: Arc::new(agent),
            sessions: Arc::new(SessionStore::new()),
            broker,
            approvals,
            tracker,
            config,
        })
    }

    /// Drop the terminal session's history.
    pub fn reset(&self) -> bool {
        self.sessions.remove(SESSION_KEY)
    }

    pub fn tracker(&self) -> &UsageTracker {
        &self.tracker
    }

    /// Run one task on a spawned task while this task renders progress,
    /// answers approvals from `input` and turns Ctrl+C into cancellation.
    pub async fn execute<R>(
        &mut self,
        user_text: &str,
        input: &mut Lines<R>,
    ) -> Result<RunOutcome, Box<dyn std::error::Error>>
    where
        R: AsyncBufRead + Unpin,
    {
        let cancel = CancellationToken::new();
        let (event_tx, mut events) = mpsc::unbounded_channel::<AgentEvent>();

        let mut handle = {
            let agent = self.agent.clone();
            let sessions = self.sessions.clone();
            let tracker = self.tracker.clone();
            let cancel = cancel.clone();
            let system_prompt = self.config.agent.effective_system_prompt().to_string();
            let user_text = user_text.to_string();
            tokio::spawn(async move {
                let sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(event_tx), tracker];
                agent
                    .run_session(
                        &sessions,
                        SESSION_KEY,
                        Some(&system_prompt),
                        &user_text,
                        &sinks,
                        &cancel,
                    )
                    .await
            })
        };

        let outcome = loop {
            tokio::select! {
                Some(event) = events.recv() => render_event(&event),
                Some(request) = self.approvals.recv() => {
                    let answer = ask_operator(&request, input, tokio::signal::ctrl_c(), &cancel);
                    let Some(decision) = answer.await? else {
                        continue;
                    };
                    if let Err(e) = self.broker.resolve(&request.id, decision) {
                        warn!(error = %e, "Approval could not be delivered");
                    }
                }
                _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                    eprintln!("  Cancelling...");
                    cancel.cancel();
                }
                result = &mut handle => break result?,
            }
        };

        while let Ok(event) = events.try_recv() {
            render_event(&event);
        }
        Ok(outcome)
    }
}

/// Prompt for one approval. `None` when `interrupt` fires first.
///
/// The run is cancelled whenever no decision comes back.
async fn ask_operator<R, I>(
    request: &ApprovalRequest,
    input: &mut Lines<R>,
    interrupt: I,
    cancel: &CancellationToken,
) -> std::io::Result<Option<ApprovalDecision>>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        decision = approval::prompt(request, input) => match decision {
            Ok(decision) => Ok(Some(decision)),
            Err(e) => {
                cancel.cancel();
                Err(e)
            }
        },
        _ = interrupt => {
            eprintln!("  Cancelling...");
            cancel.cancel();
            Ok(None)
        }
    }
}

fn render_event(event: &AgentEvent) {
    match event {
        AgentEvent::Text { text } => {
            println!();
            println!("{text}");
        }
        AgentEvent::ToolCallStarted { call } => {
            eprintln!("  → {} {}", call.name, brief_arguments(&call.arguments));
        }
        AgentEvent::ToolCallFinished { name, result } => {
            let mark = if result.is_error { "✗" } else { "✓" };
            let first_line = result.content.lines().next().unwrap_or("");
            eprintln!("  {mark} {name}: {}", truncate(first_line, 100));
        }
        AgentEvent::RoundCompleted { .. } | AgentEvent::Completed { .. } => {}
        AgentEvent::Failed { reason } => {
            eprintln!();
            eprintln!("  ✗ {reason}");
        }
    }
}

/// Arguments without the bulky payload fields.
fn brief_arguments(arguments: &serde_json::Value) -> String {
    match arguments {
        serde_json::Value::Object(map) => map
            .iter()
            .filter(|(key, _)| key.as_str() != "source")
            .map(|(key, value)| match value.as_str() {
                Some(s) => format!("{key}={}", truncate(s, 60)),
                None => format!("{key}={value}"),
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => truncate(&other.to_string(), 80),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}
