//! The agent loop runner.
//!
//! One call to [`AgentLoop::run`] drives a conversation through as many
//! gateway rounds as the model needs, bounded by [`AgentLimits`]:
//!
//! ```text
//! RoundStart ──send──▶ Sent ──no tool calls──▶ Completed
//!     ▲                 │
//!     │                 └──tool calls──▶ ToolsPending ──results appended──┐
//!     └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Gateway errors, cancellation and the two ceilings end the run with
//! `Failed`. Nothing escapes as an `Err`: the caller gets a [`RunOutcome`]
//! and the sink gets the matching terminal event.

use futures::FutureExt;
use scribe_config::AgentSettings;
use scribe_core::approval::{
    ApprovalBroker, ApprovalDecision, ApprovalHandler, ApprovalRequest, WaitOutcome,
};
use scribe_core::error::{ProviderError, ToolError};
use scribe_core::event::{AgentEvent, EventSink, FailureReason};
use scribe_core::message::{Conversation, TokenUsage, ToolCallRequest, ToolCallResult, Turn};
use scribe_core::provider::{Provider, ProviderRequest, ToolDefinition};
use scribe_core::session::SessionStore;
use scribe_core::tool::{ResourceFetcher, ToolExecutor};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::fault::{self, compact_fault};
use crate::limits::AgentLimits;
use crate::mutating::MutatingTool;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The model answered without requesting tools.
    Completed(Turn),
    Failed(FailureReason),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Final answer text, if the run completed with one.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed(turn) => turn.text.as_deref(),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(reason) => Some(reason),
        }
    }
}

/// Operator approval wiring for mutating tools.
struct Approval {
    broker: Arc<ApprovalBroker>,
    handler: Arc<dyn ApprovalHandler>,
}

/// The main agent loop.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<dyn ToolExecutor>,
    limits: AgentLimits,
    approval: Option<Approval>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
}

/// What happened to one tool call.
enum CallOutcome {
    Done(ToolCallResult),
    /// Cancelled while waiting for the operator
    Interrupted,
}

/// What the operator decided about one mutating call.
enum Verdict {
    Run(serde_json::Value),
    Declined,
    Interrupted,
}

impl AgentLoop {
    /// Create a new agent loop. Mutating tools run unapproved until
    /// [`with_approval`](Self::with_approval) is called.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            tools,
            limits: AgentLimits::default(),
            approval: None,
            fetcher: None,
        }
    }

    pub fn with_limits(mut self, limits: AgentLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Apply the `[agent]` section: limits only. Approval wiring is separate
    /// because it needs a front end.
    pub fn with_settings(self, settings: &AgentSettings) -> Self {
        self.with_limits(AgentLimits::from_settings(settings))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Gate mutating tools behind the operator. `handler` is told about each
    /// request; the answer must come back through `broker`.
    pub fn with_approval(
        mut self,
        broker: Arc<ApprovalBroker>,
        handler: Arc<dyn ApprovalHandler>,
    ) -> Self {
        self.approval = Some(Approval { broker, handler });
        self
    }

    /// Source of the current text shown as "before" in approval requests.
    pub fn with_resource_fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn limits(&self) -> &AgentLimits {
        &self.limits
    }

    /// Append `user_text` to the session `key` and run it.
    ///
    /// The session lock is held for the whole run, so a second message to
    /// the same session waits for the first run to finish.
    pub async fn run_session(
        &self,
        sessions: &SessionStore,
        key: &str,
        system_prompt: Option<&str>,
        user_text: &str,
        events: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let conversation = sessions.get_or_create(key, system_prompt);
        let mut conversation = conversation.lock().await;
        conversation.append(Turn::user(user_text));
        self.run(&mut conversation, events, cancel).await
    }

    /// Drive `conversation` until the model answers or the run fails.
    ///
    /// Emits exactly one terminal event, after every other event of the run.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        events: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        info!(
            provider = self.provider.name(),
            model = %self.model,
            turns = conversation.len(),
            "Starting run"
        );

        let outcome = self.drive(conversation, events, cancel).await;

        match &outcome {
            RunOutcome::Completed(turn) => {
                info!(turns = conversation.len(), "Run completed");
                events.emit(&AgentEvent::Completed { turn: turn.clone() });
            }
            RunOutcome::Failed(reason) => {
                warn!(reason = %reason, "Run failed");
                events.emit(&AgentEvent::Failed {
                    reason: reason.clone(),
                });
            }
        }
        outcome
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        events: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let definitions = self.tools.definitions();
        let mut cumulative_input: u64 = 0;
        let mut round: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return RunOutcome::Failed(FailureReason::Cancelled);
            }
            round += 1;
            let started = Instant::now();

            let dropped = conversation.window(self.limits.max_turns);
            let compacted = conversation.compact_tool_results(self.limits.max_tool_result_len);
            if dropped > 0 || compacted > 0 {
                debug!(round, dropped, compacted, "Trimmed conversation");
            }

            let request = self.build_request(conversation, &definitions);
            debug!(
                round,
                turns = request.turns.len(),
                tools = request.tools.len(),
                "Sending round"
            );

            let reply = match self.provider.send(&request).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(round, error = %e, "Provider request failed");
                    return RunOutcome::Failed(gateway_failure(e));
                }
            };

            let usage = reply.usage.unwrap_or_default();
            cumulative_input += usage.input_tokens;

            if let Some(text) = &reply.text {
                events.emit(&AgentEvent::Text { text: text.clone() });
            }

            if !reply.has_tool_calls() {
                conversation.append(reply.clone());
                emit_round(events, round, started, usage, cumulative_input);
                return RunOutcome::Completed(reply);
            }

            let calls = reply.tool_calls.clone();
            conversation.append(reply);

            let mut results = Vec::with_capacity(calls.len());
            let mut interrupted = false;
            for call in &calls {
                if interrupted {
                    results.push(ToolCallResult::error(
                        &call.id,
                        "Cancelled: the run was stopped before this call ran",
                    ));
                    continue;
                }

                events.emit(&AgentEvent::ToolCallStarted { call: call.clone() });

                let result = match self.execute_call(call, cancel).await {
                    CallOutcome::Done(result) => result,
                    CallOutcome::Interrupted => {
                        interrupted = true;
                        ToolCallResult::error(
                            &call.id,
                            "Cancelled: the run was stopped while waiting for approval",
                        )
                    }
                };
                let result = self.finish_result(call, result);

                events.emit(&AgentEvent::ToolCallFinished {
                    name: call.name.clone(),
                    result: result.clone(),
                });
                results.push(result);
            }

            conversation.append(Turn::tool(results));
            emit_round(events, round, started, usage, cumulative_input);

            if interrupted {
                return RunOutcome::Failed(FailureReason::Cancelled);
            }
            if cumulative_input > self.limits.max_input_tokens {
                warn!(
                    used = cumulative_input,
                    limit = self.limits.max_input_tokens,
                    "Input token budget exceeded"
                );
                return RunOutcome::Failed(FailureReason::BudgetExceeded {
                    used: cumulative_input,
                    limit: self.limits.max_input_tokens,
                });
            }
            if round >= self.limits.max_rounds {
                warn!(rounds = round, "Round limit reached with tool calls pending");
                return RunOutcome::Failed(FailureReason::RoundLimit { rounds: round });
            }
        }
    }

    fn build_request(
        &self,
        conversation: &Conversation,
        definitions: &[ToolDefinition],
    ) -> ProviderRequest {
        let mut request = ProviderRequest::new(&self.model, conversation.turns().to_vec())
            .with_system_prompt(conversation.system_prompt.clone())
            .with_tools(definitions.to_vec());
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }

    async fn execute_call(&self, call: &ToolCallRequest, cancel: &CancellationToken) -> CallOutcome {
        if !self.tools.contains(&call.name) {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return CallOutcome::Done(error_result(call, &ToolError::NotFound(call.name.clone())));
        }

        let gated = self
            .approval
            .as_ref()
            .zip(MutatingTool::lookup(&call.name));

        let Some((approval, spec)) = gated else {
            return CallOutcome::Done(self.invoke(call).await);
        };

        match self.request_approval(approval, spec, call, cancel).await {
            Verdict::Run(arguments) => {
                let approved = ToolCallRequest {
                    arguments,
                    ..call.clone()
                };
                CallOutcome::Done(self.invoke(&approved).await)
            }
            Verdict::Declined => CallOutcome::Done(ToolCallResult::success(
                &call.id,
                format!(
                    "The operator declined this change to {}. It was not applied.",
                    spec.object_name(&call.arguments)
                ),
            )),
            Verdict::Interrupted => CallOutcome::Interrupted,
        }
    }

    async fn request_approval(
        &self,
        approval: &Approval,
        spec: &MutatingTool,
        call: &ToolCallRequest,
        cancel: &CancellationToken,
    ) -> Verdict {
        let locator = spec.locator(&call.arguments);
        let before = self.current_text(locator.as_deref()).await;

        let request = ApprovalRequest::new(
            &call.id,
            &call.name,
            spec.object_name(&call.arguments),
            before,
            spec.payload(&call.arguments),
        )
        .with_locator(locator);

        info!(tool = %call.name, object = %request.object_name, "Waiting for approval");
        let waiter = approval.broker.open(request.clone());
        approval.handler.on_approval_needed(request);

        match waiter.wait(cancel).await {
            WaitOutcome::Resolved(ApprovalDecision::Accepted) => {
                debug!(tool_call_id = %call.id, "Change accepted");
                Verdict::Run(call.arguments.clone())
            }
            WaitOutcome::Resolved(ApprovalDecision::Edited(text)) => {
                debug!(tool_call_id = %call.id, "Change accepted with edits");
                Verdict::Run(spec.with_payload(&call.arguments, text))
            }
            WaitOutcome::Resolved(ApprovalDecision::Rejected) => {
                info!(tool_call_id = %call.id, "Change declined");
                Verdict::Declined
            }
            WaitOutcome::Interrupted => {
                approval.broker.discard(&call.id);
                Verdict::Interrupted
            }
        }
    }

    /// Current backend text for an approval's "before" side. Missing objects
    /// and fetch failures read as empty.
    async fn current_text(&self, locator: Option<&str>) -> String {
        let (Some(fetcher), Some(locator)) = (&self.fetcher, locator) else {
            return String::new();
        };
        match fetcher.fetch_text(locator).await {
            Ok(Some(text)) => text,
            Ok(None) => String::new(),
            Err(e) => {
                warn!(locator, error = %e, "Could not read current source for approval");
                String::new()
            }
        }
    }

    async fn invoke(&self, call: &ToolCallRequest) -> ToolCallResult {
        debug!(tool = %call.name, id = %call.id, "Executing tool");
        match AssertUnwindSafe(self.tools.execute(call)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                error_result(call, &e)
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                warn!(tool = %call.name, panic = %message, "Tool panicked");
                error_result(call, &ToolError::Panicked(message))
            }
        }
    }

    /// Repair the result id and compact error content.
    fn finish_result(&self, call: &ToolCallRequest, result: ToolCallResult) -> ToolCallResult {
        if result.tool_call_id != call.id {
            debug!(
                expected = %call.id,
                got = %result.tool_call_id,
                "Repairing tool result id"
            );
        }
        let result = result.with_call_id(&call.id);
        if result.is_error {
            result.with_content(compact_fault(&result.content))
        } else {
            result
        }
    }
}

fn emit_round(
    events: &dyn EventSink,
    round: u32,
    started: Instant,
    usage: TokenUsage,
    cumulative_input_tokens: u64,
) {
    events.emit(&AgentEvent::RoundCompleted {
        round,
        duration_ms: started.elapsed().as_millis() as u64,
        usage,
        cumulative_input_tokens,
    });
}

fn error_result(call: &ToolCallRequest, error: &ToolError) -> ToolCallResult {
    ToolCallResult::error(&call.id, format!("{}: {}", error.kind(), error))
}

fn gateway_failure(error: ProviderError) -> FailureReason {
    match error {
        ProviderError::Interrupted(_) => FailureReason::Cancelled,
        ProviderError::Parse { reason, body } => FailureReason::Parse {
            message: reason,
            body,
        },
        ProviderError::Api { status_code, body } => FailureReason::Gateway {
            status_code: Some(status_code),
            message: fault::extract_message(&body).unwrap_or(body),
        },
        other => FailureReason::Gateway {
            status_code: None,
            message: other.to_string(),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
