//! Shared test helpers for loop tests.

use async_trait::async_trait;
use scribe_core::error::{ProviderError, ToolError};
use scribe_core::message::{TokenUsage, ToolCallRequest, ToolCallResult, Turn};
use scribe_core::provider::{Provider, ProviderKind, ProviderRequest, ToolDefinition};
use scribe_core::tool::{ResourceFetcher, ToolExecutor};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A provider that returns a sequence of scripted replies and records every
/// request it receives.
///
/// Once the script runs out every further call fails with `NotConfigured`,
/// which shows up as a gateway failure in the run outcome.
pub struct ScriptedProvider {
    replies: Mutex<Vec<Result<Turn, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<Turn, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn turns(turns: Vec<Turn>) -> Self {
        Self::new(turns.into_iter().map(Ok).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn send(&self, request: &ProviderRequest) -> Result<Turn, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(ProviderError::NotConfigured(format!(
                "script exhausted at call #{call}"
            )));
        }
        replies.remove(0)
    }
}

/// Assistant turn with text only.
pub fn text_reply(text: &str) -> Turn {
    Turn::assistant_text(text).with_usage(TokenUsage::new(10, 5))
}

/// Assistant turn requesting the given calls.
pub fn tool_reply(calls: Vec<ToolCallRequest>, input_tokens: u64) -> Turn {
    Turn::assistant(Some("Working on it.".into()), calls)
        .with_usage(TokenUsage::new(input_tokens, 5))
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}

/// What a scripted tool does when invoked.
pub enum Behaviour {
    Echo,
    Fail(ToolError),
    Panic,
    /// Answer with a foreign call id
    WrongId,
    /// Cancel the token, then succeed
    Cancel(CancellationToken),
}

/// A tool catalogue whose tools follow scripted behaviours and record the
/// arguments they were invoked with.
pub struct ScriptedTools {
    behaviours: HashMap<String, Behaviour>,
    invocations: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTools {
    pub fn new() -> Self {
        Self {
            behaviours: HashMap::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, name: &str, behaviour: Behaviour) -> Self {
        self.behaviours.insert(name.to_string(), behaviour);
        self
    }

    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for ScriptedTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        let mut names: Vec<&String> = self.behaviours.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| ToolDefinition {
                name: name.clone(),
                description: format!("scripted {name}"),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            })
            .collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.behaviours.contains_key(name)
    }

    async fn execute(&self, call: &ToolCallRequest) -> Result<ToolCallResult, ToolError> {
        self.invocations
            .lock()
            .unwrap()
            .push((call.name.clone(), call.arguments.clone()));

        match self.behaviours.get(&call.name) {
            Some(Behaviour::Echo) => Ok(ToolCallResult::success(
                &call.id,
                format!("{} ok: {}", call.name, call.arguments),
            )),
            Some(Behaviour::Fail(err)) => Err(err.clone()),
            Some(Behaviour::Panic) => panic!("{} blew up", call.name),
            Some(Behaviour::WrongId) => Ok(ToolCallResult::success("bogus", "done")),
            Some(Behaviour::Cancel(token)) => {
                token.cancel();
                Ok(ToolCallResult::success(&call.id, "done"))
            }
            None => Err(ToolError::NotFound(call.name.clone())),
        }
    }
}

/// Backend contents keyed by locator; absent keys read as "does not exist".
pub struct FakeBackend {
    objects: HashMap<String, String>,
}

impl FakeBackend {
    pub fn new(objects: &[(&str, &str)]) -> Self {
        Self {
            objects: objects
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl ResourceFetcher for FakeBackend {
    async fn fetch_text(&self, locator: &str) -> Result<Option<String>, ToolError> {
        Ok(self.objects.get(locator).cloned())
    }
}
