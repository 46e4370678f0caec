//! Agent Orchestration Runtime — the turn loop. Given a `TriggerEnvelope`,
//! runs a bounded interactive conversation with the resolved model until
//! the model emits a final message with no pending tool calls and no
//! transfer directive, or the per-trigger budget is exhausted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use skynet_core::config::ConfigResolver;
use skynet_core::types::TriggerEnvelope;
use skynet_credentials::CredentialStore;
use skynet_memory::MemoryService;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::agents::{AgentRegistry, AgentSpec};
use crate::events::TurnEvent;
use crate::invocation::InvocationContext;
use crate::model_resolution;
use crate::provider::ChatRequest;
use crate::tool_registry::{ToolOutcome, ToolRegistry, ToolStatus, DEFAULT_TOOL_TIMEOUT};

const MAX_PROVIDER_RETRIES: u32 = 3;

/// The result of a completed or aborted turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub final_agent: String,
    /// `None` only when the turn was aborted before any model response.
    pub final_text: Option<String>,
    pub aborted_reason: Option<String>,
}

pub struct AgentOrchestrator {
    agents: Arc<AgentRegistry>,
    tools: Arc<ToolRegistry>,
    memory: MemoryService,
    config: Arc<ConfigResolver>,
    credentials: Arc<CredentialStore>,
}

impl AgentOrchestrator {
    pub fn new(
        agents: Arc<AgentRegistry>,
        tools: Arc<ToolRegistry>,
        memory: MemoryService,
        config: Arc<ConfigResolver>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self { agents, tools, memory, config, credentials }
    }

    #[instrument(skip(self, events), fields(session_id = %envelope.session_id, agent = %envelope.initial_agent))]
    pub async fn run_trigger(&self, envelope: TriggerEnvelope, events: mpsc::Sender<TurnEvent>) -> TurnOutcome {
        let started_at = Instant::now();
        let originating_agent = envelope.initial_agent.clone();

        let mut active_agent = match self.agents.get(&envelope.initial_agent) {
            Ok(agent) => agent,
            Err(e) => {
                let reason = e.to_string();
                let _ = events.send(TurnEvent::TurnAborted { reason: reason.clone() }).await;
                return TurnOutcome { final_agent: envelope.initial_agent, final_text: None, aborted_reason: Some(reason) };
            }
        };

        let mut history: Vec<Value> = vec![serde_json::json!({
            "role": "user",
            "content": envelope.initial_prompt,
        })];

        let _ = events.send(TurnEvent::TurnStarted { agent: active_agent.name.clone() }).await;

        let mut iterations: u32 = 0;
        loop {
            if started_at.elapsed() > Duration::from_secs(skynet_core::config::MAX_TURN_WALL_CLOCK_SECS) {
                return self.abort(&events, &active_agent, "wall_clock_budget_exhausted").await;
            }
            if iterations >= skynet_core::config::MAX_TOOL_LOOP_ITERATIONS {
                return self.abort(&events, &active_agent, "tool_loop_iteration_budget_exhausted").await;
            }
            iterations += 1;

            let response = match self.call_model(&active_agent, &history).await {
                Ok(resp) => resp,
                Err(reason) => return self.abort(&events, &active_agent, &reason).await,
            };

            let transfer_target = extract_transfer_directive(&response.content);
            let is_final = response.tool_calls.is_empty() && transfer_target.is_none();
            let _ = events
                .send(TurnEvent::ModelResponse { agent: active_agent.name.clone(), text: response.content.clone(), is_final })
                .await;

            if let Some(target_name) = transfer_target {
                if self.agents.can_transfer(&active_agent, &target_name, &originating_agent) {
                    match self.agents.get(&target_name) {
                        Ok(target) => {
                            let _ = events
                                .send(TurnEvent::AgentTransferred { from: active_agent.name.clone(), to: target.name.clone() })
                                .await;
                            active_agent = target;
                            continue;
                        }
                        Err(e) => return self.abort(&events, &active_agent, &e.to_string()).await,
                    }
                } else {
                    warn!(from = %active_agent.name, to = %target_name, "illegal transfer directive");
                    let _ = events
                        .send(TurnEvent::TurnAborted { reason: format!("illegal-transfer: {target_name}") })
                        .await;
                    return TurnOutcome {
                        final_agent: active_agent.name.clone(),
                        final_text: Some(response.content),
                        aborted_reason: Some(format!("illegal-transfer: {target_name}")),
                    };
                }
            }

            if response.tool_calls.is_empty() {
                let _ = events.send(TurnEvent::TurnCompleted).await;
                return TurnOutcome { final_agent: active_agent.name.clone(), final_text: Some(response.content), aborted_reason: None };
            }

            let mut assistant_blocks: Vec<Value> = Vec::new();
            if !response.content.is_empty() {
                assistant_blocks.push(serde_json::json!({"type": "text", "text": response.content}));
            }
            for call in &response.tool_calls {
                assistant_blocks.push(serde_json::json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": call.input,
                }));
            }
            history.push(serde_json::json!({"role": "assistant", "content": assistant_blocks}));

            let mut result_blocks: Vec<Value> = Vec::new();
            for call in &response.tool_calls {
                let _ = events.send(TurnEvent::ToolCall { name: call.name.clone(), args: call.input.clone() }).await;

                let outcome = self.invoke_tool(&active_agent, &envelope.session_id, &call.name, call.input.clone()).await;

                let _ = events
                    .send(TurnEvent::ToolResult {
                        name: call.name.clone(),
                        status: outcome.status,
                        kind: outcome.kind.clone(),
                        truncated_value: outcome.truncated(skynet_core::config::TOOL_RESULT_TRUNCATE_CHARS),
                    })
                    .await;

                let content_str = serde_json::to_string(&outcome.truncated(skynet_core::config::TOOL_RESULT_TRUNCATE_CHARS))
                    .unwrap_or_else(|_| "null".to_string());
                result_blocks.push(serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": call.id,
                    "content": content_str,
                    "is_error": outcome.status == ToolStatus::Error,
                }));
            }
            history.push(serde_json::json!({"role": "user", "content": result_blocks}));
        }
    }

    async fn call_model(&self, agent: &AgentSpec, history: &[Value]) -> std::result::Result<crate::provider::ChatResponse, String> {
        let snapshot = self.config.snapshot();
        let (provider, model) = model_resolution::resolve(&agent.model_reference, &snapshot.base.providers, &self.credentials)
            .map_err(|e| e.to_string())?;

        // memory_search/memory_store are part of the core surface for every
        // agent regardless of whether its own tool_names lists them.
        let mut tool_names = agent.tool_names.clone();
        for core in [crate::memory_tools::MEMORY_SEARCH, crate::memory_tools::MEMORY_STORE] {
            if !tool_names.iter().any(|n| n == core) {
                tool_names.push(core.to_string());
            }
        }
        let tools = self.tools.definitions_for(&tool_names);

        let request = ChatRequest {
            model,
            system: agent.instructions.clone(),
            system_prompt: None,
            messages: Vec::new(),
            max_tokens: 4096,
            stream: false,
            thinking: None,
            tools,
            raw_messages: Some(history.to_vec()),
        };

        let mut last_err = None;
        for attempt in 0..MAX_PROVIDER_RETRIES {
            match provider.send(&request).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    warn!(attempt, err = %e, "model provider call failed");
                    last_err = Some(e.to_string());
                    tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt))).await;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| "model provider unavailable".to_string()))
    }

    async fn invoke_tool(&self, agent: &AgentSpec, session_id: &str, name: &str, args: Value) -> ToolOutcome {
        let ctx = InvocationContext {
            session_id: session_id.to_string(),
            memory: self.memory.clone(),
            config: self.config.snapshot(),
            credentials: self.credentials.clone(),
            agent_memory_scope: agent.memory_scope.clone(),
        };
        match self.tools.invoke(name, args, &ctx, DEFAULT_TOOL_TIMEOUT).await {
            Ok(outcome) => outcome,
            Err(e @ crate::tool_registry::ToolRegistryError::Timeout { .. }) => {
                info!(tool = %name, err = %e, "tool invocation timed out, fed back to model");
                ToolOutcome::timeout(e.to_string())
            }
            Err(e) => {
                info!(tool = %name, err = %e, "tool invocation error fed back to model");
                ToolOutcome::error(e.to_string())
            }
        }
    }

    async fn abort(&self, events: &mpsc::Sender<TurnEvent>, agent: &AgentSpec, reason: &str) -> TurnOutcome {
        let _ = events.send(TurnEvent::TurnAborted { reason: reason.to_string() }).await;
        TurnOutcome { final_agent: agent.name.clone(), final_text: None, aborted_reason: Some(reason.to_string()) }
    }
}

/// Looks for a `transfer_to_agent(name)`-shaped directive in the model's
/// text output. Providers that support native function-calling for the
/// transfer capability would surface it as a distinguished tool call
/// instead; this textual fallback covers providers that don't.
fn extract_transfer_directive(text: &str) -> Option<String> {
    let start = text.find("transfer_to_agent(")?;
    let rest = &text[start + "transfer_to_agent(".len()..];
    let end = rest.find(')')?;
    let name = rest[..end].trim().trim_matches(|c| c == '"' || c == '\'');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_transfer_directive_from_text() {
        assert_eq!(extract_transfer_directive("ok, transfer_to_agent(\"billing\") now"), Some("billing".to_string()));
        assert_eq!(extract_transfer_directive("no directive here"), None);
        assert_eq!(extract_transfer_directive("transfer_to_agent()"), None);
    }

    #[test]
    fn extracts_unquoted_directive() {
        assert_eq!(extract_transfer_directive("transfer_to_agent(billing)"), Some("billing".to_string()));
    }
}
