//! `skynet-agent` — the Agent Orchestration Runtime: a static roster of
//! `AgentSpec`s, a Tool Registry, model resolution across hosted and local
//! providers, and the bounded turn loop that ties them together.

pub mod agents;
pub mod anthropic;
pub mod anthropic_stream;
pub mod events;
pub mod general_tools;
pub mod invocation;
pub mod memory_tools;
pub mod model_resolution;
pub mod ollama;
pub mod openai;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod stream;
pub mod thinking;
pub mod tool_registry;

pub use agents::{AgentRegistry, AgentRegistryError, AgentSpec};
pub use events::TurnEvent;
pub use invocation::InvocationContext;
pub use orchestrator::{AgentOrchestrator, TurnOutcome};
pub use tool_registry::{ToolDescriptor, ToolInvoker, ToolOutcome, ToolRegistry, ToolStatus};

/// Builds the tool registry every agent draws its `tool_names` catalog from:
/// the mandatory memory tools plus the general-purpose file/shell tools.
pub fn build_tool_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    memory_tools::register_core_tools(&mut registry);
    general_tools::register(&mut registry);
    registry
}
