//! The context handed to every tool invocation. Tools must not retain it
//! beyond the call — it borrows a config snapshot that goes stale the
//! instant the resolver's overlay changes underneath it.

use std::sync::Arc;

use skynet_core::config::ConfigSnapshot;
use skynet_credentials::CredentialStore;
use skynet_memory::MemoryService;

#[derive(Clone)]
pub struct InvocationContext {
    pub session_id: String,
    pub memory: MemoryService,
    pub config: ConfigSnapshot,
    pub credentials: Arc<CredentialStore>,
    /// The invoking agent's `memory_scope` — tools that touch memory tag
    /// reads/writes with this rather than taking it as an argument.
    pub agent_memory_scope: Option<String>,
}
