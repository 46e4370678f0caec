//! `AgentSpec` registry — the static, boot-time roster of agents, resolved
//! from config and re-resolved whenever the `agent` config section changes.

use std::collections::HashMap;
use std::sync::RwLock;

use skynet_core::config::AgentDef;

/// One resolved agent. Cloned freely; cheap (string fields only).
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub name: String,
    pub instructions: String,
    pub model_reference: String,
    pub tool_names: Vec<String>,
    /// Defaults to the agent's own name when unset in config.
    pub memory_scope: Option<String>,
    pub sub_agent_names: Vec<String>,
}

impl From<&AgentDef> for AgentSpec {
    fn from(def: &AgentDef) -> Self {
        Self {
            name: def.name.clone(),
            instructions: def.instructions.clone(),
            model_reference: def.model_reference.clone(),
            tool_names: def.tool_names.clone(),
            memory_scope: def.memory_scope.clone().or_else(|| Some(def.name.clone())),
            sub_agent_names: def.sub_agent_names.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentRegistryError {
    #[error("unknown agent: {name}")]
    UnknownAgent { name: String },
    #[error("no agents configured")]
    Empty,
}

/// In-memory registry of agents, keyed by name. Rebuilt wholesale on every
/// config change that touches the `agent` section — agents never mutate in
/// place.
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, AgentSpec>>,
}

impl AgentRegistry {
    pub fn from_defs(defs: &[AgentDef]) -> Result<Self, AgentRegistryError> {
        if defs.is_empty() {
            return Err(AgentRegistryError::Empty);
        }
        let agents = defs.iter().map(|d| (d.name.clone(), AgentSpec::from(d))).collect();
        Ok(Self { agents: RwLock::new(agents) })
    }

    /// Replace the entire roster. Called after a config reload.
    pub fn reload(&self, defs: &[AgentDef]) {
        let agents = defs.iter().map(|d| (d.name.clone(), AgentSpec::from(d))).collect();
        *self.agents.write().unwrap() = agents;
    }

    pub fn get(&self, name: &str) -> Result<AgentSpec, AgentRegistryError> {
        self.agents
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| AgentRegistryError::UnknownAgent { name: name.to_string() })
    }

    pub fn root(&self) -> Result<AgentSpec, AgentRegistryError> {
        self.get("root")
    }

    /// `true` if `candidate` is a legal transfer target from `from`: either
    /// one of `from`'s declared sub-agents, or a "return" to the agent that
    /// originally delegated to `from`.
    pub fn can_transfer(&self, from: &AgentSpec, candidate: &str, originating_agent: &str) -> bool {
        from.sub_agent_names.iter().any(|n| n == candidate) || candidate == originating_agent
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.read().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, sub_agents: &[&str]) -> AgentDef {
        AgentDef {
            name: name.to_string(),
            instructions: format!("You are {name}."),
            model_reference: "claude-sonnet-4-6".to_string(),
            tool_names: vec![],
            memory_scope: None,
            sub_agent_names: sub_agents.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn memory_scope_defaults_to_agent_name() {
        let registry = AgentRegistry::from_defs(&[def("root", &["billing"])]).unwrap();
        let root = registry.get("root").unwrap();
        assert_eq!(root.memory_scope.as_deref(), Some("root"));
    }

    #[test]
    fn unknown_agent_errors() {
        let registry = AgentRegistry::from_defs(&[def("root", &[])]).unwrap();
        assert!(matches!(registry.get("ghost"), Err(AgentRegistryError::UnknownAgent { .. })));
    }

    #[test]
    fn transfer_legal_to_declared_sub_agent() {
        let registry = AgentRegistry::from_defs(&[def("root", &["billing"]), def("billing", &[])]).unwrap();
        let root = registry.get("root").unwrap();
        assert!(registry.can_transfer(&root, "billing", "root"));
        assert!(!registry.can_transfer(&root, "scheduling", "root"));
    }

    #[test]
    fn transfer_legal_back_to_originating_agent() {
        let registry = AgentRegistry::from_defs(&[def("root", &["billing"]), def("billing", &[])]).unwrap();
        let billing = registry.get("billing").unwrap();
        assert!(registry.can_transfer(&billing, "root", "root"));
    }

    #[test]
    fn reload_replaces_roster() {
        let registry = AgentRegistry::from_defs(&[def("root", &[])]).unwrap();
        registry.reload(&[def("root", &["billing"]), def("billing", &[])]);
        assert_eq!(registry.names().len(), 2);
    }
}
