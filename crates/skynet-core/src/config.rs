use std::sync::RwLock;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

// Wire/protocol constants.
pub const PROTOCOL_VERSION: u32 = 3;
pub const DEFAULT_PORT: u16 = 18789;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const MAX_PAYLOAD_BYTES: usize = 128 * 1024; // 128 KB hard cap per WS frame
pub const MAX_WEBHOOK_BODY_BYTES: usize = 64 * 1024; // 64 KiB default cap per webhook body
pub const MAX_BUFFERED_BYTES: usize = 1024 * 1024; // 1 MB: slow consumer threshold
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000; // close if client doesn't auth in 10s
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30; // tick event cadence
pub const MAX_TOOL_LOOP_ITERATIONS: u32 = 25; // per-turn tool-call/tool-result cycles
pub const MAX_TURN_WALL_CLOCK_SECS: u64 = 120; // cooperative per-trigger budget
pub const TOOL_RESULT_TRUNCATE_CHARS: usize = 4000; // compact result cap fed back to the model

/// Top-level config (skynet.toml + SKYNET_* env overrides). This is the
/// lowest-priority layer in the resolver (DB rows > file > env).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkynetConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub agents: Vec<AgentDef>,
    /// Symmetric key material used to derive the credential store's
    /// encryption key. Treated as a secret itself; usually supplied via
    /// the `SKYNET_CREDENTIAL_KEY` env var rather than the TOML file.
    #[serde(default = "default_credential_key")]
    pub credential_key: String,
    /// Bearer token protecting the `/admin/api/` surface.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for SkynetConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            gateway: GatewayConfig {
                port: DEFAULT_PORT,
                bind: DEFAULT_BIND.to_string(),
                auth: AuthConfig {
                    mode: AuthMode::Token,
                    token: Some("change-me".to_string()),
                },
            },
            providers: ProvidersConfig::default(),
            agents: vec![AgentDef::default_root()],
            credential_key: default_credential_key(),
            admin_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    Token,
    None,
}

/// One agent definition as loaded from config — the boot-time seed for the
/// in-memory `AgentSpec` registry built by `skynet-agent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDef {
    pub name: String,
    pub instructions: String,
    /// E.g. `"claude-sonnet-4-6"`, `"ollama_chat/llama3"`, `"openai/gpt-4.1"`.
    pub model_reference: String,
    #[serde(default)]
    pub tool_names: Vec<String>,
    /// Memory scope tag passed as `source_agent` on every memory tool call.
    /// Defaults to the agent's own name.
    pub memory_scope: Option<String>,
    #[serde(default)]
    pub sub_agent_names: Vec<String>,
}

impl AgentDef {
    fn default_root() -> Self {
        Self {
            name: "root".to_string(),
            instructions: "You are the root orchestrator. Delegate to specialists by name when a request matches their scope; otherwise answer directly.".to_string(),
            model_reference: default_model(),
            tool_names: vec!["memory_search".to_string(), "memory_store".to_string()],
            memory_scope: None,
            sub_agent_names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiProviderConfig>,
    pub ollama: Option<OllamaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.skynet/skynet.db", home)
}
fn default_credential_key() -> String {
    "change-me-32-byte-minimum-secret".to_string()
}

impl SkynetConfig {
    /// Load config from a TOML file with SKYNET_* env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: SkynetConfig = Figment::from(figment::providers::Serialized::defaults(
            SkynetConfig::default(),
        ))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("SKYNET_").split("_"))
        .extract()
        .map_err(|e| crate::error::SkynetError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.skynet/skynet.toml", home)
}

/// A single section of DB-overlaid configuration (`config_entries` table).
/// `section` groups keys the way `gateway`/`providers`/`agents` group the
/// file config; `value` is raw JSON so arbitrary shapes can be stored
/// without a schema migration per field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub section: String,
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: String,
}

/// Layers DB-stored overrides on top of the file/env-resolved `SkynetConfig`
/// and republishes a resolved snapshot whenever a DB-layer write lands.
///
/// Priority, high to low: DB `config_entries` rows > file config > env vars.
/// (Env vars are already merged into `base` by `SkynetConfig::load`, so this
/// resolver only has two layers to reconcile: DB overlay vs. base.)
pub struct ConfigResolver {
    base: SkynetConfig,
    overlay: RwLock<serde_json::Map<String, serde_json::Value>>,
    tx: watch::Sender<u64>,
    version: std::sync::atomic::AtomicU64,
}

impl ConfigResolver {
    pub fn new(base: SkynetConfig) -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            base,
            overlay: RwLock::new(serde_json::Map::new()),
            tx,
            version: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Subscribe to hot-reload notifications. The payload is an opaque
    /// monotonically increasing version counter, not the config itself —
    /// subscribers re-read via `snapshot()`/`get_field` on wakeup.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Apply a DB-layer override for `section.key` and notify subscribers.
    pub fn set_override(&self, section: &str, key: &str, value: serde_json::Value) {
        let mut overlay = self.overlay.write().unwrap();
        let section_obj = overlay
            .entry(section.to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if let serde_json::Value::Object(map) = section_obj {
            map.insert(key.to_string(), value);
        }
        drop(overlay);
        let v = self.version.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        let _ = self.tx.send(v);
        info!(section, key, "config override applied, resolver version bumped");
    }

    /// Read back a single resolved field. The DB overlay wins over the
    /// file/env-resolved base; when both sides hold an object at this key,
    /// they are deep-merged rather than one replacing the other wholesale.
    pub fn get_field(&self, section: &str, key: &str) -> Option<serde_json::Value> {
        let overlay = self.overlay.read().unwrap();
        let overlay_value = overlay.get(section).and_then(|s| s.get(key)).cloned();
        drop(overlay);
        let base_json = serde_json::to_value(&self.base).ok()?;
        let base_value = base_json.get(section)?.get(key).cloned();
        merge_optional(base_value, overlay_value)
    }

    pub fn base(&self) -> &SkynetConfig {
        &self.base
    }

    /// Immutable read-only snapshot for handing to tool invocation contexts.
    pub fn snapshot(&self) -> ConfigSnapshot {
        let overlay = self.overlay.read().unwrap().clone();
        ConfigSnapshot {
            base: self.base.clone(),
            overlay,
        }
    }
}

/// A point-in-time, cheaply cloneable view of resolved config handed to
/// tool invocations (`InvocationContext`) so tools never hold a lock on
/// the live resolver across an `await`.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub base: SkynetConfig,
    pub overlay: serde_json::Map<String, serde_json::Value>,
}

impl ConfigSnapshot {
    pub fn get_field(&self, section: &str, key: &str) -> Option<serde_json::Value> {
        let overlay_value = self.overlay.get(section).and_then(|s| s.get(key)).cloned();
        let base_json = serde_json::to_value(&self.base).ok()?;
        let base_value = base_json.get(section)?.get(key).cloned();
        merge_optional(base_value, overlay_value)
    }
}

/// Deep-merges `overlay` onto `base`: object values are merged key by key
/// (recursively), any other value in `overlay` replaces the corresponding
/// `base` value outright.
pub fn deep_merge(base: &serde_json::Value, overlay: &serde_json::Value) -> serde_json::Value {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (k, overlay_v) in overlay_map {
                let next = match merged.get(k) {
                    Some(base_v) => deep_merge(base_v, overlay_v),
                    None => overlay_v.clone(),
                };
                merged.insert(k.clone(), next);
            }
            serde_json::Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

fn merge_optional(base: Option<serde_json::Value>, overlay: Option<serde_json::Value>) -> Option<serde_json::Value> {
    match (base, overlay) {
        (Some(b), Some(o)) => Some(deep_merge(&b, &o)),
        (Some(b), None) => Some(b),
        (None, Some(o)) => Some(o),
        (None, None) => None,
    }
}
