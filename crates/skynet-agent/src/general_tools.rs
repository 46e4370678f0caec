//! General-purpose specialist tools — `read_file`, `write_file`,
//! `list_files`, `search_files`, `execute_command`. Ported from the
//! teacher's coding-assistant tool catalog onto the `ToolInvoker` trait;
//! `execute_command` is simplified to a one-shot `tokio::process::Command`
//! rather than the teacher's PTY-backed persistent bash session, since
//! persistent terminal sessions are outside this system's CORE.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::invocation::InvocationContext;
use crate::tool_registry::{ToolDescriptor, ToolInvoker, ToolOutcome};

const MAX_OUTPUT_CHARS: usize = 30_000;
const MAX_LIST_ENTRIES: usize = 1_000;
const MAX_SEARCH_MATCHES: usize = 100;
const COMMAND_TIMEOUT_SECS: u64 = 30;

pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const LIST_FILES: &str = "list_files";
pub const SEARCH_FILES: &str = "search_files";
pub const EXECUTE_COMMAND: &str = "execute_command";

struct ReadFileTool;

#[async_trait]
impl ToolInvoker for ReadFileTool {
    async fn invoke(&self, args: Value, _ctx: &InvocationContext) -> ToolOutcome {
        let Some(path) = args.get("path").and_then(Value::as_str) else {
            return ToolOutcome::error("read_file requires a string `path`");
        };

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => return ToolOutcome::error(format!("failed to read '{path}': {e}")),
        };

        let offset = args.get("offset").and_then(Value::as_u64).map(|v| v.saturating_sub(1) as usize);
        let limit = args.get("limit").and_then(Value::as_u64).map(|v| v as usize);

        let result = if offset.is_some() || limit.is_some() {
            let start = offset.unwrap_or(0);
            let lines: Vec<&str> = content.lines().skip(start).collect();
            let lines = if let Some(n) = limit { &lines[..n.min(lines.len())] } else { &lines[..] };
            lines.join("\n")
        } else {
            content
        };

        let result = if result.len() > MAX_OUTPUT_CHARS {
            format!("{}\n\n[output truncated at {MAX_OUTPUT_CHARS} characters]", &result[..MAX_OUTPUT_CHARS])
        } else {
            result
        };

        ToolOutcome::success(Value::String(result))
    }
}

struct WriteFileTool;

#[async_trait]
impl ToolInvoker for WriteFileTool {
    async fn invoke(&self, args: Value, _ctx: &InvocationContext) -> ToolOutcome {
        let Some(path) = args.get("path").and_then(Value::as_str) else {
            return ToolOutcome::error("write_file requires a string `path`");
        };
        let Some(content) = args.get("content").and_then(Value::as_str) else {
            return ToolOutcome::error("write_file requires a string `content`");
        };

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ToolOutcome::error(format!("failed to create directories for '{path}': {e}"));
                }
            }
        }

        let byte_len = content.len();
        if let Err(e) = std::fs::write(path, content) {
            return ToolOutcome::error(format!("failed to write '{path}': {e}"));
        }

        ToolOutcome::success(Value::String(format!("wrote {byte_len} bytes to '{path}'")))
    }
}

struct ListFilesTool;

#[async_trait]
impl ToolInvoker for ListFilesTool {
    async fn invoke(&self, args: Value, _ctx: &InvocationContext) -> ToolOutcome {
        let Some(path) = args.get("path").and_then(Value::as_str) else {
            return ToolOutcome::error("list_files requires a string `path`");
        };

        let read_dir = match std::fs::read_dir(path) {
            Ok(rd) => rd,
            Err(e) => return ToolOutcome::error(format!("failed to list '{path}': {e}")),
        };

        let mut entries = Vec::new();
        let mut truncated = false;
        for entry in read_dir {
            if entries.len() >= MAX_LIST_ENTRIES {
                truncated = true;
                break;
            }
            let Ok(entry) = entry else { continue };
            let Ok(metadata) = entry.metadata() else { continue };
            let name = entry.file_name().to_string_lossy().to_string();
            let kind = if metadata.is_dir() { "dir" } else { "file" };
            entries.push(format!("[{kind}] {name} ({} bytes)", metadata.len()));
        }
        entries.sort();

        let mut output = entries.join("\n");
        if truncated {
            output.push_str(&format!("\n\n[truncated at {MAX_LIST_ENTRIES} entries]"));
        }
        ToolOutcome::success(Value::String(output))
    }
}

struct SearchFilesTool;

#[async_trait]
impl ToolInvoker for SearchFilesTool {
    async fn invoke(&self, args: Value, _ctx: &InvocationContext) -> ToolOutcome {
        let Some(root) = args.get("path").and_then(Value::as_str) else {
            return ToolOutcome::error("search_files requires a string `path`");
        };
        let Some(pattern) = args.get("pattern").and_then(Value::as_str) else {
            return ToolOutcome::error("search_files requires a string `pattern`");
        };
        let file_pattern = args.get("file_pattern").and_then(Value::as_str);

        let mut matches = Vec::new();
        let mut truncated = false;
        search_dir(Path::new(root), pattern, file_pattern, &mut matches, &mut truncated);

        if matches.is_empty() {
            return ToolOutcome::success(Value::String("no matches found".to_string()));
        }
        let mut output = matches.join("\n");
        if truncated {
            output.push_str(&format!("\n\n[truncated at {MAX_SEARCH_MATCHES} matches]"));
        }
        ToolOutcome::success(Value::String(output))
    }
}

fn search_dir(dir: &Path, pattern: &str, file_pattern: Option<&str>, matches: &mut Vec<String>, truncated: &mut bool) {
    let Ok(read_dir) = std::fs::read_dir(dir) else { return };
    let mut entries: Vec<_> = read_dir.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    entries.sort();

    for entry in entries {
        if *truncated {
            return;
        }
        if entry.file_name().is_some_and(|n| n == ".git") {
            continue;
        }
        if entry.is_dir() {
            search_dir(&entry, pattern, file_pattern, matches, truncated);
        } else if entry.is_file() {
            if let Some(fp) = file_pattern {
                if !entry.to_string_lossy().ends_with(fp) {
                    continue;
                }
            }
            search_file(&entry, pattern, matches, truncated);
        }
    }
}

fn search_file(path: &Path, pattern: &str, matches: &mut Vec<String>, truncated: &mut bool) {
    let Ok(content) = std::fs::read(path) else { return };
    let probe = &content[..content.len().min(8192)];
    if probe.contains(&0u8) {
        return;
    }
    let Ok(text) = std::str::from_utf8(&content) else { return };
    let display_path = path.to_string_lossy();

    for (line_idx, line) in text.lines().enumerate() {
        if *truncated {
            return;
        }
        if line.contains(pattern) {
            matches.push(format!("{display_path}:{}: {line}", line_idx + 1));
            if matches.len() >= MAX_SEARCH_MATCHES {
                *truncated = true;
                return;
            }
        }
    }
}

struct ExecuteCommandTool;

#[async_trait]
impl ToolInvoker for ExecuteCommandTool {
    async fn invoke(&self, args: Value, _ctx: &InvocationContext) -> ToolOutcome {
        let Some(command) = args.get("command").and_then(Value::as_str) else {
            return ToolOutcome::error("execute_command requires a string `command`");
        };

        let run = Command::new("sh").arg("-c").arg(command).output();
        let output = match tokio::time::timeout(std::time::Duration::from_secs(COMMAND_TIMEOUT_SECS), run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolOutcome::error(format!("failed to spawn command: {e}")),
            Err(_) => return ToolOutcome::error("command timed out"),
        };

        let mut rendered = String::new();
        rendered.push_str(&String::from_utf8_lossy(&output.stdout));
        if !output.stderr.is_empty() {
            if !rendered.is_empty() {
                rendered.push('\n');
            }
            rendered.push_str("[stderr]\n");
            rendered.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            rendered.push_str(&format!("\n[exit code: {}]", output.status.code().unwrap_or(-1)));
        }
        if rendered.is_empty() {
            rendered = "(no output)".to_string();
        }

        if output.status.success() {
            ToolOutcome::success(Value::String(rendered))
        } else {
            ToolOutcome::error(rendered)
        }
    }
}

pub fn register(registry: &mut crate::tool_registry::ToolRegistry) {
    registry.register(ToolDescriptor::new(
        READ_FILE,
        "Read the contents of a file. Optionally limit to a line range with `offset`/`limit`.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute or relative path to the file"},
                "offset": {"type": "integer", "description": "1-based line number to start reading from"},
                "limit": {"type": "integer", "description": "Maximum number of lines to return"}
            },
            "required": ["path"]
        }),
        std::sync::Arc::new(ReadFileTool),
    ));
    registry.register(ToolDescriptor::new(
        WRITE_FILE,
        "Write content to a file, creating parent directories as needed. Overwrites existing files.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute or relative path to write to"},
                "content": {"type": "string", "description": "Text content to write"}
            },
            "required": ["path", "content"]
        }),
        std::sync::Arc::new(WriteFileTool),
    ));
    registry.register(ToolDescriptor::new(
        LIST_FILES,
        "List the contents of a directory with type and size info. Returns at most 1000 entries.",
        serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string", "description": "Directory to list"}},
            "required": ["path"]
        }),
        std::sync::Arc::new(ListFilesTool),
    ));
    registry.register(ToolDescriptor::new(
        SEARCH_FILES,
        "Recursively search file contents for a substring pattern. Returns at most 100 matches.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Root directory to search in"},
                "pattern": {"type": "string", "description": "Substring to search for (case-sensitive)"},
                "file_pattern": {"type": "string", "description": "Optional filename suffix filter, e.g. '.rs'"}
            },
            "required": ["path", "pattern"]
        }),
        std::sync::Arc::new(SearchFilesTool),
    ));
    registry.register(ToolDescriptor::new(
        EXECUTE_COMMAND,
        "Execute a shell command via `sh -c` and return its stdout/stderr. Timeout 30s.",
        serde_json::json!({
            "type": "object",
            "properties": {"command": {"type": "string", "description": "The shell command to run"}},
            "required": ["command"]
        }),
        std::sync::Arc::new(ExecuteCommandTool),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_registry::{ToolRegistry, ToolStatus, DEFAULT_TOOL_TIMEOUT};
    use std::sync::Arc;

    fn ctx() -> InvocationContext {
        InvocationContext {
            session_id: "s1".to_string(),
            memory: skynet_memory::MemoryService::in_memory().unwrap(),
            config: skynet_core::config::ConfigSnapshot {
                base: skynet_core::config::SkynetConfig::default(),
                overlay: serde_json::Map::new(),
            },
            credentials: Arc::new(
                skynet_credentials::CredentialStore::new(
                    rusqlite::Connection::open_in_memory().unwrap(),
                    "test-key-that-is-at-least-32-bytes!",
                )
                .unwrap(),
            ),
            agent_memory_scope: None,
        }
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt").to_string_lossy().to_string();
        let mut registry = ToolRegistry::new();
        register(&mut registry);

        let write_out = registry
            .invoke(WRITE_FILE, serde_json::json!({"path": path, "content": "hello"}), &ctx(), DEFAULT_TOOL_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(write_out.status, ToolStatus::Success);

        let read_out = registry.invoke(READ_FILE, serde_json::json!({"path": path}), &ctx(), DEFAULT_TOOL_TIMEOUT).await.unwrap();
        assert_eq!(read_out.value, serde_json::json!("hello"));
    }

    #[tokio::test]
    async fn read_missing_file_is_a_tool_error() {
        let mut registry = ToolRegistry::new();
        register(&mut registry);
        let out = registry
            .invoke(READ_FILE, serde_json::json!({"path": "/does/not/exist"}), &ctx(), DEFAULT_TOOL_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out.status, ToolStatus::Error);
    }

    #[tokio::test]
    async fn execute_command_captures_stdout() {
        let mut registry = ToolRegistry::new();
        register(&mut registry);
        let out = registry
            .invoke(EXECUTE_COMMAND, serde_json::json!({"command": "echo hi"}), &ctx(), DEFAULT_TOOL_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out.status, ToolStatus::Success);
        assert_eq!(out.value, serde_json::json!("hi\n"));
    }

    #[tokio::test]
    async fn search_files_finds_substring() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn marker_token() {}").unwrap();
        let mut registry = ToolRegistry::new();
        register(&mut registry);
        let out = registry
            .invoke(
                SEARCH_FILES,
                serde_json::json!({"path": dir.path().to_string_lossy(), "pattern": "marker_token"}),
                &ctx(),
                DEFAULT_TOOL_TIMEOUT,
            )
            .await
            .unwrap();
        assert!(out.value.as_str().unwrap().contains("marker_token"));
    }
}
