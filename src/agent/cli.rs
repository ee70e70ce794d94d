//! Agent CLI selection and command construction.
//!
//! Each supported CLI is one enum variant holding only the flags particular to
//! that program. The rest of the crate treats agents as opaque: run one
//! prompt, get one transcript.

use std::process::Stdio;
use tokio::process::Command;

/// Default model passed to the Claude CLI.
pub const DEFAULT_CLAUDE_MODEL: &str = "sonnet";

/// A supported agent CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCli {
    /// Anthropic's `claude` CLI in print mode with JSON output.
    Claude {
        /// Model alias forwarded via `--model`.
        model: String,
    },
    /// OpenAI's `codex` CLI in non-interactive exec mode.
    Codex,
    /// Google's `gemini` CLI in non-interactive mode.
    Gemini,
}

impl AgentCli {
    /// Resolve an agent name from the closed set. Returns `None` for unknown
    /// names; callers report those as failures rather than panicking.
    pub fn resolve(name: &str) -> Option<Self> {
        match name {
            "claude" => Some(AgentCli::Claude {
                model: DEFAULT_CLAUDE_MODEL.to_string(),
            }),
            "codex" => Some(AgentCli::Codex),
            "gemini" => Some(AgentCli::Gemini),
            _ => None,
        }
    }

    /// The external program name.
    pub fn program(&self) -> &'static str {
        match self {
            AgentCli::Claude { .. } => "claude",
            AgentCli::Codex => "codex",
            AgentCli::Gemini => "gemini",
        }
    }

    /// Whether this CLI wraps its transcript in a JSON envelope that must be
    /// unwrapped before marker search.
    pub fn emits_json_envelope(&self) -> bool {
        matches!(self, AgentCli::Claude { .. })
    }

    /// Build the non-interactive invocation for one prompt.
    ///
    /// The prompt travels as the final positional argument; flags select the
    /// model, grant automatic tool-use permission, and request
    /// machine-readable output where the CLI supports it.
    pub fn build_command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(self.program());
        match self {
            AgentCli::Claude { model } => {
                cmd.arg("-p")
                    .arg("--output-format")
                    .arg("json")
                    .arg("--model")
                    .arg(model)
                    .arg("--dangerously-skip-permissions")
                    .arg(prompt);
            }
            AgentCli::Codex => {
                cmd.arg("exec").arg("--full-auto").arg(prompt);
            }
            AgentCli::Gemini => {
                cmd.arg("--yolo").arg("--prompt").arg(prompt);
            }
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}
