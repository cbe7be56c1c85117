use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("Agent response parse error: {0}")]
    Parse(String),

    #[error("Agent timed out after {0}ms")]
    Timeout(u64),

    #[error("Agent disabled: {0}")]
    Disabled(String),

    #[error("Invalid estimate: {0}")]
    InvalidEstimate(String),

    #[error("Memory error: {0}")]
    Memory(#[from] tribunal_memory::MemoryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
