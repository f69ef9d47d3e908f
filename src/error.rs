use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `replyforge`.
///
/// Library callers can match on these to decide recovery strategy; internal
/// code continues to use `anyhow::Result` for ad-hoc context chains. The
/// pipeline itself never lets an error reach the caller of `run`/`finalize`:
/// every backend or parse failure degrades to a deterministic default, and
/// the worst observable outcome is an empty draft.
#[derive(Debug, Error)]
pub enum ForgeError {
    // ── Prompt / Template ───────────────────────────────────────────────
    #[error("prompt: {0}")]
    Prompt(#[from] PromptError),

    // ── Generation backend ──────────────────────────────────────────────
    #[error("backend: {0}")]
    Backend(#[from] BackendError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Prompt errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template {name} not registered")]
    Missing { name: String },

    #[error("template {name} is not valid: {message}")]
    Register { name: String, message: String },

    #[error("template {name} failed to render: {message}")]
    Render { name: String, message: String },
}

// ─── Backend errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(String),

    #[error("backend returned empty response")]
    Empty,
}
