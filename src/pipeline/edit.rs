//! Targeted editing: apply the reviewer's patch plan to a draft.
//! Editing never produces an empty result; with no template, no patch plan
//! or an empty backend answer the original draft comes back unchanged.

use std::sync::Arc;

use crate::backend::{ChatMessage, GenerationBackend};
use crate::prompt::{PROMPT_EDIT, PromptSet};

use super::context::PatchOp;
use super::directive::Constraints;

pub async fn edit_draft(
    draft: &str,
    patch_plan: &[PatchOp],
    constraints: &Constraints,
    prompts: &PromptSet,
    backend: &Arc<dyn GenerationBackend>,
) -> String {
    if patch_plan.is_empty() {
        return draft.to_string();
    }

    let mut ctx = tera::Context::new();
    ctx.insert(
        "patch_plan",
        &serde_json::to_string(patch_plan).unwrap_or_default(),
    );
    ctx.insert("draft", draft);
    ctx.insert(
        "constraints",
        &serde_json::to_string(constraints).unwrap_or_default(),
    );

    let Some(prompt) = prompts.render(PROMPT_EDIT, &ctx) else {
        return draft.to_string();
    };

    match backend.chat(&[ChatMessage::user(prompt)], 0.2, 1024).await {
        Ok(response) => {
            let revised = response.trim();
            if revised.is_empty() {
                draft.to_string()
            } else {
                revised.to_string()
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "edit failed, keeping original draft");
            draft.to_string()
        }
    }
}
