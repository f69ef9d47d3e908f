//! Post → `PostBrief` extraction.
//!
//! One backend call behind a template, with a three-tier deterministic
//! fallback (empty input, missing template, parse/backend failure) so the
//! pipeline never stalls on this stage.

use std::sync::Arc;

use crate::backend::{ChatMessage, GenerationBackend};
use crate::prompt::{PROMPT_POST_BRIEF, PromptSet};

use super::context::PostBrief;
use super::extract::extract_json;

const MAIN_CLAIM_MAX_CHARS: usize = 200;

fn fallback_brief(post_text: &str) -> PostBrief {
    let main_claim: String = post_text.chars().take(MAIN_CLAIM_MAX_CHARS).collect();
    PostBrief {
        main_claim,
        anchors: Vec::new(),
        tone: "neutral".to_string(),
        tags: Vec::new(),
    }
}

pub async fn build_post_brief(
    post_text: &str,
    prompts: &PromptSet,
    backend: &Arc<dyn GenerationBackend>,
) -> PostBrief {
    if post_text.trim().is_empty() {
        return PostBrief {
            tone: "neutral".to_string(),
            ..PostBrief::default()
        };
    }

    let mut ctx = tera::Context::new();
    ctx.insert("post_text", post_text.trim());
    let Some(prompt) = prompts.render(PROMPT_POST_BRIEF, &ctx) else {
        return fallback_brief(post_text);
    };

    let response = match backend.chat(&[ChatMessage::user(prompt)], 0.2, 512).await {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "post brief generation failed, using fallback");
            return fallback_brief(post_text);
        }
    };

    match extract_json(&response).and_then(|v| serde_json::from_value::<PostBrief>(v).ok()) {
        Some(mut brief) => {
            if brief.tone.is_empty() {
                brief.tone = "neutral".to_string();
            }
            brief
        }
        None => fallback_brief(post_text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NoopBackend;

    fn backend() -> Arc<dyn GenerationBackend> {
        Arc::new(NoopBackend)
    }

    #[test]
    fn empty_post_yields_empty_brief() {
        let brief = tokio_test::block_on(build_post_brief("  ", &PromptSet::builtin(), &backend()));
        assert_eq!(brief.main_claim, "");
        assert_eq!(brief.tone, "neutral");
        assert!(brief.anchors.is_empty());
    }

    #[tokio::test]
    async fn missing_template_truncates_post_text() {
        let long_post = "д".repeat(300);
        let brief = build_post_brief(&long_post, &PromptSet::empty(), &backend()).await;
        assert_eq!(brief.main_claim.chars().count(), 200);
        assert_eq!(brief.tone, "neutral");
    }

    #[tokio::test]
    async fn unparsable_backend_output_falls_back() {
        let brief = build_post_brief("Rates are up.", &PromptSet::builtin(), &backend()).await;
        assert_eq!(brief.main_claim, "Rates are up.");
        assert!(brief.tags.is_empty());
    }
}
