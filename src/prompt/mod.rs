//! Tera-backed registry for the pipeline prompts.
//!
//! A missing template is not an error anywhere in the pipeline: each call
//! site falls back to its deterministic default (empty drafts, rule-only
//! review, unedited draft). `PromptSet::empty()` exists precisely to
//! exercise those paths in tests.

use std::sync::Arc;

use tera::Tera;

use crate::error::PromptError;

pub const PROMPT_POST_BRIEF: &str = "post_brief";
pub const PROMPT_GENERATE: &str = "generate";
pub const PROMPT_REVIEW: &str = "review";
pub const PROMPT_EDIT: &str = "edit";

const POST_BRIEF_TPL: &str = r#"Summarize the social-media post below for a reply writer.
Return ONLY a JSON object: {"main_claim": str, "anchors": [str], "tone": str, "tags": [str]}.
anchors are 2-4 short phrases lifted from the post for grounding, not for quoting.
tags are lowercase topic keywords.

POST:
{{ post_text }}"#;

const GENERATE_TPL: &str = r#"You write reply comments in the author's voice.

MODE RULES:
{{ mode_rules }}

POST:
{{ post_text }}

POST BRIEF (JSON):
{{ post_brief_json }}

AUTHOR DIRECTIVE (JSON):
{{ author_directive_json }}

{{ product_plan_section }}

Write 3 reply comments to the post: short, medium, long.
Anchor each comment in the post brief. No em dashes, no colons.
Return ONLY a JSON object: {"short": str, "medium": str, "long": str}."#;

const REVIEW_TPL: &str = r#"Review a reply comment draft ({{ variant }} variant).

Score 0-100: persona_fit, ai_smell, post_anchor, clarity, integrity, salesiness.
Thresholds: {{ thresholds }}
Policy fail rules:
{{ policy_fail_rules }}

DRAFT:
{{ draft }}

POST ANCHORS (JSON): {{ anchors }}
AUTHOR CONSTRAINTS (JSON): {{ constraints }}
PRODUCT PLAN (JSON): {{ product_plan_section }}

Return ONLY a JSON object:
{"pass": bool, "scores": {...}, "flags": [str], "patch_plan": [{"op": str, "hint": str}]}"#;

const EDIT_TPL: &str = r#"Apply the patch plan to the draft. Do not rewrite more than 35% of the text.
Keep the author constraints. Return ONLY the revised draft text, nothing else.

PATCH PLAN (JSON): {{ patch_plan }}
AUTHOR CONSTRAINTS (JSON): {{ constraints }}

DRAFT:
{{ draft }}"#;

/// Immutable, cheaply cloneable set of registered prompt templates.
#[derive(Clone, Debug)]
pub struct PromptSet {
    tera: Arc<Tera>,
}

impl PromptSet {
    /// The built-in templates for all four pipeline prompts.
    pub fn builtin() -> Self {
        let mut tera = Tera::default();
        // Raw templates cannot fail to register unless they are syntactically
        // broken, which the inline constants are not.
        let _ = tera.add_raw_template(PROMPT_POST_BRIEF, POST_BRIEF_TPL);
        let _ = tera.add_raw_template(PROMPT_GENERATE, GENERATE_TPL);
        let _ = tera.add_raw_template(PROMPT_REVIEW, REVIEW_TPL);
        let _ = tera.add_raw_template(PROMPT_EDIT, EDIT_TPL);
        Self {
            tera: Arc::new(tera),
        }
    }

    /// No templates registered; every pipeline stage takes its deterministic
    /// fallback path.
    pub fn empty() -> Self {
        Self {
            tera: Arc::new(Tera::default()),
        }
    }

    /// Replace or add a single template.
    pub fn with_template(mut self, name: &str, content: &str) -> Result<Self, PromptError> {
        let mut tera = (*self.tera).clone();
        tera.add_raw_template(name, content)
            .map_err(|err| PromptError::Register {
                name: name.to_string(),
                message: err.to_string(),
            })?;
        self.tera = Arc::new(tera);
        Ok(self)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a registered template, or say precisely why it cannot be.
    pub fn try_render(&self, name: &str, context: &tera::Context) -> Result<String, PromptError> {
        if !self.has(name) {
            return Err(PromptError::Missing {
                name: name.to_string(),
            });
        }
        self.tera
            .render(name, context)
            .map_err(|err| PromptError::Render {
                name: name.to_string(),
                message: err.to_string(),
            })
    }

    /// Render a registered template. `None` when the template is missing or
    /// fails to render; pipeline callers treat both as "no template".
    pub fn render(&self, name: &str, context: &tera::Context) -> Option<String> {
        match self.try_render(name, context) {
            Ok(text) => Some(text),
            Err(PromptError::Missing { .. }) => None,
            Err(err) => {
                tracing::warn!(template = name, error = %err, "prompt render failed");
                None
            }
        }
    }
}
