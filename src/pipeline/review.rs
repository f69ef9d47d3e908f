//! Compliance review: a deterministic rule layer that is always applied,
//! plus an optional assisted layer for qualitative scores. The rule layer
//! is the ultimate authority; assisted output can add flags and scores but
//! can never turn a rule-layer fail into a pass.

use std::sync::Arc;

use serde::Deserialize;

use crate::backend::{ChatMessage, GenerationBackend};
use crate::prompt::{PROMPT_REVIEW, PromptSet};

use super::config::{Mode, Policy, Variant, review_thresholds};
use super::context::{Language, PatchOp, Product, ProductPlan, ReviewResult, ReviewScores};
use super::detectors;
use super::extract::extract_json;

/// Deterministic rule layer. Returns the list of fail flags; empty means
/// clean. Used both by the assisted review and by the rule-only fallback.
#[allow(clippy::too_many_arguments)]
pub fn rule_compliance_check(
    draft: &str,
    policy: &Policy,
    plan: Option<&ProductPlan>,
    products: &[Product],
    mode: Mode,
    expected_language: Option<Language>,
    post_text: &str,
    anchors: &[String],
) -> Vec<String> {
    let mut flags: Vec<String> = Vec::new();
    let mut flag = |name: &str| flags.push(name.to_string());

    // Punctuation policy: no em dash, no colon.
    if detectors::has_em_dash(draft) {
        flag("em_dash");
    }
    if detectors::has_colon(draft) {
        flag("colon");
    }
    if let Some(language) = expected_language {
        if detectors::detect_language_mismatch(draft, language) {
            flag("language_mismatch");
        }
        if !detectors::detect_personal_stance(draft, language) {
            flag("no_personal_stance");
        }
    }
    if detectors::detect_post_copy_overlap(draft, post_text) {
        flag("post_copy_overlap");
    }
    if detectors::detect_anchor_copy_overlap(draft, anchors) {
        flag("anchor_copy_overlap");
    }
    if detectors::detect_post_rhetoric_reaction(draft) {
        flag("rhetoric_reaction");
    }

    match mode {
        Mode::Network => {
            if detectors::detect_cta(draft) {
                flag("cta");
            }
            if detectors::has_links(draft) {
                flag("link");
            }
            if detectors::detect_product_mention_any(draft, products) {
                flag("product_mention");
            }
        }
        Mode::NativeAd => {
            if detectors::detect_cta(draft) {
                flag("cta");
            }
            if detectors::has_links(draft) {
                flag("link");
            }
            if detectors::count_product_mentions(draft, plan) > policy.max_product_mentions {
                flag("product_mentions");
            }
        }
        Mode::HardAd => {
            if policy.product_required
                && plan.is_some()
                && !detectors::product_mentioned_in_draft(draft, plan)
            {
                flag("product_missing");
            }
            if policy.cta_required && !detectors::detect_cta(draft) {
                flag("cta_missing");
            }
            if let Some(plan) = plan {
                if detectors::detect_forbidden_claim_violation(draft, &plan.forbidden_claims) {
                    flag("forbidden_claim_violation");
                }
            }
        }
    }

    flags
}

/// Flags that force an overall fail in this mode, regardless of what the
/// assisted layer claims.
fn fail_flags(mode: Mode) -> Vec<&'static str> {
    let mut set = vec![
        "fake_personal_claim",
        "lecture_mode",
        "toxicity",
        "em_dash",
        "colon",
        "language_mismatch",
        "no_personal_stance",
        "post_copy_overlap",
        "anchor_copy_overlap",
        "rhetoric_reaction",
    ];
    match mode {
        Mode::Network => set.extend(["product_mention", "cta", "link"]),
        Mode::NativeAd => set.extend(["link", "cta", "product_mentions"]),
        Mode::HardAd => set.extend(["forbidden_claim_violation", "product_missing", "cta_missing"]),
    }
    set
}

fn policy_fail_rules(mode: Mode) -> &'static str {
    match mode {
        Mode::Network => "- Network: product_mention, cta, link -> fail",
        Mode::NativeAd => {
            "- Native: link, cta -> fail; product_mentions > 1 -> fail; \
             salesiness > policy.salesiness_max -> fail"
        }
        Mode::HardAd => {
            "- Hard: product_missing, cta_missing -> fail; forbidden_claim_violation -> fail; \
             salesiness > policy.salesiness_max -> fail"
        }
    }
}

fn thresholds_line(variant: Variant) -> String {
    let t = review_thresholds(variant);
    format!(
        "ai_smell<={}, post_anchor>={}, clarity>={}, integrity>={}, persona_fit>={}",
        t.ai_smell_max, t.post_anchor_min, t.clarity_min, t.integrity_min, t.persona_fit_min
    )
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct AssistedReview {
    #[serde(default = "default_true")]
    pass: bool,
    #[serde(default)]
    scores: ReviewScores,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    patch_plan: Vec<PatchOp>,
}

/// Everything the reviewer needs to judge one draft.
pub struct ReviewRequest<'a> {
    pub draft: &'a str,
    pub variant: Variant,
    pub post_text: &'a str,
    pub anchors: &'a [String],
    pub constraints_json: String,
    pub policy: &'a Policy,
    pub plan: Option<&'a ProductPlan>,
    pub products: &'a [Product],
    pub mode: Mode,
    pub expected_language: Language,
}

/// Review a draft: rule layer always, assisted layer when a template is
/// registered and the backend answer parses. The returned `pass` is false
/// whenever a mode fail-flag is present, no matter what the assisted layer
/// said.
pub async fn review_draft(
    req: &ReviewRequest<'_>,
    prompts: &PromptSet,
    backend: &Arc<dyn GenerationBackend>,
) -> ReviewResult {
    let rule_flags = rule_compliance_check(
        req.draft,
        req.policy,
        req.plan,
        req.products,
        req.mode,
        Some(req.expected_language),
        req.post_text,
        req.anchors,
    );

    let mut ctx = tera::Context::new();
    ctx.insert("variant", &req.variant.to_string());
    ctx.insert("thresholds", &thresholds_line(req.variant));
    ctx.insert("policy_fail_rules", policy_fail_rules(req.mode));
    ctx.insert("draft", req.draft);
    ctx.insert(
        "anchors",
        &serde_json::to_string(req.anchors).unwrap_or_default(),
    );
    ctx.insert("constraints", &req.constraints_json);
    ctx.insert(
        "product_plan_section",
        &req.plan
            .map(|p| serde_json::to_string(p).unwrap_or_default())
            .unwrap_or_else(|| "{}".to_string()),
    );

    let Some(prompt) = prompts.render(PROMPT_REVIEW, &ctx) else {
        return quick_review(req, &rule_flags);
    };

    let response = match backend.chat(&[ChatMessage::user(prompt)], 0.2, 512).await {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "assisted review failed, falling back to rule layer");
            return quick_review(req, &rule_flags);
        }
    };

    let Some(assisted) =
        extract_json(&response).and_then(|v| serde_json::from_value::<AssistedReview>(v).ok())
    else {
        return quick_review(req, &rule_flags);
    };

    // Union assisted and rule flags, preserving first-seen order.
    let mut flags = assisted.flags;
    for f in rule_flags {
        if !flags.contains(&f) {
            flags.push(f);
        }
    }

    let fail = fail_flags(req.mode);
    let has_fail = flags.iter().any(|f| fail.contains(&f.as_str()));

    ReviewResult {
        pass: !has_fail && assisted.pass,
        scores: assisted.scores,
        flags,
        patch_plan: assisted.patch_plan,
    }
}

/// Minimum draft length enforced when reviewing without assistance.
const MIN_DRAFT_CHARS: usize = 50;

/// Rule-based fallback review, no backend involved.
fn quick_review(req: &ReviewRequest<'_>, rule_flags: &[String]) -> ReviewResult {
    let mut flags: Vec<String> = Vec::new();
    if req.draft.trim().chars().count() < MIN_DRAFT_CHARS {
        flags.push("too_short".to_string());
    }
    flags.extend(rule_flags.iter().cloned());

    let mut patch_plan = Vec::new();
    if flags.iter().any(|f| f == "language_mismatch") {
        patch_plan.push(PatchOp::replace(format!(
            "Rewrite the comment fully in {}, keep the same meaning and tone.",
            req.expected_language
        )));
    }

    ReviewResult {
        pass: flags.is_empty(),
        scores: ReviewScores::default(),
        flags,
        patch_plan,
    }
}
