//! The comment pipeline: prepare → generate → concurrent per-variant
//! review-fix-fallback → final cleanup.
//!
//! `prepare` runs its stages strictly in sequence, each feeding the next.
//! `finalize` runs one independent task per variant; a failing or panicking
//! variant degrades to a sanitized copy of its pre-review draft and never
//! aborts its siblings. Callers needing a deadline wrap the invocation in
//! their own timeout.

pub mod brief;
pub mod config;
pub mod context;
pub mod detectors;
pub mod directive;
pub mod edit;
mod extract;
pub mod generate;
pub mod policy;
pub mod product;
pub mod relevance;
pub mod review;

use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::GenerationBackend;
use crate::prompt::PromptSet;

pub use config::{ALL_VARIANTS, Mode, Policy, Variant};
pub use context::{
    AuthorProfile, CommentRequest, DraftSet, Language, PatchOp, PipelineContext, PostBrief,
    Product, ProductPlan, ReviewResult,
};
pub use generate::PromptTrack;

use brief::build_post_brief;
use detectors::{sanitize_punctuation, strip_post_rhetoric_reaction};
use directive::compile_author_directive;
use generate::generate_drafts;
use policy::get_policy;
use product::select_product_and_plan;
use relevance::build_author_applicability;
use review::{ReviewRequest, review_draft};

/// Edit attempts per variant before falling back to regeneration.
const MAX_FIXES: usize = 1;

/// Which variants get reviewed and which may fall back to strict
/// regeneration. Defaults: medium and long for both; short passes through
/// accepted-as-generated.
#[derive(Debug, Clone)]
pub struct FinalizeOptions {
    pub variants: Vec<Variant>,
    pub review_variants: HashSet<Variant>,
    pub fallback_variants: HashSet<Variant>,
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self {
            variants: ALL_VARIANTS.to_vec(),
            review_variants: HashSet::from([Variant::Medium, Variant::Long]),
            fallback_variants: HashSet::from([Variant::Medium, Variant::Long]),
        }
    }
}

fn final_cleanup(text: &str) -> String {
    strip_post_rhetoric_reaction(&sanitize_punctuation(text))
}

/// The generation-and-compliance pipeline. Holds no per-request state; one
/// instance serves any number of concurrent invocations.
#[derive(Clone)]
pub struct CommentPipeline {
    backend: Arc<dyn GenerationBackend>,
    prompts: PromptSet,
    track: PromptTrack,
}

impl CommentPipeline {
    pub fn new(backend: Arc<dyn GenerationBackend>, prompts: PromptSet) -> Self {
        Self {
            backend,
            prompts,
            track: PromptTrack::default(),
        }
    }

    pub fn with_track(mut self, track: PromptTrack) -> Self {
        self.track = track;
        self
    }

    /// Sequential stages: brief → (relevance + directive) → policy →
    /// product plan → drafts. An empty post short-circuits to an empty
    /// context without a single backend call.
    pub async fn prepare(&self, req: &CommentRequest) -> PipelineContext {
        let mode = Mode::from_goal(&req.goal);
        let post_language = Language::detect(&req.post_text);
        let policy = get_policy(mode).clone();

        if req.post_text.trim().is_empty() {
            return PipelineContext {
                post_text: req.post_text.clone(),
                post_language,
                post_brief: PostBrief::default(),
                author_directive: compile_author_directive(&req.fingerprint, req.author.as_ref()),
                author_applicability: relevance::AuthorApplicability::default(),
                policy,
                product_plan: None,
                mode,
                products: req.products.clone(),
                drafts: DraftSet::default(),
            };
        }

        let post_brief = build_post_brief(&req.post_text, &self.prompts, &self.backend).await;

        let author_applicability =
            build_author_applicability(&req.fingerprint, &req.post_text, &post_brief);
        let author_directive = compile_author_directive(&req.fingerprint, req.author.as_ref());

        let mut product_plan = None;
        if mode != Mode::Network && !req.products.is_empty() {
            product_plan = select_product_and_plan(&post_brief, &req.products, &policy, mode, None);
            if mode == Mode::HardAd && product_plan.is_none() {
                // Policy intent overrides relevance: force the first product.
                let first_name = req.products[0].name.clone();
                product_plan = select_product_and_plan(
                    &post_brief,
                    &req.products,
                    &policy,
                    mode,
                    Some(&first_name),
                );
            }
        }

        let drafts = generate_drafts(
            &req.post_text,
            &post_brief,
            &author_directive,
            &policy,
            product_plan.as_ref(),
            mode,
            post_language,
            &self.prompts,
            &self.backend,
            self.track,
            false,
            None,
        )
        .await;

        PipelineContext {
            post_text: req.post_text.clone(),
            post_language,
            post_brief,
            author_directive,
            author_applicability,
            policy,
            product_plan,
            mode,
            products: req.products.clone(),
            drafts,
        }
    }

    async fn review_once(&self, draft: &str, variant: Variant, ctx: &PipelineContext) -> ReviewResult {
        let req = ReviewRequest {
            draft,
            variant,
            post_text: &ctx.post_text,
            anchors: &ctx.post_brief.anchors,
            constraints_json: serde_json::to_string(&ctx.author_directive.constraints)
                .unwrap_or_default(),
            policy: &ctx.policy,
            plan: ctx.product_plan.as_ref(),
            products: &ctx.products,
            mode: ctx.mode,
            expected_language: ctx.post_language,
        };
        review_draft(&req, &self.prompts, &self.backend).await
    }

    /// Derive a patch plan when the reviewer did not supply one: rewrite to
    /// the target language on a mismatch, otherwise an independent-viewpoint
    /// rewrite on copy-overlap or rhetoric flags.
    fn synthesize_patch_plan(&self, review: &ReviewResult, ctx: &PipelineContext) -> Vec<PatchOp> {
        if !review.patch_plan.is_empty() {
            return review.patch_plan.clone();
        }
        if review.flags.iter().any(|f| f == "language_mismatch") {
            return vec![PatchOp::replace(format!(
                "Rewrite the whole comment in {}, keep meaning and tone.",
                ctx.post_language
            ))];
        }
        let overlap = ["anchor_copy_overlap", "post_copy_overlap", "rhetoric_reaction"];
        if review.flags.iter().any(|f| overlap.contains(&f.as_str())) {
            return vec![PatchOp::replace(
                "Rewrite from an independent viewpoint. Use the post only as semantic context, \
                 do not quote or evaluate the post wording or metaphors directly. \
                 Keep one core idea and end naturally.",
            )];
        }
        Vec::new()
    }

    /// Bounded review → edit → review loop, then an optional strict-mode
    /// regeneration fallback. Always returns a string (possibly empty)
    /// through final cleanup.
    async fn self_review_fix_loop(
        &self,
        draft: &str,
        variant: Variant,
        ctx: &PipelineContext,
        allow_fallback: bool,
    ) -> String {
        let mut current = draft.to_string();

        for attempt in 0..=MAX_FIXES {
            let review = self.review_once(&current, variant, ctx).await;
            if review.pass {
                return final_cleanup(&current);
            }
            let patch_plan = self.synthesize_patch_plan(&review, ctx);
            if patch_plan.is_empty() {
                if attempt < MAX_FIXES {
                    continue;
                }
                break;
            }
            if attempt < MAX_FIXES {
                current = edit::edit_draft(
                    &current,
                    &patch_plan,
                    &ctx.author_directive.constraints,
                    &self.prompts,
                    &self.backend,
                )
                .await;
            }
        }

        if allow_fallback {
            tracing::debug!(variant = %variant, "fix attempts exhausted, regenerating in strict mode");
            let fallback = generate_drafts(
                &ctx.post_text,
                &ctx.post_brief,
                &ctx.author_directive,
                &ctx.policy,
                ctx.product_plan.as_ref(),
                ctx.mode,
                ctx.post_language,
                &self.prompts,
                &self.backend,
                self.track,
                true,
                Some(variant),
            )
            .await;
            let fallback_text = fallback.get(variant).trim().to_string();
            if !fallback_text.is_empty() {
                let review = self.review_once(&fallback_text, variant, ctx).await;
                if review.pass {
                    return final_cleanup(&fallback_text);
                }
                if !review.patch_plan.is_empty() {
                    let edited = edit::edit_draft(
                        &fallback_text,
                        &review.patch_plan,
                        &ctx.author_directive.constraints,
                        &self.prompts,
                        &self.backend,
                    )
                    .await;
                    let review2 = self.review_once(&edited, variant, ctx).await;
                    if review2.pass {
                        return final_cleanup(&edited);
                    }
                }
            }
        }

        // Best available text, pass or fail.
        final_cleanup(&current)
    }

    /// Run the fix loop concurrently per variant; one task each, joined
    /// with independent error boundaries keyed by variant name.
    pub async fn finalize(&self, ctx: Arc<PipelineContext>, opts: &FinalizeOptions) -> DraftSet {
        let selected: Vec<Variant> = opts
            .variants
            .iter()
            .copied()
            .filter(|v| ALL_VARIANTS.contains(v))
            .collect();

        let mut handles = Vec::with_capacity(selected.len());
        for variant in selected {
            let pipeline = self.clone();
            let ctx = Arc::clone(&ctx);
            let reviewed = opts.review_variants.contains(&variant);
            let allow_fallback = opts.fallback_variants.contains(&variant);
            let handle = tokio::spawn(async move {
                let text = ctx.drafts.get(variant).trim().to_string();
                if text.is_empty() {
                    String::new()
                } else if reviewed {
                    pipeline
                        .self_review_fix_loop(&text, variant, &ctx, allow_fallback)
                        .await
                } else {
                    final_cleanup(&text)
                }
            });
            handles.push((variant, handle));
        }

        let mut finals = DraftSet::default();
        for (variant, handle) in handles {
            match handle.await {
                Ok(text) => finals.set(variant, text),
                Err(err) => {
                    tracing::warn!(variant = %variant, error = %err, "finalize task failed");
                    finals.set(variant, sanitize_punctuation(ctx.drafts.get(variant).trim()));
                }
            }
        }
        finals
    }

    /// Full pipeline: prepare + finalize with the default options.
    pub async fn run(&self, req: &CommentRequest) -> DraftSet {
        let ctx = Arc::new(self.prepare(req).await);
        self.finalize(ctx, &FinalizeOptions::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_cleanup_sanitizes_and_strips() {
        assert_eq!(final_cleanup("Great idea — thanks"), "Great idea, thanks");
        assert_eq!(
            final_cleanup("Great question! The real point is unit economics."),
            "The real point is unit economics."
        );
    }

    #[test]
    fn default_options_review_medium_and_long() {
        let opts = FinalizeOptions::default();
        assert!(!opts.review_variants.contains(&Variant::Short));
        assert!(opts.review_variants.contains(&Variant::Medium));
        assert!(opts.fallback_variants.contains(&Variant::Long));
    }
}
