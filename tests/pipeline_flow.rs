//! End-to-end pipeline flows over a scripted backend.
//!
//! The backend routes on prompt content (brief / generate / review / edit)
//! so the per-variant concurrency in `finalize` cannot reorder a call
//! sequence out from under the test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use replyforge::pipeline::context::PostBrief;
use replyforge::pipeline::relevance::AuthorApplicability;
use replyforge::pipeline::{CommentPipeline, PipelineContext};
use replyforge::{
    ChatMessage, CommentRequest, DraftSet, FinalizeOptions, GenerationBackend, Language, Mode,
    PromptSet, PromptTrack, Variant,
};

#[derive(Default)]
struct Calls {
    brief: AtomicUsize,
    generate: AtomicUsize,
    strict_generate: AtomicUsize,
    review: AtomicUsize,
    edit: AtomicUsize,
}

/// Routes each request to a canned response based on which pipeline prompt
/// it carries, counting calls per stage.
struct ScriptedBackend {
    calls: Arc<Calls>,
    brief_response: String,
    generate_response: String,
    strict_generate_response: String,
    review_response: String,
    edit_response: String,
}

impl ScriptedBackend {
    fn new(calls: Arc<Calls>) -> Self {
        Self {
            calls,
            brief_response: String::new(),
            generate_response: String::new(),
            strict_generate_response: String::new(),
            review_response: String::new(),
            edit_response: String::new(),
        }
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _temperature: f64,
        _max_tokens: u32,
    ) -> anyhow::Result<String> {
        let prompt = &messages[0].content;
        if prompt.contains("Summarize the social-media post") {
            self.calls.brief.fetch_add(1, Ordering::SeqCst);
            Ok(self.brief_response.clone())
        } else if prompt.contains("Review a reply comment draft") {
            self.calls.review.fetch_add(1, Ordering::SeqCst);
            Ok(self.review_response.clone())
        } else if prompt.contains("Apply the patch plan") {
            self.calls.edit.fetch_add(1, Ordering::SeqCst);
            Ok(self.edit_response.clone())
        } else if prompt.contains("FALLBACK REGENERATE") {
            self.calls.strict_generate.fetch_add(1, Ordering::SeqCst);
            Ok(self.strict_generate_response.clone())
        } else {
            self.calls.generate.fetch_add(1, Ordering::SeqCst);
            Ok(self.generate_response.clone())
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn total(calls: &Calls) -> usize {
    calls.brief.load(Ordering::SeqCst)
        + calls.generate.load(Ordering::SeqCst)
        + calls.strict_generate.load(Ordering::SeqCst)
        + calls.review.load(Ordering::SeqCst)
        + calls.edit.load(Ordering::SeqCst)
}

fn request(post_text: &str, goal: &str) -> CommentRequest {
    CommentRequest {
        post_text: post_text.to_string(),
        fingerprint: json!({}),
        products: vec![],
        goal: goal.to_string(),
        author: None,
    }
}

// Scenario A: empty post short-circuits before any backend call.
#[tokio::test]
async fn empty_post_returns_empty_without_backend_calls() {
    init_tracing();
    let calls = Arc::new(Calls::default());
    let backend = Arc::new(ScriptedBackend::new(Arc::clone(&calls)));
    let pipeline = CommentPipeline::new(backend, PromptSet::builtin());

    let finals = pipeline.run(&request("   ", "network")).await;

    assert_eq!(finals, DraftSet::default());
    assert_eq!(total(&calls), 0);
}

// Scenario B: a draft with a link fails review, survives one edit attempt,
// and is replaced by a strict-mode fallback regeneration.
#[tokio::test]
async fn persistent_link_triggers_edit_then_fallback_regeneration() {
    init_tracing();
    let calls = Arc::new(Calls::default());
    let mut backend = ScriptedBackend::new(Arc::clone(&calls));

    backend.brief_response =
        json!({"main_claim": "spot rates are falling", "anchors": [], "tone": "neutral", "tags": []})
            .to_string();
    backend.generate_response =
        json!({"short": "", "medium": "Check out https://example.com now", "long": ""}).to_string();
    // Assisted review supplies a patch plan; the rule layer decides the fail.
    backend.review_response = json!({
        "pass": true,
        "scores": {"persona_fit": 80, "ai_smell": 10, "post_anchor": 75,
                   "clarity": 80, "integrity": 95, "salesiness": 5},
        "flags": [],
        "patch_plan": [{"op": "replace", "hint": "Remove the link and state the idea directly."}]
    })
    .to_string();
    // The edit keeps the link, so the re-review fails again.
    backend.edit_response = "I keep pointing at https://example.com as the proof".to_string();
    backend.strict_generate_response = json!({
        "short": "",
        "medium": "I think the deeper issue is fleet utilization, and most brokers underprice that risk.",
        "long": ""
    })
    .to_string();

    let pipeline = CommentPipeline::new(Arc::new(backend), PromptSet::builtin());
    let req = request("Spot rates keep falling and nobody wants to talk about it", "network");

    let ctx = Arc::new(pipeline.prepare(&req).await);
    assert_eq!(ctx.drafts.medium, "Check out https://example.com now");

    let opts = FinalizeOptions {
        variants: vec![Variant::Medium],
        review_variants: [Variant::Medium].into(),
        fallback_variants: [Variant::Medium].into(),
    };
    let finals = pipeline.finalize(ctx, &opts).await;

    assert_eq!(
        finals.medium,
        "I think the deeper issue is fleet utilization, and most brokers underprice that risk."
    );
    assert_eq!(calls.edit.load(Ordering::SeqCst), 1);
    assert_eq!(calls.strict_generate.load(Ordering::SeqCst), 1);
    // Initial review, post-edit review, fallback review.
    assert_eq!(calls.review.load(Ordering::SeqCst), 3);
}

// The fix loop terminates and returns a sanitized string even when nothing
// can be fixed: no templates, no backend, a draft that always fails.
#[tokio::test]
async fn fix_loop_terminates_without_templates() {
    let calls = Arc::new(Calls::default());
    let backend = Arc::new(ScriptedBackend::new(Arc::clone(&calls)));
    let pipeline = CommentPipeline::new(backend, PromptSet::empty());

    let ctx = PipelineContext {
        post_text: "A post about something".to_string(),
        post_language: Language::English,
        post_brief: PostBrief::default(),
        author_directive: replyforge::pipeline::directive::compile_author_directive(
            &json!({}),
            None,
        ),
        author_applicability: AuthorApplicability::default(),
        policy: replyforge::pipeline::policy::get_policy(Mode::Network).clone(),
        product_plan: None,
        mode: Mode::Network,
        products: vec![],
        drafts: DraftSet {
            short: String::new(),
            medium: "I think this holds — though the data: still thin, worth watching closely."
                .to_string(),
            long: String::new(),
        },
    };

    let opts = FinalizeOptions {
        variants: vec![Variant::Medium],
        review_variants: [Variant::Medium].into(),
        fallback_variants: [Variant::Medium].into(),
    };
    let finals = pipeline.finalize(Arc::new(ctx), &opts).await;

    // Em dash and colon are gone; the text survives as best-available.
    assert!(!finals.medium.is_empty());
    assert!(!finals.medium.contains('—'));
    assert!(!finals.medium.contains(':'));
    // No templates registered, so the whole loop ran without a backend call.
    assert_eq!(total(&calls), 0);
}

// Unreviewed variants get cleanup only, no review traffic.
#[tokio::test]
async fn short_variant_passes_through_with_cleanup() {
    let calls = Arc::new(Calls::default());
    let mut backend = ScriptedBackend::new(Arc::clone(&calls));
    backend.brief_response = "not json".to_string();
    backend.generate_response =
        json!({"short": "Quick take — agreed", "medium": "", "long": ""}).to_string();

    let pipeline = CommentPipeline::new(Arc::new(backend), PromptSet::builtin());
    let finals = pipeline
        .run(&request("A post about market timing", "network"))
        .await;

    assert_eq!(finals.short, "Quick take, agreed");
    assert_eq!(calls.review.load(Ordering::SeqCst), 0);
    assert_eq!(calls.edit.load(Ordering::SeqCst), 0);
}

/// Replays a fixed response sequence, recording the temperature and prompt
/// of every call.
struct SequencedBackend {
    responses: Vec<String>,
    calls: AtomicUsize,
    temperatures: Mutex<Vec<f64>>,
    prompts_seen: Mutex<Vec<String>>,
}

impl SequencedBackend {
    fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            calls: AtomicUsize::new(0),
            temperatures: Mutex::new(Vec::new()),
            prompts_seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GenerationBackend for SequencedBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        _max_tokens: u32,
    ) -> anyhow::Result<String> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        self.temperatures.lock().unwrap().push(temperature);
        self.prompts_seen
            .lock()
            .unwrap()
            .push(messages[0].content.clone());
        Ok(self.responses.get(idx).cloned().unwrap_or_default())
    }
}

async fn generate_with(backend: &Arc<dyn GenerationBackend>, track: PromptTrack) -> DraftSet {
    replyforge::pipeline::generate::generate_drafts(
        "Margins are compressing across the industry",
        &PostBrief::default(),
        &replyforge::pipeline::directive::compile_author_directive(&json!({}), None),
        replyforge::pipeline::policy::get_policy(Mode::Network),
        None,
        Mode::Network,
        Language::English,
        &PromptSet::builtin(),
        backend,
        track,
        false,
        None,
    )
    .await
}

// A meta-chatter first response triggers one reinforced-format retry at the
// lower temperature; the retry's drafts replace the originals.
#[tokio::test]
async fn reinforced_retry_recovers_suppressed_drafts() {
    let backend = Arc::new(SequencedBackend::new(vec![
        json!({"short": "", "medium": "Please provide the text you want me to comment on", "long": ""})
            .to_string(),
        json!({"short": "", "medium": "Margins matter more than rates in this cycle.", "long": ""})
            .to_string(),
    ]));
    let dyn_backend: Arc<dyn GenerationBackend> = backend.clone();

    let drafts = generate_with(&dyn_backend, PromptTrack::V2).await;

    assert_eq!(drafts.medium, "Margins matter more than rates in this cycle.");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    assert_eq!(*backend.temperatures.lock().unwrap(), vec![0.5, 0.3]);
    assert!(backend.prompts_seen.lock().unwrap()[1].contains("FORMAT REMINDER"));
}

// The stable track takes whatever the first response was, suppressed or not.
#[tokio::test]
async fn stable_track_takes_the_response_as_is() {
    let backend = Arc::new(SequencedBackend::new(vec![
        json!({"short": "", "medium": "Please provide the text you want me to comment on", "long": ""})
            .to_string(),
    ]));
    let dyn_backend: Arc<dyn GenerationBackend> = backend.clone();

    let drafts = generate_with(&dyn_backend, PromptTrack::Stable).await;

    assert!(drafts.is_empty());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

// An unparsable retry never clobbers variants the first parse produced.
#[tokio::test]
async fn unparsable_retry_keeps_the_first_parse() {
    let backend = Arc::new(SequencedBackend::new(vec![
        json!({"short": "A real short take on margins.", "medium": "As an AI, I cannot say", "long": ""})
            .to_string(),
        "?!".to_string(),
    ]));
    let dyn_backend: Arc<dyn GenerationBackend> = backend.clone();

    let drafts = generate_with(&dyn_backend, PromptTrack::V2).await;

    assert_eq!(drafts.short, "A real short take on margins.");
    assert_eq!(drafts.medium, "");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}

/// Panics when asked to review the poisoned draft; approves everything else.
struct PanickyReviewBackend;

#[async_trait]
impl GenerationBackend for PanickyReviewBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _temperature: f64,
        _max_tokens: u32,
    ) -> anyhow::Result<String> {
        let prompt = &messages[0].content;
        if prompt.contains("poisoned") {
            panic!("backend wedged");
        }
        if prompt.contains("Review a reply comment draft") {
            return Ok(json!({"pass": true, "flags": [], "patch_plan": []}).to_string());
        }
        Ok(String::new())
    }
}

// A variant whose task panics degrades to its sanitized pre-review draft;
// the sibling variant finalizes normally.
#[tokio::test]
async fn panicking_variant_degrades_without_affecting_siblings() {
    let backend: Arc<dyn GenerationBackend> = Arc::new(PanickyReviewBackend);
    let pipeline = CommentPipeline::new(backend, PromptSet::builtin());

    let ctx = PipelineContext {
        post_text: "A post about margins".to_string(),
        post_language: Language::English,
        post_brief: PostBrief::default(),
        author_directive: replyforge::pipeline::directive::compile_author_directive(
            &json!({}),
            None,
        ),
        author_applicability: AuthorApplicability::default(),
        policy: replyforge::pipeline::policy::get_policy(Mode::Network).clone(),
        product_plan: None,
        mode: Mode::Network,
        products: vec![],
        drafts: DraftSet {
            short: String::new(),
            medium: "I think margins matter more than rates here.".to_string(),
            long: "poisoned long draft — with a dash".to_string(),
        },
    };

    let opts = FinalizeOptions {
        variants: vec![Variant::Medium, Variant::Long],
        review_variants: [Variant::Medium, Variant::Long].into(),
        fallback_variants: Default::default(),
    };
    let finals = pipeline.finalize(Arc::new(ctx), &opts).await;

    assert_eq!(finals.medium, "I think margins matter more than rates here.");
    assert_eq!(finals.long, "poisoned long draft, with a dash");
}

// Mode aliases and unknown goals resolve before policy lookup.
#[tokio::test]
async fn unknown_goal_runs_as_network() {
    let calls = Arc::new(Calls::default());
    let mut backend = ScriptedBackend::new(Arc::clone(&calls));
    backend.brief_response = "not json".to_string();
    backend.generate_response = json!({"short": "", "medium": "", "long": ""}).to_string();

    let pipeline = CommentPipeline::new(Arc::new(backend), PromptSet::builtin());
    let req = CommentRequest {
        post_text: "Some post".to_string(),
        fingerprint: json!({}),
        products: vec![],
        goal: "definitely_not_a_mode".to_string(),
        author: None,
    };
    let ctx = pipeline.prepare(&req).await;

    assert_eq!(ctx.mode, Mode::Network);
    assert!(ctx.product_plan.is_none());
}
