//! Draft generation: assembles the mode-specific instruction block, calls
//! the backend, and recovers the three variants from whatever shape the
//! response arrives in.
//!
//! Parsing is an ordered chain of pure strategies, each returning a
//! populated `DraftSet` or `None`; the first strategy yielding any
//! non-empty variant wins. Known meta-commentary is suppressed to an empty
//! string so process chatter never leaks into user-visible drafts.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;

use crate::backend::{ChatMessage, GenerationBackend};
use crate::prompt::{PROMPT_GENERATE, PromptSet};

use super::config::{ALL_VARIANTS, Mode, Policy, Variant, target_length};
use super::context::{DraftSet, Language, PostBrief, ProductPlan};
use super::directive::AuthorDirective;
use super::extract::extract_json;

/// Which prompt generation the pipeline runs. The V2 track adds a one-shot
/// reinforced-format retry when parsing fails or meta chatter was
/// suppressed; the stable track takes the response as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptTrack {
    Stable,
    #[default]
    V2,
}

fn mode_rules(mode: Mode, plan: Option<&ProductPlan>) -> String {
    match mode {
        Mode::Network => "NETWORK: no products, no CTA, no links.".to_string(),
        Mode::NativeAd => match plan {
            None => "NATIVE (no product): behave exactly like NETWORK.".to_string(),
            Some(_) => "NATIVE: one short product insert (as an example or tool), no CTA, \
                        no links, no sales tone."
                .to_string(),
        },
        Mode::HardAd => match plan {
            // No plan means no product to demand; emit nothing rather than
            // instructions the model cannot follow.
            None => String::new(),
            Some(_) => "HARD_AD: product is mandatory. CTA is mandatory (one line) from the \
                        template. Link only if allowed. Claims only from chosen_claims."
                .to_string(),
        },
    }
}

fn product_plan_section(plan: Option<&ProductPlan>, mode: Mode) -> String {
    let Some(plan) = plan else {
        return String::new();
    };
    if mode == Mode::Network {
        return String::new();
    }
    let p = &plan.selected_product;
    let one_liner = if p.one_liner.is_empty() {
        &p.description
    } else {
        &p.one_liner
    };
    let mut lines = vec![
        format!("Product: {}", p.name),
        format!("One-liner: {one_liner}"),
        format!("Allowed claims: {}", plan.chosen_claims.join(", ")),
        format!("Forbidden: {}", plan.forbidden_claims.join(", ")),
    ];
    if mode == Mode::HardAd && !plan.cta_template.is_empty() {
        lines.push(format!("CTA template: {}", plan.cta_template));
    }
    format!("Product plan:\n{}", lines.join("\n"))
}

fn length_rule() -> String {
    let parts: Vec<String> = ALL_VARIANTS
        .iter()
        .map(|v| {
            let (lo, hi) = target_length(*v);
            format!("{v} {lo}-{hi} chars")
        })
        .collect();
    format!("Target lengths: {}.", parts.join(", "))
}

fn language_rule(language: Language) -> &'static str {
    match language {
        Language::Russian => "Output language: Russian. All 3 comments ONLY in Russian.",
        Language::English => "Output language: English. All 3 comments ONLY in English.",
    }
}

const STRICT_NOTE: &str = "\n\nFALLBACK REGENERATE (stricter): shorter. More anchor wording \
                           from the post brief. Fewer adjectives. One idea only.";

const RETRY_NOTE: &str = "\n\nFORMAT REMINDER: respond with ONLY the JSON object \
                          {\"short\": str, \"medium\": str, \"long\": str}. No commentary, \
                          no preamble, no markdown outside the JSON.";

// ─── Response parsing ────────────────────────────────────────────────────────

static LABELED_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:\*{1,2})?(short|medium|long)(?:\*{1,2})?\s*[:—–-]\s*(\S.*)$")
        .expect("static labeled-line regex")
});

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:#{1,4}\s*|\*{1,2})?(short|medium|long)(?:\*{1,2})?\s*:?\s*$")
        .expect("static heading regex")
});

fn variant_of(label: &str) -> Option<Variant> {
    match label.to_lowercase().as_str() {
        "short" => Some(Variant::Short),
        "medium" => Some(Variant::Medium),
        "long" => Some(Variant::Long),
        _ => None,
    }
}

fn non_empty(drafts: DraftSet) -> Option<DraftSet> {
    if drafts.is_empty() { None } else { Some(drafts) }
}

/// Strategy 1: a JSON object with short/medium/long string fields.
fn parse_structured_json(response: &str) -> Option<DraftSet> {
    let value = extract_json(response)?;
    let obj = value.as_object()?;
    let field = |k: &str| {
        obj.get(k)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    non_empty(DraftSet {
        short: field("short"),
        medium: field("medium"),
        long: field("long"),
    })
}

/// Strategy 2: inline labeled lines (`short: ...`, `**Medium** — ...`).
fn parse_labeled_lines(response: &str) -> Option<DraftSet> {
    let mut drafts = DraftSet::default();
    for caps in LABELED_LINE_RE.captures_iter(response) {
        if let Some(variant) = variant_of(&caps[1]) {
            if drafts.get(variant).is_empty() {
                drafts.set(variant, caps[2].trim().to_string());
            }
        }
    }
    non_empty(drafts)
}

/// Strategy 3: heading-style blocks (`## Short`, `**Medium**`) with the
/// variant text on the following lines.
fn parse_heading_blocks(response: &str) -> Option<DraftSet> {
    let mut drafts = DraftSet::default();
    let mut current: Option<Variant> = None;
    let mut buffer = String::new();

    let flush = |variant: Option<Variant>, buffer: &mut String, drafts: &mut DraftSet| {
        if let Some(v) = variant {
            let text = buffer.trim().to_string();
            if !text.is_empty() && drafts.get(v).is_empty() {
                drafts.set(v, text);
            }
        }
        buffer.clear();
    };

    for line in response.lines() {
        if let Some(caps) = HEADING_RE.captures(line) {
            let next = variant_of(&caps[1]);
            flush(current, &mut buffer, &mut drafts);
            current = next;
        } else if current.is_some() {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }
    flush(current, &mut buffer, &mut drafts);
    non_empty(drafts)
}

/// A paragraph too short to be a draft is treated as noise.
const MIN_PARAGRAPH_CHARS: usize = 20;

/// Strategy 4: plain paragraph split; the first three non-trivial blocks
/// become short, medium, long in order.
fn parse_paragraphs(response: &str) -> Option<DraftSet> {
    let mut drafts = DraftSet::default();
    let blocks = response
        .split("\n\n")
        .map(str::trim)
        .filter(|b| b.chars().count() >= MIN_PARAGRAPH_CHARS)
        // A leftover JSON body is parser residue, not a draft.
        .filter(|b| !b.starts_with('{') && !b.starts_with('['))
        .take(3);
    for (block, variant) in blocks.zip([Variant::Short, Variant::Medium, Variant::Long]) {
        drafts.set(variant, block.to_string());
    }
    non_empty(drafts)
}

const META_PHRASES: &[&str] = &[
    "please provide the text",
    "please provide the post",
    "here are the three",
    "here are three comments",
    "as an ai",
    "as a language model",
    "i cannot write",
    "i can't write",
];

fn is_meta_commentary(text: &str) -> bool {
    let lower = text.to_lowercase();
    META_PHRASES.iter().any(|p| lower.contains(p))
}

/// Run the strategy chain, then blank any variant that is meta chatter.
/// Returns the drafts and whether any suppression happened.
fn parse_response(response: &str) -> (DraftSet, bool) {
    let parsed = parse_structured_json(response)
        .or_else(|| parse_labeled_lines(response))
        .or_else(|| parse_heading_blocks(response))
        .or_else(|| parse_paragraphs(response))
        .unwrap_or_default();

    let mut drafts = parsed;
    let mut suppressed = false;
    for variant in [Variant::Short, Variant::Medium, Variant::Long] {
        if is_meta_commentary(drafts.get(variant)) {
            drafts.set(variant, String::new());
            suppressed = true;
        }
    }
    (drafts, suppressed)
}

// ─── Generation ──────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub async fn generate_drafts(
    post_text: &str,
    brief: &PostBrief,
    directive: &AuthorDirective,
    _policy: &Policy,
    plan: Option<&ProductPlan>,
    mode: Mode,
    language: Language,
    prompts: &PromptSet,
    backend: &Arc<dyn GenerationBackend>,
    track: PromptTrack,
    strict_mode: bool,
    variant_override: Option<Variant>,
) -> DraftSet {
    let mut ctx = tera::Context::new();
    ctx.insert("mode_rules", &mode_rules(mode, plan));
    ctx.insert("post_text", post_text);
    ctx.insert(
        "post_brief_json",
        &serde_json::to_string(brief).unwrap_or_default(),
    );
    ctx.insert(
        "author_directive_json",
        &serde_json::to_string(directive).unwrap_or_default(),
    );

    let product_section = product_plan_section(plan, mode);
    let mut section = if product_section.is_empty() {
        format!("{}\n{}", language_rule(language), length_rule())
    } else {
        format!(
            "{product_section}\n\n{}\n{}",
            language_rule(language),
            length_rule()
        )
    };
    if strict_mode {
        section.push_str(STRICT_NOTE);
    }
    ctx.insert("product_plan_section", &section);

    let Some(prompt) = prompts.render(PROMPT_GENERATE, &ctx) else {
        return DraftSet::default();
    };

    let temperature = if strict_mode { 0.4 } else { 0.5 };
    let response = match backend
        .chat(&[ChatMessage::user(prompt.clone())], temperature, 2048)
        .await
    {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "draft generation failed");
            String::new()
        }
    };

    let (mut drafts, suppressed) = parse_response(&response);

    if track == PromptTrack::V2 && (drafts.is_empty() || suppressed) {
        tracing::debug!(suppressed, "retrying generation with reinforced format instruction");
        let retry_prompt = format!("{prompt}{RETRY_NOTE}");
        if let Ok(retry_response) = backend
            .chat(&[ChatMessage::user(retry_prompt)], 0.3, 2048)
            .await
        {
            let (retry_drafts, _) = parse_response(&retry_response);
            // Retry replaces the original only when it produced something.
            if !retry_drafts.is_empty() {
                drafts = retry_drafts;
            }
        }
    }

    match variant_override {
        Some(variant) => drafts.retain_only(variant),
        None => drafts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_ad_without_plan_emits_no_product_rules() {
        use crate::pipeline::context::{MentionStyle, Product};

        assert_eq!(mode_rules(Mode::HardAd, None), "");

        let plan = ProductPlan {
            selected_product: Product::default(),
            match_score: 50,
            mention_style: MentionStyle::Direct,
            chosen_claims: vec![],
            forbidden_claims: vec![],
            cta_template: String::new(),
            link: String::new(),
        };
        assert!(mode_rules(Mode::HardAd, Some(&plan)).contains("mandatory"));
    }

    #[test]
    fn json_strategy_wins_over_others() {
        let response = r#"{"short": "s", "medium": "m", "long": "l"}"#;
        let (drafts, suppressed) = parse_response(response);
        assert_eq!(drafts.short, "s");
        assert_eq!(drafts.long, "l");
        assert!(!suppressed);
    }

    #[test]
    fn labeled_lines_strategy() {
        let response = "Short: quick take on rates\n**Medium** - a fuller thought about rates\nlong — the long variant text here";
        let drafts = parse_labeled_lines(response).unwrap();
        assert_eq!(drafts.short, "quick take on rates");
        assert_eq!(drafts.medium, "a fuller thought about rates");
        assert_eq!(drafts.long, "the long variant text here");
    }

    #[test]
    fn heading_blocks_strategy() {
        let response = "## Short\nFirst block text.\n\n## Medium\nSecond block text.\n\n## Long\nThird block text.";
        let drafts = parse_heading_blocks(response).unwrap();
        assert_eq!(drafts.short, "First block text.");
        assert_eq!(drafts.medium, "Second block text.");
        assert_eq!(drafts.long, "Third block text.");
    }

    #[test]
    fn paragraph_strategy_takes_first_three_nontrivial() {
        let response = "ok\n\nThis is the first real paragraph.\n\nThis is the second real paragraph.\n\nThis is the third real paragraph.\n\nleftover paragraph ignored here";
        let drafts = parse_paragraphs(response).unwrap();
        assert_eq!(drafts.short, "This is the first real paragraph.");
        assert_eq!(drafts.medium, "This is the second real paragraph.");
        assert_eq!(drafts.long, "This is the third real paragraph.");
    }

    #[test]
    fn meta_commentary_suppressed_to_empty() {
        let response = r#"{"short": "Please provide the text you want me to comment on", "medium": "real text", "long": ""}"#;
        let (drafts, suppressed) = parse_response(response);
        assert_eq!(drafts.short, "");
        assert_eq!(drafts.medium, "real text");
        assert!(suppressed);
    }

    #[test]
    fn unparsable_response_yields_empty_set() {
        let (drafts, suppressed) = parse_response("?!");
        assert!(drafts.is_empty());
        assert!(!suppressed);
    }

    #[test]
    fn json_with_all_empty_falls_through_to_next_strategy() {
        let response = "{\"short\": \"\", \"medium\": \"\", \"long\": \"\"}\n\nShort: recovered from labeled line though";
        let (drafts, _) = parse_response(response);
        assert_eq!(drafts.short, "recovered from labeled line though");
    }
}
