//! Stateless text detectors: CTA phrases, links, punctuation policy,
//! language mismatch, personal stance, copy overlap, rhetoric reactions,
//! product mentions. Pure functions over their inputs, no side effects.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::context::{Language, Product, ProductPlan};

// ─── CTA ─────────────────────────────────────────────────────────────────────

const CTA_PATTERNS: &[&str] = &[
    r"\bDM\s+me\b",
    r"\bbook\s+a\s+call\b",
    r"\bschedule\s+a\s+call\b",
    r"\bsign\s+up\b",
    r"\btry\s+it\b",
    r"\btry\s+free\b",
    r"\bget\s+started\b",
    r"\blet'?s\s+connect\b",
    r"\blet'?s\s+chat\b",
    r"\breach\s+out\b",
    r"\bping\s+me\b",
    r"\bhit\s+me\s+up\b",
    r"\blink\s+in\s+(bio|comments)\b",
    r"\blink\s+below\b",
    r"\bв\s+личку\b",
    r"\bнапиши\s+в\s+личку\b",
    r"\bнапишите\s+в\s+личку\b",
    r"\bзапишись\b",
    r"\bзапишитесь\b",
    r"\bзабронируй\b",
    r"\bпопробуй\b",
    r"\bпопробуйте\b",
    r"\bдавай\s+свяжемся\b",
    r"\bдавайте\s+свяжемся\b",
    r"\bнапиши\s+мне\b",
    r"\bнапишите\s+мне\b",
    r"\bскинь\s+ссылку\b",
    r"\bподробнее\s+в\s+комментах\b",
];

static CTA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){}", CTA_PATTERNS.join("|"))).expect("static CTA regex")
});

/// True if the text contains CTA-like phrases (EN or RU).
pub fn detect_cta(text: &str) -> bool {
    !text.trim().is_empty() && CTA_RE.is_match(text)
}

// ─── Links ───────────────────────────────────────────────────────────────────

const LINK_PATTERNS: &[&str] = &[
    r"https?://\S+",
    r"www\.\S+",
    r"linkedin\.com/\S*",
    r"bit\.ly/\S*",
    r"t\.me/\S*",
];

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){}", LINK_PATTERNS.join("|"))).expect("static link regex")
});

/// True if the text contains URLs or link references.
pub fn has_links(text: &str) -> bool {
    !text.trim().is_empty() && LINK_RE.is_match(text)
}

// ─── Punctuation policy ──────────────────────────────────────────────────────

/// True if the text contains an em dash (—) or en dash (–).
pub fn has_em_dash(text: &str) -> bool {
    text.contains('—') || text.contains('–')
}

static URL_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(https?://\S+|www\.\S+)").expect("static url regex"));

/// True if the text contains a colon outside of URL spans.
pub fn has_colon(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    URL_SPAN_RE.replace_all(text, "").contains(':')
}

static DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[—–]+\s*").expect("static dash regex"));

/// Replace em/en dashes with a comma and colons (outside URLs) with a
/// period. URLs pass through untouched.
pub fn sanitize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let dashless = DASH_RE.replace_all(text, ", ");
    let mut out = String::with_capacity(dashless.len());
    let mut last = 0;
    for m in URL_SPAN_RE.find_iter(&dashless) {
        out.push_str(&dashless[last..m.start()].replace(':', "."));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&dashless[last..].replace(':', "."));
    out
}

// ─── Language mismatch ───────────────────────────────────────────────────────

/// Too few letters and the check abstains rather than guessing.
const LANGUAGE_MIN_LETTERS: usize = 12;

/// True when the text's dominant script disagrees with the expected reply
/// language. Requires at least 12 combined Cyrillic+Latin letters to render
/// any verdict.
pub fn detect_language_mismatch(text: &str, expected: Language) -> bool {
    let cyrillic = text
        .chars()
        .filter(|c| ('\u{0400}'..='\u{04FF}').contains(c))
        .count();
    let latin = text.chars().filter(char::is_ascii_alphabetic).count();
    if cyrillic + latin < LANGUAGE_MIN_LETTERS {
        return false;
    }
    let detected = if cyrillic > latin {
        Language::Russian
    } else {
        Language::English
    };
    detected != expected
}

// ─── Personal stance ─────────────────────────────────────────────────────────

static STANCE_EN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(i\s+think|i\s+believe|i'?d\b|i'?ve\b|i'?m\b|in\s+my\s+(view|experience)|my\s+take|for\s+me\b|i\s+disagree|i\s+agree|i\s+see\s+it)",
    )
    .expect("static stance regex")
});

static STANCE_RU_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(я\s+думаю|я\s+считаю|по-моему|мне\s+кажется|на\s+мой\s+взгляд|я\s+бы|у\s+меня|я\s+не\s+согласен|я\s+согласен|для\s+меня|по\s+моему\s+опыту)",
    )
    .expect("static stance regex")
});

/// True if the text carries a first-person stance marker for the given
/// language.
pub fn detect_personal_stance(text: &str, language: Language) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    match language {
        Language::English => STANCE_EN_RE.is_match(text),
        Language::Russian => STANCE_RU_RE.is_match(text),
    }
}

// ─── Copy overlap ────────────────────────────────────────────────────────────

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}']+").expect("static word regex"));

fn tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

fn ngrams(tokens: &[String], n: usize) -> HashSet<String> {
    if tokens.len() < n {
        return HashSet::new();
    }
    tokens.windows(n).map(|w| w.join(" ")).collect()
}

fn ngram_overlap_count(target: &str, source: &str, n: usize) -> usize {
    let source_grams = ngrams(&tokenize(source), n);
    if source_grams.is_empty() {
        return 0;
    }
    let target_tokens = tokenize(target);
    if target_tokens.len() < n {
        return 0;
    }
    target_tokens
        .windows(n)
        .filter(|w| source_grams.contains(&w.join(" ")))
        .count()
}

/// Draft copies the post wording: more than one shared 4-gram.
pub fn detect_post_copy_overlap(draft: &str, post_text: &str) -> bool {
    ngram_overlap_count(draft, post_text, 4) > 1
}

/// Draft copies an anchor phrase: any shared 3-gram with any anchor.
/// Anchors are for grounding, not for verbatim reuse, so the bar is
/// stricter than for the post body.
pub fn detect_anchor_copy_overlap(draft: &str, anchors: &[String]) -> bool {
    anchors
        .iter()
        .any(|anchor| ngram_overlap_count(draft, anchor, 3) > 0)
}

// ─── Rhetoric reaction ───────────────────────────────────────────────────────

static RHETORIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(great\s+question|great\s+post|love\s+this\s+post|love\s+this\b|what\s+a\s+great|thanks\s+for\s+sharing|well\s+said|powerful\s+(post|metaphor)|so\s+true\b|сильный\s+пост|отличный\s+пост|отличный\s+вопрос|крутой\s+пост|спасибо,?\s+что\s+поделил|хорошо\s+сказано|очень\s+точно\s+подмечено)",
    )
    .expect("static rhetoric regex")
});

static SENTENCE_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)[^.!?]*[.!?]+|[^.!?]+$").expect("static sentence regex"));

/// True if any sentence is a reaction to the post's rhetoric rather than a
/// standalone thought.
pub fn detect_post_rhetoric_reaction(text: &str) -> bool {
    !text.trim().is_empty()
        && SENTENCE_SPLIT_RE
            .find_iter(text)
            .any(|s| RHETORIC_RE.is_match(s.as_str()))
}

/// Drop rhetoric-reaction sentences. Returns the original text unmodified
/// when stripping would empty the result; never emits empty output from
/// non-empty input.
pub fn strip_post_rhetoric_reaction(text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }
    let kept: String = SENTENCE_SPLIT_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|s| !RHETORIC_RE.is_match(s))
        .collect();
    let kept = kept.trim();
    if kept.is_empty() {
        text.to_string()
    } else {
        kept.to_string()
    }
}

// ─── Claims and product mentions ─────────────────────────────────────────────

/// True if the text contains any forbidden-claim phrase (case-insensitive
/// substring).
pub fn detect_forbidden_claim_violation(text: &str, forbidden_claims: &[String]) -> bool {
    if text.is_empty() || forbidden_claims.is_empty() {
        return false;
    }
    let text_lower = text.to_lowercase();
    forbidden_claims
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .any(|c| text_lower.contains(&c))
}

/// True if the draft mentions the planned product by name or alias.
pub fn product_mentioned_in_draft(text: &str, plan: Option<&ProductPlan>) -> bool {
    let Some(plan) = plan else { return false };
    if text.is_empty() {
        return false;
    }
    let text_lower = text.to_lowercase();
    plan.selected_product
        .names_and_aliases()
        .iter()
        .any(|n| text_lower.contains(&n.to_lowercase()))
}

/// Count of planned-product mentions (name + aliases) in the text.
pub fn count_product_mentions(text: &str, plan: Option<&ProductPlan>) -> usize {
    let Some(plan) = plan else { return 0 };
    if text.is_empty() {
        return 0;
    }
    let text_lower = text.to_lowercase();
    plan.selected_product
        .names_and_aliases()
        .iter()
        .map(|n| text_lower.matches(&n.to_lowercase()).count())
        .sum()
}

/// True if the text mentions any product from the catalog.
pub fn detect_product_mention_any(text: &str, products: &[Product]) -> bool {
    if text.is_empty() || products.is_empty() {
        return false;
    }
    let text_lower = text.to_lowercase();
    products.iter().any(|p| {
        p.names_and_aliases()
            .iter()
            .any(|n| text_lower.contains(&n.to_lowercase()))
    })
}
