//! Data model carried through one pipeline invocation. Every struct here is
//! a transient artifact: built for a single request, discarded after
//! `finalize`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::{Mode, Policy, Variant};

/// Reply language, derived from script-ratio analysis of the post text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Language {
    Russian,
    English,
}

impl Language {
    /// Cyrillic majority wins; ties (including empty text) read as English.
    pub fn detect(text: &str) -> Self {
        let cyrillic = text.chars().filter(|c| ('\u{0400}'..='\u{04FF}').contains(c)).count();
        let latin = text.chars().filter(char::is_ascii_alphabetic).count();
        if cyrillic > latin {
            Language::Russian
        } else {
            Language::English
        }
    }
}

/// Structured summary of the source post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostBrief {
    #[serde(default)]
    pub main_claim: String,
    #[serde(default)]
    pub anchors: Vec<String>,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Catalog product. Catalogs arrive as JSON; every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub one_liner: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub icp_tags: Vec<String>,
    #[serde(default)]
    pub allowed_claims: Vec<String>,
    #[serde(default)]
    pub forbidden_claims: Vec<String>,
    #[serde(default)]
    pub cta_templates: Vec<String>,
    #[serde(default)]
    pub link: String,
}

impl Product {
    /// Product name plus declared aliases, trimmed, empties dropped.
    pub fn names_and_aliases(&self) -> Vec<&str> {
        std::iter::once(self.name.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// How the selected product should be mentioned in the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MentionStyle {
    Soft,
    Direct,
}

/// The chosen product and its claim envelope for one request.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPlan {
    pub selected_product: Product,
    pub match_score: i64,
    pub mention_style: MentionStyle,
    pub chosen_claims: Vec<String>,
    pub forbidden_claims: Vec<String>,
    pub cta_template: String,
    pub link: String,
}

/// The three length variants produced per request. An empty member signals
/// generation failure for that variant, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSet {
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub medium: String,
    #[serde(default)]
    pub long: String,
}

impl DraftSet {
    pub fn get(&self, variant: Variant) -> &str {
        match variant {
            Variant::Short => &self.short,
            Variant::Medium => &self.medium,
            Variant::Long => &self.long,
        }
    }

    pub fn set(&mut self, variant: Variant, text: String) {
        match variant {
            Variant::Short => self.short = text,
            Variant::Medium => self.medium = text,
            Variant::Long => self.long = text,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.short.trim().is_empty()
            && self.medium.trim().is_empty()
            && self.long.trim().is_empty()
    }

    /// Keep one variant, blank the others.
    pub fn retain_only(mut self, variant: Variant) -> Self {
        let kept = self.get(variant).to_string();
        self = DraftSet::default();
        self.set(variant, kept);
        self
    }
}

/// One targeted edit instruction from the reviewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: String,
    pub hint: String,
}

impl PatchOp {
    pub fn replace(hint: impl Into<String>) -> Self {
        Self {
            op: "replace".to_string(),
            hint: hint.into(),
        }
    }
}

/// Qualitative scores from the assisted review layer (0-100).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewScores {
    pub persona_fit: i64,
    pub ai_smell: i64,
    pub post_anchor: i64,
    pub clarity: i64,
    pub integrity: i64,
    pub salesiness: i64,
}

impl Default for ReviewScores {
    /// Neutral scores used by the rule-only fallback review.
    fn default() -> Self {
        Self {
            persona_fit: 70,
            ai_smell: 20,
            post_anchor: 70,
            clarity: 75,
            integrity: 95,
            salesiness: 10,
        }
    }
}

/// Verdict for one draft attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewResult {
    pub pass: bool,
    pub scores: ReviewScores,
    pub flags: Vec<String>,
    pub patch_plan: Vec<PatchOp>,
}

/// Caller-supplied author record; `history` lines may override fingerprint
/// style answers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorProfile {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub history: String,
}

/// One request into the pipeline.
#[derive(Debug, Clone)]
pub struct CommentRequest {
    pub post_text: String,
    /// Persona fingerprint: arbitrary-depth mapping, read via dot-paths.
    pub fingerprint: Value,
    pub products: Vec<Product>,
    /// Goal string from the caller; resolved through `Mode::from_goal`.
    pub goal: String,
    pub author: Option<AuthorProfile>,
}

/// Everything `prepare` produced, handed to `finalize`. Owned by exactly one
/// invocation; the pipeline holds no state across requests.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub post_text: String,
    pub post_language: Language,
    pub post_brief: PostBrief,
    pub author_directive: super::directive::AuthorDirective,
    pub author_applicability: super::relevance::AuthorApplicability,
    pub policy: Policy,
    pub product_plan: Option<ProductPlan>,
    pub mode: Mode,
    pub products: Vec<Product>,
    pub drafts: DraftSet,
}
