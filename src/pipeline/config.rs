//! Policies and thresholds for the comment pipeline. Everything tunable
//! lives here as data, not as scattered if-else.

use serde::{Deserialize, Serialize};

/// Commercial-intent tier governing promotional latitude.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Network,
    NativeAd,
    HardAd,
}

impl Mode {
    /// Resolve a caller-supplied goal string, accepting legacy aliases.
    /// Unknown values fall back to `Network`, the safe default that never
    /// permits promotion.
    pub fn from_goal(goal: &str) -> Self {
        match goal.trim() {
            "network" => Mode::Network,
            "native_ad" | "native_ads" => Mode::NativeAd,
            "hard_ad" | "full_ads" => Mode::HardAd,
            _ => Mode::Network,
        }
    }
}

/// One of the three target lengths generated per request.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Short,
    Medium,
    Long,
}

pub const ALL_VARIANTS: [Variant; 3] = [Variant::Short, Variant::Medium, Variant::Long];

/// How a product may appear in the comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductInclusion {
    None,
    SoftMatch,
    Direct,
}

/// Whether the comment may carry a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPolicy {
    Forbidden,
    Allowed,
    DependsOnProduct,
}

/// Static constraint record for one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub product_inclusion: ProductInclusion,
    pub product_required: bool,
    pub max_product_mentions: usize,
    pub cta_allowed: bool,
    pub cta_required: bool,
    pub link_allowed: LinkPolicy,
    pub min_match_score_for_product: i64,
    pub salesiness_max: i64,
    pub allowed_claims_limit: usize,
}

pub const NETWORK_POLICY: Policy = Policy {
    product_inclusion: ProductInclusion::None,
    product_required: false,
    max_product_mentions: 0,
    cta_allowed: false,
    cta_required: false,
    link_allowed: LinkPolicy::Forbidden,
    min_match_score_for_product: 0,
    salesiness_max: 10,
    allowed_claims_limit: 0,
};

pub const NATIVE_AD_POLICY: Policy = Policy {
    product_inclusion: ProductInclusion::SoftMatch,
    product_required: false,
    max_product_mentions: 1,
    cta_allowed: false,
    cta_required: false,
    link_allowed: LinkPolicy::Forbidden,
    min_match_score_for_product: 70,
    salesiness_max: 25,
    allowed_claims_limit: 1,
};

pub const HARD_AD_POLICY: Policy = Policy {
    product_inclusion: ProductInclusion::Direct,
    product_required: true,
    max_product_mentions: 2,
    cta_allowed: true,
    cta_required: true,
    link_allowed: LinkPolicy::DependsOnProduct,
    min_match_score_for_product: 0,
    salesiness_max: 60,
    allowed_claims_limit: 2,
};

/// Assisted-review score bars per variant. Short comments are held to
/// tighter bars than long ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewThresholds {
    pub ai_smell_max: i64,
    pub post_anchor_min: i64,
    pub clarity_min: i64,
    pub integrity_min: i64,
    pub persona_fit_min: i64,
}

pub const fn review_thresholds(variant: Variant) -> ReviewThresholds {
    match variant {
        Variant::Short => ReviewThresholds {
            ai_smell_max: 25,
            post_anchor_min: 80,
            clarity_min: 80,
            integrity_min: 95,
            persona_fit_min: 70,
        },
        Variant::Medium => ReviewThresholds {
            ai_smell_max: 35,
            post_anchor_min: 65,
            clarity_min: 72,
            integrity_min: 95,
            persona_fit_min: 70,
        },
        Variant::Long => ReviewThresholds {
            ai_smell_max: 40,
            post_anchor_min: 60,
            clarity_min: 66,
            integrity_min: 95,
            persona_fit_min: 68,
        },
    }
}

/// Target character ranges per variant, handed to the generation prompt.
pub const fn target_length(variant: Variant) -> (usize, usize) {
    match variant {
        Variant::Short => (180, 260),
        Variant::Medium => (300, 600),
        Variant::Long => (700, 1200),
    }
}

/// Fallback CTA for hard_ad when the product declares no cta_templates.
pub const HARD_AD_CTA_FALLBACK: &str = "Напиши в личку, расскажу подробнее";

/// Typo-correction table for taboo topics. Keys are trimmed + lowercased
/// before lookup; unmapped values pass through unchanged.
pub const TABOO_TOPICS_NORMALIZE: [(&str, &str); 5] = [
    ("полигия", "Политика"),
    ("политика", "Политика"),
    ("религия", "Религия"),
    ("расизм", "Расизм"),
    ("раса/этничность", "Раса/этничность"),
];

pub fn normalize_taboo_topic(raw: &str) -> Option<&'static str> {
    let key = raw.trim().to_lowercase();
    TABOO_TOPICS_NORMALIZE
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}
