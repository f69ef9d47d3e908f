//! Relevance filter: which fingerprint facts apply to this post.
//!
//! Voice, safety and identity answers always apply; domain playbooks apply
//! only when the post actually touches that domain, and personal/family
//! context only when the post is personal. Keeps off-topic persona facts
//! out of the prompt without ever dropping voice or safety rules.

use serde::Serialize;
use serde_json::Value;

use super::context::PostBrief;

const AI_HINTS: &[&str] = &[
    "ai", "llm", "model", "models", "automation", "agent", "agents", "prompt", "prompts",
    "codex", "claude", "chatgpt", "developer-tools", "coding", "code", "software",
];

const LOGISTICS_HINTS: &[&str] = &[
    "logistics", "freight", "broker", "carrier", "trucking", "shipment", "supply chain",
    "supply-chain", "transport",
];

const MARKETING_HINTS: &[&str] = &[
    "marketing", "brand", "growth", "content", "audience", "community", "positioning",
];

const PERSONAL_HINTS: &[&str] = &[
    "family", "kids", "marriage", "husband", "wife", "parent", "parenting", "relationship",
    "personal", "life",
];

/// Topic domains a post can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Ai,
    Logistics,
    Marketing,
    Personal,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedExample {
    pub path: String,
    pub value_preview: Value,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedExample {
    pub path: String,
    pub reason: &'static str,
}

/// Per-path applicability verdicts; a transient audit artifact.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthorApplicability {
    pub post_domains: Vec<Domain>,
    pub applied_paths: Vec<String>,
    pub skipped_paths: Vec<String>,
    pub applied_examples: Vec<AppliedExample>,
    pub skipped_examples: Vec<SkippedExample>,
}

const MAX_EXAMPLES: usize = 25;

fn clip_str(s: &str, max_len: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_len.saturating_sub(3)).collect();
    format!("{cut}...")
}

fn clip_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(clip_str(s, 120)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(4)
                .map(|v| match v {
                    Value::String(s) => Value::String(clip_str(s, 60)),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn flatten_leaves<'a>(data: &'a Value, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
    match data.as_object() {
        Some(map) => {
            for (key, value) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_leaves(value, &path, out);
            }
        }
        // Lists and scalars are leaf answers.
        None => out.push((prefix.to_string(), data)),
    }
}

fn detect_domains(post_text: &str, brief: &PostBrief) -> Vec<Domain> {
    let joined = format!(
        "{} {} {}",
        post_text.to_lowercase(),
        brief.main_claim.to_lowercase(),
        brief
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect::<Vec<_>>()
            .join(" "),
    );
    // Single-word hints match whole tokens only; "retail" must not light up
    // the "ai" domain. Multi-word hints fall back to substring search.
    let tokens: std::collections::HashSet<&str> = joined
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|t| !t.is_empty())
        .collect();
    let mut domains = Vec::new();
    let hit = |hints: &[&str]| {
        hints.iter().any(|h| {
            if h.contains(' ') {
                joined.contains(h)
            } else {
                tokens.contains(h)
            }
        })
    };
    if hit(AI_HINTS) {
        domains.push(Domain::Ai);
    }
    if hit(LOGISTICS_HINTS) {
        domains.push(Domain::Logistics);
    }
    if hit(MARKETING_HINTS) {
        domains.push(Domain::Marketing);
    }
    if hit(PERSONAL_HINTS) {
        domains.push(Domain::Personal);
    }
    domains
}

fn is_relevant(path: &str, domains: &[Domain]) -> (bool, &'static str) {
    let p = path.to_lowercase();
    let has = |d: Domain| domains.contains(&d);

    // Voice, safety and interaction rules always travel with the author.
    for prefix in ["style.", "interaction.", "anti_ai.", "safety.", "rules.", "privacy.", "debate."] {
        if p.starts_with(prefix) {
            return (true, "core_voice_or_rules");
        }
    }
    for prefix in ["identity.", "expertise."] {
        if p.starts_with(prefix) {
            return (true, "author_positioning");
        }
    }

    if p.starts_with("domain.ai.") {
        return if has(Domain::Ai) {
            (true, "domain_match_ai")
        } else {
            (false, "domain_mismatch")
        };
    }
    if p.starts_with("domain.logistics.") {
        return if has(Domain::Logistics) {
            (true, "domain_match_logistics")
        } else {
            (false, "domain_mismatch")
        };
    }
    if p.starts_with("domain.marketing.") {
        return if has(Domain::Marketing) {
            (true, "domain_match_marketing")
        } else {
            (false, "domain_mismatch")
        };
    }

    // Personal and family context only when the post is personal.
    if p.contains("family") || p.starts_with("background.") {
        return if has(Domain::Personal) {
            (true, "personal_context_match")
        } else {
            (false, "not_relevant_now")
        };
    }

    (true, "default_relevant")
}

/// Classify every fingerprint leaf against the post's topic domains.
pub fn build_author_applicability(
    fingerprint: &Value,
    post_text: &str,
    brief: &PostBrief,
) -> AuthorApplicability {
    let mut leaves = Vec::new();
    flatten_leaves(fingerprint, "", &mut leaves);
    let domains = detect_domains(post_text, brief);

    let mut result = AuthorApplicability {
        post_domains: domains.clone(),
        ..AuthorApplicability::default()
    };

    for (path, value) in leaves {
        let (ok, reason) = is_relevant(&path, &domains);
        if ok {
            if result.applied_examples.len() < MAX_EXAMPLES {
                result.applied_examples.push(AppliedExample {
                    path: path.clone(),
                    value_preview: clip_value(value),
                    reason,
                });
            }
            result.applied_paths.push(path);
        } else {
            if result.skipped_examples.len() < MAX_EXAMPLES {
                result.skipped_examples.push(SkippedExample {
                    path: path.clone(),
                    reason,
                });
            }
            result.skipped_paths.push(path);
        }
    }
    result
}
