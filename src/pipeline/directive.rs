//! Fingerprint → `AuthorDirective` compilation.
//!
//! The fingerprint is an externally-owned nested mapping with no enforced
//! schema. Compilation repairs logical UI mistakes (exclusive sentinels,
//! taboo typos, out-of-range sliders) without changing the author's
//! character, and always yields a fully-populated directive. It never
//! fails; malformed paths silently degrade to defaults.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::config::normalize_taboo_topic;
use super::context::AuthorProfile;

/// Dotted-path lookup: `"style.tone_default"` → `fp["style"]["tone_default"]`.
pub fn fingerprint_get<'a>(fp: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = fp;
    for part in path.split('.') {
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur)
}

fn get_str(fp: &Value, path: &str) -> Option<String> {
    let v = fingerprint_get(fp, path)?;
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Scalars are promoted to single-item lists; null becomes empty.
fn get_list(fp: &Value, path: &str) -> Vec<String> {
    match fingerprint_get(fp, path) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Drop an exclusive "no restrictions" sentinel when concrete items are
/// also present; keep it when it is the sole item.
fn fix_no_restrictions(list: Vec<String>, exclusive: &str) -> Vec<String> {
    if list.len() <= 1 || !list.iter().any(|x| x == exclusive) {
        return list;
    }
    list.into_iter().filter(|x| x != exclusive).collect()
}

/// Normalize taboo-topic typos; unknown values pass through unchanged
/// (logged at debug). Dedupes preserving first-seen order.
fn normalize_taboo_topics(topics: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for t in topics {
        if t.trim().is_empty() {
            continue;
        }
        let normalized = match normalize_taboo_topic(&t) {
            Some(n) => n.to_string(),
            None => {
                tracing::debug!(topic = %t, "taboo topic not in normalize map");
                t
            }
        };
        if !result.contains(&normalized) {
            result.push(normalized);
        }
    }
    result
}

/// Coerce a slider answer to an integer in [1, 10], applying the documented
/// default when missing or unparsable. Accepts numbers and numeric strings.
fn clamp_slider(raw: Option<&str>, default: i64) -> i64 {
    let value = raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .map_or(default, |f| f as i64);
    value.clamp(1, 10)
}

/// `style.*` / `anti_ai.*` overrides parsed from free-text author history
/// lines of the form `style.tone_default: value`.
fn parse_history_overrides(author: Option<&AuthorProfile>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(author) = author else { return out };
    for raw_line in author.history.lines() {
        let line = raw_line.trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (k, v) = (key.trim(), value.trim());
        if v.is_empty() {
            continue;
        }
        if let Some(style_key) = k.strip_prefix("style.") {
            out.insert(style_key.to_string(), v.to_string());
        } else if k.starts_with("anti_ai.") {
            out.insert(k.to_string(), v.to_string());
        }
    }
    out
}

// ─── Directive schema ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Voice {
    pub tone_default: String,
    pub energy: String,
    pub directness: i64,
    pub humor_type: String,
    pub humor_level: i64,
    pub sentence_style: String,
    pub roughness: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Structure {
    pub opening_pattern: String,
    pub structure_pref: String,
    pub paragraph_pref: String,
    pub end_question_preference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Intent {
    pub comment_goal: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelfReference {
    pub experience_policy: String,
    pub micro_detail_policy: String,
    pub status_mentions: String,
    pub forbidden_personal_patterns: Vec<String>,
    pub micro_detail_constraint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Constraints {
    pub taboo_topics: Vec<String>,
    pub taboo_style: Vec<String>,
    pub banned_phrases: Vec<String>,
    pub hated_smells: Vec<String>,
    pub therapy_handling: String,
    pub toxic_handling: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InteractionPlaybook {
    pub support_style: String,
    pub validation_style: String,
    pub challenge_style: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainPlaybook {
    pub logistics_explain_style: String,
    pub ai_position: String,
    pub ai_theses: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebatePlaybook {
    pub deescalation: String,
    pub common_topic: String,
    pub argument_style: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StylePlaybook {
    pub empathy_mode: String,
    pub experience_injection: String,
    pub what_is_point: String,
    pub flex_level: String,
    pub handling_stupid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSignals {
    pub identity_roles: Vec<String>,
    pub expertise_topics: Vec<String>,
    pub interaction_playbook: InteractionPlaybook,
    pub domain_playbook: DomainPlaybook,
    pub debate_playbook: DebatePlaybook,
    pub style_playbook: StylePlaybook,
    pub mandatory_rules: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorContext {
    pub full_name: String,
    pub role: String,
    pub history: String,
}

/// Normalized, generation-ready distillation of a fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorDirective {
    pub voice: Voice,
    pub structure: Structure,
    pub intent: Intent,
    pub self_reference: SelfReference,
    pub constraints: Constraints,
    pub profile_signals: ProfileSignals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_context: Option<AuthorContext>,
}

const NO_EXPERIENCE_POLICY: &str = "Вообще не упоминать опыт";

const FORBIDDEN_PERSONAL_PATTERNS: [&str; 10] = [
    "I did",
    "in my experience",
    "founders I know",
    "I built",
    "my clients",
    "я сделал",
    "в моём опыте",
    "основатели которых я знаю",
    "я построил",
    "мои клиенты",
];

/// Compile the fingerprint into an `AuthorDirective`.
pub fn compile_author_directive(fp: &Value, author: Option<&AuthorProfile>) -> AuthorDirective {
    let overrides = parse_history_overrides(author);

    let style_value = |key: &str| -> Option<String> {
        if let Some(v) = overrides.get(key) {
            if !v.is_empty() {
                return Some(v.clone());
            }
        }
        get_str(fp, &format!("style.{key}"))
    };
    let style_or = |key: &str, default: &str| style_value(key).unwrap_or_else(|| default.to_string());
    let get_or = |path: &str, default: &str| {
        get_str(fp, path).unwrap_or_else(|| default.to_string())
    };

    let exp_policy =
        style_value("self_reference_policy").unwrap_or_else(|| "Да, но только если помогает мысли".to_string());
    let forbidden_personal_patterns = if exp_policy == NO_EXPERIENCE_POLICY {
        FORBIDDEN_PERSONAL_PATTERNS.iter().map(|s| (*s).to_string()).collect()
    } else {
        Vec::new()
    };

    let micro_policy = get_or("background.micro_detail_policy", "Редко, если в тему");
    let micro_detail_constraint = match micro_policy.as_str() {
        "Редко, если в тему" => "max 1 micro-insert <= 8 words, only if directly related to anchor",
        "Никогда" => "forbidden",
        _ => "allowed",
    }
    .to_string();

    // taboo_topics: never_topics (exclusivity-repaired) ahead of taboo_topics.
    let taboo = fix_no_restrictions(get_list(fp, "safety.taboo_topics"), "Нет ограничений");
    let never = fix_no_restrictions(get_list(fp, "safety.never_topics"), "Нет");
    let taboo = normalize_taboo_topics(never.into_iter().chain(taboo).collect());

    let humor_taboo = fix_no_restrictions(get_list(fp, "safety.humor_taboo"), "Нет ограничений");

    let mut banned = get_list(fp, "anti_ai.banned_phrases");
    for extra in get_list(fp, "anti_ai.banned_phrases_extra") {
        if !banned.contains(&extra) {
            banned.push(extra);
        }
    }

    let directness = clamp_slider(style_value("directness").as_deref(), 5);
    let humor_level = clamp_slider(style_value("humor_level").as_deref(), 4);
    let roughness_raw = overrides
        .get("anti_ai.roughness")
        .cloned()
        .or_else(|| get_str(fp, "anti_ai.roughness"));
    let roughness = clamp_slider(roughness_raw.as_deref(), 6);

    let voice = Voice {
        tone_default: style_or("tone_default", "neutral"),
        energy: style_or("energy", "Спокойно и без напряга"),
        directness,
        humor_type: style_or("humor_type", "Легкий"),
        humor_level,
        sentence_style: style_or("sentence_style", "Смешанный"),
        roughness,
    };

    let structure = Structure {
        opening_pattern: style_or("opening_pattern", "Сразу с конкретики из поста"),
        structure_pref: style_or("structure_pref", "Якорь из поста → мысль → вопрос"),
        paragraph_pref: style_or("paragraph_pref", "1–2"),
        end_question_preference: style_or("end_question_preference", "Почти всегда"),
    };

    let intent = Intent {
        comment_goal: get_or("interaction.comment_goal", "Получить ответ автора"),
    };

    let self_reference = SelfReference {
        experience_policy: exp_policy,
        micro_detail_policy: micro_policy,
        status_mentions: style_or("status_mentions", "Только если напрямую усиливает мысль"),
        forbidden_personal_patterns,
        micro_detail_constraint,
    };

    let constraints = Constraints {
        taboo_topics: taboo,
        taboo_style: humor_taboo,
        banned_phrases: banned,
        hated_smells: get_list(fp, "anti_ai.hated_smells"),
        therapy_handling: get_or(
            "safety.therapy_handling",
            "Говорю «не моя зона» и возвращаю к практике",
        ),
        toxic_handling: get_or("safety.toxic_handling", "Спокойно обозначаю неприемлемость"),
    };

    let profile_signals = ProfileSignals {
        identity_roles: get_list(fp, "identity.roles"),
        expertise_topics: get_list(fp, "expertise.topics"),
        interaction_playbook: InteractionPlaybook {
            support_style: get_or("interaction.support_style", ""),
            validation_style: get_or("interaction.validation_style", ""),
            challenge_style: get_or("interaction.challenge_style", ""),
        },
        domain_playbook: DomainPlaybook {
            logistics_explain_style: get_or("domain.logistics.explain_style", ""),
            ai_position: get_or("domain.ai.position", ""),
            ai_theses: get_list(fp, "domain.ai.theses"),
        },
        debate_playbook: DebatePlaybook {
            deescalation: get_or("debate.deescalation", ""),
            common_topic: get_or("debate.common_topic", ""),
            argument_style: get_or("debate.argument_style", ""),
        },
        style_playbook: StylePlaybook {
            empathy_mode: style_or("empathy_mode", ""),
            experience_injection: style_or("experience_injection", ""),
            what_is_point: style_or("what_is_point", ""),
            flex_level: style_or("flex_level", ""),
            handling_stupid: style_or("handling_stupid", ""),
        },
        mandatory_rules: get_list(fp, "rules.mandatory"),
    };

    let author_context = author.map(|a| AuthorContext {
        full_name: a.full_name.clone(),
        role: a.role.clone(),
        history: a.history.clone(),
    });

    AuthorDirective {
        voice,
        structure,
        intent,
        self_reference,
        constraints,
        profile_signals,
        author_context,
    }
}
