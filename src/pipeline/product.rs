//! Product selection and plan assembly.

use super::config::{HARD_AD_CTA_FALLBACK, Mode, Policy};
use super::context::{MentionStyle, PostBrief, Product, ProductPlan};

/// Tag-overlap heuristic between post tags and product tags ∪ ICP tags,
/// 0-100. A product that declares no tags at all scores a neutral 50.
pub fn tag_overlap_score(post_tags: &[String], product: &Product) -> i64 {
    if product.tags.is_empty() && product.icp_tags.is_empty() {
        return 50;
    }
    let post_set: std::collections::HashSet<String> = post_tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    let prod_set: std::collections::HashSet<String> = product
        .tags
        .iter()
        .chain(product.icp_tags.iter())
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if prod_set.is_empty() {
        return 50;
    }
    let overlap = post_set.intersection(&prod_set).count() as i64;
    let total = prod_set.len() as i64;
    let score = (100.0 * overlap as f64 / total as f64 + 20.0 * overlap as f64) as i64;
    score.min(100)
}

/// Select a product and build its plan.
///
/// - native_ad: only candidates scoring at least
///   `policy.min_match_score_for_product`; `None` when nothing qualifies.
/// - hard_ad: a product is mandatory; when nothing wins on relevance the
///   first catalog entry is force-selected (policy intent overrides
///   relevance).
pub fn select_product_and_plan(
    brief: &PostBrief,
    products: &[Product],
    policy: &Policy,
    mode: Mode,
    selected_product_name: Option<&str>,
) -> Option<ProductPlan> {
    if products.is_empty() || mode == Mode::Network {
        return None;
    }

    let min_score = policy.min_match_score_for_product;
    let mut best: Option<(&Product, i64)> = None;

    for product in products {
        if let Some(wanted) = selected_product_name {
            if product.name != wanted {
                continue;
            }
        }
        let score = tag_overlap_score(&brief.tags, product);
        if mode == Mode::NativeAd && score < min_score {
            continue;
        }
        // Later candidates win ties, matching first-to-last catalog scan.
        if best.is_none_or(|(_, s)| score >= s) {
            best = Some((product, score));
        }
    }

    let (product, score) = match best {
        Some(found) => found,
        None if mode == Mode::HardAd => {
            let first = products.first()?;
            (first, tag_overlap_score(&brief.tags, first))
        }
        None => return None,
    };

    let chosen_claims = product
        .allowed_claims
        .iter()
        .take(policy.allowed_claims_limit)
        .cloned()
        .collect();
    let cta_template = product
        .cta_templates
        .first()
        .cloned()
        .unwrap_or_else(|| HARD_AD_CTA_FALLBACK.to_string());

    Some(ProductPlan {
        selected_product: product.clone(),
        match_score: score,
        mention_style: if mode == Mode::NativeAd {
            MentionStyle::Soft
        } else {
            MentionStyle::Direct
        },
        chosen_claims,
        forbidden_claims: product.forbidden_claims.clone(),
        cta_template,
        link: product.link.clone(),
    })
}
