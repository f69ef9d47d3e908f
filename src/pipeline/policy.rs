//! Mode → policy lookup.

use super::config::{HARD_AD_POLICY, Mode, NATIVE_AD_POLICY, NETWORK_POLICY, Policy};

/// Constraint record for the given mode.
///
/// Callers that hold a raw goal string should resolve it through
/// `Mode::from_goal` first; anything unknown lands on the network policy,
/// which never permits promotion.
pub fn get_policy(mode: Mode) -> &'static Policy {
    match mode {
        Mode::Network => &NETWORK_POLICY,
        Mode::NativeAd => &NATIVE_AD_POLICY,
        Mode::HardAd => &HARD_AD_POLICY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::ProductInclusion;

    #[test]
    fn unknown_goal_gets_network_policy() {
        let policy = get_policy(Mode::from_goal("unknown_mode"));
        assert_eq!(*policy, NETWORK_POLICY);
        assert_eq!(policy.product_inclusion, ProductInclusion::None);
        assert!(!policy.cta_allowed);
    }

    #[test]
    fn hard_ad_requires_product_and_cta() {
        let policy = get_policy(Mode::HardAd);
        assert!(policy.product_required);
        assert!(policy.cta_required);
        assert_eq!(policy.allowed_claims_limit, 2);
    }
}
