//! Weighted risk scoring.
//!
//! ```text
//! total = attachment·35% + domain·30% + url·20% + social_engineering·15%
//! ```
//!
//! The weights sum to 100, so the result is the floor of a weighted mean of
//! four values in [0, 100]. Computed in integers so the floor is exact.

use crate::triage::types::{AggregatedScores, SignalKind};

pub const ATTACHMENT_WEIGHT: u32 = 35;
pub const DOMAIN_WEIGHT: u32 = 30;
pub const URL_WEIGHT: u32 = 20;
pub const SOCIAL_ENGINEERING_WEIGHT: u32 = 15;

/// Upper bound of the normalized score.
pub const MAX_RISK: u8 = 100;

/// Fixed weight of a signal.
pub fn weight(kind: SignalKind) -> u32 {
    match kind {
        SignalKind::Attachment => ATTACHMENT_WEIGHT,
        SignalKind::Domain => DOMAIN_WEIGHT,
        SignalKind::Url => URL_WEIGHT,
        SignalKind::SocialEngineering => SOCIAL_ENGINEERING_WEIGHT,
    }
}

/// Map four component scores to one risk score in [0, 100].
pub fn calculate_risk(scores: &AggregatedScores) -> u8 {
    let weighted: u32 = SignalKind::ALL
        .into_iter()
        .map(|kind| u32::from(scores.get(kind)) * weight(kind))
        .sum();
    let total = weighted / 100;
    total.min(u32::from(MAX_RISK)) as u8
}

/// Weighted contribution of each non-zero signal, in hundredths of a point.
///
/// `contribution / 100` is how many points of the final score a signal is
/// responsible for before truncation.
pub fn contributions(scores: &AggregatedScores) -> Vec<(SignalKind, u32)> {
    scores
        .contributing()
        .into_iter()
        .map(|(kind, score)| (kind, u32::from(score) * weight(kind)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one_hundred() {
        let sum: u32 = SignalKind::ALL.into_iter().map(weight).sum();
        assert_eq!(sum, 100);
    }

    #[test]
    fn all_zero_is_zero() {
        assert_eq!(calculate_risk(&AggregatedScores::default()), 0);
    }

    #[test]
    fn attachment_alone_is_its_weight() {
        let scores = AggregatedScores::new(0, 0, 100, 0);
        assert_eq!(calculate_risk(&scores), 35);
    }

    #[test]
    fn attachment_and_domain_maximal() {
        let scores = AggregatedScores::new(0, 100, 100, 0);
        assert_eq!(calculate_risk(&scores), 65);
    }

    #[test]
    fn url_and_social_engineering_maximal() {
        let scores = AggregatedScores::new(100, 0, 0, 100);
        assert_eq!(calculate_risk(&scores), 35);
    }

    #[test]
    fn single_high_domain_truncates() {
        let scores = AggregatedScores::new(0, 90, 0, 0);
        assert_eq!(calculate_risk(&scores), 27);
    }

    #[test]
    fn truncates_rather_than_rounds() {
        // 0.99·35 + 0.99·30 = 64.35 → 64 (plus url 1·20 = 0.2, social 1·15 = 0.15 → 64.7 → 64)
        let scores = AggregatedScores::new(1, 99, 99, 1);
        assert_eq!(calculate_risk(&scores), 64);
    }

    #[test]
    fn everything_maximal_is_capped_at_100() {
        let scores = AggregatedScores::new(100, 100, 100, 100);
        assert_eq!(calculate_risk(&scores), 100);
    }

    #[test]
    fn output_stays_in_range_across_grid() {
        for a in (0..=100).step_by(10) {
            for d in (0..=100).step_by(10) {
                for u in (0..=100).step_by(25) {
                    for s in (0..=100).step_by(25) {
                        let scores = AggregatedScores::new(u, d, a, s);
                        let first = calculate_risk(&scores);
                        assert!(first <= 100);
                        assert_eq!(first, calculate_risk(&scores));
                    }
                }
            }
        }
    }

    #[test]
    fn contributions_report_weighted_hundredths() {
        let scores = AggregatedScores::new(50, 0, 100, 0);
        assert_eq!(
            contributions(&scores),
            vec![(SignalKind::Url, 1000), (SignalKind::Attachment, 3500)]
        );
    }
}
