//! Classification bands and the action decision table.
//!
//! Classification is driven by the aggregate score only. A single maximal
//! component can therefore land in `safe` when the others are low
//! (domain 90 alone scores 27); that is current calibration, not a bug.

use crate::triage::types::{AggregatedScores, RecommendedAction, ThreatClassification};

/// First score classified as suspicious.
pub const SUSPICIOUS_FLOOR: u8 = 31;
/// First score classified as malicious.
pub const MALICIOUS_FLOOR: u8 = 61;

/// Component score above which a malicious email's sender gets blocked.
pub const BLOCK_THRESHOLD: u8 = 80;
/// Social-engineering score above which a suspicious email goes to the SOC.
pub const ESCALATION_THRESHOLD: u8 = 60;

/// Map a final risk score to its band.
pub fn classify(risk_score: u8) -> ThreatClassification {
    if risk_score >= MALICIOUS_FLOOR {
        ThreatClassification::Malicious
    } else if risk_score >= SUSPICIOUS_FLOOR {
        ThreatClassification::Suspicious
    } else {
        ThreatClassification::Safe
    }
}

/// Pick the action for a classified email. Branches are checked in order.
pub fn recommend_action(
    classification: ThreatClassification,
    scores: &AggregatedScores,
) -> RecommendedAction {
    match classification {
        ThreatClassification::Malicious => {
            if scores.attachment_risk > BLOCK_THRESHOLD || scores.domain_risk > BLOCK_THRESHOLD {
                RecommendedAction::BlockSender
            } else {
                RecommendedAction::Quarantine
            }
        }
        ThreatClassification::Suspicious => {
            if scores.social_engineering_risk > ESCALATION_THRESHOLD {
                RecommendedAction::EscalateToSoc
            } else {
                RecommendedAction::WarnUser
            }
        }
        ThreatClassification::Safe => RecommendedAction::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::scoring::calculate_risk;

    fn decide(scores: AggregatedScores) -> (u8, ThreatClassification, RecommendedAction) {
        let risk = calculate_risk(&scores);
        let class = classify(risk);
        (risk, class, recommend_action(class, &scores))
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(classify(0), ThreatClassification::Safe);
        assert_eq!(classify(30), ThreatClassification::Safe);
        assert_eq!(classify(31), ThreatClassification::Suspicious);
        assert_eq!(classify(60), ThreatClassification::Suspicious);
        assert_eq!(classify(61), ThreatClassification::Malicious);
        assert_eq!(classify(100), ThreatClassification::Malicious);
    }

    #[test]
    fn malicious_with_hot_attachment_blocks_sender() {
        assert_eq!(
            decide(AggregatedScores::new(0, 100, 100, 0)),
            (
                65,
                ThreatClassification::Malicious,
                RecommendedAction::BlockSender
            )
        );
    }

    #[test]
    fn malicious_without_hot_component_quarantines() {
        // 0.8·35 + 0.8·30 + 0.8·20 + 0.8·15 = 80, but neither attachment nor domain exceeds 80
        let scores = AggregatedScores::new(80, 80, 80, 80);
        assert_eq!(
            decide(scores),
            (
                80,
                ThreatClassification::Malicious,
                RecommendedAction::Quarantine
            )
        );
    }

    #[test]
    fn malicious_with_hot_domain_blocks_sender() {
        let scores = AggregatedScores::new(100, 81, 60, 0);
        let (risk, class, action) = decide(scores);
        assert!(risk >= MALICIOUS_FLOOR, "risk {risk}");
        assert_eq!(class, ThreatClassification::Malicious);
        assert_eq!(action, RecommendedAction::BlockSender);
    }

    #[test]
    fn suspicious_with_heavy_social_engineering_escalates() {
        assert_eq!(
            decide(AggregatedScores::new(100, 0, 0, 100)),
            (
                35,
                ThreatClassification::Suspicious,
                RecommendedAction::EscalateToSoc
            )
        );
    }

    #[test]
    fn suspicious_at_exact_threshold_only_warns() {
        let scores = AggregatedScores::new(0, 0, 100, 60);
        assert_eq!(
            recommend_action(ThreatClassification::Suspicious, &scores),
            RecommendedAction::WarnUser
        );
    }

    #[test]
    fn all_zero_allows() {
        assert_eq!(
            decide(AggregatedScores::default()),
            (0, ThreatClassification::Safe, RecommendedAction::Allow)
        );
    }

    #[test]
    fn single_high_domain_still_safe() {
        assert_eq!(
            decide(AggregatedScores::new(0, 90, 0, 0)),
            (27, ThreatClassification::Safe, RecommendedAction::Allow)
        );
    }

    #[test]
    fn safe_ignores_component_thresholds() {
        let scores = AggregatedScores::new(0, 0, 0, 100);
        assert_eq!(
            recommend_action(ThreatClassification::Safe, &scores),
            RecommendedAction::Allow
        );
    }
}
