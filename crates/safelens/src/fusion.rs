//! Confidence fusion: weighted sum, tiered boosting and a ceiling.
//!
//! Fusion is a pure function of the category's signals and its
//! [`FusionProfile`]. Boost rules form a ladder tried top to bottom; the first
//! rule whose tier counts are all met sets the multiplier.

use crate::features::RawSignal;

/// Weight of one named signal.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SignalWeight {
    pub method: String,
    pub weight: f32,
}

impl SignalWeight {
    pub fn new(method: &str, weight: f32) -> Self {
        Self {
            method: method.to_string(),
            weight,
        }
    }
}

/// Tier boundaries: strong `> strong`, moderate `(moderate, strong]`,
/// weak `(weak, moderate]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TierBounds {
    pub strong: f32,
    pub moderate: f32,
    pub weak: f32,
}

impl Default for TierBounds {
    fn default() -> Self {
        Self {
            strong: 0.6,
            moderate: 0.3,
            weak: 0.1,
        }
    }
}

/// Number of signals in each tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TierCounts {
    pub strong: usize,
    pub moderate: usize,
    pub weak: usize,
}

impl TierCounts {
    pub fn count(signals: &[RawSignal], bounds: &TierBounds) -> Self {
        let mut counts = Self::default();
        for v in signals.iter().map(RawSignal::value) {
            if v > bounds.strong {
                counts.strong += 1;
            } else if v > bounds.moderate {
                counts.moderate += 1;
            } else if v > bounds.weak {
                counts.weak += 1;
            }
        }
        counts
    }
}

/// Multiplier applied when the tier counts reach every minimum.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoostRule {
    pub min_strong: usize,
    pub min_moderate: usize,
    pub min_weak: usize,
    pub multiplier: f32,
}

impl BoostRule {
    pub const fn new(min_strong: usize, min_moderate: usize, min_weak: usize, multiplier: f32) -> Self {
        Self {
            min_strong,
            min_moderate,
            min_weak,
            multiplier,
        }
    }

    fn matches(&self, counts: &TierCounts) -> bool {
        counts.strong >= self.min_strong
            && counts.moderate >= self.min_moderate
            && counts.weak >= self.min_weak
    }
}

/// Per-category fusion parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FusionProfile {
    pub weights: Vec<SignalWeight>,
    pub tiers: TierBounds,
    /// Tried in order; no match means ×1.
    pub boosts: Vec<BoostRule>,
    pub ceiling: f32,
}

impl FusionProfile {
    /// Drug indicator groups with the multiple-strong-indicators ladder.
    pub fn drugs() -> Self {
        Self {
            weights: vec![
                SignalWeight::new("pills", 0.50),
                SignalWeight::new("powder", 0.35),
                SignalWeight::new("plants", 0.10),
                SignalWeight::new("paraphernalia", 0.05),
            ],
            tiers: TierBounds::default(),
            boosts: vec![
                BoostRule::new(2, 0, 0, 2.0),
                BoostRule::new(1, 1, 0, 1.8),
                BoostRule::new(1, 0, 0, 1.6),
                BoostRule::new(0, 2, 0, 1.4),
                BoostRule::new(0, 1, 0, 1.2),
                BoostRule::new(0, 0, 3, 1.1),
            ],
            ceiling: 0.98,
        }
    }

    /// Nudity reports exactly one signal from whichever path ran.
    pub fn nudity() -> Self {
        Self {
            weights: vec![
                SignalWeight::new("body_parts", 1.0),
                SignalWeight::new("skin_backup", 1.0),
            ],
            tiers: TierBounds::default(),
            boosts: Vec::new(),
            ceiling: 1.0,
        }
    }

    pub fn weight_of(&self, method: &str) -> f32 {
        self.weights
            .iter()
            .find(|w| w.method == method)
            .map_or(0.0, |w| w.weight)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.ceiling) {
            return Err(format!("ceiling {} outside [0, 1]", self.ceiling));
        }
        if let Some(w) = self.weights.iter().find(|w| !(w.weight.is_finite() && w.weight >= 0.0)) {
            return Err(format!("weight for {} must be finite and non-negative", w.method));
        }
        if let Some(b) = self.boosts.iter().find(|b| !(b.multiplier.is_finite() && b.multiplier > 0.0)) {
            return Err(format!("boost multiplier {} must be positive", b.multiplier));
        }
        let t = &self.tiers;
        if !(t.weak <= t.moderate && t.moderate <= t.strong) {
            return Err("tier bounds must satisfy weak <= moderate <= strong".to_string());
        }
        Ok(())
    }
}

/// Intermediate fusion values for reports.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FusionBreakdown {
    pub weighted_sum: f32,
    pub tiers: TierCounts,
    pub multiplier: f32,
    pub confidence: f32,
}

/// Fuse signals into one confidence, keeping intermediate values.
pub fn fuse_detailed(signals: &[RawSignal], profile: &FusionProfile) -> FusionBreakdown {
    let weighted_sum: f32 = signals
        .iter()
        .map(|s| profile.weight_of(&s.method) * s.value())
        .sum();
    let tiers = TierCounts::count(signals, &profile.tiers);
    let multiplier = profile
        .boosts
        .iter()
        .find(|rule| rule.matches(&tiers))
        .map_or(1.0, |rule| rule.multiplier);
    let confidence = (weighted_sum * multiplier).clamp(0.0, profile.ceiling);
    FusionBreakdown {
        weighted_sum,
        tiers,
        multiplier,
        confidence,
    }
}

/// Fuse signals into one confidence in `[0, profile.ceiling]`.
pub fn fuse(signals: &[RawSignal], profile: &FusionProfile) -> f32 {
    fuse_detailed(signals, profile).confidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ExtractorError;
    use approx::assert_relative_eq;

    fn drug_signals(values: [f32; 4]) -> Vec<RawSignal> {
        ["pills", "powder", "plants", "paraphernalia"]
            .iter()
            .zip(values)
            .map(|(m, v)| RawSignal::score(*m, v))
            .collect()
    }

    #[test]
    fn ladder_picks_first_matching_rule() {
        let p = FusionProfile::drugs();
        let b = fuse_detailed(&drug_signals([0.7, 0.7, 0.0, 0.0]), &p);
        assert_eq!(b.multiplier, 2.0);
        let b = fuse_detailed(&drug_signals([0.7, 0.4, 0.0, 0.0]), &p);
        assert_eq!(b.multiplier, 1.8);
        let b = fuse_detailed(&drug_signals([0.7, 0.0, 0.0, 0.0]), &p);
        assert_eq!(b.multiplier, 1.6);
        let b = fuse_detailed(&drug_signals([0.4, 0.4, 0.0, 0.0]), &p);
        assert_eq!(b.multiplier, 1.4);
        let b = fuse_detailed(&drug_signals([0.4, 0.0, 0.0, 0.0]), &p);
        assert_eq!(b.multiplier, 1.2);
        let b = fuse_detailed(&drug_signals([0.2, 0.2, 0.2, 0.0]), &p);
        assert_eq!(b.multiplier, 1.1);
        let b = fuse_detailed(&drug_signals([0.2, 0.2, 0.0, 0.0]), &p);
        assert_eq!(b.multiplier, 1.0);
    }

    #[test]
    fn tier_edges_are_exclusive_below() {
        let counts = TierCounts::count(&drug_signals([0.6, 0.3, 0.1, 0.0]), &TierBounds::default());
        assert_eq!(
            counts,
            TierCounts {
                strong: 0,
                moderate: 1,
                weak: 1
            }
        );
    }

    #[test]
    fn ceiling_clamps() {
        let c = fuse(&drug_signals([1.0, 1.0, 1.0, 1.0]), &FusionProfile::drugs());
        assert_relative_eq!(c, 0.98);
    }

    #[test]
    fn weighted_sum_and_boost() {
        // 0.5·0.8 + 0.35·0.4 = 0.54, one strong + one moderate → ×1.8, capped
        let c = fuse(&drug_signals([0.8, 0.4, 0.0, 0.0]), &FusionProfile::drugs());
        assert_relative_eq!(c, 0.972, epsilon = 1e-5);
    }

    #[test]
    fn failed_signal_counts_as_zero() {
        let mut signals = drug_signals([0.4, 0.0, 0.0, 0.0]);
        signals[1] = RawSignal::failed("powder", ExtractorError::NonFinite);
        assert_relative_eq!(fuse(&signals, &FusionProfile::drugs()), 0.24, epsilon = 1e-6);
    }

    #[test]
    fn nudity_profile_passes_single_signal_through() {
        let signals = vec![RawSignal::score("skin_backup", 0.65)];
        assert_relative_eq!(fuse(&signals, &FusionProfile::nudity()), 0.65);
    }

    #[test]
    fn fusion_is_deterministic() {
        let s = drug_signals([0.31, 0.77, 0.12, 0.5]);
        let p = FusionProfile::drugs();
        assert_eq!(fuse(&s, &p).to_bits(), fuse(&s, &p).to_bits());
    }
}
