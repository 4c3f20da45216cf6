//! Per-category thresholds and the aggregate verdict rules.

use crate::Category;

/// Flagging thresholds; a category is flagged when its confidence is strictly
/// greater than its threshold.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub nudity: f32,
    pub drugs: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            nudity: 0.3,
            drugs: 0.5,
        }
    }
}

impl Thresholds {
    pub fn for_category(&self, category: Category) -> f32 {
        match category {
            Category::Nudity => self.nudity,
            Category::Drugs => self.drugs,
        }
    }

    pub fn is_flagged(&self, category: Category, confidence: f32) -> bool {
        confidence > self.for_category(category)
    }

    /// Thresholds must lie in `[0, 1)` so a full-confidence result is
    /// always flagged.
    pub fn validate_category(&self, category: Category) -> Result<(), String> {
        let t = self.for_category(category);
        if !(0.0..1.0).contains(&t) {
            return Err(format!("{category} threshold {t} outside [0, 1)"));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        Category::ALL
            .iter()
            .try_for_each(|&c| self.validate_category(c))
    }
}

/// Mean of the confidences (0 for an empty slice).
pub fn overall_confidence(confidences: &[f32]) -> f32 {
    if confidences.is_empty() {
        return 0.0;
    }
    confidences.iter().sum::<f32>() / confidences.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_not_flagged() {
        let t = Thresholds::default();
        assert!(!t.is_flagged(Category::Drugs, 0.5));
        assert!(t.is_flagged(Category::Drugs, 0.5 + f32::EPSILON));
        assert!(!t.is_flagged(Category::Nudity, 0.3));
        assert!(t.is_flagged(Category::Nudity, 0.31));
    }

    #[test]
    fn overall_is_mean() {
        approx::assert_relative_eq!(overall_confidence(&[0.2, 0.4]), 0.3);
        assert_eq!(overall_confidence(&[]), 0.0);
    }

    #[test]
    fn thresholds_must_be_unit_interval() {
        let t = Thresholds {
            nudity: 1.0,
            drugs: 0.5,
        };
        assert!(t.validate().is_err());
        assert!(t.validate_category(Category::Drugs).is_ok());
    }
}
