//! Data-driven confidence ladders.
//!
//! Every extractor turns its measurement (a count or a ratio) into a score
//! through a [`StepTable`]: rows are tried from the highest threshold down and
//! the first row the measurement passes yields `min(cap, base + slope·x)`.

/// How a measurement is compared against a row threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// `x >= threshold` (used for counts).
    AtLeast,
    /// `x > threshold` (used for ratios).
    Above,
}

impl Bound {
    #[inline]
    fn passes(self, x: f32, threshold: f32) -> bool {
        match self {
            Self::AtLeast => x >= threshold,
            Self::Above => x > threshold,
        }
    }
}

/// One ladder row: `min(cap, base + slope·x)` once `x` passes `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Step {
    pub threshold: f32,
    pub base: f32,
    pub slope: f32,
    pub cap: f32,
}

impl Step {
    pub const fn new(threshold: f32, base: f32, slope: f32, cap: f32) -> Self {
        Self {
            threshold,
            base,
            slope,
            cap,
        }
    }

    /// A row that yields the constant `value`.
    pub const fn flat(threshold: f32, value: f32) -> Self {
        Self::new(threshold, value, 0.0, value)
    }

    /// A row that yields `min(cap, slope·x)`.
    pub const fn linear(threshold: f32, slope: f32, cap: f32) -> Self {
        Self::new(threshold, 0.0, slope, cap)
    }
}

/// Ordered ladder with a fall-through value.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StepTable {
    pub bound: Bound,
    /// Rows sorted by descending threshold.
    pub steps: Vec<Step>,
    /// Score when no row matches.
    pub otherwise: f32,
}

impl StepTable {
    pub fn new(bound: Bound, steps: Vec<Step>, otherwise: f32) -> Self {
        Self {
            bound,
            steps,
            otherwise,
        }
    }

    /// Score for measurement `x`.
    pub fn lookup(&self, x: f32) -> f32 {
        self.steps
            .iter()
            .find(|s| self.bound.passes(x, s.threshold))
            .map(|s| (s.base + s.slope * x).min(s.cap))
            .unwrap_or(self.otherwise)
    }

    /// Score for an integer count.
    pub fn lookup_count(&self, n: usize) -> f32 {
        self.lookup(n as f32)
    }

    /// Check row order and value ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.otherwise) {
            return Err(format!("fall-through score {} outside [0, 1]", self.otherwise));
        }
        for pair in self.steps.windows(2) {
            if pair[0].threshold < pair[1].threshold {
                return Err(format!(
                    "thresholds must be descending ({} before {})",
                    pair[0].threshold, pair[1].threshold
                ));
            }
        }
        for s in &self.steps {
            let finite = [s.threshold, s.base, s.slope, s.cap]
                .iter()
                .all(|v| v.is_finite());
            if !finite {
                return Err("non-finite step parameter".to_string());
            }
            if !(0.0..=1.0).contains(&s.cap) {
                return Err(format!("cap {} outside [0, 1]", s.cap));
            }
        }
        Ok(())
    }
}
