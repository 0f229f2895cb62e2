//! Hexagonal fuzzy gain scheduling
//!
//! A [`HexagonalFuzzyNumber`] is a six-vertex fuzzy set: membership climbs
//! to one half at `a2`, reaches full membership on the plateau `[a3, a4]`
//! and falls back through one half at `a5` to zero at `a6`.
//!
//! The inference engine turns an error signal into a gain multiplier. For
//! every configured set it takes the share of the set's area lying at or
//! below the input (the cumulative membership). Rule consequents are spread
//! evenly between `gain_min` and `gain_max`, and the equal-weight aggregate
//! of the cumulative memberships places the output between them. Every
//! cumulative membership is non-decreasing, so the multiplier never drops as
//! the error grows and never leaves `[gain_min, gain_max]`.

use serde::{Deserialize, Serialize};
use simcore::error::{require_non_negative, require_positive};
use simcore::{SimError, SimResult};

/// Six ordered vertices `a1 <= a2 <= ... <= a6`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HexagonalFuzzyNumber {
    vertices: [f64; 6],
}

impl HexagonalFuzzyNumber {
    /// Validates and builds a fuzzy number.
    pub fn new(vertices: [f64; 6]) -> SimResult<Self> {
        Self::checked(vertices, 0)
    }

    /// `index` only labels the error with the position of the set.
    fn checked(vertices: [f64; 6], index: usize) -> SimResult<Self> {
        let finite = vertices.iter().all(|v| v.is_finite());
        let ordered = vertices.windows(2).all(|pair| pair[0] <= pair[1]);
        if finite && ordered {
            Ok(Self { vertices })
        } else {
            Err(SimError::InvalidFuzzySet { index, vertices })
        }
    }

    pub fn vertices(&self) -> [f64; 6] {
        self.vertices
    }

    /// Membership grade of `x` in [0, 1].
    pub fn membership(&self, x: f64) -> f64 {
        let [a1, a2, a3, a4, a5, a6] = self.vertices;
        if x < a1 || x > a6 {
            0.0
        } else if x < a2 {
            0.5 * (x - a1) / (a2 - a1)
        } else if x < a3 {
            0.5 + 0.5 * (x - a2) / (a3 - a2)
        } else if x <= a4 {
            1.0
        } else if x <= a5 {
            1.0 - 0.5 * (x - a4) / (a5 - a4)
        } else {
            0.5 * (a6 - x) / (a6 - a5)
        }
    }

    /// Piecewise-linear segments as (start, end, grade at start, grade at end).
    fn segments(&self) -> [(f64, f64, f64, f64); 5] {
        let [a1, a2, a3, a4, a5, a6] = self.vertices;
        [
            (a1, a2, 0.0, 0.5),
            (a2, a3, 0.5, 1.0),
            (a3, a4, 1.0, 1.0),
            (a4, a5, 1.0, 0.5),
            (a5, a6, 0.5, 0.0),
        ]
    }

    /// Area under the membership function.
    pub fn area(&self) -> f64 {
        self.segments()
            .iter()
            .map(|&(l, r, m0, m1)| 0.5 * (r - l) * (m0 + m1))
            .sum()
    }

    /// Fraction of the set's area lying at or below `x`, in [0, 1].
    ///
    /// A set collapsed to a single point steps from 0 to 1 at that point.
    pub fn cumulative_membership(&self, x: f64) -> f64 {
        let [a1, .., a6] = self.vertices;
        if x < a1 {
            return 0.0;
        }
        if x >= a6 {
            return 1.0;
        }
        let total = self.area();
        if total <= 0.0 {
            return 1.0;
        }

        let mut covered = 0.0;
        for (l, r, m0, m1) in self.segments() {
            if x >= r {
                covered += 0.5 * (r - l) * (m0 + m1);
            } else {
                if x > l {
                    let grade = m0 + (m1 - m0) * (x - l) / (r - l);
                    covered += 0.5 * (x - l) * (m0 + grade);
                }
                break;
            }
        }
        (covered / total).clamp(0.0, 1.0)
    }
}

/// Settings for the fuzzy gain adaptation law.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyAdaptationConfig {
    /// Fuzzy sets over the error signal, as raw vertices.
    pub sets: Vec<[f64; 6]>,
    /// Multiplier applied for a vanishing error
    pub gain_min: f64,
    /// Multiplier applied once the error is past every set
    pub gain_max: f64,
    /// Weight of the error rate in the input signal (s)
    pub rate_weight: f64,
}

impl Default for FuzzyAdaptationConfig {
    fn default() -> Self {
        Self {
            sets: vec![[0.0, 0.05, 0.10, 0.15, 0.20, 0.25]],
            gain_min: 0.25,
            gain_max: 1.0,
            rate_weight: 0.02,
        }
    }
}

impl FuzzyAdaptationConfig {
    pub fn with_sets(mut self, sets: Vec<[f64; 6]>) -> Self {
        self.sets = sets;
        self
    }

    /// Set the multiplier bounds
    pub fn with_gain_range(mut self, gain_min: f64, gain_max: f64) -> Self {
        self.gain_min = gain_min;
        self.gain_max = gain_max;
        self
    }

    pub fn with_rate_weight(mut self, rate_weight: f64) -> Self {
        self.rate_weight = rate_weight;
        self
    }

    /// Scalar input signal for an error magnitude and its rate magnitude.
    pub fn input_signal(&self, error_norm: f64, rate_norm: f64) -> f64 {
        error_norm.abs() + self.rate_weight * rate_norm.abs()
    }

    pub fn validate(&self) -> SimResult<()> {
        HexagonalFuzzyInferenceEngine::new(self).map(|_| ())
    }
}

/// Maps an error signal to a gain multiplier in `[gain_min, gain_max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HexagonalFuzzyInferenceEngine {
    sets: Vec<HexagonalFuzzyNumber>,
    gain_min: f64,
    gain_max: f64,
}

impl HexagonalFuzzyInferenceEngine {
    pub fn new(config: &FuzzyAdaptationConfig) -> SimResult<Self> {
        if config.sets.is_empty() {
            return Err(SimError::configuration(
                "controller.adaptation.sets",
                "at least one fuzzy set is required",
            ));
        }
        require_positive("controller.adaptation.gain_max", config.gain_max)?;
        require_non_negative("controller.adaptation.gain_min", config.gain_min)?;
        require_non_negative("controller.adaptation.rate_weight", config.rate_weight)?;
        if config.gain_min > config.gain_max {
            return Err(SimError::configuration(
                "controller.adaptation.gain_min",
                format!(
                    "gain_min {} exceeds gain_max {}",
                    config.gain_min, config.gain_max
                ),
            ));
        }

        let sets = config
            .sets
            .iter()
            .enumerate()
            .map(|(i, v)| HexagonalFuzzyNumber::checked(*v, i))
            .collect::<SimResult<Vec<_>>>()?;

        Ok(Self {
            sets,
            gain_min: config.gain_min,
            gain_max: config.gain_max,
        })
    }

    /// Gain multiplier for `input`. Only the magnitude of the input matters.
    pub fn adapt(&self, input: f64) -> SimResult<f64> {
        if !input.is_finite() {
            return Err(SimError::NumericalInstability {
                step: 0,
                quantity: "fuzzy input",
                value: input,
            });
        }
        let x = input.abs();
        let mean = self
            .sets
            .iter()
            .map(|set| set.cumulative_membership(x))
            .sum::<f64>()
            / self.sets.len() as f64;

        let gain = self.gain_min + (self.gain_max - self.gain_min) * mean;
        Ok(gain.clamp(self.gain_min, self.gain_max))
    }

    /// Membership grade of `input` in every configured set.
    pub fn memberships(&self, input: f64) -> Vec<f64> {
        self.sets.iter().map(|set| set.membership(input.abs())).collect()
    }

    pub fn gain_range(&self) -> (f64, f64) {
        (self.gain_min, self.gain_max)
    }
}
