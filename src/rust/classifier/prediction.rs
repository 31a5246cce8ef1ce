use serde::{Deserialize, Serialize};

use super::error::ClassifierError;

/// Raw per-text output of a toxicity model for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Probability distribution over `[negative, positive]`
    pub probabilities: Vec<f32>,
    /// Match decision made by the model itself, if it made one
    pub matched: Option<bool>,
}

impl PredictionResult {
    pub fn new(probabilities: Vec<f32>, matched: Option<bool>) -> Self {
        Self { probabilities, matched }
    }
}

/// Raw model output for one category: a label plus one result per input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPrediction {
    pub label: String,
    pub results: Vec<PredictionResult>,
}

impl CategoryPrediction {
    pub fn new(label: impl Into<String>, results: Vec<PredictionResult>) -> Self {
        Self { label: label.into(), results }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Negative,
    Positive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProbability {
    pub outcome: Outcome,
    pub probability: f32,
}

/// Display-ready outcome for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Category identifier as returned by the model
    pub label: String,
    /// Whether the positive probability crossed the decision threshold
    pub matched: bool,
    /// One entry per outcome, negative first
    pub probabilities: Vec<OutcomeProbability>,
}

impl Classification {
    /// Reshapes the first result of a raw category prediction.
    ///
    /// The result must carry exactly two finite probabilities in `[0, 1]`.
    /// When the model made no match decision, one is derived as
    /// `positive > threshold`.
    ///
    /// # Errors
    /// - `MalformedResponse` if there is no result or its probabilities have the wrong shape
    pub fn from_prediction(
        prediction: &CategoryPrediction,
        threshold: f32,
    ) -> Result<Self, ClassifierError> {
        let result = prediction.results.first().ok_or_else(|| {
            ClassifierError::MalformedResponse(format!(
                "Category '{}' has no results",
                prediction.label
            ))
        })?;

        let (negative, positive) = match result.probabilities.as_slice() {
            &[negative, positive] => (negative, positive),
            other => {
                return Err(ClassifierError::MalformedResponse(format!(
                    "Category '{}' has {} probabilities, expected 2",
                    prediction.label,
                    other.len()
                )))
            }
        };

        for p in [negative, positive] {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(ClassifierError::MalformedResponse(format!(
                    "Category '{}' has out-of-range probability {}",
                    prediction.label, p
                )));
            }
        }

        Ok(Self {
            label: prediction.label.clone(),
            matched: result.matched.unwrap_or_else(|| exceeds_threshold(positive, threshold)),
            probabilities: vec![
                OutcomeProbability { outcome: Outcome::Negative, probability: negative },
                OutcomeProbability { outcome: Outcome::Positive, probability: positive },
            ],
        })
    }

    /// Probability of the given outcome, or 0 when absent.
    pub fn probability(&self, outcome: Outcome) -> f32 {
        self.probabilities
            .iter()
            .find(|p| p.outcome == outcome)
            .map(|p| p.probability)
            .unwrap_or(0.0)
    }

    pub fn positive_probability(&self) -> f32 {
        self.probability(Outcome::Positive)
    }
}

/// Strict comparison: a probability equal to the threshold is not a match.
pub fn exceeds_threshold(probability: f32, threshold: f32) -> bool {
    probability > threshold
}

/// Reshapes a whole model response, keeping the model's category order.
pub fn normalize_predictions(
    predictions: &[CategoryPrediction],
    threshold: f32,
) -> Result<Vec<Classification>, ClassifierError> {
    predictions
        .iter()
        .map(|p| Classification::from_prediction(p, threshold))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(label: &str, probabilities: Vec<f32>, matched: Option<bool>) -> CategoryPrediction {
        CategoryPrediction::new(label, vec![PredictionResult::new(probabilities, matched)])
    }

    #[test]
    fn test_derived_match_is_strict() {
        let at = Classification::from_prediction(&category("insult", vec![0.15, 0.85], None), 0.85).unwrap();
        assert!(!at.matched);

        let above = Classification::from_prediction(&category("insult", vec![0.1, 0.9], None), 0.85).unwrap();
        assert!(above.matched);
    }

    #[test]
    fn test_model_match_wins() {
        let c = Classification::from_prediction(&category("threat", vec![0.5, 0.5], Some(true)), 0.85).unwrap();
        assert!(c.matched);

        let c = Classification::from_prediction(&category("threat", vec![0.01, 0.99], Some(false)), 0.85).unwrap();
        assert!(!c.matched);
    }

    #[test]
    fn test_threshold_sweep() {
        for t in [0.0f32, 0.25, 0.5, 0.85, 1.0] {
            for p in [0.0f32, 0.25, 0.5, 0.85, 0.9, 1.0] {
                let c = Classification::from_prediction(&category("x", vec![1.0 - p, p], None), t).unwrap();
                assert_eq!(c.matched, p > t, "p={} t={}", p, t);
            }
        }
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        for probs in [vec![], vec![0.3], vec![0.2, 0.3, 0.5]] {
            let result = Classification::from_prediction(&category("toxicity", probs, None), 0.85);
            assert!(matches!(result, Err(ClassifierError::MalformedResponse(_))));
        }
    }

    #[test]
    fn test_missing_results_is_malformed() {
        let result = Classification::from_prediction(&CategoryPrediction::new("toxicity", vec![]), 0.85);
        assert!(matches!(result, Err(ClassifierError::MalformedResponse(_))));
    }

    #[test]
    fn test_out_of_range_is_malformed() {
        for probs in [vec![f32::NAN, 0.5], vec![-0.1, 1.1], vec![0.0, f32::INFINITY]] {
            let result = Classification::from_prediction(&category("obscene", probs, None), 0.85);
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_normalize_keeps_order() {
        let raw = vec![
            category("toxicity", vec![0.99, 0.01], None),
            category("insult", vec![0.98, 0.02], None),
            category("spam", vec![0.1, 0.9], None),
        ];
        let normalized = normalize_predictions(&raw, 0.85).unwrap();
        let labels: Vec<_> = normalized.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["toxicity", "insult", "spam"]);
        assert!((normalized[0].positive_probability() - 0.01).abs() < 1e-6);
        assert!(normalized[2].matched);
    }
}
