/// Logistic function mapping a logit to a probability.
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Decision made the same way the browser toxicity library does it: a match
/// when the positive side clears the threshold, a non-match when the negative
/// side does, and no decision otherwise.
pub(crate) fn library_match(negative: f32, positive: f32, threshold: f32) -> Option<bool> {
    if positive > threshold {
        Some(true)
    } else if negative > threshold {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.9999);
        assert!(sigmoid(-10.0) < 0.0001);
    }

    #[test]
    fn test_library_match() {
        assert_eq!(library_match(0.05, 0.95, 0.85), Some(true));
        assert_eq!(library_match(0.95, 0.05, 0.85), Some(false));
        assert_eq!(library_match(0.4, 0.6, 0.85), None);
        assert_eq!(library_match(0.15, 0.85, 0.85), None);
    }
}
