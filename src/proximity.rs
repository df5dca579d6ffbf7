//! Size-based proximity heuristic

use crate::config::AlertConfig;
use crate::utils::Detection;

/// Outcome of evaluating one detection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlertDecision {
    /// Box area in pixels
    pub area: i64,
    /// `area / area_divisor`, rounded down
    pub normalized_area: i64,
    pub should_alert: bool,
}

/// Decides whether a detection is "close" from its box area alone.
///
/// This is not a distance measurement. The divisor and threshold were
/// calibrated for one camera position and lens (3072 and 25 by default) and
/// have to be re-tuned per scene.
#[derive(Clone, Debug)]
pub struct AlertEvaluator {
    area_divisor: i64,
    area_threshold: i64,
}

impl AlertEvaluator {
    /// A zero divisor is treated as 1; configuration validation rejects it
    /// before it gets here.
    pub fn new(area_divisor: u32, area_threshold: u32) -> Self {
        Self {
            area_divisor: area_divisor.max(1) as i64,
            area_threshold: area_threshold as i64,
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(config.area_divisor, config.area_threshold)
    }

    pub fn evaluate(&self, detection: &Detection) -> AlertDecision {
        let area = detection.rect.area();
        let normalized_area = area / self.area_divisor;
        AlertDecision {
            area,
            normalized_area,
            should_alert: normalized_area > self.area_threshold,
        }
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(3072, 25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Rect;

    fn detection_with_area(width: i32, height: i32) -> Detection {
        Detection::new(0, 0.9, Rect::new(0, 0, width, height))
    }

    #[test]
    fn test_alert_boundary_is_strict() {
        let evaluator = AlertEvaluator::default();

        // 3072 * 26 = 79872 = 312 * 256
        let decision = evaluator.evaluate(&detection_with_area(312, 256));
        assert_eq!(decision.area, 3072 * 26);
        assert_eq!(decision.normalized_area, 26);
        assert!(decision.should_alert);

        // 3072 * 25 = 76800 = 300 * 256
        let decision = evaluator.evaluate(&detection_with_area(300, 256));
        assert_eq!(decision.normalized_area, 25);
        assert!(!decision.should_alert);
    }

    #[test]
    fn test_normalization_rounds_down() {
        // 3072 * 26 - 1 still normalizes to 25
        let decision = AlertEvaluator::default().evaluate(&detection_with_area(79871, 1));
        assert_eq!(decision.normalized_area, 25);
        assert!(!decision.should_alert);
    }

    #[test]
    fn test_calibration_is_configurable() {
        let evaluator = AlertEvaluator::new(100, 1);
        assert!(evaluator.evaluate(&detection_with_area(20, 10)).should_alert);
        assert!(!evaluator.evaluate(&detection_with_area(10, 10)).should_alert);
    }

    #[test]
    fn test_degenerate_box_never_alerts() {
        let decision = AlertEvaluator::default().evaluate(&detection_with_area(-500, 500));
        assert_eq!(decision.area, 0);
        assert!(!decision.should_alert);
    }
}
