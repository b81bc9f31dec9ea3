use crate::core::types::RecordContent;

/// Scorer trait
pub trait Scorer: Send + Sync {
    /// Must be pure: the same content always yields the same score in [0, 1].
    fn score(&self, content: &RecordContent) -> f64;

    fn name(&self) -> &str;
}

// Weights and caps of the content quality formula.
pub const LEVEL_WEIGHT: f64 = 0.5;
pub const DESCRIPTION_CAP: f64 = 0.2;
pub const DESCRIPTION_UNIT: f64 = 1000.0;   // chars per 1.0 of description credit
pub const EFFECT_CAP: f64 = 0.2;
pub const EFFECT_WEIGHT: f64 = 0.05;        // credit per effect entry
pub const ENVIRONMENT_CAP: f64 = 0.1;
pub const ENVIRONMENT_UNIT: f64 = 500.0;

/// Content quality assessor.
///
/// The consciousness level carries half of the score; the other half rewards
/// descriptive substance, capped per dimension so no single field saturates it.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityAssessor;

impl QualityAssessor {
    pub fn new() -> Self {
        QualityAssessor
    }

    pub fn breakdown(&self, content: &RecordContent) -> ScoreBreakdown {
        let level = content
            .consciousness_level
            .filter(|l| l.is_finite())
            .map(|l| l.clamp(0.0, 1.0))
            .unwrap_or(0.0);

        let description = content
            .description
            .as_deref()
            .map(|d| d.chars().count() as f64 / DESCRIPTION_UNIT)
            .unwrap_or(0.0)
            .min(DESCRIPTION_CAP);

        let effects = (content.effects.len() as f64 * EFFECT_WEIGHT).min(EFFECT_CAP);

        let environment = content
            .environment
            .as_deref()
            .map(|e| e.chars().count() as f64 / ENVIRONMENT_UNIT)
            .unwrap_or(0.0)
            .min(ENVIRONMENT_CAP);

        ScoreBreakdown {
            level: LEVEL_WEIGHT * level,
            description,
            effects,
            environment,
        }
    }
}

impl Scorer for QualityAssessor {
    fn score(&self, content: &RecordContent) -> f64 {
        self.breakdown(content).total()
    }

    fn name(&self) -> &str {
        "content_quality"
    }
}

/// Per-dimension contributions, useful for explaining a score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub level: f64,
    pub description: f64,
    pub effects: f64,
    pub environment: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        (self.level + self.description + self.effects + self.environment).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_reference_record_scores_082() {
        let content = RecordContent::new()
            .with_level(0.9)
            .with_description("d".repeat(120))
            .with_effects(vec![json!("glow"), json!("hum"), json!("drift")])
            .with_environment("e".repeat(200));

        let score = QualityAssessor::new().score(&content);
        assert!(approx(score, 0.82), "got {}", score);
    }

    #[test]
    fn test_empty_content_scores_zero() {
        assert_eq!(QualityAssessor::new().score(&RecordContent::default()), 0.0);
    }

    #[test]
    fn test_caps_hold_per_dimension() {
        let content = RecordContent::new()
            .with_description("x".repeat(5000))
            .with_effects((0..40).map(|i| json!(i)).collect())
            .with_environment("y".repeat(5000));

        let parts = QualityAssessor::new().breakdown(&content);
        assert!(approx(parts.description, DESCRIPTION_CAP));
        assert!(approx(parts.effects, EFFECT_CAP));
        assert!(approx(parts.environment, ENVIRONMENT_CAP));
        assert!(approx(parts.total(), 0.5));
    }

    #[test]
    fn test_level_is_clamped_and_sanitized() {
        let scorer = QualityAssessor::new();
        assert!(approx(scorer.score(&RecordContent::new().with_level(7.0)), 0.5));
        assert_eq!(scorer.score(&RecordContent::new().with_level(-3.0)), 0.0);
        assert_eq!(scorer.score(&RecordContent::new().with_level(f64::NAN)), 0.0);
        assert_eq!(scorer.score(&RecordContent::new().with_level(f64::INFINITY)), 0.0);
    }

    #[test]
    fn test_lengths_count_chars_not_bytes() {
        // 100 three-byte chars
        let content = RecordContent::new().with_description("\u{2603}".repeat(100));
        assert!(approx(QualityAssessor::new().score(&content), 0.1));
    }

    #[test]
    fn test_score_is_bounded_and_deterministic() {
        let scorer = QualityAssessor::new();
        for i in 0..200u32 {
            let content = RecordContent::new()
                .with_level(i as f64 / 150.0)
                .with_description("a".repeat((i * 7) as usize))
                .with_effects((0..(i % 9)).map(|n| json!(n)).collect())
                .with_environment("b".repeat((i * 3) as usize));

            let first = scorer.score(&content);
            assert!((0.0..=1.0).contains(&first));
            assert_eq!(first, scorer.score(&content));
        }
    }
}
