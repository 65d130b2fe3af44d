use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::result::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBand {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
    Unknown,
}

impl HealthBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthBand::Excellent => "excellent",
            HealthBand::Good => "good",
            HealthBand::Fair => "fair",
            HealthBand::Poor => "poor",
            HealthBand::Critical => "critical",
            HealthBand::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ScoreInterval {
    pub min: f64,
    pub max: f64,
}

impl ScoreInterval {
    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }
}

/// Declarative scoring configuration loaded once from the evaluation-model
/// configuration file. Immutable after load.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvaluationModel {
    pub total_score: f64,
    #[serde(default)]
    pub metrics_weight: HashMap<String, f64>,
    #[serde(default, rename = "module_weight")]
    pub module_weight: HashMap<String, f64>,
    pub default_metric_weight: f64,
    #[serde(default)]
    pub alerts_weight: HashMap<Severity, f64>,
    pub max_alert_total_weight: f64,
    #[serde(default)]
    pub ignore_same_alert: bool,
    #[serde(default)]
    pub ignore_failed_metric: bool,
    pub health_model: HashMap<HealthBand, ScoreInterval>,
    /// Localizable display alias per health band, distinct from its key.
    #[serde(default)]
    pub health_status_alias: HashMap<HealthBand, HashMap<String, String>>,
}

impl EvaluationModel {
    pub fn alert_weight(&self, severity: Severity) -> f64 {
        self.alerts_weight.get(&severity).copied().unwrap_or(0.0)
    }

    /// First band (in declaration order of `HealthBand`'s canonical
    /// ordering: excellent, good, fair, poor, critical) whose inclusive
    /// interval contains `score`; `Unknown` if none matches.
    pub fn health_band_for(&self, score: f64) -> HealthBand {
        const ORDER: [HealthBand; 5] = [
            HealthBand::Excellent,
            HealthBand::Good,
            HealthBand::Fair,
            HealthBand::Poor,
            HealthBand::Critical,
        ];
        for band in ORDER {
            if let Some(interval) = self.health_model.get(&band) {
                if interval.contains(score) {
                    return band;
                }
            }
        }
        HealthBand::Unknown
    }

    pub fn health_status_alias_for(&self, band: HealthBand, lang: &str) -> String {
        self.health_status_alias
            .get(&band)
            .and_then(|m| m.get(lang).or_else(|| m.get("zh-CN")))
            .cloned()
            .unwrap_or_else(|| band.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> EvaluationModel {
        let mut health_model = HashMap::new();
        health_model.insert(HealthBand::Excellent, ScoreInterval { min: 90.0, max: 100.0 });
        health_model.insert(HealthBand::Good, ScoreInterval { min: 80.0, max: 89.99 });
        EvaluationModel {
            total_score: 100.0,
            metrics_weight: HashMap::new(),
            module_weight: HashMap::new(),
            default_metric_weight: 1.0,
            alerts_weight: HashMap::new(),
            max_alert_total_weight: 10.0,
            ignore_same_alert: true,
            ignore_failed_metric: false,
            health_model,
            health_status_alias: HashMap::new(),
        }
    }

    #[test]
    fn empty_result_set_scores_total_score_and_band_excellent() {
        let model = model();
        assert_eq!(model.health_band_for(model.total_score), HealthBand::Excellent);
    }

    #[test]
    fn unmatched_score_falls_back_to_unknown() {
        assert_eq!(model().health_band_for(-5.0), HealthBand::Unknown);
    }
}
