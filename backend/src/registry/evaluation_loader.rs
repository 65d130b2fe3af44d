use std::path::Path;

use crate::models::EvaluationModel;
use crate::utils::error::{EngineError, EngineResult};

/// Loads the evaluation-model configuration file (weights, alert weights,
/// health bands) used by the health scorer.
pub fn load_evaluation_model(path: impl AsRef<Path>) -> EngineResult<EvaluationModel> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        EngineError::config_invalid(format!("cannot read evaluation model {}: {e}", path.display()))
    })?;
    toml::from_str(&text).map_err(|e| {
        EngineError::config_invalid(format!("cannot parse evaluation model {}: {e}", path.display()))
    })
}
