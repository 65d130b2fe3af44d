use thiserror::Error;

/// Engine-wide error taxonomy.
///
/// Each variant maps onto one propagation rule from the error-handling
/// design: `ConfigInvalid` aborts startup; `NodeUnreachable` and
/// `MetricFailed` are recorded as failed result items and the run
/// continues; `AlertExpressionError` only suppresses the one rule;
/// `Cancelled` propagates to every in-flight collector.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("node {node_id} unreachable: {reason}")]
    NodeUnreachable { node_id: String, reason: String },

    #[error("metric {metric} skipped: {reason}")]
    MetricSkipped { metric: String, reason: String },

    #[error("metric {metric} failed on {node}: {message}")]
    MetricFailed { metric: String, node: String, message: String },

    #[error("alert expression error in rule for {metric}: {message}")]
    AlertExpressionError { metric: String, message: String },

    #[error("report render failed: {0}")]
    ReportRenderFailed(String),

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid(message.into())
    }

    pub fn node_unreachable(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NodeUnreachable { node_id: node_id.into(), reason: reason.into() }
    }

    pub fn metric_skipped(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MetricSkipped { metric: metric.into(), reason: reason.into() }
    }

    pub fn metric_failed(
        metric: impl Into<String>,
        node: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MetricFailed { metric: metric.into(), node: node.into(), message: message.into() }
    }

    pub fn alert_expression_error(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AlertExpressionError { metric: metric.into(), message: message.into() }
    }

    pub fn report_render_failed(message: impl Into<String>) -> Self {
        Self::ReportRenderFailed(message.into())
    }

    /// Stable numeric classification, mirroring the teacher's
    /// backward-compatible `error_code()` convention.
    pub fn error_code(&self) -> i32 {
        match self {
            Self::ConfigInvalid(_) => 1001,
            Self::NodeUnreachable { .. } => 2001,
            Self::MetricSkipped { .. } => 2002,
            Self::MetricFailed { .. } => 2003,
            Self::AlertExpressionError { .. } => 3001,
            Self::ReportRenderFailed(_) => 4001,
            Self::Cancelled => 5001,
            Self::Io(_) => 5002,
            Self::Other(_) => 5003,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable_per_variant() {
        assert_eq!(EngineError::config_invalid("x").error_code(), 1001);
        assert_eq!(EngineError::Cancelled.error_code(), 5001);
    }
}
