use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::models::{MetricDefinition, Payload};
use crate::utils::error::{EngineError, EngineResult};

/// Runs the metric's command under a shell, capturing stdout as the payload.
/// A non-zero exit becomes a `MetricFailed` error carrying stderr.
pub async fn collect(metric: &MetricDefinition, node_id: &str, timeout: Duration) -> EngineResult<Payload> {
    let command = metric
        .command
        .as_deref()
        .ok_or_else(|| EngineError::metric_failed(&metric.name, node_id, "metric declares no command"))?;

    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| EngineError::metric_failed(&metric.name, node_id, format!("spawn failed: {e}")))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(EngineError::metric_failed(&metric.name, node_id, format!("shell IO error: {e}"))),
        Err(_) => return Err(EngineError::metric_failed(&metric.name, node_id, "command exceeded timeout")),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(EngineError::metric_failed(&metric.name, node_id, stderr));
    }

    Ok(Payload::Text(String::from_utf8_lossy(&output.stdout).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_metric(command: &str) -> MetricDefinition {
        MetricDefinition {
            name: "m".into(),
            name_alias: String::new(),
            name_alias_en: String::new(),
            module_name: "custom".into(),
            metric_type: crate::models::MetricType::Shell,
            hidden: false,
            default: true,
            enabled: true,
            column_order: vec![],
            hidden_columns: vec![],
            byte_columns: vec![],
            percent_columns: vec![],
            number_columns: vec![],
            labels: vec![],
            alert_rules: Default::default(),
            sql: None,
            command: Some(command.to_string()),
        }
    }

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let metric = echo_metric("echo hello");
        let payload = collect(&metric, "n0", Duration::from_secs(5)).await.unwrap();
        match payload {
            Payload::Text(text) => assert_eq!(text.trim(), "hello"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_zero_exit_becomes_an_error() {
        let metric = echo_metric("exit 1");
        let result = collect(&metric, "n0", Duration::from_secs(5)).await;
        assert!(result.is_err());
    }
}
