use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::models::{NodeDescriptor, Row};

/// Error kinds the SQL adapter surfaces distinctly; preflight predicates and
/// the dispatcher both classify against these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlErrorKind {
    InsufficientPrivilege,
    RelationNotFound,
    ConnectionRefused,
    Timeout,
    SyntaxError,
    Other,
}

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct SqlError {
    pub kind: SqlErrorKind,
    pub message: String,
}

impl SqlError {
    fn new(kind: SqlErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Markers the database driver embeds in error text for permission and
/// relation failures, mirroring the original preflight checks.
const MARKER_INSUFFICIENT_PRIVILEGE: &str = "YAS-02213";
const MARKER_RELATION_NOT_FOUND: &str = "YAS-02012";

fn classify_stderr(stderr: &str) -> SqlErrorKind {
    if stderr.contains(MARKER_INSUFFICIENT_PRIVILEGE) {
        SqlErrorKind::InsufficientPrivilege
    } else if stderr.contains(MARKER_RELATION_NOT_FOUND) {
        SqlErrorKind::RelationNotFound
    } else if stderr.to_lowercase().contains("connection refused") {
        SqlErrorKind::ConnectionRefused
    } else if stderr.to_lowercase().contains("syntax error") {
        SqlErrorKind::SyntaxError
    } else {
        SqlErrorKind::Other
    }
}

/// Opaque capability that executes SQL against a node via a subprocess
/// helper binary and returns rows as ordered column->value maps. The helper
/// is spawned once per call; connections are never shared across
/// collectors, which keeps cancellation independent.
#[derive(Debug, Clone)]
pub struct SqlAdapter {
    helper_path: String,
}

impl SqlAdapter {
    pub fn new(helper_path: impl Into<String>) -> Self {
        Self { helper_path: helper_path.into() }
    }

    pub async fn query(
        &self,
        node: &NodeDescriptor,
        sql: &str,
        timeout: Duration,
    ) -> Result<Vec<Row>, SqlError> {
        let stdout = self.run(node, "query", sql, timeout).await?;
        serde_json::from_slice::<Vec<Row>>(&stdout)
            .map_err(|e| SqlError::new(SqlErrorKind::Other, format!("malformed adapter output: {e}")))
    }

    pub async fn exec(
        &self,
        node: &NodeDescriptor,
        sql: &str,
        timeout: Duration,
    ) -> Result<(), SqlError> {
        self.run(node, "exec", sql, timeout).await?;
        Ok(())
    }

    async fn run(
        &self,
        node: &NodeDescriptor,
        mode: &str,
        sql: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, SqlError> {
        let mut command = Command::new(&self.helper_path);
        command
            .arg("-t")
            .arg(mode)
            .arg("-s")
            .arg(sql)
            .arg("-a")
            .arg(&node.listen_addr)
            .arg("--timeout")
            .arg(timeout.as_secs().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !node.system_auth {
            if let Some(user) = &node.user {
                command.arg("-u").arg(user);
            }
            if let Some(password) = &node.password {
                command.arg("-p").arg(password);
            }
        }
        if let Some(data_dir) = &node.data_dir {
            command.arg("-d").arg(data_dir);
        }

        debug!(node = %node.node_id, mode, "sql adapter invocation");

        let child = command
            .spawn()
            .map_err(|e| SqlError::new(SqlErrorKind::Other, format!("spawn failed: {e}")))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(SqlError::new(SqlErrorKind::Other, format!("adapter IO error: {e}"))),
            Err(_) => return Err(SqlError::new(SqlErrorKind::Timeout, "query exceeded timeout")),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let kind = classify_stderr(&stderr);
            warn!(node = %node.node_id, ?kind, "sql adapter returned non-zero exit");
            return Err(SqlError::new(kind, stderr));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_insufficient_privilege_marker() {
        assert_eq!(classify_stderr("ORA-style YAS-02213: no privilege"), SqlErrorKind::InsufficientPrivilege);
    }

    #[test]
    fn classifies_relation_not_found_marker() {
        assert_eq!(classify_stderr("YAS-02012: relation missing"), SqlErrorKind::RelationNotFound);
    }

    #[test]
    fn unclassified_errors_fall_back_to_other() {
        assert_eq!(classify_stderr("unexpected condition"), SqlErrorKind::Other);
    }
}
