//! Running external dependency tools as subprocesses.

use std::ffi::OsString;
use std::path::Path;

use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::ToolError;

/// Captured output of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, wait for it, and fail unless it exits zero.
///
/// stdout must be valid UTF-8; stderr is decoded lossily and attached to the
/// error on failure so the operator sees the tool's own message.
pub async fn run_tool(
    program: &str,
    args: &[OsString],
    working_dir: Option<&Path>,
) -> Result<ToolOutput, ToolError> {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let rendered_args: Vec<_> = args.iter().map(|a| a.to_string_lossy()).collect();
    info!(program, args = ?rendered_args, "Running external tool");

    let output = command.output().await.map_err(|e| {
        error!(program, error = ?e, "Failed to launch external tool");
        ToolError::Spawn {
            program: program.to_string(),
            source: e,
        }
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        error!(program, status = %output.status, stderr = %stderr, "External tool exited with failure");
        return Err(ToolError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr,
        });
    }

    let stdout = String::from_utf8(output.stdout).map_err(|_| ToolError::InvalidOutput {
        program: program.to_string(),
    })?;
    debug!(program, stdout_len = stdout.len(), "External tool succeeded");

    Ok(ToolOutput { stdout, stderr })
}
