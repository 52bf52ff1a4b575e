use std::path::Path;

use tokio::process::Command;

use crate::error::{AgentError, Result};

/// Run `docker compose <args>` in the project directory. Failures carry the
/// full command line plus captured stdout and stderr so the deploy driver
/// can diagnose without shelling in.
async fn run_compose(project_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("docker")
        .arg("compose")
        .args(args)
        .current_dir(project_dir)
        .output()
        .await
        .map_err(|e| AgentError::Compose(format!("failed to run docker compose: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(AgentError::Compose(format!(
            "docker compose {} failed (exit {}): stdout: {stdout}, stderr: {stderr}",
            args.join(" "),
            output.status.code().unwrap_or(-1)
        )));
    }
    Ok(stdout.trim().to_string())
}

pub async fn build(project_dir: &Path) -> Result<()> {
    run_compose(project_dir, &["build"]).await?;
    Ok(())
}

pub async fn up_detached(project_dir: &Path) -> Result<()> {
    run_compose(project_dir, &["up", "-d"]).await?;
    Ok(())
}

pub async fn down(project_dir: &Path) -> Result<()> {
    run_compose(project_dir, &["down"]).await?;
    Ok(())
}

pub async fn ps(project_dir: &Path) -> Result<String> {
    run_compose(project_dir, &["ps"]).await
}
