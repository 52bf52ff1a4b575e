use std::path::Path;

use tokio::process::Command;

use crate::error::{AgentError, Result};

async fn run_git(args: &[&str], working_directory: Option<&Path>) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = working_directory {
        cmd.current_dir(dir);
    }
    let output = cmd
        .output()
        .await
        .map_err(|e| AgentError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AgentError::Git(format!(
            "git {} failed (exit {}): {stderr}",
            args.join(" "),
            output.status.code().unwrap_or(-1)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Shallow-clone `url` into `target_path`, replacing any existing checkout.
/// Deploys always start from a fresh depth-1 clone.
pub async fn clone_shallow(url: &str, target_path: &Path) -> Result<()> {
    if target_path.exists() {
        tokio::fs::remove_dir_all(target_path).await?;
    }
    let target = target_path.to_string_lossy();
    run_git(&["clone", "--depth", "1", url, &target], None).await?;
    Ok(())
}

pub async fn head_commit(repo_path: &Path) -> Result<String> {
    run_git(&["rev-parse", "HEAD"], Some(repo_path)).await
}
