use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::debug;

/// Resolve a GitHub token using, in order:
/// 1. an explicit token file
/// 2. `GITHUB_TOKEN` environment variable
/// 3. `GH_TOKEN` environment variable
/// 4. `gh auth token` subprocess
pub fn resolve_token(token_path: Option<&Path>) -> Result<String> {
    if let Some(path) = token_path {
        let token = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file: {}", path.display()))?;
        let token = token.trim().to_string();
        if token.is_empty() {
            bail!("Token file is empty: {}", path.display());
        }
        debug!(path = %path.display(), "Token resolved via token file");
        return Ok(token);
    }

    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var)
            && !token.trim().is_empty()
        {
            debug!(var, "Token resolved via env var");
            return Ok(token.trim().to_string());
        }
    }

    debug!("Attempting to resolve token via `gh auth token`");
    if let Ok(output) = Command::new("gh").args(["auth", "token"]).output()
        && output.status.success()
    {
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !token.is_empty() {
            debug!("Token resolved via gh CLI");
            return Ok(token);
        }
    }

    bail!(
        "Could not resolve GitHub token. Please either:\n\
         - Pass --token-path pointing at a file containing a token\n\
         - Set the GITHUB_TOKEN or GH_TOKEN environment variable\n\
         - Run `gh auth login` to authenticate with the GitHub CLI"
    )
}
