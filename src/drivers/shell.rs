//! Shell commands used for statistics and privileged operations.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;

/// Runs command lines through the system shell.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Shell: Send + Sync {
    /// Runs `cmd` and returns its trimmed standard output.
    async fn output(&self, cmd: &str) -> Result<String>;

    /// Runs `cmd` for its effect only.
    async fn call(&self, cmd: &str) -> Result<()>;
}

/// `sh -c` on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

#[async_trait]
impl Shell for SystemShell {
    async fn output(&self, cmd: &str) -> Result<String> {
        let out = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .output()
            .await
            .with_context(|| format!("Failed to spawn `{cmd}`"))?;

        if !out.status.success() {
            bail!("`{cmd}` exited with {}", out.status);
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    async fn call(&self, cmd: &str) -> Result<()> {
        let status = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .status()
            .await
            .with_context(|| format!("Failed to spawn `{cmd}`"))?;

        if !status.success() {
            bail!("`{cmd}` exited with {status}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn output_is_trimmed() {
        let out = SystemShell.output("printf '  hello \\n'").await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn failing_command_is_an_error() {
        assert!(SystemShell.output("exit 3").await.is_err());
        assert!(SystemShell.call("false").await.is_err());
        assert!(SystemShell.call("true").await.is_ok());
    }
}
