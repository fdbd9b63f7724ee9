use anyhow::Result;
use async_trait::async_trait;

use crate::task_manager::TaskManager;

/// A worker the coordinator starts through the [`TaskManager`].
///
/// Providers start in descending priority. A critical provider that fails to
/// start aborts startup; any other failure is logged and skipped.
///
/// # Example
///
/// ```no_run
/// use rockpi_sata::providers::traits::ServiceProvider;
/// use rockpi_sata::task_manager::TaskManager;
/// use anyhow::Result;
///
/// struct Heartbeat;
///
/// #[async_trait::async_trait]
/// impl ServiceProvider for Heartbeat {
///     async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
///         task_manager.spawn_task(self.name(), |token| async move {
///             token.cancelled().await;
///             Ok(())
///         })
///     }
///
///     fn name(&self) -> &'static str { "Heartbeat" }
/// }
/// ```
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()>;

    fn name(&self) -> &'static str;

    /// Higher numbers start first.
    fn priority(&self) -> i32 {
        0
    }

    fn is_critical(&self) -> bool {
        false
    }
}
