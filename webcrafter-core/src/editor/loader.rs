//! Process-wide, load-once access to the editor widget module.

use super::EditorWidget;
use crate::error::PlaygroundResult;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

/// A loaded widget library able to create widget instances.
pub trait WidgetModule: Send + Sync {
    fn name(&self) -> &str;

    fn create_widget(&self) -> Box<dyn EditorWidget>;
}

/// Memoised loader. Concurrent callers share the single in-flight load;
/// its outcome, success or failure, is kept for the rest of the process.
#[derive(Default)]
pub struct WidgetLoader {
    module: OnceCell<Option<Arc<dyn WidgetModule>>>,
    attempts: AtomicUsize,
}

impl WidgetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `init` the first time only and returns the loaded module, or None
    /// when loading failed.
    pub async fn load<F, Fut>(&self, init: F) -> Option<Arc<dyn WidgetModule>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PlaygroundResult<Arc<dyn WidgetModule>>>,
    {
        self.module
            .get_or_init(|| async {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                match init().await {
                    Ok(module) => {
                        tracing::info!(module = module.name(), "editor widget loaded");
                        Some(module)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "editor widget failed to load; editor stays inert");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// The module if a load already completed successfully.
    pub fn loaded(&self) -> Option<Arc<dyn WidgetModule>> {
        self.module.get().cloned().flatten()
    }

    /// How many times a load was actually started.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// The loader shared by every mount in this process.
pub fn global_loader() -> &'static WidgetLoader {
    static LOADER: OnceLock<WidgetLoader> = OnceLock::new();
    LOADER.get_or_init(WidgetLoader::new)
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::HeadlessModule;
    use crate::error::PlaygroundError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_loads_share_one_attempt() {
        let loader = Arc::new(WidgetLoader::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let loader = loader.clone();
            handles.push(tokio::spawn(async move {
                loader
                    .load(|| async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(Arc::new(HeadlessModule) as Arc<dyn WidgetModule>)
                    })
                    .await
                    .is_some()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(loader.attempts(), 1);
        assert!(loader.loaded().is_some());
    }

    #[tokio::test]
    async fn test_failed_load_is_remembered() {
        let loader = WidgetLoader::new();
        let first = loader
            .load(|| async { Err(PlaygroundError::WidgetUnavailable("cdn unreachable".into())) })
            .await;
        assert!(first.is_none());

        let second = loader
            .load(|| async { Ok(Arc::new(HeadlessModule) as Arc<dyn WidgetModule>) })
            .await;
        assert!(second.is_none());
        assert_eq!(loader.attempts(), 1);
    }
}
