//! Named lifecycle hooks.
//!
//! A hook point is a name (`build:before:assets`, `page:update`, ...) with
//! an ordered list of async callables. Callables run sequentially; the
//! first error stops the list.
//!
//! Names used by the engine:
//! - `build:before:<phase>` / `build:after:<phase>` around each build phase
//! - `<kind>:build:before` / `<kind>:build:after` around each producer
//! - `<kind>:add` / `<kind>:update` / `<kind>:remove` on watcher activity
//!
//! where `<kind>` is `asset`, `page`, `virtual-asset` or `virtual-page`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::build::Phase;
use crate::producer::Producer;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type HookFn = Arc<dyn Fn(HookTarget) -> BoxFuture<Result<()>> + Send + Sync>;

/// What a hook is invoked with.
#[derive(Debug, Clone)]
pub enum HookTarget {
    Phase(Phase),
    Producer(Producer),
}

impl HookTarget {
    pub fn producer(&self) -> Option<&Producer> {
        match self {
            Self::Producer(producer) => Some(producer),
            Self::Phase(_) => None,
        }
    }
}

/// Registry of hook points for one site.
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<FxHashMap<String, Vec<HookFn>>>,
}

impl HookRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append a callable to `name`.
    pub fn register<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: Fn(HookTarget) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let hook: HookFn = Arc::new(move |target| -> BoxFuture<Result<()>> { Box::pin(hook(target)) });
        self.hooks.write().entry(name.into()).or_default().push(hook);
    }

    pub fn has(&self, name: &str) -> bool {
        self.hooks.read().get(name).is_some_and(|list| !list.is_empty())
    }

    /// Run every callable of `name` in order.
    pub async fn run(&self, name: &str, target: HookTarget) -> Result<()> {
        // Snapshot so no lock is held across awaits.
        let list = match self.hooks.read().get(name) {
            Some(list) => list.clone(),
            None => return Ok(()),
        };
        for hook in list {
            hook(target.clone())
                .await
                .with_context(|| format!("hook `{name}` failed"))?;
        }
        Ok(())
    }

    /// Run `name` in the background, logging failures.
    pub fn spawn(self: &Arc<Self>, name: String, target: HookTarget) {
        if !self.has(&name) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            crate::debug!("hook"; "no runtime, skipped `{}`", name);
            return;
        };
        let hooks = Arc::clone(self);
        runtime.spawn(async move {
            if let Err(e) = hooks.run(&name, target).await {
                crate::log!("error"; "{:#}", e);
            }
        });
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hooks = self.hooks.read();
        let mut names: Vec<&String> = hooks.keys().collect();
        names.sort();
        f.debug_struct("HookRegistry").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<HookRegistry>) {
        (Arc::new(Mutex::new(Vec::new())), HookRegistry::new())
    }

    #[tokio::test]
    async fn test_hooks_run_in_order() {
        let (seen, hooks) = recorder();
        for label in ["first", "second"] {
            let seen = Arc::clone(&seen);
            hooks.register("build:before:assets", move |_| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().push(label.to_string());
                    Ok(())
                }
            });
        }

        hooks
            .run("build:before:assets", HookTarget::Phase(Phase::Assets))
            .await
            .unwrap();
        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_first_failure_stops_list() {
        let (seen, hooks) = recorder();
        hooks.register("build:after:pages", |_| async { Err::<(), _>(anyhow::anyhow!("nope")) });
        let tail = Arc::clone(&seen);
        hooks.register("build:after:pages", move |_| {
            let tail = Arc::clone(&tail);
            async move {
                tail.lock().push("tail".into());
                Ok(())
            }
        });

        let err = hooks
            .run("build:after:pages", HookTarget::Phase(Phase::Pages))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("build:after:pages"));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_hook_is_noop() {
        let hooks = HookRegistry::new();
        assert!(!hooks.has("page:update"));
        hooks
            .run("page:update", HookTarget::Phase(Phase::Posts))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_spawn_does_not_block() {
        let hooks = HookRegistry::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        hooks.register("asset:update", move |_| {
            let tx = Arc::clone(&tx);
            async move {
                tokio::task::yield_now().await;
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(());
                }
                Ok(())
            }
        });

        hooks.spawn("asset:update".into(), HookTarget::Phase(Phase::Assets));
        rx.await.unwrap();
    }
}
