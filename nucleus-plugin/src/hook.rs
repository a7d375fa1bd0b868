use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::Result;

/// A registered hook handler. Handlers receive the trigger payload and may
/// suspend.
pub type HookHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Box a plain async closure into a [`HookHandler`].
pub fn hook_handler<F, Fut>(handler: F) -> HookHandler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |args| -> BoxFuture<'static, Result<()>> { Box::pin(handler(args)) })
}

/// Named hook bus. Plugins register handlers under a hook name; triggering
/// runs every handler for that name in registration order.
#[derive(Default)]
pub struct HookBus {
    handlers: Mutex<HashMap<String, Vec<HookHandler>>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn handlers(&self) -> MutexGuard<'_, HashMap<String, Vec<HookHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn hook(&self, name: &str, handler: HookHandler) {
        self.handlers()
            .entry(name.to_string())
            .or_default()
            .push(handler);
    }

    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers().get(name).map_or(0, Vec::len)
    }

    /// Invoke every handler registered under `name`. The first handler
    /// error aborts the remainder and propagates. An unknown name is a
    /// no-op.
    pub async fn trigger(&self, name: &str, args: Value) -> Result<()> {
        let handlers = self.handlers().get(name).cloned().unwrap_or_default();
        for handler in handlers {
            handler(args.clone()).await?;
        }
        Ok(())
    }
}
