//! # Life-handler capability and dispatch.
//!
//! A [`LifeHandler`] is the backend that actually starts and stops a
//! process of a given app type. The core never talks to launchers directly;
//! it selects a handler from the instance's app type and forwards the
//! operation.
//!
//! ## Rules
//! - Dispatch is pure: selection depends only on the descriptor's type and
//!   holds no shared state.
//! - `launch` must eventually drive the instance's life status out of its
//!   current state.
//! - `relaunch` is only invoked when the app is **not** registered; the
//!   registered case is served inline over the registration channel.
//! - `term` requests cooperative termination and must drive to `CLOSING`.
//! - `kill` is the forced path: idempotent, fire-and-forget, no request.

use std::sync::Arc;

use async_trait::async_trait;

use crate::apps::RunningApp;
use crate::catalog::AppType;
use crate::error::RequestError;
use crate::requests::Request;

/// Backend capability for one app type.
#[async_trait]
pub trait LifeHandler: Send + Sync {
    /// Starts the instance.
    async fn launch(&self, app: &mut RunningApp, request: &mut Request)
        -> Result<(), RequestError>;

    /// Relaunches an instance that holds no registration channel.
    async fn relaunch(
        &self,
        app: &mut RunningApp,
        request: &mut Request,
    ) -> Result<(), RequestError>;

    /// Requests a transition to `PAUSED`.
    async fn pause(&self, app: &mut RunningApp, request: &mut Request)
        -> Result<(), RequestError>;

    /// Requests cooperative termination.
    async fn term(&self, app: &mut RunningApp, request: &mut Request) -> Result<(), RequestError>;

    /// Forces termination. Idempotent; carries no request.
    async fn kill(&self, app: &mut RunningApp);
}

/// The three launcher backends, selected by app type.
#[derive(Clone)]
pub struct HandlerSet {
    native: Arc<dyn LifeHandler>,
    web: Arc<dyn LifeHandler>,
    qml: Arc<dyn LifeHandler>,
}

impl HandlerSet {
    /// Creates a handler set from the three backends.
    pub fn new(
        native: Arc<dyn LifeHandler>,
        web: Arc<dyn LifeHandler>,
        qml: Arc<dyn LifeHandler>,
    ) -> Self {
        Self { native, web, qml }
    }

    /// Creates a set that routes every type to the same backend.
    pub fn uniform(handler: Arc<dyn LifeHandler>) -> Self {
        Self {
            native: Arc::clone(&handler),
            web: Arc::clone(&handler),
            qml: handler,
        }
    }

    /// Selects the backend for an app type.
    pub fn select(&self, app_type: AppType) -> &Arc<dyn LifeHandler> {
        match app_type {
            AppType::Native => &self.native,
            AppType::Web => &self.web,
            AppType::NativeQml => &self.qml,
        }
    }
}

/// Gate consulted by the launch pipeline's memory-check stage.
#[async_trait]
pub trait MemoryChecker: Send + Sync {
    /// Returns Ok when enough memory is available to launch `app_id`.
    async fn require_memory(&self, app_id: &str, display_id: i32) -> Result<(), RequestError>;
}

/// Memory gate that always admits.
pub struct UnlimitedMemory;

#[async_trait]
impl MemoryChecker for UnlimitedMemory {
    async fn require_memory(&self, _app_id: &str, _display_id: i32) -> Result<(), RequestError> {
        Ok(())
    }
}
