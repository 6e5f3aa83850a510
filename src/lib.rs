//! # appvisor
//!
//! **Appvisor** is an application lifecycle supervisor for multi-display
//! embedded platforms (televisions, automotive head units).
//!
//! It tracks every running application instance on the device, mediates
//! launch/relaunch/pause/close requests from clients, enforces a strict
//! lifecycle state machine, and drives time-bounded transitions to
//! completion — killing stuck applications whose transitions exceed a
//! deadline.
//!
//! ## Features
//!
//! | Area              | Description                                                       | Key types / traits                       |
//! |-------------------|-------------------------------------------------------------------|------------------------------------------|
//! | **State machine** | Per-instance life status with transition legality rules.          | [`RunningApp`], [`LifeStatus`]           |
//! | **Registry**      | Insertion-ordered, multi-key collection of live instances.        | [`Registry`]                             |
//! | **Orchestration** | Launch pipeline, command loop, kill-retry handling.               | [`LifecycleManager`], [`ManagerHandle`]  |
//! | **Backends**      | Launcher capability per app type (native / web / QML).            | [`LifeHandler`], [`HandlerSet`]          |
//! | **Observability** | Broadcast feeds for running set and status trajectories.          | [`Bus`], [`Event`], [`EventKind`]        |
//! | **Errors**        | Failures as values answered over the request's reply channel.     | [`ErrorCode`], [`RequestError`]          |
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use appvisor::{
//!     AppDescriptor, AppType, Command, Config, HandlerSet, LaunchPoint, LaunchPointCatalog,
//!     LifecycleManager, LifeHandler, Replier, Request, RequestError, RunningApp,
//! };
//!
//! // The launcher backend is the integrator's seam; this one does nothing.
//! struct Launcher;
//!
//! #[async_trait]
//! impl LifeHandler for Launcher {
//!     async fn launch(&self, _app: &mut RunningApp, request: &mut Request) -> Result<(), RequestError> {
//!         request.reply_ok();
//!         Ok(())
//!     }
//!     async fn relaunch(&self, _app: &mut RunningApp, _request: &mut Request) -> Result<(), RequestError> {
//!         Ok(())
//!     }
//!     async fn pause(&self, _app: &mut RunningApp, _request: &mut Request) -> Result<(), RequestError> {
//!         Ok(())
//!     }
//!     async fn term(&self, _app: &mut RunningApp, _request: &mut Request) -> Result<(), RequestError> {
//!         Ok(())
//!     }
//!     async fn kill(&self, _app: &mut RunningApp) {}
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut catalog = LaunchPointCatalog::new();
//!     catalog.add(LaunchPoint::default_for(AppDescriptor::new("tv.menu", AppType::Web)));
//!
//!     let manager = LifecycleManager::new(
//!         Config::default(),
//!         catalog,
//!         HandlerSet::uniform(Arc::new(Launcher)),
//!     );
//!     let handle = manager.handle();
//!     let token = CancellationToken::new();
//!     tokio::spawn(manager.run(token.clone()));
//!
//!     let (replier, mut replies) = Replier::channel();
//!     let request = Request::new(replier).with_app_id("tv.menu").with_display_id(0);
//!     handle.submit(Command::Launch(request)).await.unwrap();
//!     let reply = replies.recv().await.unwrap();
//!     assert_eq!(reply["returnValue"], true);
//!
//!     token.cancel();
//! }
//! ```
//!
//! ---

mod apps;
mod catalog;
mod config;
mod error;
mod events;
mod handlers;
mod launching;
mod manager;
mod requests;
mod services;

pub mod instance;

// ---- Public re-exports ----

pub use apps::{tick_channel, LifeStatus, Registry, RunningApp, TickReceiver, TickSender, TransitionTimer};
pub use catalog::{AppDescriptor, AppType, LaunchPoint, LaunchPointCatalog};
pub use config::Config;
pub use error::{ErrorCode, RequestError};
pub use events::{Bus, Event, EventKind};
pub use handlers::{HandlerSet, LifeHandler, MemoryChecker, UnlimitedMemory};
pub use launching::{LaunchStage, LaunchingItem};
pub use manager::{Command, LifecycleManager, ManagerHandle, SubmitError};
pub use requests::{Replier, Request};
pub use services::Services;
