//! # Lifecycle orchestrator.
//!
//! [`LifecycleManager`] accepts client requests, resolves or creates the
//! target instance in the registry, and drives it through the launch
//! pipeline. All state mutation — client commands, launcher interactions,
//! and kill-timer ticks — is serialized on the manager's single dispatch
//! task; the registry needs no locks.
//!
//! ## Architecture
//! ```text
//! ManagerHandle ──► command queue ──► LifecycleManager::run()
//!                                          │
//!                                          ├──► Registry (resolve / create / remove)
//!                                          │        └──► RunningApp (state machine)
//!                                          │                 ├──► HandlerSet (launch/term/kill)
//!                                          │                 └──► TransitionTimer ─┐
//!                                          │                                       │ ticks
//!                                          ◄───────────────────────────────────────┘
//!                                          │
//!                                          └──► Bus ──► observers (running / status / events)
//! ```
//!
//! ## Rules
//! - The launch pipeline advances PRELAUNCH → MEMORY_CHECK → LAUNCH → DONE;
//!   failures short-circuit to DONE and are answered as error values.
//! - Pipeline-level failures (bad params, unknown launch point, duplicate
//!   instance, memory denied) are answered here; delegated operations are
//!   answered by the life handler that completes them.
//! - A kill tick for an instance that already left its transition state is
//!   ignored; the timer's cancellation may race the queued tick.

use std::sync::Arc;

use thiserror::Error;
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::apps::{LifeStatus, Registry, TickReceiver};
use crate::catalog::LaunchPointCatalog;
use crate::config::Config;
use crate::error::RequestError;
use crate::events::Event;
use crate::handlers::HandlerSet;
use crate::instance::generate_instance_id;
use crate::launching::{LaunchStage, LaunchingItem};
use crate::requests::Request;
use crate::services::Services;

/// Inbound client operations.
pub enum Command {
    Launch(Request),
    Pause(Request),
    Close(Request),
    RegisterApp(Request),
    Running(Request),
    GetAppLifeStatus(Request),
    GetAppLifeEvents(Request),
}

/// Errors submitting a command to the manager.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The command queue is full.
    #[error("manager command queue is full")]
    Full,
    /// The manager is gone.
    #[error("manager is closed")]
    Closed,
}

/// Handle for submitting commands to the manager.
#[derive(Clone)]
pub struct ManagerHandle {
    tx: mpsc::Sender<Command>,
}

impl ManagerHandle {
    /// Submits a command (async, waits if the queue is full).
    pub async fn submit(&self, command: Command) -> Result<(), SubmitError> {
        self.tx.send(command).await.map_err(|_| SubmitError::Closed)
    }

    /// Tries to submit without blocking.
    pub fn try_submit(&self, command: Command) -> Result<(), SubmitError> {
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }
}

/// Drives every instance through its lifecycle.
pub struct LifecycleManager {
    services: Services,
    registry: Registry,
    ticks: TickReceiver,
    tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<Command>,
}

impl LifecycleManager {
    /// Creates a manager with fresh services.
    pub fn new(config: Config, catalog: LaunchPointCatalog, handlers: HandlerSet) -> Self {
        let (services, ticks) = Services::new(config, catalog, handlers);
        Self::with_services(services, ticks)
    }

    /// Creates a manager over an existing service context.
    pub fn with_services(services: Services, ticks: TickReceiver) -> Self {
        let (tx, rx) = mpsc::channel(services.config.command_capacity);
        let registry = Registry::new(
            Arc::clone(&services.config),
            Arc::clone(&services.catalog),
            services.bus.clone(),
            services.ticks.clone(),
        );
        Self {
            services,
            registry,
            ticks,
            tx,
            rx,
        }
    }

    /// Returns a handle for submitting commands.
    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Subscribes to the observer feeds (running / status / life events).
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.services.bus.subscribe()
    }

    /// Returns the registry of live instances.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the registry, mutably.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Returns the service context.
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Runs the dispatch loop until the token is cancelled.
    ///
    /// Client commands and kill-timer ticks are serialized here; this is
    /// the only task that mutates the registry.
    pub async fn run(mut self, token: CancellationToken) {
        loop {
            select! {
                _ = token.cancelled() => break,
                Some(command) = self.rx.recv() => self.dispatch(command).await,
                Some(instance_id) = self.ticks.recv() => {
                    self.on_transition_timeout(&instance_id).await;
                }
                else => break,
            }
        }
    }

    async fn dispatch(&mut self, command: Command) {
        match command {
            Command::Launch(request) => self.launch(request).await,
            Command::Pause(request) => self.pause(request).await,
            Command::Close(request) => self.close(request).await,
            Command::RegisterApp(request) => self.register_app(request).await,
            Command::Running(request) => self.running(&request),
            Command::GetAppLifeStatus(request) => self.acknowledge_subscription(&request),
            Command::GetAppLifeEvents(request) => self.acknowledge_subscription(&request),
        }
    }

    // ---------------------------
    // Operations
    // ---------------------------

    /// Launches (or relaunches) the requested app.
    pub async fn launch(&mut self, mut request: Request) {
        if request.app_id().is_empty() && request.launch_point_id().is_empty() {
            let err = RequestError::invalid_param("neither appId nor launchPointId is specified");
            request.reply_err(&err);
            return;
        }

        let mut item = LaunchingItem::new(&request);

        // PRELAUNCH: resolve the target instance.
        item.set_stage(LaunchStage::Prelaunch);
        let existing = self.registry.get_by_request(&mut request).is_some();
        if !existing {
            let display_id = request.display_id().max(0);
            request.set_display_id(display_id);
            if request.instance_id().is_empty() {
                request.set_instance_id(generate_instance_id(display_id));
            }
        }

        // MEMORY_CHECK: ask the gate before starting anything new.
        item.set_stage(LaunchStage::MemoryCheck);
        if !existing {
            if let Err(err) = self
                .services
                .memory
                .require_memory(request.app_id(), request.display_id())
                .await
            {
                item.set_error(err.code, err.text.clone());
                self.finish(&mut item, &request, Some(err));
                return;
            }
        }

        // LAUNCH: a redirect recorded on the item replaces the target.
        item.set_stage(LaunchStage::Launch);
        if item.is_redirected() {
            request.set_app_id(item.app_id());
            request.set_launch_point_id("");
            request.set_instance_id("");
        }

        let handlers = self.services.handlers.clone();
        if existing {
            info!(instance_id = %request.instance_id(), "relaunching live instance");
            let Some(app) = self.registry.get_by_instance_id_mut(request.instance_id()) else {
                return;
            };
            if let Err(err) = app.relaunch(&handlers, &mut request).await {
                item.set_error(err.code, err.text);
            }
        } else {
            if self.registry.get_by_instance_id(request.instance_id()).is_some() {
                let err = RequestError::general("instance id already exists");
                item.set_error(err.code, err.text.clone());
                self.finish(&mut item, &request, Some(err));
                return;
            }
            let Some(mut app) = self.registry.create_by_request(&mut request) else {
                let err = RequestError::general("cannot find proper launch point");
                item.set_error(err.code, err.text.clone());
                self.finish(&mut item, &request, Some(err));
                return;
            };

            let entry = if app.preload().is_empty() {
                LifeStatus::Launching
            } else {
                LifeStatus::Preloading
            };
            // Status settles before the instance becomes visible.
            app.set_life_status(entry);

            if !self.registry.add(app) {
                let err = RequestError::general("instance id already exists");
                item.set_error(err.code, err.text.clone());
                self.finish(&mut item, &request, Some(err));
                return;
            }
            let Some(app) = self.registry.get_by_instance_id_mut(request.instance_id()) else {
                return;
            };
            if let Err(err) = app.launch(&handlers, &mut request).await {
                item.set_error(err.code, err.text);
            }
        }

        self.finish(&mut item, &request, None);
    }

    /// Requests a transition to `PAUSED`.
    pub async fn pause(&mut self, mut request: Request) {
        let handlers = self.services.handlers.clone();
        let Some(app) = self.registry.get_by_request(&mut request) else {
            request.reply_err(&RequestError::general("no such running instance"));
            return;
        };
        if let Err(err) = app.pause(&handlers, &mut request).await {
            warn!(instance_id = %request.instance_id(), error = %err, "pause failed");
        }
    }

    /// Requests cooperative termination.
    pub async fn close(&mut self, mut request: Request) {
        let handlers = self.services.handlers.clone();
        let Some(app) = self.registry.get_by_request(&mut request) else {
            request.reply_err(&RequestError::general("no such running instance"));
            return;
        };
        if let Err(err) = app.close(&handlers, &mut request).await {
            warn!(instance_id = %request.instance_id(), error = %err, "close failed");
        }
    }

    /// Binds the request's reply channel as the app's event channel.
    pub async fn register_app(&mut self, mut request: Request) {
        let Some(app) = self.registry.get_by_request(&mut request) else {
            request.reply_err(&RequestError::general("no such running instance"));
            return;
        };
        let _ = app.register(&mut request);
    }

    /// Answers with the snapshot of live instances.
    pub fn running(&self, request: &Request) {
        let mut payload = request.success_payload();
        payload["running"] = self.registry.to_json(false);
        request.replier().send(payload);
    }

    fn acknowledge_subscription(&self, request: &Request) {
        // The feed itself is served by the RPC layer over `subscribe()`.
        request.reply_ok();
    }

    /// Handles one kill-timer tick.
    ///
    /// Invoked when an instance has stayed in a transition state past the
    /// deadline. Keeps killing: the timer continues ticking until the
    /// instance actually leaves the transition.
    pub async fn on_transition_timeout(&mut self, instance_id: &str) {
        let handlers = self.services.handlers.clone();
        let Some(app) = self.registry.get_by_instance_id_mut(instance_id) else {
            return;
        };
        if !app.is_transition() {
            // Late tick; the timer was cancelled after this tick was queued.
            return;
        }
        warn!(instance_id, status = %app.life_status(), "transition timed out");
        let handler = Arc::clone(handlers.select(app.app_type()));
        handler.kill(app).await;
    }

    fn finish(&self, item: &mut LaunchingItem, request: &Request, reply: Option<RequestError>) {
        item.set_stage(LaunchStage::Done);
        if let Some(err) = reply {
            request.reply_err(&err);
        }
        if let Some(err) = item.error() {
            warn!(
                app_id = %item.app_id(),
                requested_app_id = %item.requested_app_id(),
                code = err.code.as_label(),
                "launch failed: {}",
                err.text
            );
        } else {
            info!(
                app_id = %item.app_id(),
                instance_id = %request.instance_id(),
                elapsed_ms = item.launch_start().elapsed().as_millis() as u64,
                "launch pipeline done"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::apps::RunningApp;
    use crate::error::ErrorCode;
    use crate::catalog::{AppDescriptor, AppType, LaunchPoint};
    use crate::events::EventKind;
    use crate::handlers::{LifeHandler, MemoryChecker};
    use crate::requests::Replier;

    #[derive(Default)]
    struct RecordingHandler {
        calls: Mutex<Vec<&'static str>>,
        reply_on_launch: bool,
    }

    impl RecordingHandler {
        fn replying() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reply_on_launch: true,
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, name: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
        }
    }

    #[async_trait]
    impl LifeHandler for RecordingHandler {
        async fn launch(
            &self,
            _app: &mut RunningApp,
            request: &mut Request,
        ) -> Result<(), RequestError> {
            self.calls.lock().unwrap().push("launch");
            if self.reply_on_launch {
                request.reply_ok();
            }
            Ok(())
        }

        async fn relaunch(
            &self,
            _app: &mut RunningApp,
            _request: &mut Request,
        ) -> Result<(), RequestError> {
            self.calls.lock().unwrap().push("relaunch");
            Ok(())
        }

        async fn pause(
            &self,
            _app: &mut RunningApp,
            _request: &mut Request,
        ) -> Result<(), RequestError> {
            self.calls.lock().unwrap().push("pause");
            Ok(())
        }

        async fn term(
            &self,
            _app: &mut RunningApp,
            _request: &mut Request,
        ) -> Result<(), RequestError> {
            self.calls.lock().unwrap().push("term");
            Ok(())
        }

        async fn kill(&self, _app: &mut RunningApp) {
            self.calls.lock().unwrap().push("kill");
        }
    }

    fn test_catalog() -> LaunchPointCatalog {
        let mut catalog = LaunchPointCatalog::new();
        catalog.add(LaunchPoint::default_for(AppDescriptor::new(
            "tv.menu",
            AppType::Native,
        )));
        catalog.add(LaunchPoint::default_for(AppDescriptor::new(
            "tv.browser",
            AppType::Web,
        )));
        catalog
    }

    fn test_manager(handler: Arc<RecordingHandler>) -> LifecycleManager {
        LifecycleManager::new(
            Config::default(),
            test_catalog(),
            HandlerSet::uniform(handler),
        )
    }

    fn launch_request(app_id: &str) -> (Request, tokio::sync::mpsc::UnboundedReceiver<serde_json::Value>) {
        let (replier, rx) = Replier::channel();
        let request = Request::new(replier)
            .with_app_id(app_id)
            .with_display_id(0)
            .with_reason("test");
        (request, rx)
    }

    #[tokio::test]
    async fn fresh_launch_creates_and_starts_an_instance() {
        let handler = Arc::new(RecordingHandler::default());
        let mut manager = test_manager(handler.clone());

        let (request, _rx) = launch_request("tv.menu");
        manager.launch(request).await;

        assert_eq!(handler.calls(), vec!["launch"]);
        let app = manager.registry().get_by_app_id("tv.menu", -1).unwrap();
        assert_eq!(app.life_status(), LifeStatus::Launching);
        assert_eq!(app.launch_count(), 1);
        assert!(app.is_killing_timer_armed());
        assert!(!app.instance_id().is_empty());
        assert_eq!(app.display_id(), 0);

        // On launcher success the window manager brings it up.
        let instance_id = app.instance_id().to_string();
        let app = manager.registry_mut().get_by_instance_id_mut(&instance_id).unwrap();
        app.set_life_status(LifeStatus::Foreground);
        assert!(!app.is_killing_timer_armed());
    }

    #[tokio::test]
    async fn launch_without_any_identity_is_invalid() {
        let handler = Arc::new(RecordingHandler::default());
        let mut manager = test_manager(handler.clone());

        let (replier, mut rx) = Replier::channel();
        manager.launch(Request::new(replier)).await;

        let reply = rx.try_recv().unwrap();
        assert_eq!(reply["returnValue"], false);
        assert_eq!(reply["errorCode"], ErrorCode::InvalidParam.code());
        assert!(handler.calls().is_empty());
    }

    #[tokio::test]
    async fn launch_of_unknown_app_fails_with_general_error() {
        let handler = Arc::new(RecordingHandler::default());
        let mut manager = test_manager(handler.clone());

        let (request, mut rx) = launch_request("tv.nonexistent");
        manager.launch(request).await;

        let reply = rx.try_recv().unwrap();
        assert_eq!(reply["returnValue"], false);
        assert_eq!(reply["errorCode"], ErrorCode::General.code());
        assert!(manager.registry().is_empty());
    }

    struct DeniedMemory;

    #[async_trait]
    impl MemoryChecker for DeniedMemory {
        async fn require_memory(&self, _app_id: &str, _display_id: i32) -> Result<(), RequestError> {
            Err(RequestError::general("not enough memory"))
        }
    }

    #[tokio::test]
    async fn memory_denial_short_circuits_the_pipeline() {
        let handler = Arc::new(RecordingHandler::default());
        let (services, ticks) = Services::new(
            Config::default(),
            test_catalog(),
            HandlerSet::uniform(handler.clone()),
        );
        let mut manager =
            LifecycleManager::with_services(services.with_memory(Arc::new(DeniedMemory)), ticks);

        let (request, mut rx) = launch_request("tv.menu");
        manager.launch(request).await;

        let reply = rx.try_recv().unwrap();
        assert_eq!(reply["returnValue"], false);
        assert_eq!(reply["errorText"], "not enough memory");
        assert!(handler.calls().is_empty());
        assert!(manager.registry().is_empty());
    }

    #[tokio::test]
    async fn second_launch_of_a_live_app_relaunches() {
        let handler = Arc::new(RecordingHandler::default());
        let mut manager = test_manager(handler.clone());

        let (first, _rx1) = launch_request("tv.menu");
        manager.launch(first).await;
        let (second, _rx2) = launch_request("tv.menu");
        manager.launch(second).await;

        assert_eq!(handler.calls(), vec!["launch", "relaunch"]);
        assert_eq!(manager.registry().len(), 1);
    }

    #[tokio::test]
    async fn registered_relaunch_skips_the_handler() {
        let handler = Arc::new(RecordingHandler::default());
        let mut manager = test_manager(handler.clone());

        let (first, _rx1) = launch_request("tv.menu");
        manager.launch(first).await;

        // The app registers its event channel.
        let (channel_replier, mut channel_rx) = Replier::channel();
        let register = Request::new(channel_replier).with_app_id("tv.menu");
        manager.register_app(register).await;
        assert_eq!(channel_rx.try_recv().unwrap()["event"], "registered");

        // Clear the transition so the relaunch is admitted.
        let instance_id = manager
            .registry()
            .get_by_app_id("tv.menu", -1)
            .unwrap()
            .instance_id()
            .to_string();
        manager
            .registry_mut()
            .get_by_instance_id_mut(&instance_id)
            .unwrap()
            .set_life_status(LifeStatus::Foreground);

        let (relaunch, mut reply_rx) = launch_request("tv.menu");
        let relaunch = relaunch.with_params(json!({ "x": 1 }));
        manager.launch(relaunch).await;

        assert_eq!(handler.count("relaunch"), 0);
        let pushed = channel_rx.try_recv().unwrap();
        assert_eq!(pushed["event"], "relaunch");
        assert_eq!(pushed["parameters"], json!({ "x": 1 }));
        assert_eq!(reply_rx.try_recv().unwrap()["returnValue"], true);
    }

    #[tokio::test]
    async fn pause_and_close_resolve_the_target() {
        let handler = Arc::new(RecordingHandler::default());
        let mut manager = test_manager(handler.clone());

        let (first, _rx) = launch_request("tv.menu");
        manager.launch(first).await;

        let (pause, _pause_rx) = launch_request("tv.menu");
        manager.pause(pause).await;
        let (close, _close_rx) = launch_request("tv.menu");
        manager.close(close).await;

        assert_eq!(handler.calls(), vec!["launch", "pause", "term"]);
    }

    #[tokio::test]
    async fn operations_on_unknown_instances_fail() {
        let handler = Arc::new(RecordingHandler::default());
        let mut manager = test_manager(handler.clone());

        let (close, mut rx) = launch_request("tv.menu");
        manager.close(close).await;
        assert_eq!(rx.try_recv().unwrap()["returnValue"], false);

        let (register, mut rx) = launch_request("tv.menu");
        manager.register_app(register).await;
        assert_eq!(rx.try_recv().unwrap()["returnValue"], false);
    }

    #[tokio::test]
    async fn running_returns_the_snapshot() {
        let handler = Arc::new(RecordingHandler::default());
        let mut manager = test_manager(handler.clone());

        let (first, _rx1) = launch_request("tv.menu");
        manager.launch(first).await;
        let (second, _rx2) = launch_request("tv.browser");
        manager.launch(second).await;

        let (request, mut rx) = launch_request("");
        manager.running(&request);

        let reply = rx.try_recv().unwrap();
        assert_eq!(reply["returnValue"], true);
        let running = reply["running"].as_array().unwrap();
        assert_eq!(running.len(), 2);
        assert_eq!(running[0]["appId"], "tv.menu");
        assert_eq!(running[1]["appId"], "tv.browser");
    }

    #[tokio::test]
    async fn status_feed_is_observable_through_subscribe() {
        let handler = Arc::new(RecordingHandler::default());
        let mut manager = test_manager(handler.clone());
        let mut events = manager.subscribe();

        let (first, _rx) = launch_request("tv.menu");
        manager.launch(first).await;

        let kinds: Vec<EventKind> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        // add snapshot, then the STOP→LAUNCHING change and its life event.
        assert!(kinds.contains(&EventKind::Running));
        assert!(kinds.contains(&EventKind::LifeStatusChanged));
        assert!(kinds.contains(&EventKind::LifeEvent));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn kill_retry_keeps_firing_until_the_transition_ends() {
        let handler = Arc::new(RecordingHandler::replying());
        let manager = test_manager(handler.clone());
        let handle = manager.handle();
        let token = CancellationToken::new();
        let join = tokio::spawn(manager.run(token.clone()));

        let (request, mut reply_rx) = launch_request("tv.menu");
        handle.submit(Command::Launch(request)).await.unwrap();
        // The handler answers the request once the launch is dispatched.
        assert_eq!(reply_rx.recv().await.unwrap()["returnValue"], true);

        // The launcher never confirms; each deadline forces a kill and the
        // timer keeps going.
        for expected in 1..=3 {
            tokio::time::advance(Config::default().transition_timeout).await;
            for _ in 0..50 {
                tokio::task::yield_now().await;
                if handler.count("kill") >= expected {
                    break;
                }
            }
            assert_eq!(handler.count("kill"), expected);
        }

        token.cancel();
        join.await.unwrap();
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn no_kill_before_the_deadline() {
        let handler = Arc::new(RecordingHandler::replying());
        let manager = test_manager(handler.clone());
        let handle = manager.handle();
        let token = CancellationToken::new();
        let join = tokio::spawn(manager.run(token.clone()));

        let (request, mut reply_rx) = launch_request("tv.menu");
        handle.submit(Command::Launch(request)).await.unwrap();
        reply_rx.recv().await.unwrap();

        tokio::time::advance(Config::default().transition_timeout / 2).await;
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(handler.count("kill"), 0);

        token.cancel();
        join.await.unwrap();
    }
}
