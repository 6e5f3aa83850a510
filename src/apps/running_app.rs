//! # One live application instance.
//!
//! [`RunningApp`] owns everything that belongs to a single instance: the
//! lifecycle state machine, the kill-retry timer, the registration channel,
//! and the launch/relaunch payload builders.
//!
//! ## State machine
//! ```text
//!            launch                    launcher / window manager
//!  STOP ───► LAUNCHING ──────────────► FOREGROUND ◄──► BACKGROUND
//!    ▲        │    ▲                        │
//!    │        │    │ relaunch               ▼ pause
//!    │        │    └── RELAUNCHING ◄─── PAUSING ──► PAUSED
//!    │        ▼ close
//!    └──── CLOSING   (CLOSING may be entered from any state)
//! ```
//!
//! ## Rules
//! - A change between two transition states is refused unless the target is
//!   `CLOSING`; an abort is always allowed, a second concurrent launch flow
//!   is not.
//! - `LAUNCHING` requested while the app is on screen collapses to a
//!   `RELAUNCHING` pulse with the state held at `FOREGROUND`; requested from
//!   `BACKGROUND`/`PAUSED`/`PRELOADED` it enters `RELAUNCHING` instead.
//! - The kill-retry timer is armed exactly while the status is a transition
//!   state, and keeps ticking until the state leaves the transition set.
//! - Handler-delegated operations are answered by the handler; operations
//!   this type completes inline (relaunch fast-path, doubled close,
//!   registration) answer the request here.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::catalog::{AppType, LaunchPoint};
use crate::config::Config;
use crate::error::RequestError;
use crate::events::{Bus, Event, EventKind};
use crate::handlers::HandlerSet;
use crate::requests::{Replier, Request};

use super::status::LifeStatus;
use super::timer::{TickSender, TransitionTimer};

/// A single live instance of an application.
pub struct RunningApp {
    launch_point: Arc<LaunchPoint>,
    instance_id: String,
    display_id: i32,
    process_id: Option<i32>,
    web_process_id: String,
    life_status: LifeStatus,
    launch_count: u32,
    keep_alive: bool,
    no_splash: bool,
    spinner: bool,
    is_hidden: bool,
    is_full_window: bool,
    preload: String,
    token: u64,
    context: i32,
    killing_timer: Option<TransitionTimer>,
    registered_app: Option<Replier>,
    config: Arc<Config>,
    bus: Bus,
    ticks: TickSender,
}

impl RunningApp {
    /// Creates a stopped instance bound to a launch point.
    pub fn new(
        launch_point: Arc<LaunchPoint>,
        config: Arc<Config>,
        bus: Bus,
        ticks: TickSender,
    ) -> Self {
        Self {
            launch_point,
            instance_id: String::new(),
            display_id: -1,
            process_id: None,
            web_process_id: String::new(),
            life_status: LifeStatus::Stop,
            launch_count: 0,
            keep_alive: false,
            no_splash: true,
            spinner: true,
            is_hidden: false,
            is_full_window: true,
            preload: String::new(),
            token: 0,
            context: 0,
            killing_timer: None,
            registered_app: None,
            config,
            bus,
            ticks,
        }
    }

    /// Absorbs launch-policy flags from a request's params.
    pub fn load_request(&mut self, request: &Request) {
        let params = request.params();
        if let Some(keep_alive) = params["keepAlive"].as_bool() {
            self.keep_alive = keep_alive;
        }
        if let Some(no_splash) = params["noSplash"].as_bool() {
            self.no_splash = no_splash;
        }
        if let Some(spinner) = params["spinner"].as_bool() {
            self.spinner = spinner;
        }
        if let Some(preload) = params["preload"].as_str() {
            self.preload = preload.to_string();
        }
    }

    // ---------------------------
    // Operations
    // ---------------------------

    /// Starts the instance through its life handler.
    ///
    /// The handler answers the request when the start completes or fails.
    pub async fn launch(
        &mut self,
        handlers: &HandlerSet,
        request: &mut Request,
    ) -> Result<(), RequestError> {
        let handler = Arc::clone(handlers.select(self.app_type()));
        handler.launch(self, request).await
    }

    /// Relaunches the instance.
    ///
    /// When the app holds a registration channel and the platform supports
    /// it, the relaunch is served inline: the status moves to `LAUNCHING`
    /// (collapsing per the state machine), the relaunch payload is pushed
    /// over the channel, and the request is answered here without touching
    /// the process launcher. Otherwise the life handler takes over.
    pub async fn relaunch(
        &mut self,
        handlers: &HandlerSet,
        request: &mut Request,
    ) -> Result<(), RequestError> {
        if self.is_registered() && self.config.relaunch_supported {
            self.set_life_status(LifeStatus::Launching);
            let payload = self.relaunch_payload(request);
            if !self.send_event(payload) {
                let err = RequestError::launch("failed to send relaunch event");
                request.reply_err(&err);
                return Err(err);
            }
            request.reply_ok();
            return Ok(());
        }
        let handler = Arc::clone(handlers.select(self.app_type()));
        handler.relaunch(self, request).await
    }

    /// Requests a transition to `PAUSED` through the life handler.
    pub async fn pause(
        &mut self,
        handlers: &HandlerSet,
        request: &mut Request,
    ) -> Result<(), RequestError> {
        let handler = Arc::clone(handlers.select(self.app_type()));
        handler.pause(self, request).await
    }

    /// Requests cooperative termination through the life handler.
    ///
    /// `term` is always forwarded, even when the instance is already
    /// `CLOSING`; in that case the request is additionally answered with
    /// success here, since closing is idempotent from the client's view.
    pub async fn close(
        &mut self,
        handlers: &HandlerSet,
        request: &mut Request,
    ) -> Result<(), RequestError> {
        let was_closing = self.life_status == LifeStatus::Closing;
        let handler = Arc::clone(handlers.select(self.app_type()));
        let result = handler.term(self, request).await;

        if was_closing {
            warn!(instance_id = %self.instance_id, "instance is already closing");
            request.reply_ok();
            return Ok(());
        }
        result
    }

    /// Binds the request's reply handle as the app's outbound event channel.
    ///
    /// One-shot: a second registration is rejected with a generic error and
    /// the existing channel is untouched. The channel is installed before
    /// the `registered` event is sent and removed again if the send fails.
    pub fn register(&mut self, request: &mut Request) -> Result<(), RequestError> {
        if self.registered_app.is_some() {
            let err = RequestError::general("the app is already registered");
            request.reply_err(&err);
            return Err(err);
        }

        self.registered_app = Some(request.replier().clone());

        let payload = json!({
            "event": "registered",
            // TODO drop the duplicate once clients stop reading "message".
            "message": "registered",
        });
        if !self.send_event(payload) {
            warn!(instance_id = %self.instance_id, "failed to register application");
            self.registered_app = None;
            return Err(RequestError::launch("failed to send registered event"));
        }

        info!(instance_id = %self.instance_id, "application is registered");
        Ok(())
    }

    /// Pushes an event to the registered app, stamping `returnValue: true`.
    pub fn send_event(&mut self, mut payload: Value) -> bool {
        let Some(registered_app) = &self.registered_app else {
            warn!(instance_id = %self.instance_id, "instance is not registered");
            return false;
        };

        payload["returnValue"] = json!(true);
        if !registered_app.send(payload) {
            warn!(instance_id = %self.instance_id, "registration channel is gone");
            return false;
        }
        true
    }

    // ---------------------------
    // State machine
    // ---------------------------

    /// Moves the instance to a new life status.
    ///
    /// Returns false when the change is refused (a transition requested
    /// while another transition is in flight, unless the target is
    /// `CLOSING`). Every accepted change publishes a status-changed event
    /// and a life event; the self-relaunch collapse additionally publishes
    /// the `RELAUNCHING` pulse before settling back on `FOREGROUND`.
    pub fn set_life_status(&mut self, mut next: LifeStatus) -> bool {
        if self.life_status == next {
            debug!(
                instance_id = %self.instance_id,
                app_id = %self.app_id(),
                status = %next,
                "ignored life status change"
            );
            return true;
        }

        // CLOSING is privileged; an abort must always be possible.
        if self.life_status.is_transition() && next.is_transition() && next != LifeStatus::Closing {
            warn!(
                instance_id = %self.instance_id,
                app_id = %self.app_id(),
                from = %self.life_status,
                to = %next,
                "refused transition during transition"
            );
            return false;
        }

        match next {
            LifeStatus::Stop => {
                if self.life_status == LifeStatus::Closing {
                    info!(instance_id = %self.instance_id, "closed by manager");
                } else {
                    info!(instance_id = %self.instance_id, "closed by itself");
                }
            }
            LifeStatus::Preloading => {
                self.launch_count += 1;
            }
            LifeStatus::Launching => {
                self.launch_count += 1;
                if self.life_status == LifeStatus::Foreground {
                    // The app never leaves the screen: pulse RELAUNCHING,
                    // then hold FOREGROUND.
                    info!(
                        instance_id = %self.instance_id,
                        app_id = %self.app_id(),
                        "relaunching on screen"
                    );
                    self.life_status = LifeStatus::Relaunching;
                    self.publish_status();
                    next = LifeStatus::Foreground;
                } else if matches!(
                    self.life_status,
                    LifeStatus::Background | LifeStatus::Paused | LifeStatus::Preloaded
                ) {
                    next = LifeStatus::Relaunching;
                }
            }
            _ => {}
        }

        info!(
            instance_id = %self.instance_id,
            app_id = %self.app_id(),
            from = %self.life_status,
            to = %next,
            "life status changed"
        );
        self.life_status = next;

        if self.life_status.is_transition() {
            // The transition must complete within the deadline.
            self.start_killing_timer();
        } else {
            self.stop_killing_timer();
        }

        self.publish_status();
        self.publish_life_event();
        true
    }

    /// Returns true while the instance is in a transition state.
    pub fn is_transition(&self) -> bool {
        self.life_status.is_transition()
    }

    // ---------------------------
    // Kill-retry timer
    // ---------------------------

    fn start_killing_timer(&mut self) {
        self.stop_killing_timer();
        self.killing_timer = Some(TransitionTimer::start(
            self.instance_id.clone(),
            self.config.transition_timeout,
            self.ticks.clone(),
        ));
    }

    fn stop_killing_timer(&mut self) {
        self.killing_timer = None;
    }

    /// Returns true while the kill-retry timer is armed.
    pub fn is_killing_timer_armed(&self) -> bool {
        self.killing_timer.is_some()
    }

    // ---------------------------
    // Payload builders
    // ---------------------------

    /// Builds the launch payload handed to the process launcher.
    pub fn launch_payload(&self, request: &Request) -> Value {
        let mut params = if self.app_type() == AppType::NativeQml {
            json!({
                "main": self.launch_point.descriptor().main(),
                "appId": self.launch_point.app_id(),
                "params": request.params().clone(),
            })
        } else {
            json!({
                "event": "launch",
                "reason": request.reason(),
                "appId": request.app_id(),
                "nid": request.app_id(),
                "interfaceVersion": 2,
                "interfaceMethod": "registerApp",
                "parameters": request.params().clone(),
                "@system_native_app": true,
            })
        };
        if !self.preload.is_empty() {
            params["preload"] = json!(self.preload);
        }
        params
    }

    /// Builds the relaunch payload pushed over the registration channel.
    pub fn relaunch_payload(&self, request: &Request) -> Value {
        json!({
            "returnValue": true,
            "event": "relaunch",
            // TODO drop the duplicate once clients stop reading "message".
            "message": "relaunch",
            "parameters": request.params().clone(),
            "reason": request.reason(),
            "appId": request.app_id(),
        })
    }

    /// Builds the snapshot object for the `running` feed.
    pub fn to_json(&self) -> Value {
        let mut object = json!({
            "instanceId": self.instance_id,
            "launchPointId": self.launch_point_id(),
            "appId": self.app_id(),
            "displayId": self.display_id,
            "appType": self.app_type().as_str(),
            "lifeStatus": self.life_status.as_str(),
        });
        if let Some(process_id) = self.process_id {
            object["processId"] = json!(process_id);
        }
        if !self.web_process_id.is_empty() {
            object["webProcessId"] = json!(self.web_process_id);
        }
        object
    }

    fn publish_status(&self) {
        self.bus.publish(
            Event::now(EventKind::LifeStatusChanged)
                .with_instance(&self.instance_id)
                .with_app(self.app_id())
                .with_status(self.life_status)
                .with_payload(json!({
                    "instanceId": self.instance_id,
                    "launchPointId": self.launch_point_id(),
                    "appId": self.app_id(),
                    "displayId": self.display_id,
                    "status": self.life_status.as_str(),
                })),
        );
    }

    fn publish_life_event(&self) {
        self.bus.publish(
            Event::now(EventKind::LifeEvent)
                .with_instance(&self.instance_id)
                .with_app(self.app_id())
                .with_status(self.life_status)
                .with_payload(json!({
                    "instanceId": self.instance_id,
                    "appId": self.app_id(),
                    "event": self.life_status.as_str(),
                })),
        );
    }

    // ---------------------------
    // Attributes
    // ---------------------------

    pub fn launch_point(&self) -> &Arc<LaunchPoint> {
        &self.launch_point
    }

    pub fn launch_point_id(&self) -> &str {
        self.launch_point.launch_point_id()
    }

    pub fn app_id(&self) -> &str {
        self.launch_point.app_id()
    }

    pub fn app_type(&self) -> AppType {
        self.launch_point.app_type()
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn set_instance_id(&mut self, instance_id: impl Into<String>) {
        self.instance_id = instance_id.into();
    }

    pub fn display_id(&self) -> i32 {
        self.display_id
    }

    pub fn set_display_id(&mut self, display_id: i32) {
        self.display_id = display_id;
    }

    pub fn process_id(&self) -> Option<i32> {
        self.process_id
    }

    pub fn set_process_id(&mut self, process_id: i32) {
        self.process_id = Some(process_id);
    }

    pub fn web_process_id(&self) -> &str {
        &self.web_process_id
    }

    pub fn set_web_process_id(&mut self, web_process_id: impl Into<String>) {
        self.web_process_id = web_process_id.into();
    }

    pub fn life_status(&self) -> LifeStatus {
        self.life_status
    }

    pub fn launch_count(&self) -> u32 {
        self.launch_count
    }

    pub fn is_registered(&self) -> bool {
        self.registered_app.is_some()
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn set_token(&mut self, token: u64) {
        self.token = token;
    }

    pub fn context(&self) -> i32 {
        self.context
    }

    pub fn set_context(&mut self, context: i32) {
        self.context = context;
    }

    pub fn preload(&self) -> &str {
        &self.preload
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn no_splash(&self) -> bool {
        self.no_splash
    }

    pub fn spinner(&self) -> bool {
        self.spinner
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.is_hidden = hidden;
    }

    pub fn is_full_window(&self) -> bool {
        self.is_full_window
    }

    pub fn set_full_window(&mut self, full_window: bool) {
        self.is_full_window = full_window;
    }
}
