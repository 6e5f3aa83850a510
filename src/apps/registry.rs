//! # Registry of live application instances.
//!
//! An insertion-ordered collection keyed by instance id, with secondary
//! lookups by launch point, app id, process, token, and renderer process.
//! All secondaries are linear scans over the primary store; the population
//! is tens of instances at most.
//!
//! ## Rules
//! - The registry exclusively owns every [`RunningApp`]; lookups hand out
//!   borrows scoped to the caller's dispatch turn.
//! - Creation does **not** insert: the orchestrator adds an instance
//!   explicitly once it should become visible.
//! - Every removal path drives the app to `STOP` exactly once and publishes
//!   the `Running` snapshot exactly once.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::catalog::{AppType, LaunchPoint, LaunchPointCatalog};
use crate::config::Config;
use crate::events::{Bus, Event, EventKind};
use crate::requests::Request;

use super::running_app::RunningApp;
use super::status::LifeStatus;
use super::timer::TickSender;

/// Indexed collection of all live instances.
pub struct Registry {
    apps: Vec<RunningApp>,
    config: Arc<Config>,
    catalog: Arc<LaunchPointCatalog>,
    bus: Bus,
    ticks: TickSender,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(
        config: Arc<Config>,
        catalog: Arc<LaunchPointCatalog>,
        bus: Bus,
        ticks: TickSender,
    ) -> Self {
        Self {
            apps: Vec::new(),
            config,
            catalog,
            bus,
            ticks,
        }
    }

    // ---------------------------
    // Creation (does not insert)
    // ---------------------------

    /// Creates an instance for a client request.
    ///
    /// Prefers the request's launch point id and falls back to the app id's
    /// canonical `"<appId>_default"` launch point. The new instance takes
    /// the request's instance/display identity, and the resolved launch
    /// point and app ids are written back onto the request so downstream
    /// stages see a fully resolved target.
    pub fn create_by_request(&self, request: &mut Request) -> Option<RunningApp> {
        let mut app = if !request.launch_point_id().is_empty() {
            self.create_by_launch_point_id(request.launch_point_id())?
        } else if !request.app_id().is_empty() {
            self.create_by_app_id(request.app_id())?
        } else {
            return None;
        };

        app.load_request(request);
        app.set_instance_id(request.instance_id());
        app.set_display_id(request.display_id());

        request.set_launch_point_id(app.launch_point_id());
        request.set_app_id(app.app_id());
        Some(app)
    }

    /// Rehydrates an instance from a snapshot object.
    ///
    /// All of `launchPointId`, `instanceId`, `processId`, and `displayId`
    /// are required.
    pub fn create_by_json(&self, snapshot: &Value) -> Option<RunningApp> {
        let launch_point_id = snapshot["launchPointId"].as_str()?;
        let instance_id = snapshot["instanceId"].as_str()?;
        let process_id = snapshot["processId"].as_i64()?;
        let display_id = snapshot["displayId"].as_i64()?;

        let mut app = self.create_by_launch_point_id(launch_point_id)?;
        app.set_instance_id(instance_id);
        app.set_process_id(process_id as i32);
        app.set_display_id(display_id as i32);
        Some(app)
    }

    /// Creates an instance for an app's canonical default launch point.
    pub fn create_by_app_id(&self, app_id: &str) -> Option<RunningApp> {
        let launch_point_id = format!("{app_id}_default");
        self.create_by_launch_point_id(&launch_point_id)
    }

    /// Creates an instance for a launch point.
    pub fn create_by_launch_point_id(&self, launch_point_id: &str) -> Option<RunningApp> {
        let Some(launch_point) = self.catalog.get_by_launch_point_id(launch_point_id) else {
            warn!(launch_point_id, "cannot find proper launch point");
            return None;
        };
        Some(RunningApp::new(
            launch_point,
            Arc::clone(&self.config),
            self.bus.clone(),
            self.ticks.clone(),
        ))
    }

    // ---------------------------
    // Lookup
    // ---------------------------

    /// Resolves a request's partial identity to a live instance.
    ///
    /// On platforms without multi-instance support the display id is
    /// coerced to -1 ("any display") before matching, so per-app queries
    /// return the first match. On a hit, the resolved identity is written
    /// back onto the request.
    pub fn get_by_request(&mut self, request: &mut Request) -> Option<&mut RunningApp> {
        let display_id = if self.config.multi_instance {
            request.display_id()
        } else {
            -1
        };

        let index = self.position_by_ids(
            request.instance_id(),
            request.launch_point_id(),
            request.app_id(),
            display_id,
        )?;

        {
            let app = &self.apps[index];
            request.set_instance_id(app.instance_id());
            request.set_launch_point_id(app.launch_point_id());
            request.set_app_id(app.app_id());
        }
        Some(&mut self.apps[index])
    }

    /// Looks up by a partial identity with priority-then-validate:
    /// the primary key is picked in order instanceId → launchPointId →
    /// appId, then every provided field must agree with the found instance.
    pub fn get_by_ids(
        &self,
        instance_id: &str,
        launch_point_id: &str,
        app_id: &str,
        display_id: i32,
    ) -> Option<&RunningApp> {
        self.position_by_ids(instance_id, launch_point_id, app_id, display_id)
            .map(|index| &self.apps[index])
    }

    fn position_by_ids(
        &self,
        instance_id: &str,
        launch_point_id: &str,
        app_id: &str,
        display_id: i32,
    ) -> Option<usize> {
        let index = if !instance_id.is_empty() {
            self.apps.iter().position(|a| a.instance_id() == instance_id)
        } else if !launch_point_id.is_empty() {
            self.position_by_key(display_id, |a| a.launch_point_id() == launch_point_id)
        } else if !app_id.is_empty() {
            self.position_by_key(display_id, |a| a.app_id() == app_id)
        } else {
            None
        }?;

        let app = &self.apps[index];
        if !instance_id.is_empty() && instance_id != app.instance_id() {
            return None;
        }
        if !launch_point_id.is_empty() && launch_point_id != app.launch_point_id() {
            return None;
        }
        if !app_id.is_empty() && app_id != app.app_id() {
            return None;
        }
        if display_id != -1 && display_id != app.display_id() {
            return None;
        }
        Some(index)
    }

    fn position_by_key(&self, display_id: i32, matches: impl Fn(&RunningApp) -> bool) -> Option<usize> {
        self.apps
            .iter()
            .position(|a| matches(a) && (display_id == -1 || a.display_id() == display_id))
    }

    /// Looks up by instance id.
    pub fn get_by_instance_id(&self, instance_id: &str) -> Option<&RunningApp> {
        if instance_id.is_empty() {
            return None;
        }
        self.apps.iter().find(|a| a.instance_id() == instance_id)
    }

    /// Looks up by instance id, mutably.
    pub fn get_by_instance_id_mut(&mut self, instance_id: &str) -> Option<&mut RunningApp> {
        if instance_id.is_empty() {
            return None;
        }
        self.apps.iter_mut().find(|a| a.instance_id() == instance_id)
    }

    /// Looks up by the outstanding launcher token.
    pub fn get_by_token(&self, token: u64) -> Option<&RunningApp> {
        self.apps.iter().find(|a| a.token() == token)
    }

    /// Looks up by the outstanding launcher token, mutably.
    pub fn get_by_token_mut(&mut self, token: u64) -> Option<&mut RunningApp> {
        self.apps.iter_mut().find(|a| a.token() == token)
    }

    /// Looks up by launch point id, optionally restricted to a display.
    pub fn get_by_launch_point_id(
        &self,
        launch_point_id: &str,
        display_id: i32,
    ) -> Option<&RunningApp> {
        self.position_by_key(display_id, |a| a.launch_point_id() == launch_point_id)
            .map(|index| &self.apps[index])
    }

    /// Looks up by app id, optionally restricted to a display.
    pub fn get_by_app_id(&self, app_id: &str, display_id: i32) -> Option<&RunningApp> {
        self.position_by_key(display_id, |a| a.app_id() == app_id)
            .map(|index| &self.apps[index])
    }

    /// Looks up by the renderer process id.
    pub fn get_by_web_process_id(&self, web_process_id: &str) -> Option<&RunningApp> {
        if web_process_id.is_empty() {
            return None;
        }
        self.apps.iter().find(|a| a.web_process_id() == web_process_id)
    }

    // ---------------------------
    // Mutation
    // ---------------------------

    /// Inserts an instance into the registry.
    ///
    /// Rejects an empty instance id and duplicate instance ids. On success
    /// the `Running` snapshot is published.
    pub fn add(&mut self, app: RunningApp) -> bool {
        if app.instance_id().is_empty() {
            return false;
        }
        if self.get_by_instance_id(app.instance_id()).is_some() {
            info!(instance_id = %app.instance_id(), "instance id already exists");
            return false;
        }
        self.apps.push(app);
        self.on_add(self.apps.len() - 1);
        true
    }

    /// Removes an instance by instance id.
    pub fn remove_by_instance_id(&mut self, instance_id: &str) -> bool {
        match self.apps.iter().position(|a| a.instance_id() == instance_id) {
            Some(index) => {
                let app = self.apps.remove(index);
                self.on_remove(app);
                true
            }
            None => false,
        }
    }

    /// Removes an instance by process id.
    pub fn remove_by_pid(&mut self, process_id: i32) -> bool {
        match self.apps.iter().position(|a| a.process_id() == Some(process_id)) {
            Some(index) => {
                let app = self.apps.remove(index);
                self.on_remove(app);
                true
            }
            None => false,
        }
    }

    /// Removes every instance of the given app type.
    pub fn remove_all_by_type(&mut self, app_type: AppType) {
        self.remove_all_where(|a| a.app_type() == app_type);
    }

    /// Removes every instance of the given app type tagged with `context`.
    pub fn remove_all_by_context(&mut self, app_type: AppType, context: i32) {
        self.remove_all_where(|a| a.app_type() == app_type && a.context() == context);
    }

    /// Removes every instance launched from `launch_point`.
    pub fn remove_all_by_launch_point(&mut self, launch_point: &Arc<LaunchPoint>) {
        self.remove_all_where(|a| Arc::ptr_eq(a.launch_point(), launch_point));
    }

    fn remove_all_where(&mut self, predicate: impl Fn(&RunningApp) -> bool) {
        let mut index = 0;
        while index < self.apps.len() {
            if predicate(&self.apps[index]) {
                let app = self.apps.remove(index);
                self.on_remove(app);
            } else {
                index += 1;
            }
        }
    }

    /// Tags every instance of the given app type with a rendering context.
    pub fn set_context(&mut self, app_type: AppType, context: i32) {
        for app in self.apps.iter_mut().filter(|a| a.app_type() == app_type) {
            app.set_context(context);
        }
    }

    // ---------------------------
    // Enumeration
    // ---------------------------

    /// Returns true if any instance (optionally: any devmode instance) is
    /// currently in a transition state.
    pub fn is_transition(&self, devmode_only: bool) -> bool {
        self.apps.iter().any(|a| {
            if devmode_only {
                a.launch_point().descriptor().is_devmode() && a.is_transition()
            } else {
                a.is_transition()
            }
        })
    }

    /// Builds the `running` snapshot array.
    pub fn to_json(&self, devmode_only: bool) -> Value {
        let running: Vec<Value> = self
            .apps
            .iter()
            .filter(|a| !devmode_only || a.launch_point().descriptor().is_devmode())
            .map(|a| a.to_json())
            .collect();
        Value::Array(running)
    }

    /// Returns the number of live instances.
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// Returns true when no instance is live.
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    // ---------------------------
    // Hooks
    // ---------------------------

    fn on_add(&self, index: usize) {
        // Status should be settled before the instance becomes visible.
        info!(instance_id = %self.apps[index].instance_id(), "instance added");
        self.publish_running();
    }

    fn on_remove(&self, mut app: RunningApp) {
        info!(instance_id = %app.instance_id(), "instance removed");
        app.set_life_status(LifeStatus::Stop);
        self.publish_running();
    }

    fn publish_running(&self) {
        self.bus.publish(
            Event::now(EventKind::Running).with_payload(json!({ "running": self.to_json(false) })),
        );
    }
}
