//! # In-flight launch state.
//!
//! A [`LaunchingItem`] tracks one launch request as the orchestrator drives
//! it through its stages. The item carries the effective target (which may
//! differ from the requested one after a redirection), the caller identity,
//! launch policy flags, the outstanding launcher token, and the outcome.
//!
//! ## Stages
//! ```text
//! NONE ──► PRELAUNCH ──► MEMORY_CHECK ──► LAUNCH ──► DONE
//!             │               │             (errors short-circuit to DONE)
//!             └── redirect ───┘  target app id / params may be replaced
//! ```

use std::time::Instant;

use serde_json::{json, Value};

use crate::error::{ErrorCode, RequestError};
use crate::requests::Request;

/// Pipeline stage of an in-flight launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStage {
    None,
    Prelaunch,
    MemoryCheck,
    Launch,
    Done,
}

/// Ephemeral state for one launch driven by the orchestrator.
pub struct LaunchingItem {
    app_id: String,
    requested_app_id: String,
    redirected: bool,
    stage: LaunchStage,
    sub_stage: i32,
    params: Value,
    caller_id: String,
    caller_pid: String,
    show_splash: bool,
    show_spinner: bool,
    keep_alive: bool,
    automatic_launch: bool,
    preload: String,
    return_token: u64,
    return_payload: Value,
    error: Option<RequestError>,
    launch_start: Instant,
    launch_reason: String,
}

impl LaunchingItem {
    /// Creates an item for a client request, capturing the requested
    /// target before any redirection.
    pub fn new(request: &Request) -> Self {
        let params = request.params().clone();
        Self {
            app_id: request.app_id().to_string(),
            requested_app_id: request.app_id().to_string(),
            redirected: false,
            stage: LaunchStage::None,
            sub_stage: 0,
            show_splash: !params["noSplash"].as_bool().unwrap_or(false),
            show_spinner: params["spinner"].as_bool().unwrap_or(true),
            keep_alive: params["keepAlive"].as_bool().unwrap_or(false),
            automatic_launch: params["automaticLaunch"].as_bool().unwrap_or(false),
            preload: params["preload"].as_str().unwrap_or_default().to_string(),
            params,
            caller_id: request.caller_id().to_string(),
            caller_pid: request.caller_pid().to_string(),
            return_token: 0,
            return_payload: json!({}),
            error: None,
            launch_start: Instant::now(),
            launch_reason: request.reason().to_string(),
        }
    }

    /// Redirects the launch to another app, replacing the params.
    ///
    /// The originally requested app id is preserved for the client's final
    /// response.
    pub fn set_redirection(&mut self, target_app_id: impl Into<String>, new_params: Value) {
        self.app_id = target_app_id.into();
        self.params = new_params;
        self.redirected = true;
    }

    /// Effective target app id (post-redirection).
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// App id the client originally asked for.
    pub fn requested_app_id(&self) -> &str {
        &self.requested_app_id
    }

    pub fn is_redirected(&self) -> bool {
        self.redirected
    }

    pub fn stage(&self) -> LaunchStage {
        self.stage
    }

    pub fn set_stage(&mut self, stage: LaunchStage) {
        self.stage = stage;
    }

    pub fn sub_stage(&self) -> i32 {
        self.sub_stage
    }

    pub fn set_sub_stage(&mut self, sub_stage: i32) {
        self.sub_stage = sub_stage;
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    pub fn caller_pid(&self) -> &str {
        &self.caller_pid
    }

    pub fn show_splash(&self) -> bool {
        self.show_splash
    }

    pub fn show_spinner(&self) -> bool {
        self.show_spinner
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn automatic_launch(&self) -> bool {
        self.automatic_launch
    }

    pub fn preload(&self) -> &str {
        &self.preload
    }

    /// Token of the outstanding launcher reply, 0 when none.
    pub fn return_token(&self) -> u64 {
        self.return_token
    }

    pub fn set_return_token(&mut self, token: u64) {
        self.return_token = token;
    }

    pub fn reset_return_token(&mut self) {
        self.return_token = 0;
    }

    /// Payload to deliver to the client on completion.
    pub fn return_payload(&self) -> &Value {
        &self.return_payload
    }

    pub fn set_return_payload(&mut self, payload: Value) {
        self.return_payload = payload;
    }

    /// Fails the item; the pipeline short-circuits to DONE.
    pub fn set_error(&mut self, code: ErrorCode, text: impl Into<String>) {
        self.error = Some(RequestError::new(code, text));
    }

    pub fn error(&self) -> Option<&RequestError> {
        self.error.as_ref()
    }

    /// Time the launch entered the pipeline.
    pub fn launch_start(&self) -> Instant {
        self.launch_start
    }

    pub fn launch_reason(&self) -> &str {
        &self.launch_reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::Replier;

    fn request_for(app_id: &str, params: Value) -> Request {
        let (replier, _rx) = Replier::channel();
        Request::new(replier)
            .with_app_id(app_id)
            .with_reason("test")
            .with_params(params)
    }

    #[test]
    fn captures_policy_flags_from_params() {
        let request = request_for(
            "tv.menu",
            json!({ "noSplash": true, "spinner": false, "keepAlive": true, "preload": "full" }),
        );
        let item = LaunchingItem::new(&request);

        assert!(!item.show_splash());
        assert!(!item.show_spinner());
        assert!(item.keep_alive());
        assert_eq!(item.preload(), "full");
        assert_eq!(item.stage(), LaunchStage::None);
    }

    #[test]
    fn redirection_preserves_the_requested_app_id() {
        let request = request_for("tv.menu", json!({ "x": 1 }));
        let mut item = LaunchingItem::new(&request);

        item.set_redirection("tv.firstuse", json!({ "page": "welcome" }));

        assert!(item.is_redirected());
        assert_eq!(item.app_id(), "tv.firstuse");
        assert_eq!(item.requested_app_id(), "tv.menu");
        assert_eq!(item.params(), &json!({ "page": "welcome" }));
    }

    #[test]
    fn errors_are_carried_as_values() {
        let request = request_for("tv.menu", json!({}));
        let mut item = LaunchingItem::new(&request);

        item.set_error(ErrorCode::General, "no such launch point");
        let error = item.error().unwrap();
        assert_eq!(error.code, ErrorCode::General);
        assert_eq!(error.text, "no such launch point");
    }

    #[test]
    fn return_token_resets_to_zero() {
        let request = request_for("tv.menu", json!({}));
        let mut item = LaunchingItem::new(&request);

        item.set_return_token(77);
        assert_eq!(item.return_token(), 77);
        item.reset_return_token();
        assert_eq!(item.return_token(), 0);
    }
}
