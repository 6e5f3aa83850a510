//! # Client requests and reply channels.
//!
//! A [`Request`] is one inbound client call (launch, pause, close,
//! registerApp, running). It carries a partial app identity, arbitrary JSON
//! params, a human-readable reason, and a [`Replier`] through which the
//! outcome is delivered.
//!
//! ## Rules
//! - The core resolves partial identities and **writes the full identity
//!   back** onto the request, so downstream stages and the final reply see
//!   the same resolved instance.
//! - A [`Replier`] delivers one reply for ordinary requests. For
//!   `registerApp` the same handle is held open by the app afterwards and
//!   becomes its outbound event channel.
//! - Failures are values: `{ returnValue: false, errorCode, errorText }`.

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::error::RequestError;

/// Outbound reply handle for a request.
///
/// Wraps an unbounded sender of JSON payloads. The receiving side belongs to
/// the RPC transport (or to a test). Sends never block; a send fails only
/// when the receiver is gone.
#[derive(Clone)]
pub struct Replier {
    tx: mpsc::UnboundedSender<Value>,
}

impl Replier {
    /// Creates a connected replier/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Sends a payload to the client. Returns false if the client side is
    /// gone.
    pub fn send(&self, payload: Value) -> bool {
        self.tx.send(payload).is_ok()
    }
}

/// One inbound client call.
pub struct Request {
    instance_id: String,
    launch_point_id: String,
    app_id: String,
    display_id: i32,
    params: Value,
    reason: String,
    caller_id: String,
    caller_pid: String,
    token: u64,
    replier: Replier,
}

impl Request {
    /// Creates an empty request bound to a reply channel.
    pub fn new(replier: Replier) -> Self {
        Self {
            instance_id: String::new(),
            launch_point_id: String::new(),
            app_id: String::new(),
            display_id: -1,
            params: json!({}),
            reason: String::new(),
            caller_id: String::new(),
            caller_pid: String::new(),
            token: 0,
            replier,
        }
    }

    /// Sets the target app id.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Sets the target launch point id.
    pub fn with_launch_point_id(mut self, launch_point_id: impl Into<String>) -> Self {
        self.launch_point_id = launch_point_id.into();
        self
    }

    /// Sets the target instance id.
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    /// Sets the target display (-1 = any).
    pub fn with_display_id(mut self, display_id: i32) -> Self {
        self.display_id = display_id;
        self
    }

    /// Sets the request params.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Sets the human-readable reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Sets the caller identity.
    pub fn with_caller(mut self, id: impl Into<String>, pid: impl Into<String>) -> Self {
        self.caller_id = id.into();
        self.caller_pid = pid.into();
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn launch_point_id(&self) -> &str {
        &self.launch_point_id
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn display_id(&self) -> i32 {
        self.display_id
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    pub fn caller_pid(&self) -> &str {
        &self.caller_pid
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn replier(&self) -> &Replier {
        &self.replier
    }

    pub fn set_instance_id(&mut self, instance_id: impl Into<String>) {
        self.instance_id = instance_id.into();
    }

    pub fn set_launch_point_id(&mut self, launch_point_id: impl Into<String>) {
        self.launch_point_id = launch_point_id.into();
    }

    pub fn set_app_id(&mut self, app_id: impl Into<String>) {
        self.app_id = app_id.into();
    }

    pub fn set_display_id(&mut self, display_id: i32) {
        self.display_id = display_id;
    }

    pub fn set_token(&mut self, token: u64) {
        self.token = token;
    }

    /// Builds the success payload with the resolved identity.
    pub fn success_payload(&self) -> Value {
        let mut payload = json!({ "returnValue": true });
        if !self.instance_id.is_empty() {
            payload["instanceId"] = json!(self.instance_id);
        }
        if !self.launch_point_id.is_empty() {
            payload["launchPointId"] = json!(self.launch_point_id);
        }
        if !self.app_id.is_empty() {
            payload["appId"] = json!(self.app_id);
        }
        if self.display_id >= 0 {
            payload["displayId"] = json!(self.display_id);
        }
        payload
    }

    /// Answers the request with success and the resolved identity.
    pub fn reply_ok(&self) -> bool {
        self.replier.send(self.success_payload())
    }

    /// Answers the request with a failure value.
    pub fn reply_err(&self, err: &RequestError) -> bool {
        self.replier.send(json!({
            "returnValue": false,
            "errorCode": err.code.code(),
            "errorText": err.text,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;

    #[test]
    fn success_payload_carries_resolved_identity() {
        let (replier, mut rx) = Replier::channel();
        let request = Request::new(replier)
            .with_app_id("tv.menu")
            .with_instance_id("abc0")
            .with_display_id(0);
        assert!(request.reply_ok());

        let payload = rx.try_recv().expect("reply was sent");
        assert_eq!(payload["returnValue"], true);
        assert_eq!(payload["appId"], "tv.menu");
        assert_eq!(payload["instanceId"], "abc0");
        assert_eq!(payload["displayId"], 0);
    }

    #[test]
    fn error_reply_is_a_value() {
        let (replier, mut rx) = Replier::channel();
        let request = Request::new(replier).with_app_id("tv.menu");
        request.reply_err(&RequestError::invalid_param("no target"));

        let payload = rx.try_recv().expect("reply was sent");
        assert_eq!(payload["returnValue"], false);
        assert_eq!(payload["errorCode"], 2);
        assert_eq!(payload["errorText"], "no target");
    }

    #[test]
    fn send_fails_when_client_is_gone() {
        let (replier, rx) = Replier::channel();
        drop(rx);
        let request = Request::new(replier);
        assert!(!request.reply_ok());
    }
}
