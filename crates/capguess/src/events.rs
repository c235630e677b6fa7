//! Event sink for reconciliation signals.

/// Emitted when a match happens with no identity present and the UI
/// should offer sign-in.
pub const EVENT_AUTH_REQUIRED: &str = "pending-match:auth-required";
/// Emitted after a pending match lands in the guess store.
pub const EVENT_RESOLVED: &str = "pending-match:resolved";
/// Emitted when the player declines the sign-in offer.
pub const EVENT_DECLINED: &str = "pending-match:declined";

/// Sink for UI-facing events. A desktop shell forwards these to its
/// window, a server can bridge them to SSE.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: &str, data: serde_json::Value);
}

/// No-op event emitter for headless use and tests.
pub struct NoopEmitter;

impl EventEmitter for NoopEmitter {
    fn emit(&self, _event: &str, _data: serde_json::Value) {}
}
