//! Delivery of session events back to the thread that owns the session.

use parking_lot::Mutex;
use tao::event_loop::EventLoopProxy;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::event::SessionEvent;

/// Posts events to the session's thread. Safe to call from device threads and
/// async tasks; events from one caller arrive in the order they were posted.
pub trait EventSink: Send + Sync + 'static {
    fn post(&self, event: SessionEvent);
}

impl EventSink for UnboundedSender<SessionEvent> {
    fn post(&self, event: SessionEvent) {
        if self.send(event).is_err() {
            debug!("session event dropped, receiver closed");
        }
    }
}

/// Sink feeding the tao event loop as user events.
pub struct ProxySink {
    proxy: Mutex<EventLoopProxy<SessionEvent>>,
}

impl ProxySink {
    pub fn new(proxy: EventLoopProxy<SessionEvent>) -> Self {
        Self {
            proxy: Mutex::new(proxy),
        }
    }
}

impl EventSink for ProxySink {
    fn post(&self, event: SessionEvent) {
        if self.proxy.lock().send_event(event).is_err() {
            debug!("session event dropped, event loop closed");
        }
    }
}
