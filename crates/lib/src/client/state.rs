//! Connection lifecycle for the chat client, kept free of I/O so it can be driven by any event loop.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Which path an outbound message takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPath {
    Streaming,
    OneShot,
}

/// Disconnected -> Connecting -> Connected -> Disconnected -> (scheduled) Connecting.
///
/// A close or error schedules one reconnect after a fixed delay. Further close events
/// while one is scheduled do not stack. The attempt only runs if the owner reports
/// itself active when the deadline is polled.
#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    state: ConnectionState,
    delay: Duration,
    reconnect_at: Option<Instant>,
}

impl ReconnectMachine {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            delay,
            reconnect_at: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Deadline of the scheduled reconnect, if any.
    pub fn reconnect_at(&self) -> Option<Instant> {
        self.reconnect_at
    }

    pub fn connecting(&mut self) {
        self.state = ConnectionState::Connecting;
        self.reconnect_at = None;
    }

    pub fn opened(&mut self) {
        self.state = ConnectionState::Connected;
        self.reconnect_at = None;
    }

    /// Close or error: go Disconnected and schedule a reconnect unless one is pending.
    pub fn closed(&mut self, now: Instant) -> Option<Instant> {
        self.state = ConnectionState::Disconnected;
        if self.reconnect_at.is_none() {
            self.reconnect_at = Some(now + self.delay);
        }
        self.reconnect_at
    }

    /// Owner became active again while disconnected with nothing scheduled.
    pub fn resumed(&mut self, now: Instant) -> Option<Instant> {
        if self.state == ConnectionState::Disconnected && self.reconnect_at.is_none() {
            self.reconnect_at = Some(now + self.delay);
        }
        self.reconnect_at
    }

    /// Consume a due reconnect. Returns true when the caller should connect now.
    /// An attempt that comes due while inactive is dropped.
    pub fn poll(&mut self, now: Instant, active: bool) -> bool {
        match self.reconnect_at {
            Some(at) if now >= at => {
                self.reconnect_at = None;
                if !active {
                    log::debug!("reconnect due but client inactive, skipping");
                    return false;
                }
                self.state == ConnectionState::Disconnected
            }
            _ => false,
        }
    }

    pub fn send_path(&self) -> SendPath {
        match self.state {
            ConnectionState::Connected => SendPath::Streaming,
            ConnectionState::Disconnected | ConnectionState::Connecting => SendPath::OneShot,
        }
    }
}

/// The one user message currently awaiting a reply.
#[derive(Debug, Default)]
pub struct PendingReply {
    awaiting: Option<String>,
}

impl PendingReply {
    /// Start waiting for `text`. Returns false if another message is still awaiting its reply.
    pub fn begin(&mut self, text: &str) -> bool {
        if self.awaiting.is_some() {
            return false;
        }
        self.awaiting = Some(text.to_string());
        true
    }

    pub fn finish(&mut self) -> Option<String> {
        self.awaiting.take()
    }

    pub fn awaiting(&self) -> Option<&str> {
        self.awaiting.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(3);

    #[test]
    fn lifecycle_and_send_path() {
        let mut m = ReconnectMachine::new(DELAY);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.send_path(), SendPath::OneShot);

        m.connecting();
        assert_eq!(m.send_path(), SendPath::OneShot);
        m.opened();
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(m.send_path(), SendPath::Streaming);

        let now = Instant::now();
        assert_eq!(m.closed(now), Some(now + DELAY));
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.send_path(), SendPath::OneShot);
    }

    #[test]
    fn close_and_error_schedule_a_single_attempt() {
        let mut m = ReconnectMachine::new(DELAY);
        m.opened();
        let t0 = Instant::now();
        let first = m.closed(t0);
        // error right after close does not push the deadline or stack another attempt
        let second = m.closed(t0 + Duration::from_secs(1));
        assert_eq!(first, second);

        assert!(!m.poll(t0 + Duration::from_secs(2), true));
        assert!(m.poll(t0 + DELAY, true));
        assert!(!m.poll(t0 + DELAY * 2, true));
        assert_eq!(m.reconnect_at(), None);
    }

    #[test]
    fn inactive_owner_drops_due_attempt() {
        let mut m = ReconnectMachine::new(DELAY);
        let t0 = Instant::now();
        m.closed(t0);
        assert!(!m.poll(t0 + DELAY, false));
        assert_eq!(m.reconnect_at(), None);

        let t1 = t0 + DELAY * 2;
        assert_eq!(m.resumed(t1), Some(t1 + DELAY));
        assert!(m.poll(t1 + DELAY, true));
    }

    #[test]
    fn resumed_while_connected_schedules_nothing() {
        let mut m = ReconnectMachine::new(DELAY);
        m.opened();
        assert_eq!(m.resumed(Instant::now()), None);
    }

    #[test]
    fn connecting_clears_schedule() {
        let mut m = ReconnectMachine::new(DELAY);
        let t0 = Instant::now();
        m.closed(t0);
        m.connecting();
        assert_eq!(m.reconnect_at(), None);
        assert!(!m.poll(t0 + DELAY, true));
    }

    #[test]
    fn one_pending_reply_at_a_time() {
        let mut p = PendingReply::default();
        assert!(p.begin("first"));
        assert!(!p.begin("second"));
        assert_eq!(p.awaiting(), Some("first"));
        assert_eq!(p.finish().as_deref(), Some("first"));
        assert!(p.begin("second"));
    }
}
