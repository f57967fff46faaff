use std::time::Duration;

/// How the interaction lock taken with [`EventHandle::lock`] is
/// treated by the dispatcher
///
/// [`EventHandle::lock`]: struct.EventHandle.html#method.lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// The lock only records intent.  All handles keep receiving
    /// events and may issue output; the application is expected to
    /// leave events alone whilst another handle holds the lock.
    Advisory,
    /// Whilst a handle holds the lock, only that handle receives
    /// events, and output or session calls from any other handle
    /// fail with `Error::Locked`.  Calls made directly on the
    /// `Dispatcher` are never refused.
    Exclusive,
}

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// How long an incomplete escape sequence may sit in the input
    /// buffer before it is decoded as-is.  A lone `Esc` keypress is
    /// only reported once this expires.
    pub escape_timeout: Duration,
    /// How long `sync_pos` waits for the terminal to answer a cursor
    /// position request.
    pub report_timeout: Duration,
    /// Treatment of the interaction lock.
    pub lock_policy: LockPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            escape_timeout: Duration::from_millis(100),
            report_timeout: Duration::from_millis(500),
            lock_policy: LockPolicy::Advisory,
        }
    }
}

impl Config {
    /// Sets the escape sequence timeout.
    #[must_use]
    pub fn with_escape_timeout(mut self, timeout: Duration) -> Self {
        self.escape_timeout = timeout;
        self
    }

    /// Sets the cursor report timeout.
    #[must_use]
    pub fn with_report_timeout(mut self, timeout: Duration) -> Self {
        self.report_timeout = timeout;
        self
    }

    /// Sets the lock policy.
    #[must_use]
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }
}
