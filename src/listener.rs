use crate::event::Event;
use crate::handle::EventHandle;
use stakker::{after, fwd, Fwd, CX};
use std::time::Duration;

/// Actor that drives an [`EventHandle`] from a Stakker event loop
///
/// The backlog is polled without blocking every `interval`, and each
/// event is forwarded to `output` in order.  With [`Listener::latest`]
/// enabled only the most recent event of each poll is forwarded, for
/// consumers that only care about the current state.
///
/// If the handle fails (dispatcher shut down, session failed) the
/// actor terminates with `ActorDied::Failed` carrying the error.
///
/// [`EventHandle`]: struct.EventHandle.html
/// [`Listener::latest`]: struct.Listener.html#method.latest
pub struct Listener {
    handle: EventHandle,
    output: Fwd<Event>,
    interval: Duration,
    latest: bool,
}

impl Listener {
    pub fn init(
        cx: CX![],
        handle: EventHandle,
        output: Fwd<Event>,
        interval: Duration,
    ) -> Option<Self> {
        let mut this = Self {
            handle,
            output,
            interval,
            latest: false,
        };
        this.tick(cx);
        Some(this)
    }

    /// Enable or disable coalescing of each poll's events down to the
    /// most recent one
    pub fn latest(&mut self, _cx: CX![], enable: bool) {
        self.latest = enable;
    }

    fn tick(&mut self, cx: CX![]) {
        loop {
            let polled = if self.latest {
                self.handle.poll_latest_async()
            } else {
                self.handle.poll_async()
            };
            match polled {
                Ok(Some(ev)) => fwd!([self.output], ev),
                Ok(None) => break,
                Err(e) => {
                    cx.fail(e);
                    return;
                }
            }
        }
        after!(self.interval, [cx], tick());
    }
}
