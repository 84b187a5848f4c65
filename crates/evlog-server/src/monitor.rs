use std::time::Duration;

use tracing::{debug, error, trace};

use crate::error::ServerResult;
use crate::manager::EventManager;

/// Where the request loop stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Queued work may exist; take one call and look again.
    Draining,
    /// Nothing queued; block until a call arrives or the timeout elapses.
    Idle,
}

/// Drives an [`EventManager`] from its bus, one request at a time.
#[derive(Debug)]
pub struct EventMonitor {
    manager: EventManager,
    idle_timeout: Duration,
    state: LoopState,
}

impl EventMonitor {
    pub fn new(manager: EventManager, idle_timeout: Duration) -> Self {
        Self {
            manager,
            idle_timeout,
            state: LoopState::Draining,
        }
    }

    pub fn manager(&self) -> &EventManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut EventManager {
        &mut self.manager
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Advance the loop by one transition.
    ///
    /// Returns `Err` only when the bus endpoint itself has failed.
    pub async fn step(&mut self) -> ServerResult<LoopState> {
        self.state = match self.state {
            LoopState::Draining => match self.manager.bus_mut().process()? {
                Some(dispatch) => {
                    trace!(path = %dispatch.path, "dispatching request");
                    self.manager.handle(dispatch);
                    LoopState::Draining
                }
                None => LoopState::Idle,
            },
            LoopState::Idle => {
                self.manager.bus_mut().wait(self.idle_timeout).await?;
                LoopState::Draining
            }
        };
        Ok(self.state)
    }

    /// Run until the bus endpoint fails.
    pub async fn run(&mut self) -> ServerResult<()> {
        debug!(idle_timeout = ?self.idle_timeout, "request loop started");
        loop {
            if let Err(e) = self.step().await {
                error!(error = %e, "request loop stopped");
                return Err(e);
            }
        }
    }
}
