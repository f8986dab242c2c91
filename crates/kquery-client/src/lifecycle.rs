//! Initialize/dispose guard for a context
//!
//! One mutex guards a three-state value. Disposing cancels an initialization
//! that is still running, and initializing after dispose fails right away.

use std::future::Future;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};

#[derive(Debug)]
enum State<R> {
    Uninitialized,
    Initialized(R),
    Disposed,
}

#[derive(Debug)]
pub struct Lifecycle<R> {
    state: Mutex<State<R>>,
    shutdown: CancellationToken,
}

impl<R: Clone> Lifecycle<R> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Uninitialized),
            shutdown: CancellationToken::new(),
        }
    }

    /// Fires on dispose. Queries of the context hang child tokens off it.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn is_disposed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Return the initialized resource, running `init` on first use.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        if self.shutdown.is_cancelled() {
            return Err(ClientError::Disposed);
        }

        let mut state = self.state.lock().await;
        match &*state {
            State::Initialized(resource) => return Ok(resource.clone()),
            State::Disposed => return Err(ClientError::Disposed),
            State::Uninitialized => {}
        }

        let resource = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(ClientError::Disposed),
            resource = init() => resource?,
        };
        *state = State::Initialized(resource.clone());
        Ok(resource)
    }

    /// Move to `Disposed`, returning the resource if there was one.
    pub async fn dispose(&self) -> Option<R> {
        self.shutdown.cancel();
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, State::Disposed) {
            State::Initialized(resource) => Some(resource),
            State::Uninitialized | State::Disposed => None,
        }
    }
}

impl<R: Clone> Default for Lifecycle<R> {
    fn default() -> Self {
        Self::new()
    }
}
