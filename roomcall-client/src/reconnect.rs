//! Reconnect policy for the signaling connection.

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use std::time::Duration;

use crate::config::ReconnectConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    /// Never connected yet
    Idle,
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    Failed { attempts: u32 },
}

pub struct Reconnector {
    config: ReconnectConfig,
    state: ReconnectState,
    backoff: Option<ExponentialBackoff>,
    attempts: u32,
}

impl Reconnector {
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            state: ReconnectState::Idle,
            backoff: None,
            attempts: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ReconnectState {
        self.state
    }

    fn build_backoff(config: &ReconnectConfig) -> ExponentialBackoff {
        let builder = ExponentialBuilder::default()
            .with_min_delay(config.min_delay())
            .with_max_delay(config.max_delay())
            .with_max_times(config.max_attempts as usize);
        if config.jitter {
            builder.with_jitter().build()
        } else {
            builder.build()
        }
    }

    /// A connection is up; the next loss starts a fresh schedule
    pub fn on_connected(&mut self) {
        self.state = ReconnectState::Connected;
        self.backoff = None;
        self.attempts = 0;
    }

    /// The connection dropped or a connect attempt failed. Returns how long
    /// to wait before the next attempt, or `Failed` once the schedule is spent.
    pub fn on_disconnected(&mut self) -> ReconnectState {
        if matches!(self.state, ReconnectState::Failed { .. }) {
            return self.state;
        }

        let config = &self.config;
        let backoff = self
            .backoff
            .get_or_insert_with(|| Self::build_backoff(config));
        self.state = match backoff.next() {
            Some(delay) => {
                self.attempts += 1;
                ReconnectState::Reconnecting {
                    attempt: self.attempts,
                    delay,
                }
            }
            None => ReconnectState::Failed {
                attempts: self.attempts,
            },
        };
        self.state
    }
}
