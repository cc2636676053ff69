// Copyright 2025 Eric Jingryd (tidynest@proton.me)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Conflict resolution state machine
//!
//! One instance drives one request for one binding id:
//!
//! ```text
//! Idle -> Requesting -> Registered
//!                    -> AwaitingUserChoice -> RetryingWithOverride  -> Registered | Failed
//!                                          -> DisablingThenRetrying -> Registered | Failed
//!                                          -> Cancelled
//! ```
//!
//! Each instance carries the registry token issued when it started. Starting
//! a new instance for the same id invalidates the token, and every action on
//! the old instance then ends in `Superseded` instead of touching the
//! registry.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::hotkey::conflict::{BindingId, ConflictCode, ConflictReport};
use crate::hotkey::registry::{HotkeyRegistry, HotkeyRequest, RegistrationOutcome, RequestToken};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResolutionState {
    Idle,
    Requesting,
    Registered,
    AwaitingUserChoice(ConflictReport),
    RetryingWithOverride,
    DisablingThenRetrying { target: BindingId },
    Cancelled,
    Failed(ConflictReport),
    Superseded,
    Unsupported,
}

impl ResolutionState {
    pub fn name(&self) -> &'static str {
        match self {
            ResolutionState::Idle => "idle",
            ResolutionState::Requesting => "requesting",
            ResolutionState::Registered => "registered",
            ResolutionState::AwaitingUserChoice(_) => "awaiting-user-choice",
            ResolutionState::RetryingWithOverride => "retrying-with-override",
            ResolutionState::DisablingThenRetrying { .. } => "disabling-then-retrying",
            ResolutionState::Cancelled => "cancelled",
            ResolutionState::Failed(_) => "failed",
            ResolutionState::Superseded => "superseded",
            ResolutionState::Unsupported => "unsupported",
        }
    }

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolutionState::Registered
                | ResolutionState::Cancelled
                | ResolutionState::Failed(_)
                | ResolutionState::Superseded
                | ResolutionState::Unsupported
        )
    }
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ResolutionError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },

    #[error("Override unavailable: blocking conflicts {0:?}")]
    OverrideBlocked(Vec<ConflictCode>),

    #[error("'{0}' is not a conflicting internal binding")]
    NoInternalConflict(BindingId),

    #[error("Request was superseded by a newer one")]
    Superseded,
}

/// Drives one hotkey request through conflict resolution.
#[derive(Debug)]
pub struct ConflictResolution {
    registry: Arc<HotkeyRegistry>,
    request: HotkeyRequest,
    token: Option<RequestToken>,
    state: ResolutionState,
}

impl ConflictResolution {
    pub fn new(registry: Arc<HotkeyRegistry>, request: HotkeyRequest) -> Self {
        Self {
            registry,
            request,
            token: None,
            state: ResolutionState::Idle,
        }
    }

    pub fn state(&self) -> &ResolutionState {
        &self.state
    }

    pub fn request(&self) -> &HotkeyRequest {
        &self.request
    }

    pub fn token(&self) -> Option<RequestToken> {
        self.token
    }

    /// Conflicts the user is choosing about, if any.
    pub fn report(&self) -> Option<&ConflictReport> {
        match &self.state {
            ResolutionState::AwaitingUserChoice(report) | ResolutionState::Failed(report) => Some(report),
            _ => None,
        }
    }

    /// Whether the primary "use anyway" action is enabled.
    pub fn can_override(&self) -> bool {
        matches!(&self.state, ResolutionState::AwaitingUserChoice(report) if !report.is_blocking())
    }

    /// Internal bindings the user may disable to free the accelerator.
    pub fn disable_targets(&self) -> Vec<BindingId> {
        match &self.state {
            ResolutionState::AwaitingUserChoice(report) => {
                report.duplicate_internal_ids().into_iter().cloned().collect()
            }
            _ => Vec::new(),
        }
    }

    /// `Idle -> Requesting -> ...`
    pub async fn start(&mut self) -> Result<&ResolutionState, ResolutionError> {
        self.expect_state(matches!(self.state, ResolutionState::Idle), "start")?;

        let token = self.registry.begin(&self.request.id);
        self.token = Some(token);
        self.transition(ResolutionState::Requesting);

        let outcome = self.registry.submit(self.request.clone(), token).await;
        let next = match outcome {
            RegistrationOutcome::Registered => ResolutionState::Registered,
            RegistrationOutcome::Conflicted(report) => ResolutionState::AwaitingUserChoice(report),
            RegistrationOutcome::Failed(report) => ResolutionState::Failed(report),
            RegistrationOutcome::Unsupported => ResolutionState::Unsupported,
            RegistrationOutcome::Superseded => ResolutionState::Superseded,
        };
        self.transition(next);
        Ok(&self.state)
    }

    /// Retries with `allowConflicts`, displacing the other internal binding.
    pub async fn retry_with_override(&mut self) -> Result<&ResolutionState, ResolutionError> {
        let report = self.awaiting("retry with override")?;
        if report.is_blocking() {
            return Err(ResolutionError::OverrideBlocked(report.blocking_codes()));
        }
        let token = self.live_token()?;

        self.transition(ResolutionState::RetryingWithOverride);
        let request = self.request.clone().allowing_conflicts();
        let outcome = self.registry.submit(request, token).await;
        self.finish_retry(outcome);
        Ok(&self.state)
    }

    /// Unregisters `target`, then retries the original request.
    pub async fn disable_and_retry(&mut self, target: &BindingId) -> Result<&ResolutionState, ResolutionError> {
        let report = self.awaiting("disable and retry")?;
        if !report.duplicate_internal_ids().contains(&target) {
            return Err(ResolutionError::NoInternalConflict(target.clone()));
        }
        let token = self.live_token()?;

        self.transition(ResolutionState::DisablingThenRetrying { target: target.clone() });
        self.registry.unregister(target).await;

        let outcome = self.registry.submit(self.request.clone(), token).await;
        self.finish_retry(outcome);
        Ok(&self.state)
    }

    /// Closes the dialog without resolving. The binding keeps its prior state.
    pub fn cancel(&mut self) -> Result<&ResolutionState, ResolutionError> {
        self.awaiting("cancel")?;
        if let Some(token) = self.token {
            self.registry.cancel(&self.request.id, token);
        }
        self.transition(ResolutionState::Cancelled);
        Ok(&self.state)
    }

    fn awaiting(&self, action: &'static str) -> Result<ConflictReport, ResolutionError> {
        match &self.state {
            ResolutionState::AwaitingUserChoice(report) => Ok(report.clone()),
            other => Err(ResolutionError::InvalidTransition {
                state: other.name(),
                action,
            }),
        }
    }

    fn expect_state(&self, ok: bool, action: &'static str) -> Result<(), ResolutionError> {
        if ok {
            Ok(())
        } else {
            Err(ResolutionError::InvalidTransition {
                state: self.state.name(),
                action,
            })
        }
    }

    fn live_token(&mut self) -> Result<RequestToken, ResolutionError> {
        match self.token {
            Some(token) if self.registry.is_live(&self.request.id, token) => Ok(token),
            _ => {
                self.transition(ResolutionState::Superseded);
                Err(ResolutionError::Superseded)
            }
        }
    }

    fn finish_retry(&mut self, outcome: RegistrationOutcome) {
        let next = match outcome {
            RegistrationOutcome::Registered => ResolutionState::Registered,
            RegistrationOutcome::Conflicted(report) | RegistrationOutcome::Failed(report) => {
                ResolutionState::Failed(report)
            }
            RegistrationOutcome::Unsupported => ResolutionState::Unsupported,
            RegistrationOutcome::Superseded => ResolutionState::Superseded,
        };
        self.transition(next);
    }

    fn transition(&mut self, next: ResolutionState) {
        debug!(id = %self.request.id, from = self.state.name(), to = next.name(), "Conflict resolution transition");
        if next == ResolutionState::Registered {
            info!(id = %self.request.id, accelerator = %self.request.accelerator, "Hotkey request settled as registered");
        }
        self.state = next;
    }
}
