// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the rendezvous and dispatch lifecycle: assign,
//! register, ready, dispatch, poll, complete, wait, and request rejection.

use super::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A participant's role was resolved by `assign`, whether freshly claimed
/// or returned from the idempotent cache.
pub struct RoleAssigned<'a> {
    pub model_key: &'a str,
    pub my_id: &'a str,
    pub role: &'a str,
}

impl Display for RoleAssigned<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} assigned role {} for model {}", self.my_id, self.role, self.model_key)
    }
}

impl StructuredLog for RoleAssigned<'_> {
    fn log(&self) {
        tracing::info!(model_key = self.model_key, my_id = self.my_id, role = self.role, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("assign", span_name = name, model_key = self.model_key, my_id = self.my_id, role = self.role)
    }
}

/// A participant descriptor was written (or overwritten) for a rank
/// coordinate.
pub struct ParticipantRegistered<'a> {
    pub model_key: &'a str,
    pub my_id: &'a str,
    pub role: &'a str,
    pub rank_key: &'a str,
}

impl Display for ParticipantRegistered<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} registered as {} for model {} at rank {}",
            self.my_id, self.role, self.model_key, self.rank_key
        )
    }
}

impl StructuredLog for ParticipantRegistered<'_> {
    fn log(&self) {
        tracing::info!(
            model_key = self.model_key,
            my_id = self.my_id,
            role = self.role,
            rank_key = self.rank_key,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "register",
            span_name = name,
            model_key = self.model_key,
            my_id = self.my_id,
            rank_key = self.rank_key,
        )
    }
}

/// A participant signaled readiness for pairing.
pub struct ReadySignaled<'a> {
    pub my_id: &'a str,
    pub rank_key: &'a str,
}

impl Display for ReadySignaled<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ready at rank {}", self.my_id, self.rank_key)
    }
}

impl StructuredLog for ReadySignaled<'_> {
    fn log(&self) {
        tracing::info!(my_id = self.my_id, rank_key = self.rank_key, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("ready", span_name = name, my_id = self.my_id, rank_key = self.rank_key)
    }
}

/// The dispatcher materialized tasks for a rank-pair.
pub struct TasksDispatched<'a> {
    pub rank_key: &'a str,
    pub source_my_id: &'a str,
    pub count: usize,
}

impl Display for TasksDispatched<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dispatched {} task(s) to source {} at rank {}",
            self.count, self.source_my_id, self.rank_key
        )
    }
}

impl StructuredLog for TasksDispatched<'_> {
    fn log(&self) {
        tracing::info!(
            rank_key = self.rank_key,
            source_my_id = self.source_my_id,
            count = self.count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("dispatch", span_name = name, rank_key = self.rank_key, count = self.count)
    }
}

/// A source drained its pending task queue.
pub struct TasksPolled<'a> {
    pub my_id: &'a str,
    pub count: usize,
}

impl Display for TasksPolled<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} polled {} task(s)", self.my_id, self.count)
    }
}

impl StructuredLog for TasksPolled<'_> {
    fn log(&self) {
        tracing::debug!(my_id = self.my_id, count = self.count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("poll", span_name = name, my_id = self.my_id, count = self.count)
    }
}

/// A transfer id transitioned to `done`.
pub struct TransferCompleted<'a> {
    pub transfer_id: &'a str,
    pub known: bool,
}

impl Display for TransferCompleted<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.known {
            write!(f, "transfer {} completed", self.transfer_id)
        } else {
            write!(f, "complete called for unknown transfer {}", self.transfer_id)
        }
    }
}

impl StructuredLog for TransferCompleted<'_> {
    fn log(&self) {
        tracing::info!(transfer_id = self.transfer_id, known = self.known, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("complete", span_name = name, transfer_id = self.transfer_id)
    }
}

/// A request was rejected before reaching handler logic proper.
pub struct RequestRejected<'a> {
    pub path: &'a str,
    pub reason: &'a str,
}

impl Display for RequestRejected<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "rejected {}: {}", self.path, self.reason)
    }
}

impl StructuredLog for RequestRejected<'_> {
    fn log(&self) {
        tracing::warn!(path = self.path, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("reject", span_name = name, path = self.path)
    }
}

/// The server bound its listening socket.
pub struct ServerListening<'a> {
    pub addr: &'a str,
}

impl Display for ServerListening<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "memfabric-coord listening on {}", self.addr)
    }
}

impl StructuredLog for ServerListening<'_> {
    fn log(&self) {
        tracing::info!(addr = self.addr, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("serve", span_name = name, addr = self.addr)
    }
}
