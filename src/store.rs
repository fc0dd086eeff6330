// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Process-local state store.
//!
//! This is the sole owner of all mutable registry data: the per-model
//! [`ModelState`] values and the process-wide transfer-id counter, both
//! reachable only through one [`std::sync::Mutex`]. Request rate into this
//! store is participant-lifecycle traffic (assign/register/ready/poll/
//! complete/wait), not data-path traffic, so a single coarse lock is the
//! right call: contention is negligible, and one lock eliminates the class
//! of bugs where assignment and registration race across separate
//! partitioned locks.
//!
//! Global mutable state is deliberately *not* a `lazy_static`/`OnceLock`
//! here. The registry lives in an owned [`Store`] value constructed by
//! `main` and handed to the HTTP layer, so tests can build a fresh, hermetic
//! store per test instead of sharing process-global state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::identity::TransferId;

/// The role a participant was assigned: exactly one source is bound per
/// rank coordinate; any number of receivers may be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Source,
    Receiver,
}

impl Role {
    /// Parses a wire-provided role string. Unlike the reference
    /// coordinator, which silently coerces unknown values to `source`, this
    /// rejects anything else with 400 — coercing an operator typo to
    /// `source` risks silently stealing the source slot for a rank.
    pub fn parse(raw: &str) -> Result<Role, String> {
        match raw {
            "source" => Ok(Role::Source),
            "receiver" => Ok(Role::Receiver),
            other => Err(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Receiver => "receiver",
        }
    }
}

/// One registered parameter's device location: address and byte size.
#[derive(Debug, Clone, Copy, Serialize, serde::Deserialize)]
pub struct ParamEntry {
    pub addr: u64,
    pub bytes: u64,
}

/// A single entry of the `params` array a participant registers.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ParamInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub addr: u64,
    #[serde(default)]
    pub bytes: u64,
}

/// name -> {addr, bytes}, as carried in a [`Task`]'s `dst_params` and in a
/// [`ParticipantDescriptor`]'s registered parameter map.
pub type ParamsMap = HashMap<String, ParamEntry>;

/// Canonicalizes a `params` array into a name-keyed map. Entries without a
/// name are dropped, matching the reference coordinator's `_params_to_map`.
pub fn params_to_map(params: Vec<ParamInput>) -> ParamsMap {
    params
        .into_iter()
        .filter(|p| !p.name.is_empty())
        .map(|p| (p.name, ParamEntry { addr: p.addr, bytes: p.bytes }))
        .collect()
}

/// A unit of work emitted to a source: "write your buffer to peer X at
/// address Y."
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub transfer_id: TransferId,
    pub peer_id: String,
    pub dst_params: ParamsMap,
}

/// Lifecycle of one emitted task. Transition is one-way: `Pending -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Pending,
    Done,
}

/// A participant bound to a rank coordinate: its role, parameter map, and
/// bookkeeping the dispatcher needs (the `transfer_id` latch for receivers).
#[derive(Debug, Clone)]
pub struct ParticipantDescriptor {
    pub my_id: String,
    pub role: Role,
    pub rank_info: crate::identity::RankInfo,
    pub params_map: ParamsMap,
    pub metrics: Value,
    /// Caller-supplied fields the coordinator doesn't interpret (e.g.
    /// `node_ip`, `npu_id`) but stores and carries along anyway — dropping
    /// them would lose information real callers send, even though no
    /// endpoint response promises them back.
    pub extra: Map<String, Value>,
    /// Latches to the transfer id bound to this receiver on first task
    /// emission. Unused for source descriptors.
    pub transfer_id: Option<TransferId>,
    pub registered_at: std::time::SystemTime,
}

impl ParticipantDescriptor {
    pub fn new(
        my_id: String,
        role: Role,
        rank_info: crate::identity::RankInfo,
        params_map: ParamsMap,
        metrics: Value,
        extra: Map<String, Value>,
    ) -> Self {
        ParticipantDescriptor {
            my_id,
            role,
            rank_info,
            params_map,
            metrics,
            extra,
            transfer_id: None,
            registered_at: std::time::SystemTime::now(),
        }
    }
}

/// All registry state for one model identity. Created lazily on first
/// reference and lives for the process lifetime — there is no explicit
/// deregistration and no eviction (see DESIGN.md for the accepted
/// unbounded-growth tradeoff).
#[derive(Debug, Default)]
pub struct ModelState {
    pub source_assignments: HashMap<String, String>,
    pub assignments: HashMap<String, Role>,
    pub sources: HashMap<String, ParticipantDescriptor>,
    pub receivers: HashMap<String, HashMap<String, ParticipantDescriptor>>,
    pub ready_sources: HashSet<String>,
    pub ready_receivers: HashSet<String>,
    pub pending: HashMap<String, VecDeque<Task>>,
    pub transfer_status: HashMap<String, TransferStatus>,
    pub receiver_transfers: HashMap<String, Vec<String>>,
}

/// All models plus the process-wide transfer-id counter, protected by one
/// mutex (see [`Store`]).
#[derive(Default)]
pub struct Registry {
    models: HashMap<String, ModelState>,
    next_transfer_id: u64,
}

impl Registry {
    /// Splits the registry into its model map and its id counter as two
    /// independent mutable borrows, so a caller can hold a `&mut ModelState`
    /// and still allocate transfer ids in the same critical section.
    pub fn split_mut(&mut self) -> (&mut HashMap<String, ModelState>, &mut u64) {
        (&mut self.models, &mut self.next_transfer_id)
    }

    pub fn model_state_mut(&mut self, key: &str) -> &mut ModelState {
        self.models.entry(key.to_string()).or_default()
    }

    /// Scans every model's transfer statuses for `transfer_id` and marks it
    /// done. Unknown ids are a no-op (the reference coordinator responds
    /// `{"status": "ok"}` either way). Returns whether the id was known.
    pub fn complete_transfer(&mut self, transfer_id: &str) -> bool {
        for state in self.models.values_mut() {
            if let Some(status) = state.transfer_status.get_mut(transfer_id) {
                *status = TransferStatus::Done;
                return true;
            }
        }
        false
    }
}

/// The process-wide state store. One coarse [`std::sync::Mutex`] guards all
/// reachable registry data; critical sections never perform I/O or await,
/// so lock hold time is bounded by in-memory map operations only.
pub struct Store {
    inner: Mutex<Registry>,
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Store { inner: Mutex::new(Registry::default()) }
    }

    /// Runs `f` with exclusive access to the registry. A poisoned lock (a
    /// prior panic mid-critical-section) is recovered rather than
    /// propagated — a single handler bug should not wedge every future
    /// request.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_state_is_created_lazily_and_reused() {
        let store = Store::new();
        store.with_registry(|reg| {
            reg.model_state_mut("m1").assignments.insert("a".into(), Role::Source);
        });
        store.with_registry(|reg| {
            assert_eq!(reg.model_state_mut("m1").assignments.len(), 1);
        });
    }

    #[test]
    fn complete_transfer_is_idempotent_and_ignores_unknown_ids() {
        let store = Store::new();
        store.with_registry(|reg| {
            let state = reg.model_state_mut("m1");
            state.transfer_status.insert("t1".into(), TransferStatus::Pending);
        });
        store.with_registry(|reg| reg.complete_transfer("t1"));
        store.with_registry(|reg| reg.complete_transfer("t1"));
        store.with_registry(|reg| reg.complete_transfer("unknown"));
        store.with_registry(|reg| {
            let state = reg.model_state_mut("m1");
            assert_eq!(state.transfer_status["t1"], TransferStatus::Done);
        });
    }

    #[test]
    fn params_to_map_drops_unnamed_entries() {
        let params = vec![
            ParamInput { name: "w".into(), addr: 0x1000, bytes: 4096 },
            ParamInput { name: "".into(), addr: 0x2000, bytes: 8192 },
        ];
        let map = params_to_map(params);
        assert_eq!(map.len(), 1);
        assert!(!map.contains_key(""));
        assert_eq!(map["w"].addr, 0x1000);
    }

    #[test]
    fn role_parse_rejects_unknown_values() {
        assert!(Role::parse("source").is_ok());
        assert!(Role::parse("receiver").is_ok());
        assert!(Role::parse("sidecar").is_err());
    }
}
