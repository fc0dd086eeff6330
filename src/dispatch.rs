// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Dispatch logic: the two-sided readiness gate and task emission.
//!
//! [`maybe_emit_tasks`] is the heart of the control plane. It is called
//! after any state change that could newly satisfy the readiness gate
//! (`register`, either side, and `ready`), under the store's lock, and is
//! safe to call redundantly — the per-receiver `transfer_id` latch makes
//! emission idempotent no matter how many times it runs for the same
//! rank-pair.

use crate::identity::TransferId;
use crate::store::{ModelState, Task, TransferStatus};

/// Emits one task per not-yet-bound receiver for `rank_key`, provided both
/// a ready source and at least one ready receiver exist for that rank and
/// the source has actually registered. `alloc` mints a fresh transfer id
/// per task.
///
/// Preconditions: caller holds the store's lock.
pub fn maybe_emit_tasks(
    state: &mut ModelState,
    rank_key: &str,
    alloc: &mut impl FnMut() -> TransferId,
) -> usize {
    let prefix = format!("{rank_key}|");

    let source_ready = state.ready_sources.iter().any(|k| k.starts_with(&prefix));
    if !source_ready {
        return 0;
    }
    let receiver_ready = state.ready_receivers.iter().any(|k| k.starts_with(&prefix));
    if !receiver_ready {
        return 0;
    }

    // Source readiness was signaled before registration completed — possible
    // due to client ordering. Nothing to dispatch against yet.
    let Some(source) = state.sources.get(rank_key) else {
        return 0;
    };
    let source_my_id = source.my_id.clone();

    let Some(receivers) = state.receivers.get_mut(rank_key) else {
        return 0;
    };

    let mut emitted = 0;
    for recv in receivers.values_mut() {
        if recv.transfer_id.is_some() {
            continue;
        }

        let transfer_id = alloc();
        let task = Task {
            transfer_id: transfer_id.clone(),
            peer_id: recv.my_id.clone(),
            dst_params: recv.params_map.clone(),
        };

        state
            .pending
            .entry(source_my_id.clone())
            .or_default()
            .push_back(task);
        state
            .transfer_status
            .insert(transfer_id.clone(), TransferStatus::Pending);
        state
            .receiver_transfers
            .entry(recv.my_id.clone())
            .or_default()
            .push(transfer_id.clone());
        recv.transfer_id = Some(transfer_id);
        emitted += 1;
    }
    emitted
}
