// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Canonicalization of model identities and rank coordinates into stable
//! string keys, plus transfer-id formatting.
//!
//! A model identity arrives over the wire as an arbitrary JSON object (model
//! name, revision, dtype, quantization, parallelism degrees, implementation
//! variant, architecture list — the caller decides which fields it sends).
//! The coordinator never validates that shape; it only needs two identities
//! that are semantically equal to canonicalize to the same string. Sorting
//! object keys recursively and serializing without whitespace gives exactly
//! that, matching the reference coordinator's
//! `json.dumps(model_key, sort_keys=True, separators=(",", ":"))`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Produces the canonical key string for a model identity.
///
/// Object keys are sorted recursively; array element order is preserved
/// (arrays are positional, not associative). Two identities produce the
/// same key iff they are semantically equal under this ordering.
pub fn canonical_model_key(model_key: &Value) -> String {
    serde_json::to_string(&canonicalize(model_key)).expect("canonical value always serializes")
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            serde_json::to_value(sorted).expect("BTreeMap<String, Value> always serializes")
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// A rank coordinate in the parallelism mesh: tensor-parallel, pipeline-
/// parallel, and data-parallel rank. Missing fields default to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RankInfo {
    #[serde(default)]
    pub tp_rank: u64,
    #[serde(default)]
    pub pp_rank: u64,
    #[serde(default)]
    pub dp_rank: u64,
}

/// Formats the fixed-order rank key used to group participants into a
/// rank-pair. Equality of rank coordinates is literal string equality of
/// this key.
pub fn rank_key(rank_info: &RankInfo) -> String {
    format!(
        "tp:{}|pp:{}|dp:{}",
        rank_info.tp_rank, rank_info.pp_rank, rank_info.dp_rank
    )
}

/// Process-monotonic transfer identifier, `t<N>` with N starting at 1.
pub type TransferId = String;

/// Formats a transfer-id counter value into its wire form.
pub fn format_transfer_id(n: u64) -> TransferId {
    format!("t{n}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_key_is_order_independent() {
        let a = json!({"model": "llama", "revision": "main", "tp": 2, "pp": 1});
        let b = json!({"pp": 1, "tp": 2, "revision": "main", "model": "llama"});
        assert_eq!(canonical_model_key(&a), canonical_model_key(&b));
    }

    #[test]
    fn canonical_key_distinguishes_different_values() {
        let a = json!({"model": "llama", "tp": 2});
        let b = json!({"model": "llama", "tp": 4});
        assert_ne!(canonical_model_key(&a), canonical_model_key(&b));
    }

    #[test]
    fn canonical_key_sorts_nested_objects() {
        let a = json!({"outer": {"b": 1, "a": 2}});
        let b = json!({"outer": {"a": 2, "b": 1}});
        assert_eq!(canonical_model_key(&a), canonical_model_key(&b));
    }

    #[test]
    fn canonical_key_preserves_array_order() {
        let a = json!({"architectures": ["LlamaForCausalLM", "LlamaModel"]});
        let b = json!({"architectures": ["LlamaModel", "LlamaForCausalLM"]});
        assert_ne!(canonical_model_key(&a), canonical_model_key(&b));
    }

    #[test]
    fn rank_key_defaults_missing_fields_to_zero() {
        let r = RankInfo::default();
        assert_eq!(rank_key(&r), "tp:0|pp:0|dp:0");
    }

    #[test]
    fn rank_key_formats_fixed_order() {
        let r = RankInfo { tp_rank: 1, pp_rank: 2, dp_rank: 3 };
        assert_eq!(rank_key(&r), "tp:1|pp:2|dp:3");
    }

    #[test]
    fn transfer_id_format_is_monotonic_prefix() {
        assert_eq!(format_transfer_id(1), "t1");
        assert_eq!(format_transfer_id(42), "t42");
    }
}
