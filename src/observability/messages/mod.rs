// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging and tracing spans.
//!
//! # Usage
//! ```
//! use memfabric_coord::observability::messages::{StructuredLog, registry::RoleAssigned};
//!
//! RoleAssigned { model_key: "m1", my_id: "A:1", role: "source" }.log();
//! ```

pub mod registry;

use tracing::Span;

/// A message type that knows both how to render itself for a human
/// (`Display`) and how to emit itself as a structured log event or tracing
/// span with its fields as attributes.
pub trait StructuredLog {
    /// Emit a log event: human-readable message plus machine-readable
    /// fields.
    fn log(&self);

    /// Create a tracing span named `name` carrying this message's fields as
    /// attributes.
    fn span(&self, name: &str) -> Span;
}
