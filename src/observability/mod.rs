// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structured logging for the coordinator's request lifecycle.
//!
//! Message types live under [`messages`], one subsystem per file, each
//! implementing `Display` (human-readable) and [`messages::StructuredLog`]
//! (machine-readable fields + span attributes). This keeps log strings out
//! of handler bodies and centralizes wording so it can change in one place.

pub mod messages;
