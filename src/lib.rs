// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The coordinator as a library: state store, identity canonicalization,
//! dispatch logic, HTTP control plane, and error and observability types.
//! `main.rs` is the thinnest possible binary over this surface — CLI
//! parsing, logging init, and the serve-forever call.

pub mod dispatch;
pub mod errors;
pub mod http;
pub mod identity;
pub mod observability;
pub mod store;
