// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors surfaced at the HTTP boundary.
//!
//! Every variant maps to exactly one HTTP status and JSON body, mirroring
//! the error taxonomy the reference coordinator uses: bad request (400),
//! unknown route (404), internal (500). All error responses are local to a
//! single request — the lock-protected state is never left inconsistent by
//! a failed request, so clients may always retry.

use hyper::{Body, Response, StatusCode};
use serde_json::json;
use thiserror::Error;

/// Errors that can terminate a single HTTP request before a handler-specific
/// response is produced.
#[derive(Error, Debug)]
pub enum ApiError {
    /// `my_id` is required on every endpoint except `/healthz`.
    #[error("missing my_id")]
    MissingMyId,

    /// `transfer_id` is required on `/v1/registry/complete`.
    #[error("missing transfer_id")]
    MissingTransferId,

    /// The request body was not valid JSON, or did not match the endpoint's
    /// expected shape.
    #[error("invalid request body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The body could not be read off the wire at all (client disconnect,
    /// truncated chunked transfer, etc.) — distinct from `InvalidJson`,
    /// which means the bytes arrived but didn't parse.
    #[error("failed to read request body: {0}")]
    BodyReadFailed(String),

    /// `role` was present but was neither `"source"` nor `"receiver"`.
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// No handler is registered for the request's method and path.
    #[error("not found")]
    NotFound,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BodyReadFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Renders this error as the JSON error response the spec promises:
    /// `{"error": "<message>"}`.
    pub fn into_response(self) -> Response<Body> {
        let status = self.status();
        let body = json!({ "error": self.to_string() });
        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("static response parts never fail to build")
    }
}
