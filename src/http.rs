// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! HTTP control plane: the six `POST /v1/registry/*` endpoints plus
//! `GET /healthz`. Built directly on `hyper::service_fn` in the idiom of
//! the WebRTC.rs signaling example rather than a web framework — the
//! surface is seven small handlers over one shared [`Store`], which is all
//! a framework would buy here.
//!
//! Every handler is a plain async function from `(Arc<Store>, Request<Body>)`
//! to `Result<Response<Body>, ApiError>`; [`route`] is the one place that
//! converts an `Err` into its JSON error response, so individual handlers
//! can use `?` freely.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::dispatch::maybe_emit_tasks;
use crate::errors::ApiError;
use crate::identity::{canonical_model_key, format_transfer_id, rank_key, RankInfo};
use crate::observability::messages::{registry as msg, StructuredLog};
use crate::store::{params_to_map, ParamInput, ParticipantDescriptor, Role, Store};

/// `Server` header value advertised on every response.
pub const SERVER_IDENT: &str = "memfabric-coord/0.1";

#[derive(Debug, Deserialize, Default)]
struct AssignRequest {
    #[serde(default)]
    model_key: Value,
    my_id: Option<String>,
    #[serde(default)]
    rank_info: RankInfo,
}

#[derive(Debug, Deserialize, Default)]
struct RegisterRequest {
    #[serde(default)]
    model_key: Value,
    my_id: Option<String>,
    role: Option<String>,
    #[serde(default)]
    rank_info: RankInfo,
    #[serde(default)]
    params: Vec<ParamInput>,
    #[serde(default)]
    metrics: Value,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize, Default)]
struct ReadyRequest {
    #[serde(default)]
    model_key: Value,
    my_id: Option<String>,
    role: Option<String>,
    #[serde(default)]
    rank_info: RankInfo,
}

#[derive(Debug, Deserialize, Default)]
struct PollRequest {
    #[serde(default)]
    model_key: Value,
    my_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CompleteRequest {
    transfer_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct WaitRequest {
    #[serde(default)]
    model_key: Value,
    my_id: Option<String>,
}

/// Reads at most `Content-Length` bytes of the body and deserializes it.
/// An empty body deserializes to the target type's `Default`, matching the
/// spec's "empty bodies yield `{}`".
async fn parse_body<T>(req: Request<Body>) -> Result<T, ApiError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let bytes = hyper::body::to_bytes(req.into_body())
        .await
        .map_err(|e| ApiError::BodyReadFailed(e.to_string()))?;
    if bytes.is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn json_response(status: StatusCode, body: Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Server", SERVER_IDENT)
        .body(Body::from(body.to_string()))
        .expect("static response parts never fail to build")
}

async fn handle_assign(store: &Store, req: Request<Body>) -> Result<Response<Body>, ApiError> {
    let req: AssignRequest = parse_body(req).await?;
    let my_id = req.my_id.ok_or(ApiError::MissingMyId)?;
    let model_key = canonical_model_key(&req.model_key);
    let rk = rank_key(&req.rank_info);

    let role = store.with_registry(|reg| {
        let state = reg.model_state_mut(&model_key);
        if let Some(existing) = state.assignments.get(&my_id) {
            return *existing;
        }
        // First writer wins: an empty or foreign-held source slot is
        // claimed by this caller; anyone racing a moment later sees it
        // occupied and becomes a receiver.
        let role = match state.source_assignments.get(&rk) {
            Some(holder) if holder != &my_id => Role::Receiver,
            _ => {
                state.source_assignments.insert(rk.clone(), my_id.clone());
                Role::Source
            }
        };
        state.assignments.insert(my_id.clone(), role);
        role
    });

    msg::RoleAssigned { model_key: &model_key, my_id: &my_id, role: role.as_str() }.log();
    Ok(json_response(StatusCode::OK, json!({ "role": role.as_str() })))
}

async fn handle_register(store: &Store, req: Request<Body>) -> Result<Response<Body>, ApiError> {
    let req: RegisterRequest = parse_body(req).await?;
    let my_id = req.my_id.ok_or(ApiError::MissingMyId)?;
    let model_key = canonical_model_key(&req.model_key);
    let rk = rank_key(&req.rank_info);
    let params_map = params_to_map(req.params);
    let role_input = match req.role {
        Some(raw) => Some(Role::parse(&raw).map_err(ApiError::InvalidRole)?),
        None => None,
    };

    let (role, dispatched) = store.with_registry(|reg| {
        let (models, counter) = reg.split_mut();
        let state = models.entry(model_key.clone()).or_default();

        // If role is absent, use the cached assignment, defaulting to
        // source — matching the reference coordinator's
        // `state["assignments"].get(my_id, "source")`. Register never
        // writes the assignment cache itself; only `assign` does.
        let role = role_input.unwrap_or_else(|| {
            state.assignments.get(&my_id).copied().unwrap_or(Role::Source)
        });

        let descriptor = ParticipantDescriptor::new(
            my_id.clone(),
            role,
            req.rank_info,
            params_map,
            req.metrics,
            req.extra,
        );

        match role {
            Role::Source => {
                state.source_assignments.insert(rk.clone(), my_id.clone());
                state.sources.insert(rk.clone(), descriptor);
            }
            Role::Receiver => {
                state
                    .receivers
                    .entry(rk.clone())
                    .or_default()
                    .insert(my_id.clone(), descriptor);
            }
        }

        let mut alloc = || format_transfer_id({
            *counter += 1;
            *counter
        });
        let dispatched = maybe_emit_tasks(state, &rk, &mut alloc);
        (role, dispatched)
    });

    msg::ParticipantRegistered {
        model_key: &model_key,
        my_id: &my_id,
        role: role.as_str(),
        rank_key: &rk,
    }
    .log();
    if dispatched > 0 {
        msg::TasksDispatched { rank_key: &rk, source_my_id: &my_id, count: dispatched }.log();
    }

    Ok(json_response(StatusCode::OK, json!({ "status": "ok", "role": role.as_str() })))
}

async fn handle_ready(store: &Store, req: Request<Body>) -> Result<Response<Body>, ApiError> {
    let req: ReadyRequest = parse_body(req).await?;
    let my_id = req.my_id.ok_or(ApiError::MissingMyId)?;
    let model_key = canonical_model_key(&req.model_key);
    let rk = rank_key(&req.rank_info);
    let role_input = match req.role {
        Some(raw) => Some(Role::parse(&raw).map_err(ApiError::InvalidRole)?),
        None => None,
    };

    let dispatched = store.with_registry(|reg| {
        let (models, counter) = reg.split_mut();
        let state = models.entry(model_key.clone()).or_default();
        // Unlike `register`, an unassigned caller here defaults to receiver,
        // not source — matching the reference coordinator's `if role ==
        // "source": ready_sources... else: ready_receivers...`.
        let role = role_input.unwrap_or_else(|| {
            state.assignments.get(&my_id).copied().unwrap_or(Role::Receiver)
        });

        let marker = format!("{rk}|{my_id}");
        match role {
            Role::Source => {
                state.ready_sources.insert(marker);
            }
            Role::Receiver => {
                state.ready_receivers.insert(marker);
            }
        }

        let mut alloc = || format_transfer_id({
            *counter += 1;
            *counter
        });
        maybe_emit_tasks(state, &rk, &mut alloc)
    });

    msg::ReadySignaled { my_id: &my_id, rank_key: &rk }.log();
    if dispatched > 0 {
        msg::TasksDispatched { rank_key: &rk, source_my_id: &my_id, count: dispatched }.log();
    }

    Ok(json_response(StatusCode::OK, json!({ "status": "ok" })))
}

async fn handle_poll(store: &Store, req: Request<Body>) -> Result<Response<Body>, ApiError> {
    let req: PollRequest = parse_body(req).await?;
    let my_id = req.my_id.ok_or(ApiError::MissingMyId)?;
    let model_key = canonical_model_key(&req.model_key);

    // Destructive read: swap the queue out under the lock so tasks appended
    // concurrently are never lost between an iterate-then-clear pair.
    let tasks = store.with_registry(|reg| {
        reg.model_state_mut(&model_key)
            .pending
            .remove(&my_id)
            .unwrap_or_default()
    });

    msg::TasksPolled { my_id: &my_id, count: tasks.len() }.log();
    Ok(json_response(StatusCode::OK, json!({ "tasks": tasks })))
}

async fn handle_complete(store: &Store, req: Request<Body>) -> Result<Response<Body>, ApiError> {
    let req: CompleteRequest = parse_body(req).await?;
    let transfer_id = req.transfer_id.ok_or(ApiError::MissingTransferId)?;

    let known = store.with_registry(|reg| reg.complete_transfer(&transfer_id));

    msg::TransferCompleted { transfer_id: &transfer_id, known }.log();
    Ok(json_response(StatusCode::OK, json!({ "status": "ok" })))
}

async fn handle_wait(store: &Store, req: Request<Body>) -> Result<Response<Body>, ApiError> {
    let req: WaitRequest = parse_body(req).await?;
    let my_id = req.my_id.ok_or(ApiError::MissingMyId)?;
    let model_key = canonical_model_key(&req.model_key);

    let done = store.with_registry(|reg| {
        let state = reg.model_state_mut(&model_key);
        let transfers = state.receiver_transfers.get(&my_id);
        match transfers {
            None => None,
            Some(ids) if ids.is_empty() => None,
            Some(ids) => Some(
                ids.iter()
                    .all(|tid| state.transfer_status.get(tid) == Some(&crate::store::TransferStatus::Done)),
            ),
        }
    });

    let status = match done {
        Some(true) => "done",
        _ => "wait",
    };
    Ok(json_response(StatusCode::OK, json!({ "status": status })))
}

fn healthz() -> Response<Body> {
    json_response(StatusCode::OK, json!({ "status": "ok" }))
}

/// Routes one request to its handler, converting any [`ApiError`] into its
/// JSON response. This is the single point that needs to know about every
/// path; individual handlers stay path-agnostic.
pub async fn route(store: Arc<Store>, req: Request<Body>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/healthz") => Ok(healthz()),
        (&Method::POST, "/v1/registry/assign") => handle_assign(&store, req).await,
        (&Method::POST, "/v1/registry/register") => handle_register(&store, req).await,
        (&Method::POST, "/v1/registry/ready") => handle_ready(&store, req).await,
        (&Method::POST, "/v1/registry/poll") => handle_poll(&store, req).await,
        (&Method::POST, "/v1/registry/complete") => handle_complete(&store, req).await,
        (&Method::POST, "/v1/registry/wait") => handle_wait(&store, req).await,
        _ => Err(ApiError::NotFound),
    };

    match result {
        Ok(resp) => resp,
        Err(err) => {
            msg::RequestRejected { path: &path, reason: &err.to_string() }.log();
            err.into_response()
        }
    }
}

/// Binds and serves the control plane forever. Returns only on a fatal
/// server error (e.g. the listener dying); bind failures are returned
/// before the listening socket is ever created.
pub async fn serve(addr: SocketAddr, store: Arc<Store>) -> hyper::Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let store = store.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let store = store.clone();
                async move { Ok::<_, Infallible>(route(store, req).await) }
            }))
        }
    });

    msg::ServerListening { addr: &addr.to_string() }.log();
    Server::bind(&addr).serve(make_svc).await
}
