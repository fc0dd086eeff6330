// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! End-to-end scenarios driving the HTTP control plane as a whole, one
//! process-lifetime [`Store`] per test, no real socket — `route` is a plain
//! function of request to response, so an in-process call is a faithful
//! stand-in for a client hitting the bound server.

use std::sync::Arc;

use hyper::{Body, Method, Request, Response, StatusCode};
use memfabric_coord::http::route;
use memfabric_coord::store::Store;
use serde_json::{json, Value};

fn post(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: Response<Body>) -> Value {
    let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn assign(store: &Arc<Store>, model_key: &Value, my_id: &str, rank: &Value) -> Value {
    body_json(
        route(
            store.clone(),
            post("/v1/registry/assign", json!({"model_key": model_key, "my_id": my_id, "rank_info": rank})),
        )
        .await,
    )
    .await
}

async fn register(
    store: &Arc<Store>,
    model_key: &Value,
    my_id: &str,
    role: &str,
    rank: &Value,
    params: Value,
) -> Value {
    body_json(
        route(
            store.clone(),
            post(
                "/v1/registry/register",
                json!({
                    "model_key": model_key, "my_id": my_id, "role": role,
                    "rank_info": rank, "params": params,
                }),
            ),
        )
        .await,
    )
    .await
}

async fn ready(store: &Arc<Store>, model_key: &Value, my_id: &str, role: &str, rank: &Value) {
    route(
        store.clone(),
        post("/v1/registry/ready", json!({"model_key": model_key, "my_id": my_id, "role": role, "rank_info": rank})),
    )
    .await;
}

async fn poll(store: &Arc<Store>, model_key: &Value, my_id: &str) -> Value {
    body_json(route(store.clone(), post("/v1/registry/poll", json!({"model_key": model_key, "my_id": my_id}))).await).await
}

async fn wait(store: &Arc<Store>, model_key: &Value, my_id: &str) -> Value {
    body_json(route(store.clone(), post("/v1/registry/wait", json!({"model_key": model_key, "my_id": my_id}))).await).await
}

async fn complete(store: &Arc<Store>, transfer_id: &str) {
    route(store.clone(), post("/v1/registry/complete", json!({"transfer_id": transfer_id}))).await;
}

/// Scenario 1: single pair happy path (spec.md §8, scenario 1).
#[tokio::test]
async fn single_pair_happy_path() {
    let store = Arc::new(Store::new());
    let model_key = json!({"model": "llama-3-70b", "revision": "main"});
    let rank = json!({"tp_rank": 0, "pp_rank": 0, "dp_rank": 0});

    let a = assign(&store, &model_key, "A:1", &rank).await;
    let b = assign(&store, &model_key, "B:1", &rank).await;
    assert_eq!(a["role"], "source");
    assert_eq!(b["role"], "receiver");

    register(&store, &model_key, "A:1", "source", &rank, json!([{"name": "w", "addr": 4096, "bytes": 4194304}])).await;
    register(&store, &model_key, "B:1", "receiver", &rank, json!([{"name": "w", "addr": 8192, "bytes": 4194304}])).await;
    ready(&store, &model_key, "A:1", "source", &rank).await;
    ready(&store, &model_key, "B:1", "receiver", &rank).await;

    let before = wait(&store, &model_key, "B:1").await;
    assert_eq!(before["status"], "wait");

    let polled = poll(&store, &model_key, "A:1").await;
    let tasks = polled["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["peer_id"], "B:1");
    assert_eq!(tasks[0]["dst_params"]["w"]["addr"], 8192);
    let tid = tasks[0]["transfer_id"].as_str().unwrap().to_string();

    complete(&store, &tid).await;
    let after = wait(&store, &model_key, "B:1").await;
    assert_eq!(after["status"], "done");
}

/// Scenario 2: assign idempotence (spec.md §8, scenario 2).
#[tokio::test]
async fn assign_idempotence_across_repeats_and_third_party() {
    let store = Arc::new(Store::new());
    let model_key = json!({"model": "llama"});
    let rank = json!({"tp_rank": 1});

    let first = assign(&store, &model_key, "B", &rank).await;
    let second = assign(&store, &model_key, "B", &rank).await;
    assert_eq!(first["role"], "source");
    assert_eq!(second["role"], "source");

    let third = assign(&store, &model_key, "C", &rank).await;
    assert_eq!(third["role"], "receiver");
}

/// Scenario 3: fan-out — one source, two receivers, independent completion.
#[tokio::test]
async fn fan_out_completes_independently_per_receiver() {
    let store = Arc::new(Store::new());
    let model_key = json!({"model": "llama"});
    let rank = json!({"tp_rank": 0});

    register(&store, &model_key, "A", "source", &rank, json!([])).await;
    register(&store, &model_key, "B", "receiver", &rank, json!([])).await;
    register(&store, &model_key, "C", "receiver", &rank, json!([])).await;
    ready(&store, &model_key, "A", "source", &rank).await;
    ready(&store, &model_key, "B", "receiver", &rank).await;
    ready(&store, &model_key, "C", "receiver", &rank).await;

    let polled = poll(&store, &model_key, "A").await;
    let tasks = polled["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    let peers: Vec<&str> = tasks.iter().map(|t| t["peer_id"].as_str().unwrap()).collect();
    assert!(peers.contains(&"B"));
    assert!(peers.contains(&"C"));

    let b_tid = tasks.iter().find(|t| t["peer_id"] == "B").unwrap()["transfer_id"].as_str().unwrap().to_string();
    complete(&store, &b_tid).await;

    assert_eq!(wait(&store, &model_key, "B").await["status"], "done");
    assert_eq!(wait(&store, &model_key, "C").await["status"], "wait");
}

/// Scenario 4: ready-before-register — no task until the descriptor exists.
#[tokio::test]
async fn ready_before_register_defers_dispatch() {
    let store = Arc::new(Store::new());
    let model_key = json!({"model": "llama"});
    let rank = json!({"tp_rank": 0});

    register(&store, &model_key, "A", "source", &rank, json!([])).await;
    ready(&store, &model_key, "A", "source", &rank).await;
    ready(&store, &model_key, "B", "receiver", &rank).await;

    let polled = poll(&store, &model_key, "A").await;
    assert!(polled["tasks"].as_array().unwrap().is_empty());

    register(&store, &model_key, "B", "receiver", &rank, json!([])).await;
    let polled = poll(&store, &model_key, "A").await;
    assert_eq!(polled["tasks"].as_array().unwrap().len(), 1);
}

/// Scenario 5: racing assign calls for the same rank — exactly one source.
#[tokio::test]
async fn concurrent_assign_race_yields_exactly_one_source() {
    let store = Arc::new(Store::new());
    let model_key = json!({"model": "llama"});
    let rank = json!({"tp_rank": 0});

    let ids: Vec<String> = (0..16).map(|i| format!("peer-{i}")).collect();
    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let store = store.clone();
            let model_key = model_key.clone();
            let rank = rank.clone();
            let id = id.clone();
            tokio::spawn(async move { assign(&store, &model_key, &id, &rank).await })
        })
        .collect();

    let mut source_count = 0;
    for h in handles {
        if h.await.unwrap()["role"] == "source" {
            source_count += 1;
        }
    }
    assert_eq!(source_count, 1);
}

/// Scenario 6: completing an unknown transfer id is a no-op 200.
#[tokio::test]
async fn unknown_transfer_id_complete_is_a_no_op() {
    let store = Arc::new(Store::new());
    let resp = route(store.clone(), post("/v1/registry/complete", json!({"transfer_id": "t-does-not-exist"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");
}

/// Registration ordering irrelevance: either side registering/readying
/// first produces the same emitted task set (spec.md §8, round-trip law).
#[tokio::test]
async fn registration_ordering_does_not_affect_emitted_tasks() {
    let model_key = json!({"model": "llama"});
    let rank = json!({"tp_rank": 0});

    let store_a = Arc::new(Store::new());
    register(&store_a, &model_key, "A", "source", &rank, json!([])).await;
    ready(&store_a, &model_key, "A", "source", &rank).await;
    register(&store_a, &model_key, "B", "receiver", &rank, json!([])).await;
    ready(&store_a, &model_key, "B", "receiver", &rank).await;
    let tasks_a = poll(&store_a, &model_key, "A").await;

    let store_b = Arc::new(Store::new());
    register(&store_b, &model_key, "B", "receiver", &rank, json!([])).await;
    ready(&store_b, &model_key, "B", "receiver", &rank).await;
    register(&store_b, &model_key, "A", "source", &rank, json!([])).await;
    ready(&store_b, &model_key, "A", "source", &rank).await;
    let tasks_b = poll(&store_b, &model_key, "A").await;

    assert_eq!(tasks_a["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(tasks_a["tasks"][0]["peer_id"], tasks_b["tasks"][0]["peer_id"]);
}

/// `GET /healthz` requires no `my_id` and is reachable alongside the
/// registry surface.
#[tokio::test]
async fn healthz_reports_ok_independent_of_registry_state() {
    let store = Arc::new(Store::new());
    let req = Request::builder().method(Method::GET).uri("/healthz").body(Body::empty()).unwrap();
    let resp = route(store, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"status": "ok"}));
}
