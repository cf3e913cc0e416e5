#![allow(dead_code)]
//! In-process stand-ins for the booking service and for misbehaving hosts.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use contract_harness::{Executor, HarnessConfig, Session};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "password123";
const ADMIN_BASIC: &str = "Basic YWRtaW46cGFzc3dvcmQxMjM=";
const REQUIRED_FIELDS: [&str; 5] = ["firstname", "lastname", "totalprice", "depositpaid", "bookingdates"];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct Store {
    bookings: BTreeMap<u64, Value>,
    next_id: u64,
    tokens: HashSet<String>,
}

#[derive(Clone, Default)]
struct StubState {
    store: Arc<Mutex<Store>>,
    hits: Arc<AtomicUsize>,
    token_seq: Arc<AtomicU64>,
}

/// Handle to a running booking stub.
pub struct BookingStub {
    pub base_url: String,
    state: StubState,
}

impl BookingStub {
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn booking_count(&self) -> usize {
        self.state.store.lock().map(|store| store.bookings.len()).unwrap_or(0)
    }

    pub fn config(&self) -> HarnessConfig {
        HarnessConfig::new(self.base_url.clone()).with_timeout(Duration::from_secs(10))
    }

    pub fn session(&self) -> Session {
        Session::from_config(&self.config()).expect("stub session")
    }

    pub fn executor(&self) -> Executor {
        Executor::from_config(&self.config()).expect("stub executor")
    }
}

/// Starts the booking stub on an ephemeral port.
pub async fn spawn_booking_stub() -> BookingStub {
    let state = StubState::default();
    let app = Router::new()
        .route("/ping", get(ping))
        .route("/auth", axum::routing::post(auth))
        .route("/booking", get(list_bookings).post(create_booking))
        .route(
            "/booking/{id}",
            get(get_booking)
                .put(update_booking)
                .patch(patch_booking)
                .delete(delete_booking),
        )
        .route("/slow/{millis}", get(slow))
        .route("/status/{code}", get(fixed_status))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    BookingStub {
        base_url: format!("http://{addr}"),
        state,
    }
}

fn text(status: StatusCode, body: &'static str) -> Response {
    (status, body).into_response()
}

fn json_response(status: StatusCode, body: Value) -> Response {
    (status, axum::Json(body)).into_response()
}

fn authorized(state: &StubState, headers: &HeaderMap) -> bool {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if value == ADMIN_BASIC {
            return true;
        }
    }
    let Some(cookie) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let store = state.store.lock().expect("store lock");
    cookie
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("token="))
        .any(|token| store.tokens.contains(token))
}

fn is_complete_booking(value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    REQUIRED_FIELDS.iter().all(|field| map.contains_key(*field))
        && value["bookingdates"]["checkin"].is_string()
        && value["bookingdates"]["checkout"].is_string()
}

async fn ping(State(state): State<StubState>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    text(StatusCode::CREATED, "Created")
}

async fn auth(State(state): State<StubState>, body: Bytes) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let Ok(value) = serde_json::from_slice::<Value>(&body) else {
        return text(StatusCode::BAD_REQUEST, "Bad Request");
    };
    if !value.is_object() {
        return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
    }

    let username = value.get("username").and_then(Value::as_str);
    let password = value.get("password").and_then(Value::as_str);
    if username == Some(ADMIN_USER) && password == Some(ADMIN_PASSWORD) {
        let token = format!("tok{:08x}", state.token_seq.fetch_add(1, Ordering::SeqCst) + 0xabc);
        state.store.lock().expect("store lock").tokens.insert(token.clone());
        return json_response(StatusCode::OK, json!({ "token": token }));
    }
    json_response(StatusCode::OK, json!({ "reason": "Bad credentials" }))
}

async fn list_bookings(
    State(state): State<StubState>,
    Query(filter): Query<HashMap<String, String>>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let store = state.store.lock().expect("store lock");
    let matches = |booking: &Value| {
        let field = |name: &str| booking[name].as_str().unwrap_or_default().to_string();
        let date = |name: &str| booking["bookingdates"][name].as_str().unwrap_or_default().to_string();
        filter.get("firstname").is_none_or(|want| *want == field("firstname"))
            && filter.get("lastname").is_none_or(|want| *want == field("lastname"))
            && filter.get("checkin").is_none_or(|want| date("checkin") >= *want)
            && filter.get("checkout").is_none_or(|want| date("checkout") <= *want)
    };
    let ids: Vec<Value> = store
        .bookings
        .iter()
        .filter(|(_, booking)| matches(*booking))
        .map(|(id, _)| json!({ "bookingid": id }))
        .collect();
    json_response(StatusCode::OK, Value::Array(ids))
}

async fn get_booking(State(state): State<StubState>, Path(id): Path<u64>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let store = state.store.lock().expect("store lock");
    match store.bookings.get(&id) {
        Some(booking) => json_response(StatusCode::OK, booking.clone()),
        None => text(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn create_booking(State(state): State<StubState>, body: Bytes) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let booking = match serde_json::from_slice::<Value>(&body) {
        Ok(value) if is_complete_booking(&value) => value,
        _ => return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
    };
    let mut store = state.store.lock().expect("store lock");
    store.next_id += 1;
    let id = store.next_id;
    store.bookings.insert(id, booking.clone());
    json_response(StatusCode::OK, json!({ "bookingid": id, "booking": booking }))
}

async fn update_booking(
    State(state): State<StubState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&state, &headers) {
        return text(StatusCode::FORBIDDEN, "Forbidden");
    }
    let booking = match serde_json::from_slice::<Value>(&body) {
        Ok(value) if is_complete_booking(&value) => value,
        _ => return text(StatusCode::BAD_REQUEST, "Bad Request"),
    };
    let mut store = state.store.lock().expect("store lock");
    match store.bookings.get_mut(&id) {
        Some(existing) => {
            *existing = booking.clone();
            json_response(StatusCode::OK, booking)
        }
        None => text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
    }
}

async fn patch_booking(
    State(state): State<StubState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&state, &headers) {
        return text(StatusCode::FORBIDDEN, "Forbidden");
    }
    let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(&body) else {
        return text(StatusCode::BAD_REQUEST, "Bad Request");
    };
    let mut store = state.store.lock().expect("store lock");
    match store.bookings.get_mut(&id).and_then(Value::as_object_mut) {
        Some(existing) => {
            for (key, value) in fields {
                existing.insert(key, value);
            }
            json_response(StatusCode::OK, Value::Object(existing.clone()))
        }
        None => text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
    }
}

async fn delete_booking(
    State(state): State<StubState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&state, &headers) {
        return text(StatusCode::FORBIDDEN, "Forbidden");
    }
    let mut store = state.store.lock().expect("store lock");
    match store.bookings.remove(&id) {
        Some(_) => text(StatusCode::CREATED, "Created"),
        None => text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
    }
}

async fn slow(State(state): State<StubState>, Path(millis): Path<u64>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(millis)).await;
    json_response(StatusCode::OK, json!({ "delay": millis }))
}

async fn fixed_status(State(state): State<StubState>, Path(code): Path<u16>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, json!({ "status": code }))
}

async fn read_request_head(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|window| window == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// A host that drops the first `failures` connections mid-request, then
/// answers `200 {"ok":true}` to every later one.
pub async fn spawn_flaky_server(failures: usize) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind flaky");
    let addr = listener.local_addr().expect("flaky addr");
    let connections = Arc::new(AtomicUsize::new(0));
    let seen = connections.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let index = seen.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                read_request_head(&mut stream).await;
                if index < failures {
                    drop(stream);
                    return;
                }
                let body = r#"{"ok":true}"#;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), connections)
}

/// A host that accepts connections and never answers.
pub async fn spawn_silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind silent");
    let addr = listener.local_addr().expect("silent addr");

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    format!("http://{addr}")
}

/// An address with nothing listening on it.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind closed");
    let addr = listener.local_addr().expect("closed addr");
    drop(listener);
    format!("http://{addr}")
}
