//! Common test utilities for integration tests
//! Provides an in-memory mock of the Circl messaging backend and helpers for
//! seeding it and pointing a client at it.

#![allow(dead_code)]

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use circl_inbox::config::{ApiConfig, Session};
use circl_inbox::services::Messenger;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ME: i64 = 7;

/// Backend state shared between the mock server and the test body
pub struct BackendState {
    pub messages: Mutex<Vec<Value>>,
    pub network: Mutex<Vec<Value>>,
    pub posts: Mutex<Vec<Value>>,
    next_id: AtomicI64,
    /// Status returned by /send_message (201 means accepted)
    pub send_status: Mutex<u16>,
    /// Echo the stored message back on a successful send
    pub echo_sent: Mutex<bool>,
    /// Make GET /messages answer 500
    pub fail_fetch: Mutex<bool>,
    /// Make GET /messages answer with an unexpected JSON shape
    pub malformed_fetch: Mutex<bool>,
    pub fail_mark_read: Mutex<bool>,
    pub fail_like: Mutex<bool>,
    pub fetch_count: AtomicUsize,
    pub network_count: AtomicUsize,
    pub mark_read_calls: Mutex<Vec<(i64, i64)>>,
    pub auth_headers: Mutex<Vec<Option<String>>>,
}

impl Default for BackendState {
    fn default() -> Self {
        BackendState {
            messages: Mutex::new(Vec::new()),
            network: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1000),
            send_status: Mutex::new(201),
            echo_sent: Mutex::new(true),
            fail_fetch: Mutex::new(false),
            malformed_fetch: Mutex::new(false),
            fail_mark_read: Mutex::new(false),
            fail_like: Mutex::new(false),
            fetch_count: AtomicUsize::new(0),
            network_count: AtomicUsize::new(0),
            mark_read_calls: Mutex::new(Vec::new()),
            auth_headers: Mutex::new(Vec::new()),
        }
    }
}

impl BackendState {
    pub fn seed_message(&self, id: i64, sender: i64, receiver: i64, content: &str, ts: &str, read: bool) {
        self.messages.lock().unwrap().push(json!({
            "id": id,
            "sender_id": sender,
            "receiver_id": receiver,
            "content": content,
            "timestamp": ts,
            "is_read": read,
        }));
    }

    /// Network users as the source backend sends them: string ids, extra fields
    pub fn seed_user(&self, id: i64, name: &str) {
        self.network.lock().unwrap().push(json!({
            "id": id.to_string(),
            "name": name,
            "username": name.to_lowercase().replace(' ', "_"),
            "email": format!("{}@example.com", id),
            "company": "Circl",
            "bio": "",
            "profile_image": null,
            "tags": [],
            "isOnline": false,
        }));
    }

    pub fn seed_post(&self, id: i64, likes: u32, liked: bool) {
        self.posts.lock().unwrap().push(json!({
            "id": id,
            "author_id": 3,
            "author": "John Doe",
            "content": "What are your thoughts on the new AI developments?",
            "likes": likes,
            "comments": 0,
            "liked_by_user": liked,
        }));
    }

    pub fn set(&self, flag: &Mutex<bool>, value: bool) {
        *flag.lock().unwrap() = value;
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn stored_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    fn record_auth(&self, req: &HttpRequest) {
        let header = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        self.auth_headers.lock().unwrap().push(header);
    }
}

/// Scenario: local user 7 and counterparty 9, three messages, two unread
pub fn seed_scenario(state: &BackendState) {
    state.seed_message(1, 7, 9, "hello", "2024-01-01T10:00:00.000Z", true);
    state.seed_message(2, 9, 7, "hi back", "2024-01-01T10:05:00.000Z", false);
    state.seed_message(3, 9, 7, "earlier", "2024-01-01T09:00:00.000Z", false);
    state.seed_user(9, "Howard Brown");
}

#[derive(Deserialize)]
struct SendBody {
    sender_id: i64,
    receiver_id: i64,
    content: String,
}

#[derive(Deserialize)]
struct MarkReadBody {
    sender_id: i64,
    receiver_id: i64,
}

#[derive(Deserialize)]
struct LikeBody {
    #[allow(dead_code)]
    user_id: i64,
    post_id: i64,
}

async fn get_messages(
    state: web::Data<BackendState>,
    user_id: web::Path<i64>,
    req: HttpRequest,
) -> HttpResponse {
    state.fetch_count.fetch_add(1, Ordering::SeqCst);
    state.record_auth(&req);

    if *state.fail_fetch.lock().unwrap() {
        return HttpResponse::InternalServerError().json(json!({ "error": "boom" }));
    }
    if *state.malformed_fetch.lock().unwrap() {
        return HttpResponse::Ok().json(json!({ "unexpected": true }));
    }

    let user_id = user_id.into_inner();
    let messages: Vec<Value> = state
        .messages
        .lock()
        .unwrap()
        .iter()
        .filter(|m| m["sender_id"] == user_id || m["receiver_id"] == user_id)
        .cloned()
        .collect();
    HttpResponse::Ok().json(json!({ "messages": messages }))
}

async fn send_message(state: web::Data<BackendState>, body: web::Json<SendBody>) -> HttpResponse {
    let status = *state.send_status.lock().unwrap();
    if status != 201 {
        let code = actix_web::http::StatusCode::from_u16(status)
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
        return HttpResponse::build(code).json(json!({ "error": "rejected" }));
    }

    let id = state.next_id.fetch_add(1, Ordering::SeqCst);
    let stored = json!({
        "id": id,
        "sender_id": body.sender_id,
        "receiver_id": body.receiver_id,
        "content": body.content,
        "timestamp": chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
        "is_read": false,
    });
    state.messages.lock().unwrap().push(stored.clone());

    if *state.echo_sent.lock().unwrap() {
        HttpResponse::Created().json(json!({ "message": stored }))
    } else {
        HttpResponse::Created().finish()
    }
}

async fn mark_read(state: web::Data<BackendState>, body: web::Json<MarkReadBody>) -> HttpResponse {
    state
        .mark_read_calls
        .lock()
        .unwrap()
        .push((body.sender_id, body.receiver_id));

    if *state.fail_mark_read.lock().unwrap() {
        return HttpResponse::InternalServerError().finish();
    }

    for message in state.messages.lock().unwrap().iter_mut() {
        if message["sender_id"] == body.sender_id && message["receiver_id"] == body.receiver_id {
            message["is_read"] = json!(true);
        }
    }
    HttpResponse::Ok().json(json!({ "success": true }))
}

async fn get_network(state: web::Data<BackendState>, req: HttpRequest) -> HttpResponse {
    state.network_count.fetch_add(1, Ordering::SeqCst);
    state.record_auth(&req);
    let users = state.network.lock().unwrap().clone();
    HttpResponse::Ok().json(users)
}

async fn get_feed(state: web::Data<BackendState>) -> HttpResponse {
    let posts = state.posts.lock().unwrap().clone();
    HttpResponse::Ok().json(posts)
}

async fn toggle_like(state: web::Data<BackendState>, body: web::Json<LikeBody>) -> HttpResponse {
    if *state.fail_like.lock().unwrap() {
        return HttpResponse::ServiceUnavailable().finish();
    }

    let mut posts = state.posts.lock().unwrap();
    let Some(post) = posts.iter_mut().find(|p| p["id"] == body.post_id) else {
        return HttpResponse::NotFound().finish();
    };

    let liked = !post["liked_by_user"].as_bool().unwrap_or(false);
    let likes = post["likes"].as_u64().unwrap_or(0);
    // Other users liked in the meantime: the server count runs ahead.
    let likes = if liked { likes + 3 } else { likes.saturating_sub(1) };
    post["liked_by_user"] = json!(liked);
    post["likes"] = json!(likes);

    HttpResponse::Ok().json(json!({ "likes": likes, "liked": liked }))
}

/// A running mock backend
pub struct MockBackend {
    pub state: web::Data<BackendState>,
    pub addr: String,
}

impl MockBackend {
    /// Start a mock backend on a random local port
    pub async fn start() -> MockBackend {
        let state = web::Data::new(BackendState::default());
        let data = state.clone();

        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .route("/messages/{user_id}", web::get().to(get_messages))
                .route("/send_message", web::post().to(send_message))
                .route("/mark_messages_read", web::post().to(mark_read))
                .route("/network/{user_id}", web::get().to(get_network))
                .route("/forum/feed/{user_id}", web::get().to(get_feed))
                .route("/toggle_like", web::post().to(toggle_like))
        })
        .workers(1)
        .bind("127.0.0.1:0")
        .expect("Failed to bind mock backend");

        let addr = server
            .addrs()
            .first()
            .expect("No bind address found")
            .to_string();
        tokio::spawn(server.run());

        // Give server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        MockBackend { state, addr }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn session(&self) -> Session {
        Session::new(&self.base_url(), ME)
    }

    pub fn messenger(&self) -> Arc<Messenger> {
        self.messenger_with(self.session(), ApiConfig::default())
    }

    pub fn messenger_with(&self, session: Session, config: ApiConfig) -> Arc<Messenger> {
        Arc::new(Messenger::new(Arc::new(session), config).expect("Failed to create messenger"))
    }
}

/// Poll `check` until it holds or the timeout passes
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
