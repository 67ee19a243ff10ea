//! In-process fake of the Ceph Manager dashboard API
//!
//! Serves the endpoints the provider uses from in-memory state on an
//! ephemeral `127.0.0.1` port. Tests can expire tokens to force a 401,
//! stall or fail dashboard tasks, mutate objects out of band, and count
//! requests to prove a call never reached the network.

#![allow(dead_code)]

pub mod cluster;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use ceph_provider::{keyring, CephProvider, KeyringEntry, OpContext, ProviderConfig};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
    /// Apply the mutation and report success
    Complete,
    /// Leave the task executing forever
    Stall,
}

#[derive(Default)]
pub struct FakeState {
    tokens: HashSet<String>,
    issued: u64,
    pub logins: usize,
    pub requests: usize,
    login_delay: Duration,
    reject_tokens: bool,

    /// entity -> keyring entry
    pub auth: BTreeMap<String, KeyringEntry>,
    generated_keys: u64,

    pub rgw_users: BTreeMap<String, Value>,
    pub pools: BTreeMap<String, Value>,
    pub crush_rules: BTreeMap<String, Value>,
    pub ec_profiles: BTreeMap<String, Value>,
    /// option name -> section -> value
    pub cluster_conf: BTreeMap<String, BTreeMap<String, Value>>,
    /// module -> option -> default (typed)
    pub mgr_defaults: BTreeMap<String, BTreeMap<String, Value>>,

    executing: Vec<Value>,
    finished: Vec<Value>,
    task_mode: Option<TaskMode>,
    task_failure: Option<String>,
}

type Shared = Arc<Mutex<FakeState>>;

impl FakeState {
    fn seeded() -> Self {
        let mut state = FakeState::default();
        state.mgr_defaults.insert(
            "dashboard".into(),
            [
                ("jwt_token_ttl".to_string(), json!(28800)),
                ("ssl".to_string(), json!(true)),
                ("server_port".to_string(), json!(8443)),
                ("GRAFANA_API_URL".to_string(), json!("")),
            ]
            .into_iter()
            .collect(),
        );
        state.mgr_defaults.insert(
            "pg_autoscaler".into(),
            [
                ("sleep_interval".to_string(), json!(60)),
                ("threshold".to_string(), json!(3.0)),
            ]
            .into_iter()
            .collect(),
        );
        state.crush_rules.insert(
            "replicated_rule".into(),
            crush_rule_json(0, "replicated_rule", "default", None, "host"),
        );
        state.task_mode = Some(TaskMode::Complete);
        state
    }

    fn next_key(&mut self) -> String {
        self.generated_keys += 1;
        format!("AQBf{:034}==", self.generated_keys)
    }

    /// Record a dashboard task for a 202 answer; `apply` runs unless the
    /// task is set to fail or stall
    fn task<F>(&mut self, name: &str, metadata: Value, apply: F) -> Response
    where
        F: FnOnce(&mut FakeState) -> Value,
    {
        let descriptor = json!({"name": name, "metadata": metadata});
        let now = "2024-03-01T10:00:00.000000Z";

        if let Some(detail) = self.task_failure.clone() {
            self.finished.push(json!({
                "name": name, "metadata": metadata, "begin_time": now, "end_time": now,
                "progress": 100, "success": false, "ret_value": null,
                "exception": {"detail": detail}
            }));
            return (StatusCode::ACCEPTED, Json(descriptor)).into_response();
        }

        if self.task_mode == Some(TaskMode::Stall) {
            self.executing.push(json!({
                "name": name, "metadata": metadata, "begin_time": now, "progress": 10
            }));
            return (StatusCode::ACCEPTED, Json(descriptor)).into_response();
        }

        let ret_value = apply(self);
        self.finished.push(json!({
            "name": name, "metadata": metadata, "begin_time": now, "end_time": now,
            "progress": 100, "success": true, "ret_value": ret_value, "exception": null
        }));
        (StatusCode::ACCEPTED, Json(descriptor)).into_response()
    }
}

fn error(status: StatusCode, detail: impl Into<String>) -> Response {
    let body = json!({"detail": detail.into(), "code": status.as_u16().to_string(), "component": null});
    (status, Json(body)).into_response()
}

fn ok(body: Value) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

fn created() -> Response {
    StatusCode::CREATED.into_response()
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

// =============================================================================
// Server
// =============================================================================

pub struct FakeDashboard {
    pub url: String,
    state: Shared,
}

impl FakeDashboard {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::seeded()));
        let app = router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn config(&self) -> ProviderConfig {
        ProviderConfig {
            endpoint: Some(self.url.clone()),
            username: Some(USERNAME.into()),
            password: Some(PASSWORD.into()),
            task_poll_interval_ms: Some(20),
            request_timeout_secs: Some(10),
            ..Default::default()
        }
    }

    pub async fn provider(&self) -> CephProvider {
        let provider = CephProvider::new();
        provider.configure(&ctx(), self.config()).await.unwrap();
        provider
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, FakeState> {
        self.state.lock()
    }

    /// Invalidate every issued token; the next request answers 401
    pub fn expire_tokens(&self) {
        self.state.lock().tokens.clear();
    }

    /// Keep accepting logins but refuse every token, old and new
    pub fn reject_all_tokens(&self) {
        let mut state = self.state.lock();
        state.tokens.clear();
        state.reject_tokens = true;
    }

    pub fn set_login_delay(&self, delay: Duration) {
        self.state.lock().login_delay = delay;
    }

    pub fn stall_tasks(&self) {
        self.state.lock().task_mode = Some(TaskMode::Stall);
    }

    pub fn fail_tasks(&self, detail: &str) {
        self.state.lock().task_failure = Some(detail.to_string());
    }

    pub fn logins(&self) -> usize {
        self.state.lock().logins
    }

    pub fn requests(&self) -> usize {
        self.state.lock().requests
    }

    /// Names of finished dashboard tasks, oldest first
    pub fn finished_tasks(&self) -> Vec<String> {
        let state = self.state.lock();
        state
            .finished
            .iter()
            .filter_map(|t| t["name"].as_str().map(str::to_string))
            .collect()
    }

    /// Replace the caps of a principal behind the provider's back
    pub fn set_caps(&self, entity: &str, caps: &[(&str, &str)]) {
        let mut state = self.state.lock();
        let entry = state.auth.get_mut(entity).expect("principal exists");
        entry.caps = caps.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    }

    pub fn set_pool_field(&self, pool: &str, field: &str, value: Value) {
        let mut state = self.state.lock();
        let entry = state.pools.get_mut(pool).expect("pool exists");
        entry[field] = value;
    }
}

/// Generous deadline for tests that are expected to succeed
pub fn ctx() -> OpContext {
    OpContext::with_timeout(Duration::from_secs(10))
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/auth", post(login))
        .route("/api/task", get(list_tasks))
        .route("/api/cluster/user", get(list_auth).post(create_auth))
        .route("/api/cluster/user/export", post(export_auth))
        .route("/api/cluster/user/:entity", put(update_auth).delete(delete_auth))
        .route("/api/rgw/user", get(list_rgw_users).post(create_rgw_user))
        .route(
            "/api/rgw/user/:uid",
            get(get_rgw_user).put(update_rgw_user).delete(delete_rgw_user),
        )
        .route("/api/rgw/user/:uid/subuser", post(create_subuser))
        .route(
            "/api/rgw/user/:uid/subuser/:sub",
            put(update_subuser).delete(delete_subuser),
        )
        .route("/api/rgw/user/:uid/key", post(create_key).delete(delete_key))
        .route("/api/osd/pool", get(list_pools).post(create_pool))
        .route(
            "/api/osd/pool/:name",
            get(get_pool).put(update_pool).delete(delete_pool),
        )
        .route("/api/crush_rule", get(list_crush_rules).post(create_crush_rule))
        .route("/api/crush_rule/:name", get(get_crush_rule).delete(delete_crush_rule))
        .route(
            "/api/erasure_code_profile",
            get(list_ec_profiles).post(create_ec_profile),
        )
        .route(
            "/api/erasure_code_profile/:name",
            get(get_ec_profile).delete(delete_ec_profile),
        )
        .route("/api/mgr/module", get(list_mgr_modules))
        .route("/api/mgr/module/:module", get(get_mgr_module).put(set_mgr_module))
        .route("/api/cluster_conf", get(list_conf).post(set_conf))
        .route("/api/cluster_conf/:name", get(get_conf).delete(delete_conf))
        .layer(middleware::from_fn_with_state(state.clone(), gate))
        .with_state(state)
}

/// Count every request and enforce bearer auth outside `/api/auth`
async fn gate(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let authorized = {
        let mut s = state.lock();
        s.requests += 1;
        request.uri().path() == "/api/auth"
            || request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .is_some_and(|token| !s.reject_tokens && s.tokens.contains(token))
    };
    if !authorized {
        return error(StatusCode::UNAUTHORIZED, "Token expired or invalid");
    }
    next.run(request).await
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let delay = state.lock().login_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut s = state.lock();
    s.logins += 1;
    if body["username"] != USERNAME || body["password"] != PASSWORD {
        return error(StatusCode::BAD_REQUEST, "Invalid credentials");
    }
    s.issued += 1;
    let token = format!("tok-{}", s.issued);
    s.tokens.insert(token.clone());
    (StatusCode::CREATED, Json(json!({"token": token, "username": USERNAME}))).into_response()
}

async fn list_tasks(State(state): State<Shared>, Query(query): Query<HashMap<String, String>>) -> Response {
    let s = state.lock();
    let wanted = query.get("name");
    let filter = |tasks: &[Value]| -> Vec<Value> {
        tasks
            .iter()
            .filter(|t| wanted.map_or(true, |name| t["name"] == name.as_str()))
            .cloned()
            .collect()
    };
    ok(json!({"executing_tasks": filter(&s.executing), "finished_tasks": filter(&s.finished)}))
}

// =============================================================================
// cluster/user
// =============================================================================

fn caps_from_grants(body: &Value) -> BTreeMap<String, String> {
    body["capabilities"]
        .as_array()
        .map(|grants| {
            grants
                .iter()
                .filter_map(|g| Some((g["entity"].as_str()?.to_string(), g["cap"].as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

async fn list_auth(State(state): State<Shared>) -> Response {
    let s = state.lock();
    let users: Vec<Value> = s
        .auth
        .values()
        .map(|e| json!({"entity": e.entity, "caps": e.caps, "key": e.key}))
        .collect();
    ok(Value::Array(users))
}

async fn create_auth(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock();
    let Some(entity) = body["user_entity"].as_str().map(str::to_string) else {
        return error(StatusCode::BAD_REQUEST, "user_entity is required");
    };
    if s.auth.contains_key(&entity) {
        return error(StatusCode::BAD_REQUEST, format!("entity {} exists", entity));
    }

    let imported_key = body["import_data"]
        .as_str()
        .and_then(|text| keyring::parse_entity(text, &entity).ok())
        .and_then(|e| e.key);
    let key = match imported_key {
        Some(key) => key,
        None => s.next_key(),
    };

    let mut entry = KeyringEntry::new(entity.clone());
    entry.key = Some(key);
    entry.caps = caps_from_grants(&body).into_iter().collect();
    s.auth.insert(entity, entry);
    created()
}

async fn update_auth(State(state): State<Shared>, Path(entity): Path<String>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock();
    let Some(entry) = s.auth.get_mut(&entity) else {
        return error(StatusCode::NOT_FOUND, format!("entity {} does not exist", entity));
    };
    entry.caps = caps_from_grants(&body).into_iter().collect();
    ok(Value::Null)
}

async fn delete_auth(State(state): State<Shared>, Path(entity): Path<String>) -> Response {
    match state.lock().auth.remove(&entity) {
        Some(_) => no_content(),
        None => error(StatusCode::NOT_FOUND, format!("entity {} does not exist", entity)),
    }
}

async fn export_auth(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let s = state.lock();
    let mut entries = Vec::new();
    for entity in body["entities"].as_array().into_iter().flatten() {
        let name = entity.as_str().unwrap_or_default();
        match s.auth.get(name) {
            Some(entry) => entries.push(entry.clone()),
            None => {
                return error(
                    StatusCode::BAD_REQUEST,
                    format!("Failed to export: unable to export user '{}'", name),
                )
            }
        }
    }
    ok(Value::String(keyring::serialize(&entries)))
}

// =============================================================================
// rgw/user
// =============================================================================

fn wire_permission(access: &str) -> &'static str {
    match access {
        "read" => "read",
        "write" => "write",
        "readwrite" => "read-write",
        _ => "full-control",
    }
}

fn missing_user(uid: &str) -> Response {
    error(StatusCode::NOT_FOUND, format!("NoSuchUser: {}", uid))
}

async fn list_rgw_users(State(state): State<Shared>) -> Response {
    let s = state.lock();
    ok(json!(s.rgw_users.keys().collect::<Vec<_>>()))
}

async fn create_rgw_user(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock();
    let uid = body["uid"].as_str().unwrap_or_default().to_string();
    if s.rgw_users.contains_key(&uid) {
        return error(StatusCode::CONFLICT, "UserAlreadyExists");
    }
    s.task("rgw/user/create", json!({"uid": uid}), move |s| {
        let user = json!({
            "user_id": uid,
            "uid": uid,
            "tenant": "",
            "display_name": body["display_name"],
            "email": body["email"].as_str().unwrap_or(""),
            "max_buckets": body["max_buckets"].as_i64().unwrap_or(1000),
            "suspended": body["suspended"].as_u64().unwrap_or(0),
            "system": if body["system"].as_bool().unwrap_or(false) { "true" } else { "false" },
            "admin": false,
            "subusers": [],
            "keys": [],
            "swift_keys": []
        });
        s.rgw_users.insert(uid.clone(), user.clone());
        user
    })
}

async fn get_rgw_user(State(state): State<Shared>, Path(uid): Path<String>) -> Response {
    match state.lock().rgw_users.get(&uid) {
        Some(user) => ok(user.clone()),
        None => missing_user(&uid),
    }
}

async fn update_rgw_user(State(state): State<Shared>, Path(uid): Path<String>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock();
    let Some(user) = s.rgw_users.get_mut(&uid) else {
        return missing_user(&uid);
    };
    user["display_name"] = body["display_name"].clone();
    if let Some(email) = body["email"].as_str() {
        user["email"] = json!(email);
    }
    if let Some(max) = body["max_buckets"].as_i64() {
        user["max_buckets"] = json!(max);
    }
    if let Some(system) = body["system"].as_bool() {
        user["system"] = json!(if system { "true" } else { "false" });
    }
    user["suspended"] = body["suspended"].clone();
    ok(user.clone())
}

async fn delete_rgw_user(State(state): State<Shared>, Path(uid): Path<String>) -> Response {
    match state.lock().rgw_users.remove(&uid) {
        Some(_) => no_content(),
        None => missing_user(&uid),
    }
}

async fn create_subuser(State(state): State<Shared>, Path(uid): Path<String>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock();
    let Some(user) = s.rgw_users.get_mut(&uid) else {
        return missing_user(&uid);
    };
    let id = format!("{}:{}", uid, body["subuser"].as_str().unwrap_or_default());
    let permissions = wire_permission(body["access"].as_str().unwrap_or_default());
    if let Some(subusers) = user["subusers"].as_array_mut() {
        subusers.push(json!({"id": id, "permissions": permissions}));
    }
    created()
}

async fn update_subuser(
    State(state): State<Shared>,
    Path((uid, sub)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let mut s = state.lock();
    let Some(user) = s.rgw_users.get_mut(&uid) else {
        return missing_user(&uid);
    };
    let id = format!("{}:{}", uid, sub);
    let permissions = wire_permission(body["access"].as_str().unwrap_or_default());
    let entry = user["subusers"]
        .as_array_mut()
        .and_then(|subs| subs.iter_mut().find(|s| s["id"] == id.as_str()));
    match entry {
        Some(entry) => {
            entry["permissions"] = json!(permissions);
            ok(Value::Null)
        }
        None => error(StatusCode::NOT_FOUND, format!("subuser {} does not exist", id)),
    }
}

async fn delete_subuser(State(state): State<Shared>, Path((uid, sub)): Path<(String, String)>) -> Response {
    let mut s = state.lock();
    let Some(user) = s.rgw_users.get_mut(&uid) else {
        return missing_user(&uid);
    };
    let id = format!("{}:{}", uid, sub);
    let before = user["subusers"].as_array().map_or(0, Vec::len);
    if let Some(items) = user["subusers"].as_array_mut() {
        items.retain(|s| s["id"] != id.as_str());
    }
    for list in ["keys", "swift_keys"] {
        if let Some(items) = user[list].as_array_mut() {
            items.retain(|k| k["user"] != id.as_str());
        }
    }
    if user["subusers"].as_array().map_or(0, Vec::len) == before {
        return error(StatusCode::NOT_FOUND, format!("subuser {} does not exist", id));
    }
    no_content()
}

async fn create_key(State(state): State<Shared>, Path(uid): Path<String>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock();
    if !s.rgw_users.contains_key(&uid) {
        return missing_user(&uid);
    }
    let generated_access = format!("AK{:018}", s.generated_keys + 1);
    let generated_secret = s.next_key();
    let Some(user) = s.rgw_users.get_mut(&uid) else {
        return missing_user(&uid);
    };

    let owner = match body["subuser"].as_str() {
        Some(sub) => format!("{}:{}", uid, sub),
        None => uid.clone(),
    };
    let secret = body["secret_key"].as_str().map(str::to_string).unwrap_or(generated_secret);

    match body["key_type"].as_str() {
        Some("swift") => {
            if let Some(keys) = user["swift_keys"].as_array_mut() {
                keys.retain(|k| k["user"] != owner.as_str());
                keys.push(json!({"user": owner, "secret_key": secret}));
            }
        }
        _ => {
            let access = body["access_key"].as_str().map(str::to_string).unwrap_or(generated_access);
            if let Some(keys) = user["keys"].as_array_mut() {
                keys.push(json!({"user": owner, "access_key": access, "secret_key": secret, "active": true}));
            }
        }
    }
    created()
}

async fn delete_key(
    State(state): State<Shared>,
    Path(uid): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock();
    let Some(user) = s.rgw_users.get_mut(&uid) else {
        return missing_user(&uid);
    };
    let owner = match query.get("subuser") {
        Some(sub) => format!("{}:{}", uid, sub),
        None => uid.clone(),
    };
    let (list, removed) = match query.get("key_type").map(String::as_str) {
        Some("swift") => {
            let keys = user["swift_keys"].as_array_mut();
            let n = keys.map(|keys| {
                let before = keys.len();
                keys.retain(|k| k["user"] != owner.as_str());
                before - keys.len()
            });
            ("swift", n.unwrap_or(0))
        }
        _ => {
            let access = query.get("access_key").cloned().unwrap_or_default();
            let keys = user["keys"].as_array_mut();
            let n = keys.map(|keys| {
                let before = keys.len();
                keys.retain(|k| k["access_key"] != access.as_str());
                before - keys.len()
            });
            ("s3", n.unwrap_or(0))
        }
    };
    if removed == 0 {
        return error(StatusCode::NOT_FOUND, format!("NoSuchKey ({})", list));
    }
    no_content()
}

// =============================================================================
// osd/pool
// =============================================================================

const COMPRESSION_FIELDS: &[&str] = &[
    "compression_mode",
    "compression_algorithm",
    "compression_required_ratio",
    "compression_min_blob_size",
    "compression_max_blob_size",
];

/// Apply the fields of a create / edit body to a stored pool
fn apply_pool_spec(pool: &mut Value, spec: &Value) {
    for (field, target) in [
        ("size", "size"),
        ("min_size", "min_size"),
        ("pg_num", "pg_num"),
        ("rule_name", "crush_rule"),
        ("pg_autoscale_mode", "pg_autoscale_mode"),
        ("primary_affinity", "primary_affinity"),
        ("application_metadata", "application_metadata"),
        ("quota_max_bytes", "quota_max_bytes"),
        ("quota_max_objects", "quota_max_objects"),
    ] {
        if !spec[field].is_null() {
            pool[target] = spec[field].clone();
        }
    }
    for field in COMPRESSION_FIELDS {
        let value = match &spec[*field] {
            Value::Null => continue,
            // The monitor echoes ratios with six decimals
            Value::Number(n) if *field == "compression_required_ratio" => {
                json!(format!("{:.6}", n.as_f64().unwrap_or_default()))
            }
            other => other.clone(),
        };
        pool["options"][*field] = value;
    }
}

async fn list_pools(State(state): State<Shared>) -> Response {
    ok(json!(state.lock().pools.values().cloned().collect::<Vec<_>>()))
}

async fn get_pool(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    match state.lock().pools.get(&name) {
        Some(pool) => ok(pool.clone()),
        None => error(StatusCode::NOT_FOUND, format!("pool {} does not exist", name)),
    }
}

async fn create_pool(State(state): State<Shared>, Json(spec): Json<Value>) -> Response {
    let mut s = state.lock();
    let name = spec["pool"].as_str().unwrap_or_default().to_string();
    if s.pools.contains_key(&name) {
        return error(StatusCode::BAD_REQUEST, format!("pool '{}' already exists", name));
    }
    s.task("pool/create", json!({"pool_name": name}), move |s| {
        let mut pool = json!({
            "pool_name": name,
            "type": spec["pool_type"].as_str().unwrap_or("replicated"),
            "size": 3,
            "min_size": 2,
            "pg_num": 32,
            "crush_rule": "replicated_rule",
            "primary_affinity": 1.0,
            "application_metadata": {},
            "erasure_code_profile": spec["erasure_code_profile"].as_str().unwrap_or(""),
            "pg_autoscale_mode": "on",
            "quota_max_bytes": 0,
            "quota_max_objects": 0,
            "options": {}
        });
        apply_pool_spec(&mut pool, &spec);
        s.pools.insert(name, pool);
        Value::Null
    })
}

async fn update_pool(State(state): State<Shared>, Path(name): Path<String>, Json(spec): Json<Value>) -> Response {
    let mut s = state.lock();
    if !s.pools.contains_key(&name) {
        return error(StatusCode::NOT_FOUND, format!("pool {} does not exist", name));
    }
    s.task("pool/edit", json!({"pool_name": name}), move |s| {
        if let Some(pool) = s.pools.get_mut(&name) {
            apply_pool_spec(pool, &spec);
        }
        Value::Null
    })
}

async fn delete_pool(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    let mut s = state.lock();
    if !s.pools.contains_key(&name) {
        return error(StatusCode::NOT_FOUND, format!("pool {} does not exist", name));
    }
    s.task("pool/delete", json!({"pool_name": name}), move |s| {
        s.pools.remove(&name);
        Value::Null
    })
}

// =============================================================================
// crush_rule / erasure_code_profile
// =============================================================================

fn crush_rule_json(id: i64, name: &str, root: &str, class: Option<&str>, domain: &str) -> Value {
    let take = match class {
        Some(class) => format!("{}~{}", root, class),
        None => root.to_string(),
    };
    json!({
        "rule_id": id,
        "rule_name": name,
        "type": 1,
        "steps": [
            {"op": "take", "item": -1, "item_name": take},
            {"op": "chooseleaf_firstn", "num": 0, "type": domain},
            {"op": "emit"}
        ]
    })
}

async fn list_crush_rules(State(state): State<Shared>) -> Response {
    ok(json!(state.lock().crush_rules.values().cloned().collect::<Vec<_>>()))
}

async fn get_crush_rule(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    match state.lock().crush_rules.get(&name) {
        Some(rule) => ok(rule.clone()),
        None => error(StatusCode::NOT_FOUND, format!("rule {} does not exist", name)),
    }
}

async fn create_crush_rule(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock();
    let name = body["name"].as_str().unwrap_or_default().to_string();
    if s.crush_rules.contains_key(&name) {
        return error(StatusCode::BAD_REQUEST, format!("rule {} exists", name));
    }
    let id = s.crush_rules.len() as i64;
    let rule = crush_rule_json(
        id,
        &name,
        body["root"].as_str().unwrap_or("default"),
        body["device_class"].as_str(),
        body["failure_domain"].as_str().unwrap_or("host"),
    );
    s.crush_rules.insert(name, rule);
    created()
}

async fn delete_crush_rule(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    match state.lock().crush_rules.remove(&name) {
        Some(_) => no_content(),
        None => error(StatusCode::NOT_FOUND, format!("rule {} does not exist", name)),
    }
}

async fn list_ec_profiles(State(state): State<Shared>) -> Response {
    ok(json!(state.lock().ec_profiles.values().cloned().collect::<Vec<_>>()))
}

async fn get_ec_profile(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    match state.lock().ec_profiles.get(&name) {
        Some(profile) => ok(profile.clone()),
        None => error(StatusCode::NOT_FOUND, format!("profile {} does not exist", name)),
    }
}

async fn create_ec_profile(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock();
    let name = body["name"].as_str().unwrap_or_default().to_string();
    // The monitor keeps every profile value as a string
    let mut profile = Map::new();
    for (key, value) in body.as_object().into_iter().flatten() {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        profile.insert(key.clone(), Value::String(text));
    }
    profile.entry("plugin").or_insert(json!("jerasure"));
    s.ec_profiles.insert(name, Value::Object(profile));
    created()
}

async fn delete_ec_profile(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    match state.lock().ec_profiles.remove(&name) {
        Some(_) => no_content(),
        None => error(StatusCode::NOT_FOUND, format!("profile {} does not exist", name)),
    }
}

// =============================================================================
// mgr/module / cluster_conf
// =============================================================================

/// Coerce a string to the type of the option's default
fn coerce(default: &Value, raw: &str) -> Option<Value> {
    match default {
        Value::Bool(_) => match raw {
            "true" | "True" | "1" => Some(json!(true)),
            "false" | "False" | "0" => Some(json!(false)),
            _ => None,
        },
        Value::Number(n) if n.is_i64() || n.is_u64() => raw.parse::<i64>().ok().map(|v| json!(v)),
        Value::Number(_) => raw.parse::<f64>().ok().map(|v| json!(v)),
        _ => Some(json!(raw)),
    }
}

async fn list_mgr_modules(State(state): State<Shared>) -> Response {
    let s = state.lock();
    let modules: Vec<Value> = s
        .mgr_defaults
        .keys()
        .map(|name| json!({"name": name, "enabled": true, "always_on": name == "pg_autoscaler"}))
        .collect();
    ok(Value::Array(modules))
}

async fn get_mgr_module(State(state): State<Shared>, Path(module): Path<String>) -> Response {
    let s = state.lock();
    let Some(defaults) = s.mgr_defaults.get(&module) else {
        return error(StatusCode::NOT_FOUND, format!("module {} does not exist", module));
    };
    let mut config = Map::new();
    for (option, default) in defaults {
        let name = format!("mgr/{}/{}", module, option);
        let set = s
            .cluster_conf
            .get(&name)
            .and_then(|sections| sections.get("mgr"))
            .and_then(Value::as_str)
            .and_then(|raw| coerce(default, raw));
        config.insert(option.clone(), set.unwrap_or_else(|| default.clone()));
    }
    ok(Value::Object(config))
}

async fn set_mgr_module(State(state): State<Shared>, Path(module): Path<String>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock();
    let Some(defaults) = s.mgr_defaults.get(&module).cloned() else {
        return error(StatusCode::NOT_FOUND, format!("module {} does not exist", module));
    };
    let mut updates = Vec::new();
    for (option, value) in body["config"].as_object().into_iter().flatten() {
        let raw = value.as_str().unwrap_or_default();
        let Some(default) = defaults.get(option) else {
            return error(StatusCode::BAD_REQUEST, format!("unknown option {}", option));
        };
        let Some(typed) = coerce(default, raw) else {
            return error(StatusCode::BAD_REQUEST, format!("invalid value {:?} for {}", raw, option));
        };
        let canonical = match typed {
            Value::String(s) => s,
            other => other.to_string(),
        };
        updates.push((format!("mgr/{}/{}", module, option), canonical));
    }
    for (name, value) in updates {
        s.cluster_conf.entry(name).or_default().insert("mgr".into(), json!(value));
    }
    ok(Value::Null)
}

fn conf_json(name: &str, sections: &BTreeMap<String, Value>) -> Value {
    let value: Vec<Value> = sections
        .iter()
        .map(|(section, value)| json!({"section": section, "value": value}))
        .collect();
    json!({"name": name, "type": "str", "value": value})
}

async fn list_conf(State(state): State<Shared>) -> Response {
    let s = state.lock();
    let options: Vec<Value> = s
        .cluster_conf
        .iter()
        .map(|(name, sections)| conf_json(name, sections))
        .collect();
    ok(Value::Array(options))
}

async fn get_conf(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    match state.lock().cluster_conf.get(&name) {
        Some(sections) => ok(conf_json(&name, sections)),
        None => error(StatusCode::NOT_FOUND, format!("option {} does not exist", name)),
    }
}

async fn set_conf(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock();
    let name = body["name"].as_str().unwrap_or_default().to_string();
    for entry in body["value"].as_array().into_iter().flatten() {
        let section = entry["section"].as_str().unwrap_or_default().to_string();
        s.cluster_conf
            .entry(name.clone())
            .or_default()
            .insert(section, entry["value"].clone());
    }
    created()
}

async fn delete_conf(
    State(state): State<Shared>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let mut s = state.lock();
    let section = query.get("section").cloned().unwrap_or_default();
    if let Some(sections) = s.cluster_conf.get_mut(&name) {
        sections.remove(&section);
        if sections.is_empty() {
            s.cluster_conf.remove(&name);
        }
    }
    no_content()
}
