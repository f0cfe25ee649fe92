use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::debug;

pub const AUTH_COOKIE: &str = ".ASPXAUTH";
const SESSION_COOKIE: &str = "ASP.NET_SessionId";
const LOGIN_PATH: &str = "/Account/LogOn";
const MONITORS: [&str; 3] = ["AcmMonitor", "SchoolFinalMonitor", "MySchoolFinalSubmits"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub username: String,
    pub contest_id: u64,
    pub problem: String,
    pub compiler: String,
    pub solution: String,
}

/// Request that arrived at `/Contest/Submitted` after a submit redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landing {
    pub method: Method,
    pub body: String,
}

#[derive(Default)]
pub struct FakeContestBuilder {
    users: HashMap<String, String>,
    broken_monitors: HashSet<String>,
    looping_monitors: HashSet<String>,
    failing_login: bool,
    submit_redirect: Option<StatusCode>,
}

impl FakeContestBuilder {
    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(username.into(), password.into());
        self
    }

    /// Makes the named monitor answer `503 Service Unavailable`.
    #[must_use]
    pub fn with_broken_monitor(mut self, name: impl Into<String>) -> Self {
        self.broken_monitors.insert(name.into());
        self
    }

    /// Makes the named monitor redirect to itself forever.
    #[must_use]
    pub fn with_redirect_loop(mut self, name: impl Into<String>) -> Self {
        self.looping_monitors.insert(name.into());
        self
    }

    /// Makes the login form answer `500 Internal Server Error`.
    #[must_use]
    pub fn with_failing_login(mut self) -> Self {
        self.failing_login = true;
        self
    }

    /// Makes a successful submit redirect with `status` to the relative
    /// `Submitted` landing page instead of the contest index.
    #[must_use]
    pub fn with_submit_redirect(mut self, status: StatusCode) -> Self {
        self.submit_redirect = Some(status);
        self
    }

    #[must_use]
    pub fn build(self) -> FakeContest {
        FakeContest {
            inner: Arc::new(Inner {
                users: self.users,
                broken_monitors: self.broken_monitors,
                looping_monitors: self.looping_monitors,
                failing_login: self.failing_login,
                submit_redirect: self.submit_redirect,
                next_token: AtomicU64::new(1),
                sessions: Mutex::new(HashMap::new()),
                entered: Mutex::new(HashMap::new()),
                submissions: Mutex::new(Vec::new()),
                landings: Mutex::new(Vec::new()),
                monitor_hits: AtomicUsize::new(0),
            }),
        }
    }
}

struct Inner {
    users: HashMap<String, String>,
    broken_monitors: HashSet<String>,
    looping_monitors: HashSet<String>,
    failing_login: bool,
    submit_redirect: Option<StatusCode>,
    next_token: AtomicU64,
    /// auth token -> username
    sessions: Mutex<HashMap<String, String>>,
    /// auth token -> contest id
    entered: Mutex<HashMap<String, u64>>,
    submissions: Mutex<Vec<Submission>>,
    landings: Mutex<Vec<Landing>>,
    monitor_hits: AtomicUsize,
}

#[derive(Clone)]
pub struct FakeContest {
    inner: Arc<Inner>,
}

impl FakeContest {
    #[must_use]
    pub fn builder() -> FakeContestBuilder {
        FakeContestBuilder::default()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(get_index))
            .route(LOGIN_PATH, get(get_logon).post(post_logon))
            .route("/Contest/EnterContest", get(enter_contest))
            .route("/Contest/Index", get(contest_index))
            .route("/Contest/Submit", post(submit))
            .route("/Contest/Submitted", get(submitted).post(submitted))
            .route("/Monitor/:name", get(monitor))
            .with_state(self.clone())
    }

    /// Serves until the listener fails.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router()).await
    }

    #[must_use]
    pub fn logged_in(&self) -> usize {
        lock(&self.inner.sessions).len()
    }

    #[must_use]
    pub fn entered(&self) -> usize {
        lock(&self.inner.entered).len()
    }

    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.inner.submissions).clone()
    }

    #[must_use]
    pub fn landings(&self) -> Vec<Landing> {
        lock(&self.inner.landings).clone()
    }

    #[must_use]
    pub fn monitor_hits(&self) -> usize {
        self.inner.monitor_hits.load(Ordering::Acquire)
    }

    fn authenticated(&self, headers: &HeaderMap) -> Option<(String, String)> {
        let token = cookie(headers, AUTH_COOKIE)?;
        let username = lock(&self.inner.sessions).get(&token).cloned()?;
        Some((token, username))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|hv| hv.to_str().ok())
        .flat_map(|hv| hv.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

fn to_login() -> Response {
    redirect(LOGIN_PATH)
}

async fn get_index() -> Html<&'static str> {
    Html("<html><body>BACS</body></html>")
}

async fn get_logon(State(site): State<FakeContest>, headers: HeaderMap) -> Response {
    let page = Html("<html><body><form method=\"post\">logon</form></body></html>");
    if cookie(&headers, SESSION_COOKIE).is_some() {
        return page.into_response();
    }
    let id = site.inner.next_token.fetch_add(1, Ordering::AcqRel);
    let set = format!("{SESSION_COOKIE}=s{id:016x}; path=/; HttpOnly");
    ([(SET_COOKIE, set)], page).into_response()
}

async fn post_logon(
    State(site): State<FakeContest>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if site.inner.failing_login {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let login = form.get("Login").map(String::as_str).unwrap_or_default();
    let password = form.get("Password").map(String::as_str).unwrap_or_default();
    if login.is_empty() || site.inner.users.get(login).map(String::as_str) != Some(password) {
        debug!("Rejected login for {login:?}");
        return Html("<html><body>invalid login</body></html>").into_response();
    }
    let token = format!(
        "{:032x}",
        site.inner.next_token.fetch_add(1, Ordering::AcqRel)
    );
    lock(&site.inner.sessions).insert(token.clone(), login.to_string());
    let set = format!("{AUTH_COOKIE}={token}; path=/; HttpOnly");
    (StatusCode::FOUND, [(LOCATION, "/".to_string()), (SET_COOKIE, set)]).into_response()
}

#[derive(Deserialize)]
struct EnterContestQuery {
    #[serde(rename = "contestID")]
    contest_id: u64,
}

async fn enter_contest(
    State(site): State<FakeContest>,
    Query(query): Query<EnterContestQuery>,
    headers: HeaderMap,
) -> Response {
    let Some((token, _)) = site.authenticated(&headers) else {
        return to_login();
    };
    lock(&site.inner.entered).insert(token, query.contest_id);
    redirect("/Contest/Index")
}

async fn contest_index(State(site): State<FakeContest>, headers: HeaderMap) -> Response {
    if site.authenticated(&headers).is_none() {
        return to_login();
    }
    Html("<html><body>contest</body></html>").into_response()
}

#[derive(Deserialize)]
struct ContestQuery {
    #[serde(rename = "contestId")]
    contest_id: u64,
}

async fn monitor(
    State(site): State<FakeContest>,
    Path(name): Path<String>,
    Query(query): Query<ContestQuery>,
    headers: HeaderMap,
) -> Response {
    if !MONITORS.contains(&name.as_str()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    if site.authenticated(&headers).is_none() {
        return to_login();
    }
    site.inner.monitor_hits.fetch_add(1, Ordering::AcqRel);
    if site.inner.looping_monitors.contains(&name) {
        return redirect(&format!("/Monitor/{name}?contestId={}", query.contest_id));
    }
    if site.inner.broken_monitors.contains(&name) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Html(format!(
        "<html><body><table id=\"{name}\" data-contest=\"{}\"></table></body></html>",
        query.contest_id
    ))
    .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitForm {
    problem: String,
    compiler: String,
    solution_text: String,
    solution_file_type: String,
}

async fn submit(
    State(site): State<FakeContest>,
    Query(query): Query<ContestQuery>,
    headers: HeaderMap,
    Form(form): Form<SubmitForm>,
) -> Response {
    let Some((token, username)) = site.authenticated(&headers) else {
        return to_login();
    };
    if lock(&site.inner.entered).get(&token) != Some(&query.contest_id) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if form.solution_file_type != "Text" {
        return StatusCode::BAD_REQUEST.into_response();
    }
    lock(&site.inner.submissions).push(Submission {
        username,
        contest_id: query.contest_id,
        problem: form.problem,
        compiler: form.compiler,
        solution: form.solution_text,
    });
    let Some(status) = site.inner.submit_redirect else {
        return redirect("/Contest/Index");
    };
    let location = format!("Submitted?contestId={}", query.contest_id);
    (status, [(LOCATION, location)]).into_response()
}

async fn submitted(State(site): State<FakeContest>, method: Method, body: String) -> Response {
    lock(&site.inner.landings).push(Landing { method, body });
    Html("<html><body>submitted</body></html>").into_response()
}
