use anyhow::{bail, Context, Result};
use bytes::Bytes;
use http_bench_util::{byte_body, empty_body, form_encode, FORM_CONTENT_TYPE};
use hyper::header::{CONTENT_TYPE, COOKIE, LOCATION};
use hyper::{Method, Request, StatusCode};
use tracing::debug;
use url::Url;

use crate::client::{to_uri, CookieJar, HttpClient, Reply, AUTH_COOKIE};
use crate::compiler::compiler_id;
use crate::error::LoginError;
use crate::runner::{ContestSession, SessionFactory};
use crate::scenario::Scenario;

/// Requests in one redirect chain, the first one included.
const MAX_REDIRECTS: usize = 10;

/// One simulated user: its own cookie jar on top of a shared transport.
pub struct WebClient {
    base_url: String,
    site: Url,
    http: HttpClient,
    jar: CookieJar,
    contest_id: u64,
}

impl WebClient {
    pub fn new(base_url: &str, http: HttpClient) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let site = Url::parse(&format!("{base_url}/"))
            .with_context(|| format!("Invalid base url {base_url:?}"))?;
        Ok(Self {
            base_url,
            site,
            http,
            jar: CookieJar::default(),
            contest_id: 0,
        })
    }

    #[must_use]
    pub fn contest_id(&self) -> u64 {
        self.contest_id
    }

    /// Whether the site's auth cookie is held and still valid.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.jar.contains(AUTH_COOKIE, &self.site)
    }

    fn url(&self, relative: &str) -> Result<Url> {
        let full = format!("{}{relative}", self.base_url);
        Url::parse(&full).with_context(|| format!("Invalid request url {full:?}"))
    }

    async fn execute(
        &mut self,
        mut method: Method,
        mut url: Url,
        mut form: Option<Bytes>,
    ) -> Result<Reply> {
        for _ in 0..MAX_REDIRECTS {
            let mut builder = Request::builder().method(method.clone()).uri(to_uri(&url)?);
            if let Some(cookies) = self.jar.header_value(&url) {
                builder = builder.header(COOKIE, cookies);
            }
            let body = match &form {
                Some(fields) => {
                    builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
                    byte_body(fields.clone())
                }
                None => empty_body(),
            };
            let request = builder
                .body(body)
                .with_context(|| format!("Failed to build {method} {url}"))?;
            let reply = self.http.send_recv(request).await?;
            self.jar.store(&reply.headers, &url);
            if !reply.status.is_redirection() {
                return Ok(reply);
            }
            let Some(location) = reply.headers.get(LOCATION).and_then(|hv| hv.to_str().ok()) else {
                return Ok(reply);
            };
            let next = url
                .join(location)
                .with_context(|| format!("Invalid redirect location {location:?}"))?;
            debug!("{method} {url} redirected ({}) to {next}", reply.status);
            if !matches!(
                reply.status,
                StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
            ) {
                if method != Method::HEAD {
                    method = Method::GET;
                }
                form = None;
            }
            url = next;
        }
        bail!("stopped after {MAX_REDIRECTS} redirects")
    }

    async fn get(&mut self, relative: &str) -> Result<Reply> {
        let url = self.url(relative)?;
        self.execute(Method::GET, url, None).await
    }

    async fn post_form(&mut self, relative: &str, fields: &[(&str, &str)]) -> Result<Reply> {
        let url = self.url(relative)?;
        let form = form_encode(fields.iter().copied());
        self.execute(Method::POST, url, Some(form)).await
    }

    /// Primes the session, posts the login form, and checks that the site
    /// handed out its authentication cookie.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), LoginError> {
        self.get("/Account/LogOn").await?;
        let reply = self
            .post_form(
                "/Account/LogOn",
                &[
                    ("Login", username),
                    ("Password", password),
                    ("RememberMe", "false"),
                    ("logon", "Вход"),
                ],
            )
            .await?;
        if reply.status.is_server_error() {
            return Err(LoginError::ServerError(reply.status));
        }
        if !self.is_logged_in() {
            return Err(LoginError::MissingCookie);
        }
        Ok(())
    }

    pub async fn enter_contest(&mut self, contest_id: u64) -> Result<()> {
        self.get(&format!("/Contest/EnterContest?contestID={contest_id}"))
            .await?;
        self.contest_id = contest_id;
        Ok(())
    }

    async fn monitor(&mut self, name: &str, params: &[&str]) -> Result<String> {
        let mut relative = format!("/Monitor/{name}?contestId={}", self.contest_id);
        for param in params {
            relative.push('&');
            relative.push_str(param);
        }
        let reply = self.get(&relative).await?;
        if reply.status != StatusCode::OK {
            bail!("unable to read monitor: {}", reply.status);
        }
        Ok(String::from_utf8_lossy(&reply.body).into_owned())
    }

    pub async fn acm_monitor(&mut self) -> Result<String> {
        self.monitor("AcmMonitor", &["showLeftMenu=True"]).await
    }

    pub async fn school_final_monitor(&mut self) -> Result<String> {
        self.monitor("SchoolFinalMonitor", &[]).await
    }

    pub async fn my_school_final_submits(&mut self) -> Result<String> {
        self.monitor("MySchoolFinalSubmits", &[]).await
    }

    /// `compiler` may be a display name or a raw compiler id.
    pub async fn submit(&mut self, problem: &str, compiler: &str, solution: &str) -> Result<()> {
        let relative = format!("/Contest/Submit?contestId={}", self.contest_id);
        self.post_form(
            &relative,
            &[
                ("Problem", problem),
                ("Compiler", compiler_id(compiler)),
                ("SolutionText", solution),
                ("SolutionFileType", "Text"),
            ],
        )
        .await?;
        Ok(())
    }
}

impl ContestSession for WebClient {
    async fn login(&mut self, username: &str, password: &str) -> Result<(), LoginError> {
        WebClient::login(self, username, password).await
    }

    async fn enter_contest(&mut self, contest_id: u64) -> Result<()> {
        WebClient::enter_contest(self, contest_id).await
    }

    async fn run_scenario(&mut self, scenario: Scenario) -> Result<()> {
        scenario.run(self).await
    }
}

/// Opens a fresh [`WebClient`] per worker over one shared connection pool.
#[derive(Clone)]
pub struct WebSessionFactory {
    base_url: String,
    http: HttpClient,
}

impl WebSessionFactory {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: HttpClient::new(),
        }
    }
}

impl SessionFactory for WebSessionFactory {
    type Session = WebClient;

    fn open(&self, _worker: usize) -> Result<WebClient> {
        WebClient::new(&self.base_url, self.http.clone())
    }
}
