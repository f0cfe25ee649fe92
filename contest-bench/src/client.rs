use anyhow::{Context, Result};
use bytes::Bytes;
use cookie_store::{CookieStore, RawCookie};
use http_body_util::Full;
use http_bench_util::drain::DrainBodyFuture;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, SET_COOKIE};
use hyper::{Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::Url;

/// Cookie the contest site sets once a login went through.
pub const AUTH_COOKIE: &str = ".ASPXAUTH";

/// Pooled plain-http transport. Clones share connections but nothing else,
/// cookies live with each [`crate::web_client::WebClient`].
#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpClient {
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    pub async fn send_recv(&self, request: Request<Full<Bytes>>) -> Result<Reply> {
        let resp = self
            .client
            .request(request)
            .await
            .context("Failed to send request")?;
        let content_length: usize = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|hv| hv.to_str().ok())
            .and_then(|hv| hv.parse().ok())
            .unwrap_or(1024);
        let (parts, body) = resp.into_parts();
        let body = DrainBodyFuture::with_capacity(body, content_length)
            .await
            .context("Failed to read response body")?;
        Ok(Reply {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

/// Cookies of one simulated user.
#[derive(Debug, Default)]
pub struct CookieJar {
    store: CookieStore,
}

impl CookieJar {
    /// Applies every parseable `Set-Cookie` header of a response to `url`.
    pub fn store(&mut self, headers: &HeaderMap, url: &Url) {
        let cookies = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|hv| hv.to_str().ok())
            .filter_map(|raw| RawCookie::parse(raw).ok())
            .map(RawCookie::into_owned);
        self.store.store_response_cookies(cookies, url);
    }

    /// Whether an unexpired cookie named `name` would be sent to `url`.
    #[must_use]
    pub fn contains(&self, name: &str, url: &Url) -> bool {
        self.store
            .get_request_values(url)
            .any(|(cookie, _)| cookie == name)
    }

    /// Value for a `Cookie` request header, `None` when nothing applies.
    #[must_use]
    pub fn header_value(&self, url: &Url) -> Option<HeaderValue> {
        let joined = self
            .store
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if joined.is_empty() {
            return None;
        }
        HeaderValue::from_str(&joined).ok()
    }
}

pub fn to_uri(url: &Url) -> Result<Uri> {
    url.as_str()
        .parse()
        .with_context(|| format!("Invalid request url {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(set_cookies: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in set_cookies {
            headers.append(SET_COOKIE, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    fn site() -> Url {
        Url::parse("http://bacs.local/Account/LogOn").unwrap()
    }

    #[test]
    fn jar_keeps_latest_value_per_name() {
        let mut jar = CookieJar::default();
        jar.store(
            &headers(&[
                "ASP.NET_SessionId=abc; path=/; HttpOnly",
                ".ASPXAUTH=first; path=/",
            ]),
            &site(),
        );
        jar.store(&headers(&[".ASPXAUTH=second; path=/; HttpOnly"]), &site());
        assert!(jar.contains(AUTH_COOKIE, &site()));
        let sent = jar.header_value(&site()).unwrap();
        let sent = sent.to_str().unwrap();
        assert!(sent.contains(".ASPXAUTH=second"));
        assert!(sent.contains("ASP.NET_SessionId=abc"));
        assert!(!sent.contains("first"));
    }

    #[test]
    fn max_age_zero_drops_cookie() {
        let mut jar = CookieJar::default();
        jar.store(&headers(&[".ASPXAUTH=token; path=/"]), &site());
        jar.store(&headers(&[".ASPXAUTH=; Max-Age=0; path=/"]), &site());
        assert!(!jar.contains(AUTH_COOKIE, &site()));
        assert!(jar.header_value(&site()).is_none());
    }

    #[test]
    fn cookie_expired_by_date_is_not_a_login() {
        let mut jar = CookieJar::default();
        jar.store(
            &headers(&[".ASPXAUTH=stale; expires=Mon, 11-Oct-1999 00:00:00 GMT; path=/"]),
            &site(),
        );
        assert!(!jar.contains(AUTH_COOKIE, &site()));
    }

    #[test]
    fn cookie_path_limits_where_it_is_sent() {
        let mut jar = CookieJar::default();
        jar.store(&headers(&["scoped=1; path=/Monitor"]), &site());
        let monitor = Url::parse("http://bacs.local/Monitor/AcmMonitor").unwrap();
        assert!(jar.contains("scoped", &monitor));
        assert!(!jar.contains("scoped", &site()));
    }

    #[test]
    fn malformed_set_cookie_is_ignored() {
        let mut jar = CookieJar::default();
        jar.store(&headers(&["no-equals-sign"]), &site());
        assert!(jar.header_value(&site()).is_none());
    }

    #[test]
    fn redirect_targets_resolve_like_a_browser() {
        let current = site();
        assert_eq!(
            current.join("?ReturnUrl=%2f").unwrap().as_str(),
            "http://bacs.local/Account/LogOn?ReturnUrl=%2f"
        );
        assert_eq!(
            current.join("../Contest/Index").unwrap().as_str(),
            "http://bacs.local/Contest/Index"
        );
        assert_eq!(
            to_uri(&current.join("/").unwrap()).unwrap(),
            "http://bacs.local/"
        );
    }
}
