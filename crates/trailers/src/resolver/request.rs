use std::collections::HashMap;
use std::str::FromStr;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;

use super::default::DEFAULT_UA;

/// Request builder bound to one provider domain.
///
/// Carries the headers every call to that provider shares (browser
/// User-Agent, `Origin`/`Referer`, credential headers) so strategy code only
/// adds what is specific to a single request.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    /// Registry domain this client talks on behalf of, e.g. "example.com".
    pub domain: String,
    pub client: Client,
    headers: HeaderMap,
}

impl ProviderClient {
    pub fn new<S: Into<String>>(domain: S, client: Client) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(DEFAULT_UA),
        );
        headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        Self {
            domain: domain.into(),
            client,
            headers,
        }
    }

    pub fn set_origin_and_referer(&mut self, site: &str) {
        self.add_header_typed(reqwest::header::ORIGIN, site);
        self.add_header_typed(reqwest::header::REFERER, site);
    }

    pub fn add_header_str<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) {
        match HeaderName::from_str(key.as_ref()) {
            Ok(name) => self.add_header_typed(name, value),
            Err(e) => {
                debug!(error = %e, "Invalid header name; skipping");
            }
        }
    }

    pub fn add_header_typed<K: Into<HeaderName>, V: AsRef<str>>(&mut self, key: K, value: V) {
        match HeaderValue::from_str(value.as_ref()) {
            Ok(value) => {
                self.headers.insert(key.into(), value);
            }
            Err(e) => {
                debug!(error = %e, "Invalid header value; skipping");
            }
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .headers(self.headers.clone())
    }
}

/// Parse cookies from `Set-Cookie` response headers.
///
/// Only the leading `name=value` pair of each header is kept; attributes
/// such as `Path` or `Expires` are dropped. Empty names or values are skipped.
pub fn parse_set_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for value in headers.get_all(reqwest::header::SET_COOKIE) {
        if let Ok(cookie_str) = value.to_str()
            && let Some(kv) = cookie_str.split(';').next()
            && let Some((name, value)) = kv.split_once('=')
        {
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                continue;
            }
            cookies.insert(name.to_owned(), value.to_owned());
        }
    }

    cookies
}
