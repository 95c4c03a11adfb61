use crate::client::build_client;
use crate::configuration::FetchConfig;
use crate::error::FetchError;
use crate::response::{FetchResult, Path};
use log::debug;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, StatusCode, Url};

// Connectivity-check endpoints answer HEAD cheaply
const HEAD_PATTERN: &str = r"204|blank|generate|gstatic";

/// Builds a header map from string pairs, rejecting invalid names or values.
pub fn headers_from_pairs<I, K, V>(pairs: I) -> Result<HeaderMap, FetchError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_ref().trim().as_bytes()).map_err(|e| {
            FetchError::RequestBuild(format!("invalid header name {:?}: {}", name.as_ref(), e))
        })?;
        let value = HeaderValue::from_str(value.as_ref().trim()).map_err(|e| {
            FetchError::RequestBuild(format!("invalid value for header {}: {}", name, e))
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

pub(crate) fn parse_target(url: &str) -> Result<Url, FetchError> {
    Url::parse(url).map_err(|e| FetchError::RequestBuild(format!("invalid url {:?}: {}", url, e)))
}

/// Copies `headers`, adding `User-Agent` when the caller did not set one.
pub(crate) fn with_default_user_agent(
    headers: &HeaderMap,
    user_agent: &str,
) -> Result<HeaderMap, FetchError> {
    let mut headers = headers.clone();
    if !headers.contains_key(USER_AGENT) {
        let value = HeaderValue::from_str(user_agent)
            .map_err(|e| FetchError::RequestBuild(format!("invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, value);
    }
    Ok(headers)
}

// Host, path and query; the port never decides the probe method
fn probe_key(url: &Url) -> String {
    format!(
        "{}{}?{}",
        url.host_str().unwrap_or_default(),
        url.path(),
        url.query().unwrap_or_default()
    )
}

pub(crate) fn decode_body(bytes: &[u8]) -> String {
    htmlize::unescape(String::from_utf8_lossy(bytes)).into_owned()
}

/// One GET over one path. With `require_body`, an empty body is a failure.
pub(crate) async fn get(
    client: &Client,
    path: Path,
    url: Url,
    headers: HeaderMap,
    require_body: bool,
) -> Result<FetchResult, FetchError> {
    let resp = client
        .get(url)
        .headers(headers)
        .send()
        .await
        .map_err(|source| FetchError::Transport { path, source })?;

    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp
        .bytes()
        .await
        .map_err(|source| FetchError::Transport { path, source })?;

    if require_body && bytes.is_empty() {
        return Err(FetchError::EmptyResponse { path });
    }

    Ok(FetchResult {
        body: decode_body(&bytes),
        headers,
        status,
        path,
    })
}

/// Sequential GET over a single path: proxied when `proxy` is non-empty,
/// direct otherwise. Empty bodies are returned as-is.
pub async fn send_get(
    url: &str,
    headers: &HeaderMap,
    proxy: Option<&str>,
    config: &FetchConfig,
) -> Result<FetchResult, FetchError> {
    let proxy = proxy.filter(|p| !p.is_empty());
    let path = if proxy.is_some() { Path::Proxied } else { Path::Direct };

    let url = parse_target(url)?;
    let headers = with_default_user_agent(headers, &config.user_agent)?;
    let client = build_client(proxy, config.request_timeout, config.dial_timeout)?;

    get(&client, path, url, headers, false).await
}

/// Returns the status code of `url`. Connectivity-check URLs are probed with
/// HEAD, anything else with GET.
pub async fn send_head(
    url: &str,
    proxy: Option<&str>,
    config: &FetchConfig,
) -> Result<StatusCode, FetchError> {
    let proxy = proxy.filter(|p| !p.is_empty());
    let path = if proxy.is_some() { Path::Proxied } else { Path::Direct };

    let target = parse_target(url)?;
    let pattern = Regex::new(HEAD_PATTERN)
        .map_err(|e| FetchError::RequestBuild(format!("invalid probe pattern: {}", e)))?;
    let method = if pattern.is_match(&probe_key(&target)) {
        Method::HEAD
    } else {
        Method::GET
    };

    let headers = with_default_user_agent(&HeaderMap::new(), &config.user_agent)?;
    let client = build_client(proxy, config.probe_timeout, config.dial_timeout)?;

    debug!("probing {} with {} ({})", url, method, path);
    let resp = client
        .request(method, target)
        .headers(headers)
        .send()
        .await
        .map_err(|source| FetchError::Transport { path, source })?;

    Ok(resp.status())
}
