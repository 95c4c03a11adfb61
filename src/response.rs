use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::fmt;

/// The network route an attempt takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Path {
    Proxied,
    Direct,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Proxied => write!(f, "proxied"),
            Path::Direct => write!(f, "direct"),
        }
    }
}

/// A successfully fetched response. `body` has HTML entities decoded.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub body: String,
    pub headers: HeaderMap,
    pub status: StatusCode,
    pub path: Path,
}

impl fmt::Display for FetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} via {} ({} bytes)",
            self.status,
            self.path,
            self.body.len()
        )
    }
}
