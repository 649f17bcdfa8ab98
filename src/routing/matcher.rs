//! Local target parsing and route matching.
//!
//! # Responsibilities
//! - Recover the original target from a local path `/<scheme>/<domain><path>`
//! - Build that local path from an outbound URL
//! - Match filter routes on (domain, path)
//!
//! # Design Decisions
//! - Domain matching is case-insensitive; domains are lowercased on parse
//! - Path matching is case-sensitive and exact, or prefix + suffix with a
//!   single captured segment
//! - No regex

use url::Url;

/// Original target of a request, recovered from the local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTarget {
    pub scheme: String,
    pub domain: String,
    pub path: String,
}

impl LocalTarget {
    /// Parse `/<http|https>/<domain><path>`. A missing path means `/`.
    pub fn parse(local_path: &str) -> Option<Self> {
        let rest = local_path.strip_prefix('/')?;
        let (scheme, rest) = rest.split_once('/')?;
        if scheme != "http" && scheme != "https" {
            return None;
        }
        let (domain, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        if domain.is_empty() {
            return None;
        }
        Some(Self {
            scheme: scheme.to_string(),
            domain: domain.to_ascii_lowercase(),
            path: path.to_string(),
        })
    }

    /// `scheme://domain/path[?query]`.
    pub fn original_url(&self, raw_query: Option<&str>) -> String {
        let mut url = format!("{}://{}{}", self.scheme, self.domain, self.path);
        if let Some(query) = raw_query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

/// Local path for an outbound URL: `/<scheme>/<host>[:port]<path>[?query]`.
/// Only http(s) URLs with a host qualify; default ports are dropped.
pub fn local_path_for(url: &Url) -> Option<String> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    };
    let mut local = format!("/{}/{}{}", url.scheme(), authority, url.path());
    if let Some(query) = url.query() {
        local.push('?');
        local.push_str(query);
    }
    Some(local)
}

/// Trait for matching filter routes.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if `domain` + `path` belong to this route.
    fn matches(&self, domain: &str, path: &str) -> bool;
}

/// Exact domain and path.
#[derive(Debug, Clone)]
pub struct ExactRoute {
    domain: &'static str,
    path: &'static str,
}

impl ExactRoute {
    pub const fn new(domain: &'static str, path: &'static str) -> Self {
        Self { domain, path }
    }
}

impl Matcher for ExactRoute {
    fn matches(&self, domain: &str, path: &str) -> bool {
        self.domain.eq_ignore_ascii_case(domain) && path == self.path
    }
}

/// Domain plus `prefix<segment>suffix`, where the segment is non-empty
/// and contains no `/`.
#[derive(Debug, Clone)]
pub struct SegmentRoute {
    domain: &'static str,
    prefix: &'static str,
    suffix: &'static str,
}

impl SegmentRoute {
    pub const fn new(domain: &'static str, prefix: &'static str, suffix: &'static str) -> Self {
        Self { domain, prefix, suffix }
    }

    /// The captured segment, if the path has this route's shape.
    pub fn capture<'p>(&self, path: &'p str) -> Option<&'p str> {
        let segment = path.strip_prefix(self.prefix)?.strip_suffix(self.suffix)?;
        if segment.is_empty() || segment.contains('/') {
            return None;
        }
        Some(segment)
    }
}

impl Matcher for SegmentRoute {
    fn matches(&self, domain: &str, path: &str) -> bool {
        self.domain.eq_ignore_ascii_case(domain) && self.capture(path).is_some()
    }
}

/// Matches if any inner matcher does (OR).
#[derive(Debug)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, domain: &str, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(domain, path))
    }
}
