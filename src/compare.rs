//! Response equivalence.
//!
//! Two responses match when status code text, status text and body are equal and
//! their headers are equal after filtering: ignored headers are dropped and
//! the values of listed cookies are replaced by a placeholder. Raw header
//! equality is never required.

use std::collections::HashSet;
use std::fmt;

use h1wire::{Header, HttpResponse};

/// Headers ignored when no ignore list is configured
pub const DEFAULT_IGNORED_HEADERS: [&str; 3] = ["x-powered-by", "date", "server"];

/// Replacement for the value of a stripped cookie
pub const STRIPPED_COOKIE_VALUE: &str = "<stripped>";

/// Rules that decide which header differences are tolerated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparePolicy {
    /// Lowercase names of headers excluded from comparison
    ignore_headers: HashSet<String>,
    /// Cookie names (case-sensitive) whose values are not compared
    strip_cookies:  HashSet<String>,
}

impl Default for ComparePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_HEADERS, Vec::<String>::new())
    }
}

impl ComparePolicy {
    /// Create a policy. Header names are matched case-insensitively, cookie
    /// names exactly.
    pub fn new<H, C>(ignore_headers: H, strip_cookies: C) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            ignore_headers: ignore_headers
                .into_iter()
                .map(|name| name.as_ref().to_ascii_lowercase())
                .collect(),
            strip_cookies:  strip_cookies.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a header with this name is left out of the comparison
    pub fn ignores(&self, name: &str) -> bool {
        self.ignore_headers.contains(&name.to_ascii_lowercase())
    }

    /// The view of `headers` that takes part in the comparison
    pub fn filter_headers(&self, headers: &[Header]) -> Vec<Header> {
        headers
            .iter()
            .filter(|h| !self.ignores(&h.name))
            .map(|h| self.strip_cookie(h))
            .collect()
    }

    /// Replace the value of a listed cookie in a `Set-Cookie` header.
    ///
    /// Attributes after the first `; ` are kept as they are, so a changed
    /// `Path` or `Expires` still counts as a difference.
    fn strip_cookie(&self, header: &Header) -> Header {
        let value = match &header.value {
            Some(value) if header.is_named("set-cookie") => value,
            _ => return header.clone(),
        };

        let (first, rest) = match value.split_once("; ") {
            Some((first, rest)) => (first, Some(rest)),
            None => (value.as_str(), None),
        };
        let Some((name, _)) = first.split_once('=') else {
            return header.clone();
        };
        if !self.strip_cookies.contains(name) {
            return header.clone();
        }

        let mut stripped = format!("{name}={STRIPPED_COOKIE_VALUE}");
        if let Some(rest) = rest {
            stripped.push_str("; ");
            stripped.push_str(rest);
        }
        Header {
            name:  header.name.clone(),
            value: Some(stripped),
        }
    }
}

/// Domain-specific normalization applied to both responses before they are
/// compared (e.g. blanking timestamps embedded in bodies).
pub trait ResponseTransform {
    fn transform(&self, response: HttpResponse) -> HttpResponse;
}

impl<F> ResponseTransform for F
where
    F: Fn(HttpResponse) -> HttpResponse,
{
    fn transform(&self, response: HttpResponse) -> HttpResponse {
        self(response)
    }
}

/// First difference found between two responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// Status code fields differ as text
    StatusCode { original: String, replayed: String },
    /// Reason phrases differ
    StatusText { original: String, replayed: String },
    /// Bodies differ
    Body {
        original_len: usize,
        replayed_len: usize,
    },
    /// Filtered header lists differ
    Headers {
        original: Vec<Header>,
        replayed: Vec<Header>,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusCode { original, replayed } => {
                let show = |c: &str| if c.is_empty() { "-".to_string() } else { c.to_string() };
                write!(f, "status code {} != {}", show(original), show(replayed))
            },
            Self::StatusText { original, replayed } => {
                write!(f, "status text {original:?} != {replayed:?}")
            },
            Self::Body {
                original_len,
                replayed_len,
            } => {
                write!(f, "body differs ({original_len} bytes original, {replayed_len} bytes replayed)")
            },
            Self::Headers { original, replayed } => {
                write!(f, "headers differ")?;
                for header in original.iter().filter(|h| !replayed.contains(h)) {
                    write!(f, "\n  - {header}")?;
                }
                for header in replayed.iter().filter(|h| !original.contains(h)) {
                    write!(f, "\n  + {header}")?;
                }
                Ok(())
            },
        }
    }
}

/// Verdict for one replayed request, with both responses as compared
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Captured response (headers sorted, transform applied)
    pub original: HttpResponse,
    /// Freshly fetched response (headers sorted, transform applied)
    pub replayed: HttpResponse,
    /// `None` when the responses are equivalent
    pub mismatch: Option<Mismatch>,
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        self.mismatch.is_none()
    }
}

/// Applies a [`ComparePolicy`] and an optional [`ResponseTransform`]
pub struct ResponseComparator {
    policy:    ComparePolicy,
    transform: Option<Box<dyn ResponseTransform>>,
}

impl Default for ResponseComparator {
    fn default() -> Self {
        Self::new(ComparePolicy::default())
    }
}

impl ResponseComparator {
    pub fn new(policy: ComparePolicy) -> Self {
        Self {
            policy,
            transform: None,
        }
    }

    /// Normalize both responses with `transform` before comparing
    pub fn with_transform(mut self, transform: impl ResponseTransform + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn policy(&self) -> &ComparePolicy {
        &self.policy
    }

    /// Compare a replayed response against the captured one.
    ///
    /// Both sides get the same treatment: headers sorted, then the transform,
    /// then header filtering.
    pub fn compare(&self, replayed: HttpResponse, original: HttpResponse) -> Comparison {
        let replayed = self.prepare(replayed);
        let original = self.prepare(original);
        let mismatch = self.find_mismatch(&replayed, &original);
        Comparison {
            original,
            replayed,
            mismatch,
        }
    }

    fn prepare(&self, mut response: HttpResponse) -> HttpResponse {
        response.sort_headers();
        match &self.transform {
            Some(transform) => transform.transform(response),
            None => response,
        }
    }

    fn find_mismatch(&self, replayed: &HttpResponse, original: &HttpResponse) -> Option<Mismatch> {
        if replayed.code_text != original.code_text {
            return Some(Mismatch::StatusCode {
                original: original.code_text.clone(),
                replayed: replayed.code_text.clone(),
            });
        }
        if replayed.status != original.status {
            return Some(Mismatch::StatusText {
                original: original.status.clone(),
                replayed: replayed.status.clone(),
            });
        }
        if replayed.body != original.body {
            return Some(Mismatch::Body {
                original_len: original.body.len(),
                replayed_len: replayed.body.len(),
            });
        }

        let replayed_headers = self.policy.filter_headers(&replayed.headers);
        let original_headers = self.policy.filter_headers(&original.headers);
        if replayed_headers != original_headers {
            return Some(Mismatch::Headers {
                original: original_headers,
                replayed: replayed_headers,
            });
        }
        None
    }
}
