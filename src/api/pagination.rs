//! Cursor pagination
//!
//! List endpoints answer with an envelope:
//!
//! ```json
//! {"pagination": {"next": "https://.../queues?page=2", "total": 42},
//!  "results": [...], "users": [...]}
//! ```
//!
//! [`PageCollector`] merges the envelopes page by page: lists are
//! concatenated, any other envelope field is kept as sent by the last page
//! that carried it. The request loop lives
//! in [`ApiClient::get_paginated_with`](super::ApiClient::get_paginated_with).

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use super::error::{ApiError, ApiResult};
use super::sideload::{Sideload, resolve_sideloads};

pub const PAGINATION_KEY: &str = "pagination";
pub const RESULTS_KEY: &str = "results";

/// Caller controls over a multi-page fetch
///
/// Both are checked before each page request, never while a page is in flight.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub deadline: Option<Instant>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Stop once the flag is set
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub(crate) fn check(&self, pages: usize) -> ApiResult<()> {
        if let Some(flag) = &self.cancel
            && flag.load(Ordering::SeqCst)
        {
            return Err(ApiError::Cancelled { pages });
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(ApiError::DeadlineExceeded { pages });
        }
        Ok(())
    }
}

/// Everything collected from a paginated list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginatedResult {
    pub results: Vec<Value>,
    /// `pagination.total` of the last page, when the server reports it
    pub total: Option<u64>,
    pub pages: usize,
    /// Other envelope fields: sideloaded lists merged across pages, any
    /// other value as sent by the last page
    pub sideloaded: Map<String, Value>,
}

/// Accumulates pages and tracks visited cursors
#[derive(Debug)]
pub struct PageCollector {
    key: String,
    endpoint: String,
    merged: Map<String, Value>,
    visited: HashSet<String>,
    total: Option<u64>,
    pages: usize,
}

impl PageCollector {
    /// `first_url` is the URL of the first request; it counts as visited
    pub fn new(key: impl Into<String>, first_url: impl Into<String>) -> Self {
        let endpoint = first_url.into();
        let mut visited = HashSet::new();
        visited.insert(endpoint.clone());
        Self {
            key: key.into(),
            endpoint,
            merged: Map::new(),
            visited,
            total: None,
            pages: 0,
        }
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Merge one page and return the next cursor, if any
    pub fn absorb(&mut self, page: Value) -> ApiResult<Option<String>> {
        let Value::Object(mut envelope) = page else {
            return Err(self.protocol("expected a JSON object"));
        };
        let pagination = envelope
            .remove(PAGINATION_KEY)
            .ok_or_else(|| self.protocol("missing 'pagination'"))?;

        if let Some(results) = envelope.get(&self.key)
            && !results.is_array()
        {
            return Err(self.protocol(&format!("'{}' is not a list", self.key)));
        }

        for (key, value) in envelope {
            match value {
                Value::Array(items) => {
                    if let Some(Value::Array(existing)) = self.merged.get_mut(&key) {
                        existing.extend(items);
                    } else {
                        self.merged.insert(key, Value::Array(items));
                    }
                }
                other => {
                    self.merged.insert(key, other);
                }
            }
        }
        self.pages += 1;
        self.total = pagination.get("total").and_then(Value::as_u64);

        let next = match pagination.get("next") {
            None | Some(Value::Null) => None,
            Some(Value::String(next)) if next.is_empty() => None,
            Some(Value::String(next)) => Some(next.clone()),
            Some(_) => return Err(self.protocol("'pagination.next' is not a string")),
        };

        if let Some(next) = &next {
            if !self.visited.insert(next.clone()) {
                return Err(ApiError::Pagination {
                    endpoint: self.endpoint.clone(),
                    message: format!("cursor {} was already followed", next),
                });
            }
            tracing::debug!("Page {} of {} -> {}", self.pages, self.endpoint, next);
        }
        Ok(next)
    }

    /// Finish: split out the result list and inject sideloads
    pub fn finish(mut self, sideloads: &[Sideload]) -> PaginatedResult {
        let mut results = match self.merged.remove(&self.key) {
            Some(Value::Array(results)) => results,
            _ => Vec::new(),
        };
        resolve_sideloads(&mut results, &self.merged, sideloads);
        PaginatedResult {
            results,
            total: self.total,
            pages: self.pages,
            sideloaded: self.merged,
        }
    }

    fn protocol(&self, message: &str) -> ApiError {
        ApiError::Protocol {
            endpoint: self.endpoint.clone(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_three_pages() {
        let mut collector = PageCollector::new(RESULTS_KEY, "https://x/v1/queues");
        let next = collector
            .absorb(json!({"pagination": {"next": "https://x/v1/queues?page=2", "total": 3},
                           "results": ["a", "b"]}))
            .unwrap();
        assert_eq!(next.as_deref(), Some("https://x/v1/queues?page=2"));
        let next = collector
            .absorb(json!({"pagination": {"next": "https://x/v1/queues?page=3", "total": 3},
                           "results": ["c"]}))
            .unwrap();
        assert!(next.is_some());
        let next = collector
            .absorb(json!({"pagination": {"next": null, "total": 3}, "results": []}))
            .unwrap();
        assert!(next.is_none());

        let result = collector.finish(&[]);
        assert_eq!(result.results, vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(result.total, Some(3));
        assert_eq!(result.pages, 3);
    }

    #[test]
    fn test_repeated_cursor() {
        let mut collector = PageCollector::new(RESULTS_KEY, "https://x/v1/hooks");
        collector
            .absorb(json!({"pagination": {"next": "https://x/v1/hooks?page=2"}, "results": []}))
            .unwrap();
        let err = collector
            .absorb(json!({"pagination": {"next": "https://x/v1/hooks?page=2"}, "results": []}))
            .unwrap_err();
        assert!(matches!(err, ApiError::Pagination { .. }));
    }

    #[test]
    fn test_cursor_back_to_first_page() {
        let mut collector = PageCollector::new(RESULTS_KEY, "https://x/v1/hooks");
        let err = collector
            .absorb(json!({"pagination": {"next": "https://x/v1/hooks"}, "results": []}))
            .unwrap_err();
        assert!(matches!(err, ApiError::Pagination { .. }));
    }

    #[test]
    fn test_missing_envelope() {
        let mut collector = PageCollector::new(RESULTS_KEY, "https://x/v1/users");
        assert!(matches!(
            collector.absorb(json!({"results": []})),
            Err(ApiError::Protocol { .. })
        ));
        assert!(matches!(
            collector.absorb(json!([1, 2])),
            Err(ApiError::Protocol { .. })
        ));
    }

    #[test]
    fn test_non_list_envelope_fields_pass_through() {
        let mut collector = PageCollector::new(RESULTS_KEY, "https://x/v1/annotations");
        collector
            .absorb(json!({"pagination": {"next": "https://x/v1/annotations?page=2", "total": 2},
                           "results": [1], "meta": {"generated": "earlier"}}))
            .unwrap();
        collector
            .absorb(json!({"pagination": {"next": null, "total": 2},
                           "results": [2], "meta": {"generated": "now"}}))
            .unwrap();

        let result = collector.finish(&[]);
        assert_eq!(result.results, vec![json!(1), json!(2)]);
        assert_eq!(result.sideloaded.get("meta"), Some(&json!({"generated": "now"})));
    }

    #[test]
    fn test_results_must_be_a_list() {
        let mut collector = PageCollector::new(RESULTS_KEY, "https://x/v1/annotations");
        assert!(matches!(
            collector.absorb(json!({"pagination": {"next": null}, "results": {"id": 1}})),
            Err(ApiError::Protocol { .. })
        ));
    }

    #[test]
    fn test_cancel_and_deadline() {
        let flag = Arc::new(AtomicBool::new(false));
        let options = FetchOptions::new().with_cancel(flag.clone());
        assert!(options.check(0).is_ok());
        flag.store(true, Ordering::SeqCst);
        assert_eq!(options.check(2), Err(ApiError::Cancelled { pages: 2 }));

        let options = FetchOptions::new().with_deadline(Instant::now());
        assert_eq!(options.check(1), Err(ApiError::DeadlineExceeded { pages: 1 }));
    }
}
