//! Request metrics for HTTP services, recorded through the `metrics`
//! facade. Install any recorder (e.g. a Prometheus exporter) to collect
//! them.

use crate::event::short_type_name;
use metrics::{counter, gauge, histogram, Label};
use std::future::Future;
use std::time::Instant;

/// Gauge of in-flight requests, labelled `method`, `path`, `host`.
pub const ACTIVE_REQUESTS: &str = "http_active_requests";
/// Finished requests, labelled with the base labels plus `status_code`, or
/// `exception_type` and `status_code=500` for failed handlers.
pub const REQUEST_COUNTER: &str = "http_request_counter";
/// Failed handlers, unlabelled.
pub const ERROR_COUNTER: &str = "http_error_counter";
/// Wall-clock handling time in seconds, base labels only.
pub const REQUEST_TIME: &str = "http_total_request_time";

/// Resolves a request to the route pattern that handles it.
pub trait RouteTable: Send + Sync {
    fn match_route(&self, method: &str, path: &str) -> Option<String>;
}

/// Route patterns such as `/user/{user_id}`; a `{param}` segment matches
/// any single non-empty segment, everything else must match exactly.
#[derive(Debug, Clone, Default)]
pub struct RoutePatterns {
    routes: Vec<(String, String)>,
}

impl RoutePatterns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pattern` for `method`; `*` matches any method.
    pub fn route(mut self, method: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.routes.push((method.into(), pattern.into()));
        self
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.split('/');
    let mut path_segments = path.split('/');
    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) => {
                let is_param = p.len() > 2 && p.starts_with('{') && p.ends_with('}');
                if is_param {
                    if s.is_empty() {
                        return false;
                    }
                } else if p != s {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

impl RouteTable for RoutePatterns {
    fn match_route(&self, method: &str, path: &str) -> Option<String> {
        self.routes
            .iter()
            .find(|(m, p)| (m == "*" || m.eq_ignore_ascii_case(method)) && pattern_matches(p, path))
            .map(|(_, p)| p.clone())
    }
}

/// The parts of an inbound request the middleware labels by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub client_host: String,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, path: impl Into<String>, client_host: impl Into<String>) -> Self {
        RequestInfo { method: method.into(), path: path.into(), client_host: client_host.into() }
    }
}

/// Responses that carry an HTTP status code.
pub trait ResponseStatus {
    fn status_code(&self) -> u16;
}

impl ResponseStatus for u16 {
    fn status_code(&self) -> u16 {
        *self
    }
}

/// Observes request handlers and records request metrics.
///
/// The handler's result is passed through untouched; failures are counted
/// and returned as-is.
pub struct MetricsMiddleware<R> {
    routes: R,
}

impl<R: RouteTable> MetricsMiddleware<R> {
    pub fn new(routes: R) -> Self {
        MetricsMiddleware { routes }
    }

    /// Matched route pattern, or the raw path when no route matches.
    ///
    /// Unmatched paths are used verbatim, so label cardinality is only
    /// bounded for routed requests.
    pub fn route_path(&self, request: &RequestInfo) -> String {
        self.routes
            .match_route(&request.method, &request.path)
            .unwrap_or_else(|| request.path.clone())
    }

    pub async fn observe<F, T, E>(&self, request: &RequestInfo, handler: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        T: ResponseStatus,
    {
        let labels = vec![
            Label::new("method", request.method.clone()),
            Label::new("path", self.route_path(request)),
            Label::new("host", request.client_host.clone()),
        ];
        gauge!(ACTIVE_REQUESTS, labels.clone()).increment(1.0);
        let mut guard = InFlight { labels, started: Instant::now(), finished: false };

        let result = handler.await;
        guard.finished = true;

        match &result {
            Ok(response) => {
                let mut labels = guard.labels.clone();
                labels.push(Label::new("status_code", response.status_code().to_string()));
                counter!(REQUEST_COUNTER, labels).increment(1);
            }
            Err(_) => record_failure(&guard.labels, short_type_name(std::any::type_name::<E>())),
        }

        drop(guard);
        result
    }
}

/// Exception type recorded when the handler panics.
pub const PANIC_EXCEPTION_TYPE: &str = "panic";

fn record_failure(base: &[Label], exception_type: &str) {
    let mut labels = base.to_vec();
    labels.push(Label::new("exception_type", exception_type.to_string()));
    labels.push(Label::new("status_code", "500"));
    counter!(REQUEST_COUNTER, labels).increment(1);
    counter!(ERROR_COUNTER).increment(1);
}

/// Ends an in-flight request, also when the handler future is dropped
/// before completing. A handler that panics is counted as a failed request;
/// one that is cancelled is not counted.
struct InFlight {
    labels: Vec<Label>,
    started: Instant,
    finished: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished && std::thread::panicking() {
            record_failure(&self.labels, PANIC_EXCEPTION_TYPE);
        }
        gauge!(ACTIVE_REQUESTS, self.labels.clone()).decrement(1.0);
        histogram!(REQUEST_TIME, self.labels.clone()).record(self.started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{SharedString, Unit};
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use metrics_util::CompositeKey;

    type Entry = (CompositeKey, Option<Unit>, Option<SharedString>, DebugValue);

    fn find<'a>(snapshot: &'a [Entry], name: &str, labels: &[(&str, &str)]) -> Option<&'a DebugValue> {
        let mut expected: Vec<(String, String)> =
            labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        expected.sort();
        snapshot.iter().find_map(|(key, _, _, value)| {
            let mut actual: Vec<(String, String)> = key
                .key()
                .labels()
                .map(|l| (l.key().to_string(), l.value().to_string()))
                .collect();
            actual.sort();
            (key.key().name() == name && actual == expected).then_some(value)
        })
    }

    fn run<F: Future>(recorder: &DebuggingRecorder, fut: F) -> F::Output {
        metrics::with_local_recorder(recorder, || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(fut)
        })
    }

    fn middleware() -> MetricsMiddleware<RoutePatterns> {
        MetricsMiddleware::new(
            RoutePatterns::new()
                .route("GET", "/user/{user_id}")
                .route("POST", "/user/"),
        )
    }

    #[derive(Debug, PartialEq)]
    struct ValueError(&'static str);

    #[test]
    fn route_patterns_match_params_exactly() {
        let routes = RoutePatterns::new().route("GET", "/user/{user_id}").route("*", "/health");
        assert_eq!(routes.match_route("GET", "/user/42").as_deref(), Some("/user/{user_id}"));
        assert_eq!(routes.match_route("get", "/user/42").as_deref(), Some("/user/{user_id}"));
        assert_eq!(routes.match_route("POST", "/user/42"), None);
        assert_eq!(routes.match_route("GET", "/user/42/posts"), None);
        assert_eq!(routes.match_route("GET", "/user/"), None);
        assert_eq!(routes.match_route("DELETE", "/health").as_deref(), Some("/health"));
    }

    #[test]
    fn successful_request_is_labelled_with_route_and_status() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let mw = middleware();
        let req = RequestInfo::new("GET", "/user/42", "10.0.0.1");

        let result: Result<u16, ValueError> = run(&recorder, mw.observe(&req, async { Ok(200) }));
        assert_eq!(result, Ok(200));

        let snapshot = snapshotter.snapshot().into_vec();
        let base = [("method", "GET"), ("path", "/user/{user_id}"), ("host", "10.0.0.1")];
        let with_status = [
            ("method", "GET"),
            ("path", "/user/{user_id}"),
            ("host", "10.0.0.1"),
            ("status_code", "200"),
        ];

        assert_eq!(find(&snapshot, REQUEST_COUNTER, &with_status), Some(&DebugValue::Counter(1)));
        match find(&snapshot, ACTIVE_REQUESTS, &base) {
            Some(DebugValue::Gauge(v)) => assert_eq!(v.0, 0.0),
            other => panic!("unexpected gauge {:?}", other),
        }
        match find(&snapshot, REQUEST_TIME, &base) {
            Some(DebugValue::Histogram(values)) => assert_eq!(values.len(), 1),
            other => panic!("unexpected histogram {:?}", other),
        }
        assert!(find(&snapshot, ERROR_COUNTER, &[]).is_none());
    }

    #[test]
    fn failed_handler_is_counted_and_error_passed_through() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let mw = middleware();
        let req = RequestInfo::new("GET", "/missing", "10.0.0.2");

        let result: Result<u16, ValueError> =
            run(&recorder, mw.observe(&req, async { Err(ValueError("bad id")) }));
        assert_eq!(result, Err(ValueError("bad id")));

        let snapshot = snapshotter.snapshot().into_vec();
        let failed = [
            ("method", "GET"),
            ("path", "/missing"),
            ("host", "10.0.0.2"),
            ("exception_type", "ValueError"),
            ("status_code", "500"),
        ];
        assert_eq!(find(&snapshot, REQUEST_COUNTER, &failed), Some(&DebugValue::Counter(1)));
        assert_eq!(find(&snapshot, ERROR_COUNTER, &[]), Some(&DebugValue::Counter(1)));

        let base = [("method", "GET"), ("path", "/missing"), ("host", "10.0.0.2")];
        match find(&snapshot, ACTIVE_REQUESTS, &base) {
            Some(DebugValue::Gauge(v)) => assert_eq!(v.0, 0.0),
            other => panic!("unexpected gauge {:?}", other),
        }
        assert!(find(&snapshot, REQUEST_TIME, &base).is_some());
    }

    #[test]
    fn panicking_handler_is_counted_as_failure() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let mw = middleware();
        let req = RequestInfo::new("GET", "/user/7", "10.0.0.3");

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run(
                &recorder,
                mw.observe(&req, async {
                    if req.path.starts_with("/user") {
                        panic!("handler crashed");
                    }
                    Ok::<u16, ValueError>(200)
                }),
            )
        }));
        assert!(outcome.is_err());

        let snapshot = snapshotter.snapshot().into_vec();
        let failed = [
            ("method", "GET"),
            ("path", "/user/{user_id}"),
            ("host", "10.0.0.3"),
            ("exception_type", PANIC_EXCEPTION_TYPE),
            ("status_code", "500"),
        ];
        assert_eq!(find(&snapshot, REQUEST_COUNTER, &failed), Some(&DebugValue::Counter(1)));
        assert_eq!(find(&snapshot, ERROR_COUNTER, &[]), Some(&DebugValue::Counter(1)));

        let base = [("method", "GET"), ("path", "/user/{user_id}"), ("host", "10.0.0.3")];
        match find(&snapshot, ACTIVE_REQUESTS, &base) {
            Some(DebugValue::Gauge(v)) => assert_eq!(v.0, 0.0),
            other => panic!("unexpected gauge {:?}", other),
        }
    }
}
