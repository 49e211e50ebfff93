//! Interception dispatcher
//!
//! Called once per inbound request before the application handler. The
//! flow is: resolve an entry, evaluate its activation policy, then either
//! synthesize the override response or pass the request through.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::HandlerFailure;
use crate::registry::{ActivationPolicy, OverrideEntry, Registry, ResponseSpec};
use crate::request::InterceptedRequest;
use crate::response::OverrideResponse;

/// Result of intercepting one request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Respond with this instead of running the application
    Override(OverrideResponse),
    /// Let the application handle the request
    PassThrough,
}

impl Outcome {
    pub fn is_override(&self) -> bool {
        matches!(self, Outcome::Override(_))
    }
}

/// Decides pass-through versus override for one context
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Intercept a request.
    ///
    /// Lookup anomalies degrade to [`Outcome::PassThrough`]. A failing
    /// functional handler is returned as-is so the host can handle it like
    /// any other handler error. Dropping the returned future cancels any
    /// handler work in flight.
    pub async fn intercept(&self, request: &InterceptedRequest) -> Result<Outcome, HandlerFailure> {
        let method = request.method().as_str();

        let route = match self.registry.resolve(method, request.path(), request.host()) {
            Ok(Some(route)) => route,
            Ok(None) => {
                record_outcome("pass_through");
                return Ok(Outcome::PassThrough);
            }
            Err(e) => {
                warn!(
                    "Override lookup failed for {} {}, passing through: {}",
                    method,
                    request.path(),
                    e
                );
                record_outcome("pass_through");
                return Ok(Outcome::PassThrough);
            }
        };

        let entry = route.entry;
        let request = request.clone().with_params(route.params);

        if !should_fire(&entry, &request).await {
            debug!(
                "Override {} matched {} {} but its policy declined",
                entry.id(),
                method,
                request.path()
            );
            record_outcome("pass_through");
            return Ok(Outcome::PassThrough);
        }

        debug!(
            "Override {} firing for {} {}",
            entry.id(),
            method,
            request.path()
        );

        let response = match entry.response() {
            ResponseSpec::Static(spec) => spec.render(),
            ResponseSpec::Functional(handler) => match handler.handle(&request).await {
                Ok(response) => response,
                Err(failure) => {
                    record_outcome("error");
                    return Err(failure);
                }
            },
        };

        record_outcome("override");
        Ok(Outcome::Override(response))
    }
}

/// Evaluate the entry's activation policy, counting the match where the
/// policy keeps a count
async fn should_fire(entry: &OverrideEntry, request: &InterceptedRequest) -> bool {
    match entry.policy() {
        ActivationPolicy::Always => true,
        ActivationPolicy::OnceOnly => entry.record_match() == 0,
        ActivationPolicy::AfterCount(n) => entry.record_match() >= *n,
        ActivationPolicy::Filtered(filter) => filter.should_override(request).await,
    }
}

fn record_outcome(outcome: &'static str) {
    metrics::counter!("decoy_intercept_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OverrideSpec;
    use crate::response::RequestFilter;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(Registry::new()))
    }

    fn get(path: &str) -> InterceptedRequest {
        InterceptedRequest::new(Method::GET, path)
    }

    fn body_of(outcome: Outcome) -> Option<Bytes> {
        match outcome {
            Outcome::Override(response) => Some(response.body),
            Outcome::PassThrough => None,
        }
    }

    #[tokio::test]
    async fn test_always_overrides() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/").payload(json!(2)))
            .unwrap();

        for _ in 0..3 {
            let outcome = dispatcher.intercept(&get("/")).await.unwrap();
            assert_eq!(body_of(outcome), Some(Bytes::from("2")));
        }
    }

    #[tokio::test]
    async fn test_no_match_passes_through() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/").payload(json!(2)))
            .unwrap();

        assert_eq!(dispatcher.intercept(&get("/a")).await.unwrap(), Outcome::PassThrough);
        let post = InterceptedRequest::new(Method::POST, "/");
        assert_eq!(dispatcher.intercept(&post).await.unwrap(), Outcome::PassThrough);
    }

    #[tokio::test]
    async fn test_match_specificity() {
        let dispatcher = dispatcher();
        let registry = dispatcher.registry();
        registry.register(OverrideSpec::new("/").payload(json!(2))).unwrap();
        registry.register(OverrideSpec::new("/a").payload(json!(3))).unwrap();

        let a = dispatcher.intercept(&get("/a")).await.unwrap();
        let root = dispatcher.intercept(&get("/")).await.unwrap();
        assert_eq!(body_of(a), Some(Bytes::from("3")));
        assert_eq!(body_of(root), Some(Bytes::from("2")));
    }

    #[tokio::test]
    async fn test_context_isolation() {
        let a = dispatcher();
        let b = dispatcher();
        a.registry()
            .register(OverrideSpec::new("/").payload(json!(2)))
            .unwrap();

        assert!(a.intercept(&get("/")).await.unwrap().is_override());
        assert_eq!(b.intercept(&get("/")).await.unwrap(), Outcome::PassThrough);
    }

    #[tokio::test]
    async fn test_once_fires_exactly_once() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/").payload(json!(2)).once(true))
            .unwrap();

        assert!(dispatcher.intercept(&get("/")).await.unwrap().is_override());
        for _ in 0..5 {
            assert_eq!(dispatcher.intercept(&get("/")).await.unwrap(), Outcome::PassThrough);
        }
        assert_eq!(dispatcher.registry().entries()[0].matches_seen, 6);
    }

    #[tokio::test]
    async fn test_after_count_threshold() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/").payload(json!(2)).after(1))
            .unwrap();

        assert_eq!(dispatcher.intercept(&get("/")).await.unwrap(), Outcome::PassThrough);
        assert!(dispatcher.intercept(&get("/")).await.unwrap().is_override());
        assert!(dispatcher.intercept(&get("/")).await.unwrap().is_override());
    }

    #[tokio::test]
    async fn test_after_count_larger_threshold() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/").payload(json!(2)).after(3))
            .unwrap();

        let mut fired = Vec::new();
        for _ in 0..5 {
            fired.push(dispatcher.intercept(&get("/")).await.unwrap().is_override());
        }
        assert_eq!(fired, vec![false, false, false, true, true]);
    }

    #[tokio::test]
    async fn test_unmatched_requests_do_not_count() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/").payload(json!(2)).after(1))
            .unwrap();

        for _ in 0..3 {
            dispatcher.intercept(&get("/other")).await.unwrap();
        }
        assert_eq!(dispatcher.registry().entries()[0].matches_seen, 0);
        assert_eq!(dispatcher.intercept(&get("/")).await.unwrap(), Outcome::PassThrough);
    }

    struct CountingFilter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RequestFilter for CountingFilter {
        async fn should_override(&self, _request: &InterceptedRequest) -> bool {
            tokio::task::yield_now().await;
            self.calls.fetch_add(1, Ordering::SeqCst) + 1 > 1
        }
    }

    #[tokio::test]
    async fn test_filter_drives_decision() {
        let filter = Arc::new(CountingFilter {
            calls: AtomicUsize::new(0),
        });

        struct Shared(Arc<CountingFilter>);

        #[async_trait]
        impl RequestFilter for Shared {
            async fn should_override(&self, request: &InterceptedRequest) -> bool {
                self.0.should_override(request).await
            }
        }

        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(
                OverrideSpec::new("/")
                    .payload(json!(2))
                    .filter(Shared(filter.clone())),
            )
            .unwrap();

        assert_eq!(dispatcher.intercept(&get("/")).await.unwrap(), Outcome::PassThrough);
        assert!(dispatcher.intercept(&get("/")).await.unwrap().is_override());
        assert_eq!(filter.calls.load(Ordering::SeqCst), 2);
        // The dispatcher keeps no count of its own for filtered entries
        assert_eq!(dispatcher.registry().entries()[0].matches_seen, 0);
    }

    #[tokio::test]
    async fn test_filter_sees_params() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(
                OverrideSpec::new("/users/{id}")
                    .payload(json!("admin"))
                    .filter(|req: &InterceptedRequest| req.param("id") == Some("1")),
            )
            .unwrap();

        assert!(dispatcher.intercept(&get("/users/1")).await.unwrap().is_override());
        assert_eq!(
            dispatcher.intercept(&get("/users/2")).await.unwrap(),
            Outcome::PassThrough
        );
    }

    #[tokio::test]
    async fn test_functional_handler_response_propagates() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/").handler(|_: &InterceptedRequest| {
                Ok::<_, HandlerFailure>(OverrideResponse::error(StatusCode::BAD_REQUEST, "kaboom"))
            }))
            .unwrap();

        match dispatcher.intercept(&get("/")).await.unwrap() {
            Outcome::Override(response) => {
                assert_eq!(response.status, StatusCode::BAD_REQUEST);
                let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
                assert_eq!(body["message"], "kaboom");
            }
            Outcome::PassThrough => panic!("expected override"),
        }
    }

    #[tokio::test]
    async fn test_functional_handler_sees_request() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/echo/{word}").handler(|req: &InterceptedRequest| {
                Ok::<_, HandlerFailure>(OverrideResponse::text(
                    StatusCode::OK,
                    req.param("word").unwrap_or_default().to_string(),
                ))
            }))
            .unwrap();

        let outcome = dispatcher.intercept(&get("/echo/hi")).await.unwrap();
        assert_eq!(body_of(outcome), Some(Bytes::from("hi")));
    }

    #[tokio::test]
    async fn test_handler_failure_is_forwarded() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(
                OverrideSpec::new("/")
                    .handler(|_: &InterceptedRequest| {
                        Err::<OverrideResponse, _>(HandlerFailure::new("backend exploded"))
                    }),
            )
            .unwrap();

        let failure = dispatcher.intercept(&get("/")).await.unwrap_err();
        assert_eq!(failure.message(), "backend exploded");
    }

    #[tokio::test]
    async fn test_malformed_path_passes_through() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/{*rest}").payload(json!(2)))
            .unwrap();

        let outcome = dispatcher.intercept(&get("/bad%zz")).await.unwrap();
        assert_eq!(outcome, Outcome::PassThrough);
    }

    #[tokio::test]
    async fn test_static_response_status_and_headers() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(
                OverrideSpec::new("/teapot")
                    .payload(json!({"brew": false}))
                    .status_code(418)
                    .header("x-mock", "1"),
            )
            .unwrap();

        match dispatcher.intercept(&get("/teapot")).await.unwrap() {
            Outcome::Override(response) => {
                assert_eq!(response.status, StatusCode::IM_A_TEAPOT);
                assert_eq!(response.headers.get("x-mock").unwrap(), "1");
                assert_eq!(response.body, Bytes::from(r#"{"brew":false}"#));
            }
            Outcome::PassThrough => panic!("expected override"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_after_count_is_race_free() {
        const REQUESTS: usize = 64;
        const THRESHOLD: i64 = 10;

        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/").payload(json!(2)).after(THRESHOLD))
            .unwrap();

        let tasks: Vec<_> = (0..REQUESTS)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.intercept(&get("/")).await.unwrap() })
            })
            .collect();

        let mut overridden = 0;
        for task in tasks {
            if task.await.unwrap().is_override() {
                overridden += 1;
            }
        }

        assert_eq!(overridden, REQUESTS - THRESHOLD as usize);
        assert_eq!(dispatcher.registry().entries()[0].matches_seen, REQUESTS as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_after_count_below_threshold_never_fires() {
        const REQUESTS: usize = 5;

        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/").payload(json!(2)).after(10))
            .unwrap();

        let tasks: Vec<_> = (0..REQUESTS)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.intercept(&get("/")).await.unwrap() })
            })
            .collect();

        let mut passed = 0;
        for task in tasks {
            if task.await.unwrap() == Outcome::PassThrough {
                passed += 1;
            }
        }

        assert_eq!(passed, REQUESTS);
        assert_eq!(dispatcher.registry().entries()[0].matches_seen, REQUESTS as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_once_is_race_free() {
        let dispatcher = dispatcher();
        dispatcher
            .registry()
            .register(OverrideSpec::new("/").payload(json!(2)).once(true))
            .unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.intercept(&get("/")).await.unwrap() })
            })
            .collect();

        let mut overridden = 0;
        for task in tasks {
            if task.await.unwrap().is_override() {
                overridden += 1;
            }
        }
        assert_eq!(overridden, 1);
    }
}
