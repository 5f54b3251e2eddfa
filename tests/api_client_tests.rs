//! API client tests against a scripted transport

#![cfg(feature = "api-backend")]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use docschema_sdk::api::{
    ApiClient, ApiError, ClientConfig, HookUpdate, HttpMethod, HttpRequest, HttpResponse,
    HttpTransport, Query, RequestBody, RetryPolicy, Sideload, TransportError,
};
use serde_json::{Value, json};

/// Answers requests from a queue and records what was sent
#[derive(Default)]
struct FakeServer {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeServer {
    fn json(self, status: u16, body: Value) -> Self {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            url: String::new(),
            body: serde_json::to_vec(&body).unwrap(),
        }));
        self
    }

    fn error(self, error: TransportError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpTransport for FakeServer {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Fatal("no response scripted".to_string())))
    }
}

fn token_config() -> ClientConfig {
    ClientConfig::with_token("https://elis.test/api", "tok")
        .with_retry(RetryPolicy::default().with_base_delay(Duration::ZERO))
}

fn page(results: Value, next: Option<&str>) -> Value {
    json!({"pagination": {"next": next, "total": 3}, "results": results})
}

mod pagination_tests {
    use super::*;

    #[test]
    fn test_pages_merged_in_server_order() {
        let server = FakeServer::default()
            .json(200, page(json!(["a", "b"]), Some("https://elis.test/api/v1/queues?page=2")))
            .json(200, page(json!(["c"]), Some("https://elis.test/api/v1/queues?page=3")))
            .json(200, page(json!([]), None));

        let result = {
            let mut client = ApiClient::with_transport(token_config(), &server).unwrap();
            client.get_paginated("queues", &Query::new()).unwrap()
        };

        assert_eq!(result.results, vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(result.total, Some(3));
        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].url, "https://elis.test/api/v1/queues");
        assert_eq!(requests[2].url, "https://elis.test/api/v1/queues?page=3");
        assert!(requests.iter().all(|r| r.method == HttpMethod::Get));
    }

    #[test]
    fn test_repeated_cursor_is_an_error() {
        let next = Some("https://elis.test/api/v1/queues?page=2");
        let server = FakeServer::default()
            .json(200, page(json!(["a"]), next))
            .json(200, page(json!(["b"]), next));

        let mut client = ApiClient::with_transport(token_config(), &server).unwrap();
        let err = client.get_paginated("queues", &Query::new()).unwrap_err();
        assert!(matches!(err, ApiError::Pagination { .. }));
    }

    #[test]
    fn test_sideloaded_users_are_injected() {
        let server = FakeServer::default().json(
            200,
            json!({
                "pagination": {"next": null, "total": 1},
                "results": [{"id": 1, "users": ["https://elis.test/api/v1/users/7"]}],
                "users": [{"url": "https://elis.test/api/v1/users/7", "username": "bob"}]
            }),
        );

        let mut client = ApiClient::with_transport(token_config(), &server).unwrap();
        let result = client
            .get_paginated_with(
                "queues",
                &Query::new(),
                &[Sideload::new("users")],
                &Default::default(),
            )
            .unwrap();

        assert_eq!(result.results[0]["users"][0]["username"], json!("bob"));
        assert!(server.requests()[0].url.contains("sideload=users"));
    }

    #[test]
    fn test_envelope_metadata_is_passed_through() {
        let server = FakeServer::default().json(
            200,
            json!({"pagination":{"next":null,"total":1},"results":[1],"meta":{"generated":"now"}}),
        );

        let mut client = ApiClient::with_transport(token_config(), &server).unwrap();
        let result = client.get_paginated("annotations", &Query::new()).unwrap();

        assert_eq!(result.results, vec![json!(1)]);
        assert_eq!(result.total, Some(1));
        assert_eq!(result.sideloaded.get("meta"), Some(&json!({"generated": "now"})));
    }
}

mod request_tests {
    use super::*;

    #[test]
    fn test_upload_keeps_filename() {
        let server = FakeServer::default().json(
            201,
            json!({"annotation": "https://elis.test/api/v1/annotations/1", "document": "https://elis.test/api/v1/documents/1"}),
        );

        let mut client = ApiClient::with_transport(token_config(), &server).unwrap();
        client
            .upload_document(50117, b"%PDF-1.4", "invoice.pdf")
            .unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://elis.test/api/v1/queues/50117/upload");
        let RequestBody::Multipart(parts) = &requests[0].body else {
            panic!("expected a multipart body");
        };
        let files: Vec<_> = parts.iter().filter(|p| p.filename.is_some()).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename.as_deref(), Some("invoice.pdf"));
        assert_eq!(files[0].data, b"%PDF-1.4".to_vec());
    }

    #[test]
    fn test_error_status_carries_endpoint_and_body() {
        let server = FakeServer::default().json(404, json!({"detail": "Not found."}));

        let mut client = ApiClient::with_transport(token_config(), &server).unwrap();
        let err = client.get("queues/999", &Query::new()).unwrap_err();
        match err {
            ApiError::Request {
                status,
                endpoint,
                body,
            } => {
                assert_eq!(status, 404);
                assert!(endpoint.ends_with("queues/999"));
                assert!(body.contains("Not found."));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_transient_failures_retried_then_surfaced() {
        let server = FakeServer::default()
            .error(TransportError::Transient("connection reset".to_string()))
            .error(TransportError::Transient("connection reset".to_string()))
            .error(TransportError::Transient("timed out".to_string()));

        let mut client = ApiClient::with_transport(token_config(), &server).unwrap();
        let err = client.get("queues", &Query::new()).unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, ApiError::Transient { attempts: 3, .. }));
        assert_eq!(server.requests().len(), 3);
    }

    #[test]
    fn test_poll_annotation_until_done() {
        let server = FakeServer::default()
            .json(200, json!({"id": 5, "status": "importing"}))
            .json(200, json!({"id": 5}))
            .json(200, json!({"id": 5, "status": "to_review"}));

        let mut client = ApiClient::with_transport(token_config(), &server).unwrap();
        let annotation = client
            .poll_annotation(5, Duration::ZERO, Duration::from_secs(5), |a| {
                a.get("status").and_then(Value::as_str) == Some("to_review")
            })
            .unwrap();
        assert_eq!(annotation["status"], "to_review");
        assert_eq!(server.requests().len(), 3);
    }

    #[test]
    fn test_session_released_when_request_fails() {
        let server = FakeServer::default()
            .json(200, json!({"key": "session"}))
            .json(500, json!({"detail": "boom"}))
            .json(200, json!({"detail": "Successfully logged out."}));

        {
            let config = ClientConfig::new("https://elis.test/api", "alice", "secret");
            let mut client = ApiClient::with_transport(config, &server).unwrap();
            assert!(client.post("queues", &json!({"name": "x"})).is_err());
        }

        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].url.ends_with("/auth/logout"));
        assert_eq!(requests[2].header("Authorization"), Some("Token session"));
    }
}

mod delete_tests {
    use super::*;

    fn targets() -> Vec<(String, String)> {
        ["1", "2", "3"]
            .iter()
            .map(|id| (id.to_string(), format!("https://elis.test/api/v1/annotations/{}", id)))
            .collect()
    }

    #[test]
    fn test_refused_object_is_reported_and_run_continues() {
        let server = FakeServer::default()
            .json(204, Value::Null)
            .json(404, json!({"detail": "Not found."}))
            .json(204, Value::Null);

        let report = {
            let mut client = ApiClient::with_transport(token_config(), &server).unwrap();
            client.delete_objects("annotation", &targets()).unwrap()
        };

        assert_eq!(report.deleted, vec!["1".to_string(), "3".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "2");
        assert_eq!(report.failed[0].1.status(), Some(404));
        assert!(!report.is_complete());

        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.method == HttpMethod::Delete));
        assert_eq!(requests[1].url, "https://elis.test/api/v1/annotations/2");
    }

    #[test]
    fn test_network_failure_stops_the_run() {
        let server = FakeServer::default()
            .json(204, Value::Null)
            .error(TransportError::Fatal("bad certificate".to_string()));

        let mut client = ApiClient::with_transport(token_config(), &server).unwrap();
        let err = client.delete_objects("annotation", &targets()).unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
        assert_eq!(server.requests().len(), 2);
    }

    #[test]
    fn test_hook_update_and_delete() {
        let server = FakeServer::default()
            .json(200, json!({"id": 12, "name": "Renamed"}))
            .json(204, Value::Null);

        {
            let mut client = ApiClient::with_transport(token_config(), &server).unwrap();
            let update = HookUpdate {
                name: Some("Renamed".to_string()),
                events: Some(vec!["annotation_status".to_string()]),
                ..Default::default()
            };
            client.update_hook(12, &update).unwrap();
            client.delete_hook(12).unwrap();
        }

        let requests = server.requests();
        assert_eq!(requests[0].method, HttpMethod::Patch);
        assert_eq!(requests[0].url, "https://elis.test/api/v1/hooks/12");
        assert_eq!(
            requests[0].body,
            RequestBody::Json(json!({"name": "Renamed", "events": ["annotation_status"]}))
        );
        assert_eq!(requests[1].method, HttpMethod::Delete);
        assert_eq!(requests[1].url, "https://elis.test/api/v1/hooks/12");
    }
}
