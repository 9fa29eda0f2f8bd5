// Integration tests for the REST side of BackendClient against a mock
// backend: threads CRUD, models, chart generation, and tool insights.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sift::backend::{format_insights, BackendClient};
use sift::error::ClientError;
use sift::models::parse_query_results;

async fn client_for(server: &MockServer) -> BackendClient {
    BackendClient::with_base_url(server.uri(), "tester")
}

#[tokio::test]
async fn list_threads_sends_user_and_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/threads"))
        .and(query_param("user", "tester"))
        .and(query_param("page", "1"))
        .and(query_param("page_size", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "threads": [
                {
                    "thread_id": "t-1",
                    "thread_title": "Revenue by region",
                    "user_id": "tester",
                    "created_at": "2026-08-01T10:00:00+00:00",
                    "updated_at": "2026-08-02T10:00:00+00:00",
                    "message_count": 4
                },
                {"thread_id": 7, "thread_title": "WAF logs"}
            ],
            "page": 1,
            "page_size": 50,
            "total": 2
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let response = client.list_threads(1, 50).await.unwrap();
    assert_eq!(response.status, "success");
    assert_eq!(response.threads.len(), 2);
    assert_eq!(response.threads[0].thread_id, "t-1");
    assert_eq!(response.threads[0].message_count, 4);
    // Numeric ids are normalized to strings
    assert_eq!(response.threads[1].thread_id, "7");
}

#[tokio::test]
async fn get_thread_returns_turns() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/thread/t-1"))
        .and(query_param("user", "tester"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "thread_id": "t-1",
            "thread_title": "Revenue",
            "ui_msgs": [{
                "human": "show revenue",
                "ai": "Here it is",
                "query_results": "[{\"region\":\"West\",\"revenue\":100}]",
                "show_graph": true,
                "graph_code": "",
                "usage": {"input": 1, "output": 2, "total_tokens": 3, "latency": 4}
            }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let detail = client.get_thread("t-1").await.unwrap();
    assert_eq!(detail.status, "success");
    assert_eq!(detail.thread_id.as_deref(), Some("t-1"));
    assert_eq!(detail.ui_msgs.len(), 1);
    let rows = detail.ui_msgs[0].parsed_query_results();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("region"), Some(&json!("West")));
}

#[tokio::test]
async fn create_thread_posts_and_returns_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/thread"))
        .and(query_param("user", "tester"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "thread_id": "t-new",
            "thread_title": "New Chat",
            "ui_msgs": []
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let detail = client.create_thread().await.unwrap();
    assert_eq!(detail.thread_id.as_deref(), Some("t-new"));
    assert_eq!(detail.thread_title, "New Chat");
    assert!(detail.ui_msgs.is_empty());
}

#[tokio::test]
async fn delete_thread_checks_the_status_field() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/thread/t-1"))
        .and(query_param("user", "tester"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Thread t-1 deleted successfully"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/thread/t-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "message": "Thread not found or could not be deleted"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client.delete_thread("t-1").await.unwrap();

    let err = client.delete_thread("t-2").await.unwrap_err();
    match err {
        ClientError::Server { message, .. } => {
            assert!(message.contains("not found"));
        }
        other => panic!("expected server error, got {other}"),
    }
}

#[tokio::test]
async fn delete_thread_on_404_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/thread/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": "error",
            "message": "Thread not found"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.delete_thread("missing").await.unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 404, .. }));
}

#[tokio::test]
async fn list_models_unwraps_the_models_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"id": "us.amazon.nova-lite-v1:0", "name": "Nova Lite"},
                {"id": "us.anthropic.claude-3-5-sonnet-20241022-v2:0", "name": "Claude 3.5 Sonnet"}
            ],
            "count": 2,
            "status": "success"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let models = client.list_models().await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[1].name, "Claude 3.5 Sonnet");
}

#[tokio::test]
async fn generate_chart_decodes_graph_code() {
    let server = MockServer::start().await;
    let spec = json!({
        "chart_type": "bar",
        "caption": "Revenue by region",
        "chart_configuration": {
            "options": {"xaxis": {"categories": ["West"]}},
            "series": [{"name": "revenue", "data": [100]}]
        }
    });
    Mock::given(method("POST"))
        .and(path("/api/chart"))
        .and(body_partial_json(json!({
            "text": "show revenue by region",
            "user_id": "tester",
            "thread_id": "t-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "graph_code": spec.to_string(),
            "status": "success"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let rows = parse_query_results(Some(&json!([{"region": "West", "revenue": 100}])));
    let chart = client
        .generate_chart("show revenue by region", &rows, "t-1")
        .await
        .unwrap()
        .expect("chart spec");
    assert_eq!(chart.chart_type, "bar");
    assert_eq!(chart.caption, "Revenue by region");
}

#[tokio::test]
async fn generate_chart_falls_back_to_legacy_chart_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": "{\"chart_type\":\"pie\",\"caption\":\"Split\"}",
            "status": "success"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let rows = parse_query_results(Some(&json!([{"a": 1}])));
    let chart = client
        .generate_chart("q", &rows, "t-1")
        .await
        .unwrap()
        .expect("chart spec");
    assert_eq!(chart.chart_type, "pie");
}

#[tokio::test]
async fn generate_chart_with_unusable_payload_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "graph_code": "I could not produce a chart for this data",
            "status": "success"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let rows = parse_query_results(Some(&json!([{"a": 1}])));
    let chart = client.generate_chart("q", &rows, "t-1").await.unwrap();
    assert!(chart.is_none());
}

#[tokio::test]
async fn generate_chart_skips_the_request_without_rows() {
    // No mock mounted: a request would fail loudly.
    let server = MockServer::start().await;
    let client = client_for(&server).await;
    let chart = client.generate_chart("q", &[], "t-1").await.unwrap();
    assert!(chart.is_none());
}

#[tokio::test]
async fn insights_round_trip_and_formatting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/insights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"type": "Analytics", "tools": ["sales_analytics_assistant"]},
            {"type": "Infrastructure", "tools": ["aws_resource_assistant", "waf_logs"]}
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let categories = client.list_insights().await.unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].kind, "Analytics");

    let markdown = format_insights(&categories);
    assert!(markdown.contains("#### Infrastructure"));
    assert!(markdown.contains("- **waf_logs**"));
}
