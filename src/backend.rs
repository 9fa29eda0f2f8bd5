//! Backend API client.
//!
//! HTTP client for the Sift backend: opens the streaming answer connection
//! and wraps the REST endpoints for threads, models, charts, and tool
//! insights. Streaming semantics live in [`crate::stream`]; this module only
//! knows URLs, request bodies, and response shapes.

use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::Stream;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::Value;

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::models::{
    AnswerRequest, ChartSpec, InsightCategory, ModelInfo, ModelsResponse, QueryRow,
    StatusResponse, ThreadDetail, ThreadListResponse,
};

/// Client for the Sift backend API.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    user: String,
    client: Client,
}

impl BackendClient {
    /// Create a client from runtime configuration.
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(config.api_url.clone(), config.user.clone())
    }

    /// Create a client with an explicit base URL and user id.
    pub fn with_base_url(base_url: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user: user.into(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Open the streaming answer connection.
    ///
    /// Returns the raw byte stream of the response body; frame decoding is
    /// the caller's job. A non-2xx response is an error here — the session
    /// layer turns it into an error-status terminal result.
    pub async fn open_answer_stream(
        &self,
        request: &AnswerRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>> {
        let url = format!("{}/api/answer", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        let stream = response
            .bytes_stream()
            .map(|item| item.map_err(ClientError::from));
        Ok(Box::pin(stream))
    }

    /// `GET /api/threads` — list the user's threads, newest first.
    pub async fn list_threads(&self, page: u32, page_size: u32) -> Result<ThreadListResponse> {
        let url = format!(
            "{}/api/threads?user={}&page={}&page_size={}",
            self.base_url,
            urlencoding::encode(&self.user),
            page,
            page_size
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// `GET /api/thread/{id}` — fetch a full thread with its turns.
    pub async fn get_thread(&self, thread_id: &str) -> Result<ThreadDetail> {
        let url = format!(
            "{}/api/thread/{}?user={}",
            self.base_url,
            thread_id,
            urlencoding::encode(&self.user)
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// `POST /api/thread` — create a new empty thread.
    pub async fn create_thread(&self) -> Result<ThreadDetail> {
        let url = format!(
            "{}/api/thread?user={}",
            self.base_url,
            urlencoding::encode(&self.user)
        );
        let body = serde_json::json!({ "human": "New Chat", "user": self.user });
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// `DELETE /api/thread/{id}` — delete a thread.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let url = format!(
            "{}/api/thread/{}?user={}",
            self.base_url,
            thread_id,
            urlencoding::encode(&self.user)
        );
        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }
        let status: StatusResponse = response.json().await?;
        if status.status != "success" {
            return Err(ClientError::Server {
                status: 200,
                message: status.message,
            });
        }
        Ok(())
    }

    /// `GET /api/models` — list available models.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/models", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }
        let models: ModelsResponse = response.json().await?;
        Ok(models.models)
    }

    /// `POST /api/chart` — ask the backend to design a chart for a set of
    /// query results.
    ///
    /// The spec comes back JSON-encoded under `graph_code` (current) or
    /// `chart` (legacy). A response that cannot be decoded into a usable
    /// spec yields `Ok(None)` — a broken chart never fails the caller.
    pub async fn generate_chart(
        &self,
        text: &str,
        query_results: &[QueryRow],
        thread_id: &str,
    ) -> Result<Option<ChartSpec>> {
        if query_results.is_empty() {
            return Ok(None);
        }

        let url = format!("{}/api/chart", self.base_url);
        let body = serde_json::json!({
            "text": text,
            "queryResults": query_results,
            "user_id": self.user,
            "thread_id": thread_id,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        let payload: Value = response.json().await?;
        for key in ["graph_code", "chart"] {
            if let Some(value) = payload.get(key) {
                if let Some(spec) = ChartSpec::from_value(value) {
                    return Ok(Some(spec));
                }
            }
        }
        tracing::warn!("chart response carried no usable spec");
        Ok(None)
    }

    /// `GET /api/insights` — list tool categories exposed by the agent.
    pub async fn list_insights(&self) -> Result<Vec<InsightCategory>> {
        let url = format!("{}/api/insights", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn status_error(&self, response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        ClientError::Server { status, message }
    }
}

/// Format tool insights as a Markdown listing, the way the `/tools` command
/// presents them in the conversation.
pub fn format_insights(categories: &[InsightCategory]) -> String {
    let mut markdown = String::from("### Available Tools\n\n");
    for category in categories {
        markdown.push_str(&format!("#### {}\n\n", category.kind));
        for tool in &category.tools {
            markdown.push_str(&format!("- **{tool}**\n"));
        }
        markdown.push('\n');
    }
    markdown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_keeps_base_url_and_user() {
        let client = BackendClient::with_base_url("http://localhost:5000", "analyst");
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.user(), "analyst");
    }

    #[test]
    fn format_insights_renders_categories() {
        let categories = vec![
            InsightCategory {
                kind: "Analytics".to_string(),
                tools: vec!["sales_analytics_assistant".to_string()],
            },
            InsightCategory {
                kind: "Operations".to_string(),
                tools: vec!["aws_resource_assistant".to_string(), "waf_logs".to_string()],
            },
        ];
        let markdown = format_insights(&categories);
        assert!(markdown.starts_with("### Available Tools"));
        assert!(markdown.contains("#### Analytics"));
        assert!(markdown.contains("- **sales_analytics_assistant**"));
        assert!(markdown.contains("- **waf_logs**"));
    }

    #[tokio::test]
    async fn open_answer_stream_against_dead_server_fails() {
        let client = BackendClient::with_base_url("http://127.0.0.1:1", "analyst");
        let request = AnswerRequest::new("hello", "model", None, "analyst");
        assert!(client.open_answer_stream(&request).await.is_err());
    }

    #[tokio::test]
    async fn rest_calls_against_dead_server_fail() {
        let client = BackendClient::with_base_url("http://127.0.0.1:1", "analyst");
        assert!(client.list_threads(1, 10).await.is_err());
        assert!(client.get_thread("t-1").await.is_err());
        assert!(client.list_models().await.is_err());
    }
}
