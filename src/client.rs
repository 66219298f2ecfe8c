//! HTTP client for the upstream task API.
//!
//! The upstream service is the source of truth for tasks; this client wraps
//! its loose wire contract (see `normalize`) and layers the advisory task
//! cache on reads. Only transport failures and non-2xx statuses surface as
//! errors — unrecognizable payloads degrade to empty or echoed values so
//! callers always get something renderable.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::cache::TaskCache;
use crate::models::{Task, TaskDraft, TaskId};
use crate::normalize::{extract_tasks, normalize_task};
use crate::settings::{UserSettings, normalize_settings};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Non-2xx upstream response, with best-effort body text.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// 2xx response that still reported `success: false`.
    #[error("upstream rejected the request: {message}")]
    Rejected { message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("email is required for task operations")]
    MissingEmail,
    #[error("settings endpoint is not configured")]
    SettingsNotConfigured,
}

/// Where a fetched task list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSource {
    Cache { age_ms: i64 },
    Network,
}

#[derive(Debug)]
pub struct FetchedTasks {
    pub tasks: Vec<Task>,
    pub source: TaskSource,
}

/// Client for the upstream task API with cache integration.
pub struct UpstreamClient {
    http: Client,
    endpoint: String,
    api_key: String,
    settings_endpoint: Option<String>,
    cache: TaskCache,
}

impl UpstreamClient {
    pub fn new(
        endpoint: String,
        api_key: String,
        settings_endpoint: Option<String>,
        cache: TaskCache,
    ) -> Result<Self, UpstreamError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint,
            api_key,
            settings_endpoint,
            cache,
        })
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.header("x-api-key", &self.api_key)
        }
    }

    fn require_email(email: &str) -> Result<(), UpstreamError> {
        if email.trim().is_empty() {
            Err(UpstreamError::MissingEmail)
        } else {
            Ok(())
        }
    }

    /// Body as JSON, falling back to the raw text when it does not parse;
    /// `extract_tasks` knows how to deal with either.
    async fn read_payload(response: reqwest::Response) -> Result<Value, UpstreamError> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// Mutation responses additionally carry an application-level
    /// `success`/`error` pair; only a literal `false` counts as a rejection.
    fn check_mutation(payload: &Value, fallback: &str) -> Result<(), UpstreamError> {
        if payload.get("success") == Some(&Value::Bool(false)) {
            let message = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string();
            return Err(UpstreamError::Rejected { message });
        }
        Ok(())
    }

    /// Dig the created/updated task out of the response, whatever the
    /// envelope; `None` means the upstream echoed nothing usable.
    fn dig_task(payload: &Value, keys: &[&str]) -> Option<Value> {
        if let Some(array) = payload.as_array() {
            return array.first().cloned();
        }
        if let Some(found) = crate::normalize::first_present(payload, keys) {
            return Some(found.clone());
        }
        if payload.is_object() {
            return Some(payload.clone());
        }
        None
    }

    /// Read the owner's task list, serving from cache within the freshness
    /// window when `use_cache` is set.
    pub async fn fetch_tasks(
        &self,
        email: Option<&str>,
        use_cache: bool,
    ) -> Result<FetchedTasks, UpstreamError> {
        if use_cache && let Some(hit) = self.cache.get(email) {
            tracing::debug!(age_ms = hit.age_ms, "serving tasks from cache");
            return Ok(FetchedTasks {
                tasks: hit.tasks,
                source: TaskSource::Cache { age_ms: hit.age_ms },
            });
        }

        let mut request = self.http.get(&self.endpoint);
        if let Some(email) = email {
            request = request.query(&[("email", email)]);
        }
        let response = self.with_key(request).send().await?;
        let payload = Self::read_payload(response).await?;

        let tasks: Vec<Task> = extract_tasks(&payload)
            .iter()
            .map(normalize_task)
            .collect();

        if use_cache {
            self.cache.put(email, &tasks);
        }

        Ok(FetchedTasks {
            tasks,
            source: TaskSource::Network,
        })
    }

    /// Create a task owned by `email`. The cache entry for that identity is
    /// invalidated before returning.
    pub async fn create_task(
        &self,
        email: &str,
        draft: &TaskDraft,
    ) -> Result<Task, UpstreamError> {
        Self::require_email(email)?;

        let mut body = match serde_json::to_value(draft) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        body.insert("email".to_string(), json!(email));

        let response = self
            .with_key(self.http.post(&self.endpoint))
            .json(&Value::Object(body.clone()))
            .send()
            .await?;
        let payload = Self::read_payload(response).await?;
        Self::check_mutation(&payload, "Failed to create task")?;

        self.cache.invalidate(Some(email));

        let raw = Self::dig_task(&payload, &["task", "createdTask", "data"])
            .unwrap_or(Value::Object(body));
        Ok(normalize_task(&raw))
    }

    /// Apply a partial update to one task. Any subset of fields may appear
    /// in `patch`; `email` is always carried in the body as well.
    pub async fn update_task(
        &self,
        email: &str,
        id: &TaskId,
        patch: Value,
    ) -> Result<Task, UpstreamError> {
        Self::require_email(email)?;

        let mut body = match patch {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        body.insert("email".to_string(), json!(email));

        let response = self
            .with_key(self.http.put(&self.endpoint))
            .query(&[("id", id.to_string()), ("email", email.to_string())])
            .json(&Value::Object(body.clone()))
            .send()
            .await?;
        let payload = Self::read_payload(response).await?;
        Self::check_mutation(&payload, "Failed to update task")?;

        self.cache.invalidate(Some(email));

        let raw = Self::dig_task(&payload, &["task", "updatedTask", "data"]).unwrap_or_else(|| {
            let mut echo = body;
            echo.insert("id".to_string(), json!(id.to_string()));
            Value::Object(echo)
        });
        Ok(normalize_task(&raw))
    }

    /// Delete one task by id, scoped to its owner.
    pub async fn delete_task(&self, email: &str, id: &TaskId) -> Result<(), UpstreamError> {
        Self::require_email(email)?;

        let response = self
            .with_key(self.http.delete(&self.endpoint))
            .query(&[("id", id.to_string()), ("email", email.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        self.cache.invalidate(Some(email));
        Ok(())
    }

    /// Read the owner's notification preferences.
    pub async fn fetch_settings(&self, email: &str) -> Result<UserSettings, UpstreamError> {
        Self::require_email(email)?;
        let endpoint = self
            .settings_endpoint
            .as_deref()
            .ok_or(UpstreamError::SettingsNotConfigured)?;

        let response = self
            .with_key(self.http.get(endpoint))
            .query(&[("email", email)])
            .send()
            .await?;
        let payload = Self::read_payload(response).await?;
        Ok(normalize_settings(&payload))
    }

    /// Persist the owner's notification preferences.
    pub async fn save_settings(
        &self,
        email: &str,
        settings: &UserSettings,
    ) -> Result<UserSettings, UpstreamError> {
        Self::require_email(email)?;
        let endpoint = self
            .settings_endpoint
            .as_deref()
            .ok_or(UpstreamError::SettingsNotConfigured)?;

        let mut body = match serde_json::to_value(settings) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        body.insert("email".to_string(), json!(email));

        let response = self
            .with_key(self.http.post(endpoint))
            .json(&Value::Object(body))
            .send()
            .await?;
        let payload = Self::read_payload(response).await?;
        Self::check_mutation(&payload, "Failed to save settings")?;
        Ok(normalize_settings(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dig_task_tries_envelope_then_array_then_bare() {
        let keys = ["task", "createdTask", "data"];
        let enveloped = json!({ "task": { "id": 1 } });
        assert_eq!(
            UpstreamClient::dig_task(&enveloped, &keys),
            Some(json!({ "id": 1 }))
        );

        let array = json!([{ "id": 2 }, { "id": 3 }]);
        assert_eq!(UpstreamClient::dig_task(&array, &keys), Some(json!({ "id": 2 })));

        let bare = json!({ "id": 4, "name": "bare" });
        assert_eq!(UpstreamClient::dig_task(&bare, &keys), Some(bare.clone()));

        assert_eq!(UpstreamClient::dig_task(&json!([]), &keys), None);
        assert_eq!(UpstreamClient::dig_task(&json!("nope"), &keys), None);
    }

    #[test]
    fn mutation_check_honors_success_flag() {
        assert!(UpstreamClient::check_mutation(&json!({ "success": true }), "f").is_ok());
        assert!(UpstreamClient::check_mutation(&json!({}), "f").is_ok());

        let err =
            UpstreamClient::check_mutation(&json!({ "success": false, "error": "nope" }), "f")
                .unwrap_err();
        match err {
            UpstreamError::Rejected { message } => assert_eq!(message, "nope"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
