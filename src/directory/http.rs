//! HTTP directory client.
//!
//! Talks to a REST directory service:
//!
//! - `GET /scopes/{scope}/entities`
//! - `GET /entities/{id}`
//! - `GET /groups/{group}/members`
//! - `GET /skus/{sku}/plans`
//! - `PATCH /entities/{id}` with a [`TargetState`] body
//!
//! A `404` on any lookup means the referenced object does not exist.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{DirectoryError, ReconcileError, Result};
use crate::reconcile::TargetState;

use super::store::Directory;
use super::types::{Entity, ServicePlan};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Base retry delay in milliseconds, one backoff unit.
const RETRY_DELAY_MS: u64 = 1000;

/// Upper bound on a single backoff, in units of the base delay.
const MAX_BACKOFF_UNITS: u64 = 60;

/// Directory reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    /// HTTP client.
    client: Client,
    /// Service base URL.
    base_url: Url,
    /// Bearer token, if the service requires one.
    token: Option<String>,
    /// Base delay between retries.
    retry_delay: Duration,
}

impl HttpDirectory {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// created.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            DirectoryError::network(format!("Invalid directory URL '{base_url}': {e}"))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::network(format!(
                "Directory URL '{base_url}' cannot be used as a base"
            ))
            .into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| DirectoryError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Sets the base retry delay, one backoff unit.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Returns the service base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds a URL from path segments, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Delay before `attempt` after a retryable `error`.
    ///
    /// Rate limits wait the advertised `Retry-After` seconds, other transient
    /// failures back off linearly. Both count in units of the base delay and
    /// are capped at [`MAX_BACKOFF_UNITS`].
    fn backoff(&self, attempt: u32, error: &ReconcileError) -> Duration {
        let units = error
            .retry_delay_secs()
            .unwrap_or(1)
            .max(u64::from(attempt))
            .min(MAX_BACKOFF_UNITS);
        self.retry_delay * u32::try_from(units).unwrap_or(u32::MAX)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");

        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fetches a resource, retrying transient failures.
    ///
    /// Returns `None` on `404`.
    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>> {
        let url = self.url(segments);
        let mut last_error: Option<ReconcileError> = None;

        for attempt in 0..MAX_RETRIES {
            if let Some(error) = &last_error {
                let delay = self.backoff(attempt, error);
                debug!("Retry attempt {attempt} of {MAX_RETRIES} for {url} in {delay:?}: {error}");
                tokio::time::sleep(delay).await;
            }

            match self.get_once(url.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| DirectoryError::network("Max retries exceeded").into()))
    }

    async fn get_once<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        trace!("GET {url}");

        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| DirectoryError::network(format!("Request failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_status(response).await?;
        let body = response.json().await.map_err(|e| DirectoryError::InvalidResponse {
            message: format!("Failed to parse response: {e}"),
        })?;

        Ok(Some(body))
    }

    async fn patch_once(&self, url: Url, target: &TargetState) -> Result<()> {
        trace!("PATCH {url}");

        let response = self
            .request(Method::PATCH, url)
            .json(target)
            .send()
            .await
            .map_err(|e| DirectoryError::network(format!("Request failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(DirectoryError::api_error(404, "entity not found").into());
        }

        check_status(response).await?;
        Ok(())
    }
}

/// Maps non-success responses to directory errors.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let retry_after = if retry_after == 0 { 60 } else { retry_after };

        return Err(DirectoryError::RateLimited {
            retry_after_secs: retry_after,
        }
        .into());
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(DirectoryError::AuthenticationFailed {
            message: format!("Directory rejected credentials ({status})"),
        }
        .into());
    }

    if status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(DirectoryError::network(format!("Server error {status}: {body}")).into());
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DirectoryError::api_error(status.as_u16(), body).into());
    }

    Ok(response)
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn list_entities(&self, scope: &str) -> Result<Option<Vec<Entity>>> {
        self.get(&["scopes", scope, "entities"]).await
    }

    async fn lookup(&self, id: &str) -> Result<Option<Entity>> {
        self.get(&["entities", id]).await
    }

    async fn group_members(&self, group: &str) -> Result<Option<Vec<String>>> {
        self.get(&["groups", group, "members"]).await
    }

    async fn service_plans(&self, sku: &str) -> Result<Option<Vec<ServicePlan>>> {
        self.get(&["skus", sku, "plans"]).await
    }

    async fn apply_target(&self, entity: &Entity, target: &TargetState) -> Result<()> {
        let url = self.url(&["entities", &entity.id]);
        let mut last_error: Option<ReconcileError> = None;

        for attempt in 0..MAX_RETRIES {
            if let Some(error) = &last_error {
                let delay = self.backoff(attempt, error);
                debug!("Retry attempt {attempt} of {MAX_RETRIES} for {} in {delay:?}: {error}", entity.id);
                tokio::time::sleep(delay).await;
            }

            match self.patch_once(url.clone(), target).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(ReconcileError::apply_failed(&entity.id, e.to_string())),
            }
        }

        let reason = last_error.map_or_else(|| String::from("Max retries exceeded"), |e| e.to_string());
        Err(ReconcileError::apply_failed(&entity.id, reason))
    }

    fn backend_type(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn directory(server: &MockServer) -> HttpDirectory {
        HttpDirectory::new(&server.uri(), Some(String::from("secret")))
            .unwrap()
            .with_retry_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_list_entities() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scopes/staff/entities"))
            .and(header_matcher("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": "alice", "attributes": { "dept": "IT" } },
                { "id": "bob", "enabled": false }
            ])))
            .mount(&server)
            .await;

        let entities = directory(&server)
            .list_entities("staff")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].attribute("dept"), Some("IT"));
        assert!(entities[0].enabled);
        assert!(!entities[1].enabled);
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/groups/ghosts/members"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let members = directory(&server).group_members("ghosts").await.unwrap();
        assert!(members.is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/entities/alice"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = directory(&server).lookup("alice").await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Directory(DirectoryError::AuthenticationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/skus/ENTERPRISEPACK/plans"))
            .respond_with(ResponseTemplate::new(503))
            .expect(u64::from(MAX_RETRIES))
            .mount(&server)
            .await;

        let err = directory(&server)
            .service_plans("ENTERPRISEPACK")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_apply_target_patches_entity() {
        let server = MockServer::start().await;
        let target = TargetState::Attribute {
            name: String::from("dept"),
            value: String::from("Finance"),
        };
        Mock::given(method("PATCH"))
            .and(path("/entities/alice"))
            .and(body_json(serde_json::json!({
                "kind": "attribute",
                "name": "dept",
                "value": "Finance"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        directory(&server)
            .apply_target(&Entity::new("alice"), &target)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_apply_target_rejection_is_entity_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/entities/bob"))
            .respond_with(ResponseTemplate::new(409).set_body_string("entity is locked"))
            .mount(&server)
            .await;

        let target = TargetState::Relocate {
            container: String::from("OU=Leavers"),
        };
        let err = directory(&server)
            .apply_target(&Entity::new("bob"), &target)
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::ApplyFailed { ref entity, .. } if entity == "bob"));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/entities/alice"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/entities/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "alice" })))
            .expect(1)
            .mount(&server)
            .await;

        let entity = directory(&server).lookup("alice").await.unwrap().unwrap();
        assert_eq!(entity.id, "alice");
    }

    #[test]
    fn test_backoff_honours_retry_after() {
        let directory = HttpDirectory::new("http://localhost:8080", None)
            .unwrap()
            .with_retry_delay(Duration::from_millis(10));

        let rate_limited = ReconcileError::from(DirectoryError::RateLimited {
            retry_after_secs: 7,
        });
        assert_eq!(directory.backoff(1, &rate_limited), Duration::from_millis(70));
        assert_eq!(directory.backoff(2, &rate_limited), Duration::from_millis(70));

        let network = ReconcileError::from(DirectoryError::network("reset"));
        assert_eq!(directory.backoff(1, &network), Duration::from_millis(10));
        assert_eq!(directory.backoff(2, &network), Duration::from_millis(20));

        let flooded = ReconcileError::from(DirectoryError::RateLimited {
            retry_after_secs: 3600,
        });
        assert_eq!(directory.backoff(1, &flooded), Duration::from_millis(600));
    }

    #[test]
    fn test_path_segments_are_encoded() {
        let directory = HttpDirectory::new("http://localhost:8080/api/", None).unwrap();
        let url = directory.url(&["scopes", "OU=Staff,DC=corp", "entities"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/scopes/OU=Staff,DC=corp/entities"
        );

        let url = directory.url(&["entities", "a/b"]);
        assert_eq!(url.as_str(), "http://localhost:8080/api/entities/a%2Fb");
    }

    #[test]
    fn test_invalid_url() {
        assert!(HttpDirectory::new("not a url", None).is_err());
    }
}
