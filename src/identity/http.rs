//! Appwrite-style REST client for the identity collaborators.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Account, IdentityService, Profile, Session};
use crate::error::IdentityError;

const PROJECT_HEADER: &str = "x-appwrite-project";
const DEFAULT_PROFILE_COLLECTION: &str = "databases/main/collections/profiles";

/// Identity service over HTTP.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use oauth_landing::identity::{HttpIdentityService, IdentityService};
///
/// # async fn example() -> Result<(), oauth_landing::error::IdentityError> {
/// let service = HttpIdentityService::new(
///     "https://cloud.example.com/v1",
///     "project-id",
///     Duration::from_secs(15),
/// )?
/// .with_session_cookie("a_session_project=abc");
/// let session = service.get_current_session().await?;
/// println!("{}", session.user_id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpIdentityService {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
    profile_collection: String,
    session_cookie: Option<String>,
}

impl HttpIdentityService {
    /// Every request is bounded by `request_timeout`.
    ///
    /// # Errors
    /// [`IdentityError::Network`] when the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IdentityError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            profile_collection: DEFAULT_PROFILE_COLLECTION.to_string(),
            session_cookie: None,
        })
    }

    /// Collection path (relative to the endpoint) holding profile documents.
    pub fn with_profile_collection(mut self, path: impl Into<String>) -> Self {
        self.profile_collection = path.into().trim_matches('/').to_string();
        self
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Ok(val) = HeaderValue::from_str(&self.project_id) {
            headers.insert(PROJECT_HEADER, val);
        }
        if let Some(cookie) = &self.session_cookie {
            if let Ok(val) = HeaderValue::from_str(cookie) {
                headers.insert(COOKIE, val);
            }
        }
        headers
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, IdentityError> {
        let url = format!("{}/{}", self.endpoint, path.trim_start_matches('/'));
        tracing::debug!(%url, "Identity request");
        let resp = self
            .client
            .get(&url)
            .headers(self.headers())
            .query(query)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if resp.status().is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| IdentityError::InvalidResponse(e.to_string()));
        }

        let body = resp.text().await.unwrap_or_default();
        Err(status_to_error(status, &body))
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn get_current_session(&self) -> Result<Session, IdentityError> {
        self.get_json("account/sessions/current", &[]).await
    }

    async fn get_current_account(&self) -> Result<Account, IdentityError> {
        self.get_json("account", &[]).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, IdentityError> {
        let list: SessionList = self.get_json("account/sessions", &[]).await?;
        Ok(list.sessions)
    }

    async fn get_profile_by_user_id(&self, user_id: &str) -> Result<Option<Profile>, IdentityError> {
        let path = format!("{}/documents", self.profile_collection);
        let query = [("queries[]", equal_query("userId", user_id)), ("queries[]", limit_query(1))];
        let list: DocumentList<Profile> = self.get_json(&path, &query).await?;
        Ok(list.documents.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
struct SessionList {
    #[serde(default)]
    sessions: Vec<Session>,
}

#[derive(Debug, Deserialize)]
struct DocumentList<T> {
    #[serde(default = "Vec::new")]
    documents: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Serialize an `equal` query in the JSON query syntax.
pub fn equal_query(attribute: &str, value: &str) -> String {
    serde_json::json!({
        "method": "equal",
        "attribute": attribute,
        "values": [value],
    })
    .to_string()
}

fn limit_query(limit: u32) -> String {
    serde_json::json!({ "method": "limit", "values": [limit] }).to_string()
}

/// Map a non-success response to an [`IdentityError`].
pub fn status_to_error(status: u16, body: &str) -> IdentityError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    match status {
        401 | 403 => IdentityError::Unauthorized {
            code: parsed.kind,
            message,
        },
        _ => IdentityError::Api {
            status,
            code: parsed.kind,
            message,
        },
    }
}
