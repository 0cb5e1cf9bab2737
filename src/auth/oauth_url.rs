//! Provider OAuth URL construction.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::browser::{BrowserName, BrowserProfile};
use crate::error::{LandingError, Result};

/// Round-trip state carried through the provider redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthState {
    pub nonce: Uuid,
    pub browser: BrowserName,
    pub enhanced: bool,
}

impl OAuthState {
    pub fn encode(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(self)?))
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw.trim())
            .map_err(|e| LandingError::InvalidArgument(format!("OAuth state is not base64: {e}")))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Builds `{endpoint}/account/sessions/oauth2/{provider}` URLs.
#[derive(Debug, Clone)]
pub struct OAuthUrlBuilder {
    endpoint: String,
    project_id: String,
    success_url: String,
    failure_url: String,
}

impl OAuthUrlBuilder {
    pub fn new(
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
        success_url: impl Into<String>,
        failure_url: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            success_url: success_url.into(),
            failure_url: failure_url.into(),
        }
    }

    /// Build the provider URL for `browser`.
    ///
    /// Enhanced-flow browsers also get `prompt=select_account`, so a stale
    /// account selection is never reused silently.
    pub fn build(&self, provider: &str, browser: &BrowserProfile, nonce: Uuid) -> Result<Url> {
        validate_provider(provider)?;
        let base = format!("{}/account/sessions/oauth2/{provider}", self.endpoint);
        let mut url = Url::parse(&base)
            .map_err(|e| LandingError::Configuration(format!("invalid endpoint {base}: {e}")))?;

        let state = OAuthState {
            nonce,
            browser: browser.browser,
            enhanced: browser.requires_enhanced_flow,
        }
        .encode()?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("project", &self.project_id)
                .append_pair("success", &self.success_url)
                .append_pair("failure", &self.failure_url)
                .append_pair("state", &state);
            if browser.requires_enhanced_flow {
                query.append_pair("prompt", "select_account");
            }
        }
        Ok(url)
    }
}

fn validate_provider(provider: &str) -> Result<()> {
    let valid = !provider.is_empty()
        && provider
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(LandingError::InvalidArgument(format!(
            "invalid OAuth provider name: {provider:?}"
        )))
    }
}
