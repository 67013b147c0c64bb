use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};

use homefind_core::identity::{IdentityError, IdentityProvider, IdentityResult, UserProfile};

/// Identity provider backed by the Clerk Backend API.
#[derive(Clone)]
pub struct ClerkClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl std::fmt::Debug for ClerkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClerkClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ClerkClient {
    pub fn new(base_url: &str, secret_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().use_rustls_tls().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    fn user_url(&self, user_id: &str) -> String {
        format!("{}/users/{user_id}", self.base_url)
    }
}

fn upstream(err: impl std::fmt::Display) -> IdentityError {
    IdentityError::Upstream(err.to_string())
}

#[async_trait]
impl IdentityProvider for ClerkClient {
    async fn get_user(&self, user_id: &str) -> IdentityResult<UserProfile> {
        let response = self
            .http
            .get(self.user_url(user_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(upstream)?;
        match response.status() {
            StatusCode::OK => response.json().await.map_err(upstream),
            StatusCode::NOT_FOUND => Err(IdentityError::UserNotFound(user_id.to_string())),
            status => Err(IdentityError::Upstream(format!("get user returned {status}"))),
        }
    }

    async fn update_user_metadata(
        &self,
        user_id: &str,
        metadata: Map<String, Value>,
    ) -> IdentityResult<()> {
        // The metadata endpoint deep-merges into what is already stored.
        let response = self
            .http
            .patch(format!("{}/metadata", self.user_url(user_id)))
            .bearer_auth(&self.secret_key)
            .json(&json!({ "public_metadata": metadata }))
            .send()
            .await
            .map_err(upstream)?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(IdentityError::UserNotFound(user_id.to_string())),
            status => Err(IdentityError::Upstream(format!(
                "update metadata returned {status}"
            ))),
        }
    }
}
