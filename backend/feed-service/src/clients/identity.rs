use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, Span};
use uuid::Uuid;

use super::IdentityLookup;
use crate::config::IdentityConfig;
use crate::error::IdentityError;
use crate::models::ActorProfile;

/// Profile payload returned by the identity provider's user API
#[derive(Debug, Deserialize)]
struct UserProfileResponse {
    id: Uuid,
    #[serde(alias = "display_name", alias = "username")]
    name: String,
    #[serde(default, alias = "picture", alias = "avatar")]
    avatar_url: Option<String>,
}

impl From<UserProfileResponse> for ActorProfile {
    fn from(resp: UserProfileResponse) -> Self {
        ActorProfile {
            id: resp.id,
            name: resp.name,
            avatar_url: resp.avatar_url,
        }
    }
}

/// Identity lookup over the provider's REST API
#[derive(Clone)]
pub struct HttpIdentityLookup {
    http: Client,
    base_url: String,
    api_token: String,
    span: Span,
}

impl HttpIdentityLookup {
    pub fn new(config: &IdentityConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            span: tracing::info_span!("component", name = "identity_lookup"),
        })
    }
}

fn classify_status(user_id: Uuid, status: StatusCode) -> IdentityError {
    match status {
        StatusCode::NOT_FOUND => IdentityError::NotFound(user_id),
        StatusCode::TOO_MANY_REQUESTS => IdentityError::RateLimited,
        other => IdentityError::Unavailable(format!("unexpected status {}", other)),
    }
}

#[async_trait]
impl IdentityLookup for HttpIdentityLookup {
    async fn get_profile(&self, user_id: Uuid) -> Result<ActorProfile, IdentityError> {
        let url = format!("{}/users/{}", self.base_url, user_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(parent: &self.span, %user_id, %status, "identity lookup rejected");
            return Err(classify_status(user_id, status));
        }

        let profile: UserProfileResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Decode(e.to_string()))?;

        Ok(profile.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let id = Uuid::new_v4();
        assert_eq!(
            classify_status(id, StatusCode::NOT_FOUND),
            IdentityError::NotFound(id)
        );
        assert_eq!(
            classify_status(id, StatusCode::TOO_MANY_REQUESTS),
            IdentityError::RateLimited
        );
        assert!(matches!(
            classify_status(id, StatusCode::SERVICE_UNAVAILABLE),
            IdentityError::Unavailable(_)
        ));
    }

    #[test]
    fn profile_accepts_provider_field_names() {
        let id = Uuid::new_v4();
        let body = format!(
            r#"{{"id":"{}","display_name":"Ada","picture":"https://cdn/ada.png"}}"#,
            id
        );
        let profile: ActorProfile = serde_json::from_str::<UserProfileResponse>(&body)
            .unwrap()
            .into();
        assert_eq!(profile.id, id);
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.avatar_url.as_deref(), Some("https://cdn/ada.png"));
    }

    #[test]
    fn base_url_is_normalized() {
        let lookup = HttpIdentityLookup::new(&IdentityConfig {
            base_url: "http://identity/api/v1/".to_string(),
            api_token: String::new(),
            timeout_ms: 100,
        })
        .unwrap();
        assert_eq!(lookup.base_url, "http://identity/api/v1");
    }
}
