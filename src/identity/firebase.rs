use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{CoreError, CoreResult, UserId};

use super::IdentityProvider;

trait GetField {
    fn get_str_field(&self, field: &str) -> CoreResult<String>;
    fn get_obj_field(&self, field: &str) -> CoreResult<&Value>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> CoreResult<String> {
        Ok(
            self.get(field)
            .ok_or_else(|| CoreError::unauthenticated(format!("expected {field} in identity response")))?
            .as_str()
            .ok_or_else(|| CoreError::unauthenticated(format!("expected {field} in identity response to be string")))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> CoreResult<&Value> {
        self.get(field)
        .ok_or_else(|| CoreError::unauthenticated(format!("expected {field} in identity response")))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

/// Resolves Firebase ID tokens through the Identity Toolkit `accounts:lookup`
/// endpoint.
#[derive(Clone)]
pub struct FirebaseIdentity {
    http_client: reqwest::Client,
    lookup_url: String,
}

impl FirebaseIdentity {
    pub fn new(lookup_url: &str, api_key: &str) -> CoreResult<Self> {
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| CoreError::unauthenticated(format!("identity client: {err}")))?;

        Ok(FirebaseIdentity {
            http_client,
            lookup_url: format!("{lookup_url}?key={api_key}"),
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn resolve(&self, token: &str) -> CoreResult<UserId> {
        let unreachable = |err: reqwest::Error| CoreError::unauthenticated(format!("identity provider: {err}"));

        let response = self.http_client.post(&self.lookup_url)
            .json(&LookupRequest { id_token: token })
            .send()
            .await
            .map_err(unreachable)?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "token rejected");
            return Err(CoreError::unauthenticated("invalid or expired token"));
        }

        let body: Value = response.json().await.map_err(unreachable)?;
        let user = body
            .get_obj_field("users")?
            .get(0)
            .ok_or_else(|| CoreError::unauthenticated("token does not belong to any user"))?;

        UserId::parse(&user.get_str_field("localId")?)
    }
}
