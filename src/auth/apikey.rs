//! The one built-in auth scheme: a static api key matched against the
//! `X-MCP-API-Key` header or the `api_key` query parameter.

use async_trait::async_trait;

use super::{AuthError, AuthMiddleware, Credentials};

pub const HEADER_NAME: &str = "x-mcp-api-key";
pub const QUERY_PARAM: &str = "api_key";

pub struct ApiKeyAuth {
    expected: String,
}

impl ApiKeyAuth {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

#[async_trait]
impl AuthMiddleware for ApiKeyAuth {
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let provided = credentials
            .header_value
            .as_deref()
            .or(credentials.query_value.as_deref())
            .ok_or(AuthError::Missing)?;

        if provided == self.expected {
            Ok(())
        } else {
            Err(AuthError::Invalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_matching_header() {
        let auth = ApiKeyAuth::new("secret");
        let creds = Credentials {
            header_value: Some("secret".to_string()),
            query_value: None,
        };
        assert!(auth.authenticate(&creds).await.is_ok());
    }

    #[tokio::test]
    async fn accepts_matching_query_param_when_header_absent() {
        let auth = ApiKeyAuth::new("secret");
        let creds = Credentials {
            header_value: None,
            query_value: Some("secret".to_string()),
        };
        assert!(auth.authenticate(&creds).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_missing_credentials() {
        let auth = ApiKeyAuth::new("secret");
        assert!(matches!(
            auth.authenticate(&Credentials::default()).await,
            Err(AuthError::Missing)
        ));
    }

    #[tokio::test]
    async fn rejects_wrong_key() {
        let auth = ApiKeyAuth::new("secret");
        let creds = Credentials {
            header_value: Some("wrong".to_string()),
            query_value: None,
        };
        assert!(matches!(
            auth.authenticate(&creds).await,
            Err(AuthError::Invalid)
        ));
    }
}
