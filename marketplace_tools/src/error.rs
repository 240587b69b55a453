use reqwest::Response;
use serde_json::Value;
use thiserror::Error;

/// The upstream 401 detail that means the API token exists but was issued for the wrong permission
/// class. Operators need to reissue the token, not reset credentials, so it gets its own variant.
const SCOPE_DENIED_DETAIL: &str = "token scope not allowed";

#[derive(Debug, Error)]
pub enum MarketplaceApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("API token lacks the required permission scope: {0}")]
    PermissionScope(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Transient upstream failure: {message}")]
    Transient { status: Option<u16>, message: String },
    #[error("Could not send request: {0}")]
    RequestError(String),
    #[error("Upstream rejected every supported request body encoding. Last response: {0}")]
    RequestRejected(String),
    #[error("The response contained no data")]
    EmptyResponse,
}

impl MarketplaceApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn is_permission_scope(&self) -> bool {
        matches!(self, Self::PermissionScope(_))
    }
}

/// Builds the error for a non-success response, consuming its body.
pub(crate) async fn error_for_response(response: Response) -> MarketplaceApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    error_for_status(status, body)
}

/// Classifies a non-success status + body. A 401 carrying the scope-denied detail is a
/// credential-class problem, not a generic auth failure.
pub(crate) fn error_for_status(status: u16, body: String) -> MarketplaceApiError {
    if status == 401 && scope_denied(&body) {
        return MarketplaceApiError::PermissionScope(body);
    }
    MarketplaceApiError::QueryError { status, message: body }
}

fn scope_denied(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .map(|v| v["detail"].as_str() == Some(SCOPE_DENIED_DETAIL))
        .unwrap_or_else(|_| body.contains(SCOPE_DENIED_DETAIL))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scope_denied_401_is_classified_separately() {
        let err = error_for_status(401, r#"{"title":"unauthorized","detail":"token scope not allowed"}"#.to_string());
        assert!(err.is_permission_scope());
        // a plain 401 stays a generic query error
        let err = error_for_status(401, r#"{"detail":"invalid token"}"#.to_string());
        assert!(matches!(err, MarketplaceApiError::QueryError { status: 401, .. }));
    }

    #[test]
    fn non_json_bodies_still_match_on_substring() {
        let err = error_for_status(401, "401: token scope not allowed".to_string());
        assert!(err.is_permission_scope());
    }
}
