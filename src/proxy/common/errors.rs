// Uniform JSON error body for everything the relay refuses or fails:
// {"error": true, "msg": "<message>"}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::AuthFailure;

/// Build an error response with the given HTTP status and message.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let body = json!({
        "error": true,
        "msg": message,
    });
    (status, Json(body)).into_response()
}

/// 403 for a subpath outside the provider's allowlist.
pub fn forbidden_path_response(subpath: &str) -> Response {
    error_response(
        StatusCode::FORBIDDEN,
        &format!("you are not allowed to request {}", subpath),
    )
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        error_response(StatusCode::UNAUTHORIZED, &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_forbidden_path_message() {
        let resp = forbidden_path_response("v1/files");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert_eq!(body["error"], true);
        assert_eq!(body["msg"], "you are not allowed to request v1/files");
    }

    #[tokio::test]
    async fn test_auth_failure_into_response() {
        let resp = AuthFailure::WrongAccessCode.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["msg"], "wrong access code");
    }

    proptest! {
        #[test]
        fn prop_error_response_format(msg in "[a-zA-Z0-9 ]{1,100}") {
            let resp = error_response(StatusCode::BAD_GATEWAY, &msg);
            prop_assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

            let parsed = tokio::runtime::Runtime::new()
                .unwrap()
                .block_on(body_json(resp));

            prop_assert_eq!(parsed["error"].as_bool(), Some(true));
            prop_assert_eq!(parsed["msg"].as_str().unwrap(), msg.as_str());
        }
    }
}
