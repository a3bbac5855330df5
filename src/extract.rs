//! Request extractors that reject with the API's JSON error body

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// `Json` that reports malformed bodies as a 400 `{success:false,error}`
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// `Path` that reports unparsable segments as a 400 `{success:false,error}`
pub struct ApiPath<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TradeRequest;
    use axum::{
        body::Body,
        http::{header, StatusCode},
        response::IntoResponse,
    };

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/sessions/1/buy")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_bad_request() {
        let result = ApiJson::<TradeRequest>::from_request(json_request(r#"{"quantity":"two"}"#), &()).await;
        let err = match result {
            Ok(_) => panic!("malformed body accepted"),
            Err(e) => e,
        };
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_truncated_json_is_bad_request() {
        let result = ApiJson::<TradeRequest>::from_request(json_request("{\"item_id\":"), &()).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/sessions/1/buy")
            .body(Body::from("{}"))
            .unwrap();
        let result = ApiJson::<TradeRequest>::from_request(req, &()).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
