//! Request extractors
//!
//! Body, path and query rejections are reported as
//! [`ValidationError::InvalidRequest`] so malformed input gets the same 400
//! envelope as a DTO that fails validation.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::{request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;

use crate::core::error::{AppError, ValidationError};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::files::models::UserId;

/// Header the gateway sets after authenticating the caller
pub const USER_ID_HEADER: &str = "x-user-id";

/// JSON body extractor
pub struct AppJson<T>(pub T);

/// Path parameter extractor, e.g. a file id
pub struct AppPath<T>(pub T);

/// Query string extractor for list filters
pub struct AppQuery<T>(pub T);

fn json_rejection(rejection: JsonRejection) -> AppError {
    let message = match rejection {
        JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON".to_string(),
        JsonRejection::JsonDataError(err) => {
            format!("Request body has the wrong shape: {}", err.body_text())
        }
        JsonRejection::MissingJsonContentType(_) => {
            "Expected Content-Type: application/json".to_string()
        }
        other => other.body_text(),
    };
    ValidationError::InvalidRequest(message).into()
}

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        Ok(Self(value))
    }
}

impl<T, S> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: PathRejection| {
                ValidationError::InvalidRequest(format!(
                    "Invalid path parameter: {}",
                    rejection.body_text()
                ))
            })?;
        Ok(Self(value))
    }
}

impl<T, S> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| {
                ValidationError::InvalidRequest(format!(
                    "Invalid query string: {}",
                    rejection.body_text()
                ))
            })?;
        Ok(Self(value))
    }
}

/// Read the caller's id from `X-User-Id`; it must be a positive integer
pub fn user_id_from_headers(headers: &HeaderMap) -> Result<UserId, AppError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing user identity".to_string()))?;

    raw.trim()
        .parse::<UserId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Unauthorized("Invalid user identity".to_string()))
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(*user);
        }
        let user_id = user_id_from_headers(&parts.headers)?;
        Ok(AuthenticatedUser { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_user_id_from_headers() {
        assert_eq!(user_id_from_headers(&headers_with("42")).unwrap(), 42);
        assert_eq!(user_id_from_headers(&headers_with(" 7 ")).unwrap(), 7);
    }

    #[test]
    fn test_user_id_rejects_missing_and_non_positive() {
        for value in ["0", "-3", "abc", ""] {
            assert!(matches!(
                user_id_from_headers(&headers_with(value)),
                Err(AppError::Unauthorized(_))
            ));
        }
        assert!(matches!(
            user_id_from_headers(&HeaderMap::new()),
            Err(AppError::Unauthorized(_))
        ));
    }
}
