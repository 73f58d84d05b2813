// src/utils/context.rs
//
// Tenant and caller context. Authentication happens upstream; the gateway
// forwards the verified college and caller identity as headers, and this
// middleware turns them into a request extension every handler reads.
// Role checks stay at the gateway; the role header only feeds audit trails.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

pub const COLLEGE_ID_HEADER: &str = "x-college-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone)]
pub struct TenantContext {
    pub college_id: i64,
    pub user_id: Option<i64>,
    pub role: Option<String>,
}

fn header_i64(headers: &HeaderMap, name: &str) -> Result<Option<i64>, AppError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let parsed = value
                .to_str()
                .ok()
                .and_then(|raw| raw.parse::<i64>().ok())
                .ok_or_else(|| {
                    AppError::Unauthorized(format!("malformed {} header", name))
                })?;
            Ok(Some(parsed))
        }
    }
}

/// Middleware that requires a college id and injects `TenantContext`.
pub async fn tenant_context(mut req: Request, next: Next) -> Result<Response, AppError> {
    let headers = req.headers();

    let college_id = header_i64(headers, COLLEGE_ID_HEADER)?
        .ok_or_else(|| AppError::Unauthorized("missing college context".to_string()))?;
    let user_id = header_i64(headers, USER_ID_HEADER)?;
    let role = headers
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    req.extensions_mut().insert(TenantContext {
        college_id,
        user_id,
        role,
    });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_numeric_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(COLLEGE_ID_HEADER, HeaderValue::from_static("42"));
        assert_eq!(header_i64(&headers, COLLEGE_ID_HEADER).unwrap(), Some(42));
        assert_eq!(header_i64(&headers, USER_ID_HEADER).unwrap(), None);
    }

    #[test]
    fn rejects_garbage_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(COLLEGE_ID_HEADER, HeaderValue::from_static("not-a-number"));
        assert!(header_i64(&headers, COLLEGE_ID_HEADER).is_err());
    }
}
