//! Bearer-token auth (spec.md §6: "a bearer token for read and an
//! optional second token for write"). Comparisons are constant-time to
//! avoid timing side channels on the token value.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use tr_core::TrError;

use crate::state::ServerState;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Constant-time comparison to prevent timing attacks on the token value.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Present on every route except `/health`. Required for GET and the
/// event stream.
pub struct ReadAuth;

impl FromRequestParts<ServerState> for ReadAuth {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &ServerState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) if constant_time_eq(token.as_bytes(), state.config.read_token.as_bytes()) => Ok(ReadAuth),
            _ => Err(unauthorized()),
        }
    }
}

/// Required for write endpoints (admin merge). Absent `write_token` in
/// config disables all write endpoints outright.
pub struct WriteAuth;

impl FromRequestParts<ServerState> for WriteAuth {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &ServerState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.write_token.as_deref() else {
            return Err(forbidden());
        };
        match bearer_token(parts) {
            Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(WriteAuth),
            _ => Err(unauthorized()),
        }
    }
}

fn unauthorized() -> Response {
    TrError::Unauthorized.into_response()
}

fn forbidden() -> Response {
    TrError::Forbidden.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_tokens_compare_true() {
        assert!(constant_time_eq(b"abc123", b"abc123"));
    }

    #[test]
    fn different_length_tokens_compare_false() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn differing_tokens_compare_false() {
        assert!(!constant_time_eq(b"abc123", b"abc124"));
    }
}
