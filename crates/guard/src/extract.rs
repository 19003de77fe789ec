use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;

use chartgate_core_types::{AccountId, RequestContext, RequestId, TenantId};
use chartgate_principal::{AuthError, Principal};

use crate::errors::GuardError;
use crate::state::GuardState;

/// Actor identity observed by the response-side audit wrapper. The wrapper
/// plants the slot before the handler runs; the extractor fills it once.
#[derive(Clone, Default)]
pub struct CurrentActor(pub Arc<OnceLock<ActorInfo>>);

#[derive(Clone, Debug)]
pub struct ActorInfo {
    pub account: AccountId,
    pub role: Option<String>,
    pub tenant: Option<TenantId>,
}

/// Resolved principal plus the immutable context for this request.
pub struct Authenticated {
    pub principal: Principal,
    pub ctx: RequestContext,
}

/// Pulls the bearer token from the `Authorization` header, falling back to
/// the `token` query parameter for embeds that cannot set headers (inline
/// file viewers). Callers on the query path accept that tokens may be
/// retained in browser history and URL logs.
fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        if let Ok(value) = header.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }
    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("token=")
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
    })
}

fn header_string(parts: &Parts, name: impl axum::http::header::AsHeaderName) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = GuardError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = parts
            .extensions
            .get::<Arc<GuardState>>()
            .cloned()
            .ok_or(GuardError::Internal)?;

        let token = extract_token(parts).ok_or(AuthError::TokenMissing)?;
        let principal = state.resolver.resolve(&token).await?;

        // Correlate with the audit wrapper when it is mounted.
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .or_else(|| header_string(parts, "x-request-id").map(RequestId))
            .unwrap_or_else(RequestId::new);

        let ctx = RequestContext {
            tenant: principal.tenant.clone(),
            ip: header_string(parts, "x-forwarded-for"),
            user_agent: header_string(parts, USER_AGENT),
            request_id,
            path: parts.uri.path().to_string(),
            method: parts.method.to_string(),
        };

        if let Some(slot) = parts.extensions.get::<CurrentActor>() {
            let _ = slot.0.set(ActorInfo {
                account: principal.account_id.clone(),
                role: principal.role.clone(),
                tenant: principal.tenant.clone(),
            });
        }

        Ok(Authenticated { principal, ctx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn header_token_wins_over_query() {
        let parts = parts("/documents/1?token=query-token", Some("Bearer header-token"));
        assert_eq!(extract_token(&parts).as_deref(), Some("header-token"));
    }

    #[test]
    fn query_fallback_for_headerless_embeds() {
        let parts = parts("/documents/1?inline=1&token=query-token", None);
        assert_eq!(extract_token(&parts).as_deref(), Some("query-token"));
    }

    #[test]
    fn missing_token_everywhere_is_none() {
        let parts_no_auth = parts("/documents/1?inline=1", None);
        assert_eq!(extract_token(&parts_no_auth), None);
        let parts_basic = parts("/documents/1", Some("Basic abc"));
        assert_eq!(extract_token(&parts_basic), None);
    }
}
