/// Authentication extractors
use crate::{
    api::middleware::extract_session_token, context::AppContext, db::account::User,
    error::MarketError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context - extracts and validates the session from the request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub session_token: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let session_token = extract_session_token(&parts.headers)
            .ok_or_else(|| MarketError::Authentication("Not authenticated".to_string()))?;

        let user = state.account_manager.validate_session(&session_token).await?;

        Ok(AuthContext {
            user,
            session_token,
        })
    }
}

/// Optional authenticated context - does not fail if no auth provided
#[derive(Debug, Clone)]
pub struct OptionalAuthContext {
    pub auth: Option<AuthContext>,
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = match extract_session_token(&parts.headers) {
            Some(session_token) => state
                .account_manager
                .validate_session(&session_token)
                .await
                .ok()
                .map(|user| AuthContext {
                    user,
                    session_token,
                }),
            None => None,
        };

        Ok(OptionalAuthContext { auth })
    }
}

/// Admin authentication context - requires the admin role
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub user: User,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let AuthContext { user, .. } = AuthContext::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            tracing::warn!("User {} attempted an admin action", user.user_id);
            return Err(MarketError::Authorization("Admin access required".to_string()));
        }

        Ok(AdminAuthContext { user })
    }
}
