/// Registration, login and referral endpoints
use crate::{
    account::{
        AuthResponse, LoginRequest, MeResponse, ReferralCodeResponse, RegisterRequest,
        TrackReferralRequest, TrackReferralResponse,
    },
    api::middleware::{extract_session_token, SESSION_COOKIE},
    auth::AuthContext,
    context::AppContext,
    db::account::{Session, User},
    error::{MarketError, MarketResult},
    mailer::Notification,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use validator::Validate;

/// Build account routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/user/referral-code", get(referral_code))
        .route("/api/referral/track", post(track_referral))
}

/// Register a password account and start a session
async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> MarketResult<(HeaderMap, Json<AuthResponse>)> {
    req.validate()?;

    let user = ctx
        .account_manager
        .register(&req.email, &req.password, &req.name, req.phone)
        .await?;
    let session = ctx.account_manager.create_session(&user.user_id).await?;

    ctx.notifier.enqueue(
        user.email.clone(),
        Notification::Welcome {
            user_name: user.name.clone(),
        },
    );

    session_response(&ctx, user, session)
}

/// Password login
async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> MarketResult<(HeaderMap, Json<AuthResponse>)> {
    let (user, session) = ctx
        .account_manager
        .login(&req.email, &req.password)
        .await
        .map_err(|e| {
            tracing::debug!("Login failed for {}: {}", req.email, e);
            e
        })?;

    tracing::info!("User {} logged in", user.user_id);

    session_response(&ctx, user, session)
}

/// Delete the current session, if any, and clear the cookie
async fn logout(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> MarketResult<(HeaderMap, Json<Value>)> {
    if let Some(token) = extract_session_token(&headers) {
        ctx.account_manager.delete_session(&token).await?;
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, clear_cookie(&ctx)?);

    Ok((response_headers, Json(json!({ "message": "Logged out" }))))
}

/// Current user profile
async fn me(auth: AuthContext) -> Json<MeResponse> {
    let user = auth.user;
    Json(MeResponse {
        user_id: user.user_id,
        email: user.email,
        name: user.name,
        phone: user.phone,
        picture: user.picture,
        role: user.role,
    })
}

async fn referral_code(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> MarketResult<Json<ReferralCodeResponse>> {
    let (referral_code, referral_count) = ctx.account_manager.referral_code(&auth.user).await?;

    Ok(Json(ReferralCodeResponse {
        referral_code,
        referral_count,
    }))
}

/// Credit a referral; unknown or missing codes are not an error
async fn track_referral(
    State(ctx): State<AppContext>,
    Json(req): Json<TrackReferralRequest>,
) -> MarketResult<Json<TrackReferralResponse>> {
    let code = match req.ref_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => code,
        _ => {
            return Ok(Json(TrackReferralResponse {
                tracked: false,
                referrer_id: None,
            }))
        }
    };

    let referrer_id = ctx.account_manager.track_referral(code).await?;

    Ok(Json(TrackReferralResponse {
        tracked: referrer_id.is_some(),
        referrer_id,
    }))
}

fn session_response(
    ctx: &AppContext,
    user: User,
    session: Session,
) -> MarketResult<(HeaderMap, Json<AuthResponse>)> {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie(ctx, &session.session_token)?);

    Ok((
        headers,
        Json(AuthResponse {
            user_id: user.user_id,
            email: user.email,
            name: user.name,
            role: user.role,
            session_token: session.session_token,
        }),
    ))
}

fn session_cookie(ctx: &AppContext, token: &str) -> MarketResult<HeaderValue> {
    let max_age = ctx.config.authentication.session_lifetime_days * 24 * 60 * 60;
    cookie_header(ctx, token, max_age)
}

fn clear_cookie(ctx: &AppContext) -> MarketResult<HeaderValue> {
    cookie_header(ctx, "", 0)
}

fn cookie_header(ctx: &AppContext, value: &str, max_age: i64) -> MarketResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=None; Path=/; Max-Age={}",
        SESSION_COOKIE, value, max_age
    );
    if ctx.config.authentication.secure_cookies {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(&cookie)
        .map_err(|e| MarketError::Internal(format!("Invalid cookie header: {}", e)))
}
