/// Buyer/seller messaging endpoints
use crate::{
    ads::PageQuery,
    auth::AuthContext,
    context::AppContext,
    error::MarketResult,
    messaging::{
        ConversationList, ConversationThread, SendMessageRequest, SendMessageResponse,
        UnreadCountResponse,
    },
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};

/// Build messaging routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/messages", post(send_message))
        .route("/api/messages/unread-count", get(unread_count))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/:conversation_id", get(get_conversation))
}

async fn send_message(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<SendMessageRequest>,
) -> MarketResult<Json<SendMessageResponse>> {
    Ok(Json(ctx.message_manager.send(&auth.user.user_id, req).await?))
}

async fn list_conversations(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> MarketResult<Json<ConversationList>> {
    let conversations = ctx.message_manager.conversations(&auth.user.user_id).await?;
    Ok(Json(ConversationList { conversations }))
}

async fn get_conversation(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(conversation_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> MarketResult<Json<ConversationThread>> {
    let thread = ctx
        .message_manager
        .thread(&conversation_id, &auth.user.user_id, query.page, query.limit)
        .await?;

    Ok(Json(thread))
}

async fn unread_count(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> MarketResult<Json<UnreadCountResponse>> {
    let unread_count = ctx.message_manager.unread_count(&auth.user.user_id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}
