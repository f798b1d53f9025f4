/// Payment endpoints: hosted checkout orders and gateway webhooks
use crate::{
    ads::AdManager,
    auth::AuthContext,
    context::AppContext,
    error::{MarketError, MarketResult},
    mailer::Notification,
    metrics,
    payments::{
        signature, to_major_units, Correlation, CreateOrderRequest, CreateOrderResponse,
        OrderRequest, Payment, PaymentManager, PaymentType, VerifyPaymentResponse,
        WebhookPayload,
    },
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

/// Build payment routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/payments/create-order", post(create_order))
        .route(
            "/api/payments/webhook",
            get(webhook_verification).post(webhook),
        )
        .route("/api/payments/verify/:order_code", get(verify_payment))
}

/// Create a checkout order for a paid ad action
async fn create_order(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<CreateOrderRequest>,
) -> MarketResult<Json<CreateOrderResponse>> {
    let payment_type = PaymentType::from_str(&req.payment_type)?;
    let ad = ctx.ad_manager.get(&req.ad_id).await?;

    let order = OrderRequest {
        amount: payment_type.amount(),
        customer_email: auth.user.email.clone(),
        customer_name: auth.user.name.clone(),
        correlation: Correlation {
            ad_id: ad.ad_id.clone(),
            payment_type: payment_type.as_str().to_string(),
            user_id: auth.user.user_id.clone(),
        },
    };

    let order_code = ctx.gateway.create_order(&order).await?;
    ctx.payment_manager
        .record_order(order_code, &ad.ad_id, &auth.user.user_id, payment_type)
        .await?;

    Ok(Json(CreateOrderResponse {
        order_code,
        checkout_url: ctx.gateway.checkout_url(order_code),
        amount: to_major_units(payment_type.amount()),
    }))
}

/// Echo the verification key the gateway expects when registering the URL
async fn webhook_verification(State(ctx): State<AppContext>) -> MarketResult<Json<Value>> {
    let key = ctx
        .config
        .payments
        .webhook_verification_key
        .as_deref()
        .ok_or_else(|| MarketError::NotFound("Webhook verification not configured".to_string()))?;

    Ok(Json(json!({ "Key": key })))
}

/// Gateway transaction notification
///
/// Every delivery that passes the signature check is acknowledged, whatever
/// its content, so the gateway does not keep retrying.
async fn webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> MarketResult<Json<Value>> {
    if let Some(secret) = ctx.config.payments.webhook_secret.as_deref() {
        let provided = headers
            .get(signature::SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !signature::verify(secret, &body, provided) {
            tracing::warn!("Rejected webhook with invalid signature");
            metrics::record_webhook("invalid_signature");
            return Err(MarketError::Authentication(
                "Invalid webhook signature".to_string(),
            ));
        }
    }

    let received = Json(json!({ "status": "received" }));

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Malformed webhook body: {}", e);
            metrics::record_webhook("malformed");
            return Ok(received);
        }
    };

    let event = payload.event_data;
    if !event.is_finished() {
        tracing::debug!("Ignoring webhook with status {:?}", event.status_id);
        metrics::record_webhook("ignored");
        return Ok(received);
    }

    let Some(order_code) = event.order_code else {
        tracing::warn!("Finished webhook without an order code");
        metrics::record_webhook("unknown_order");
        return Ok(received);
    };

    let outcome = match complete_and_apply(&ctx, order_code, event.transaction_id.as_deref()).await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // Rolled back: the order stays pending so a redelivery can settle it
            tracing::error!("Failed to settle order {}: {}", order_code, e);
            metrics::record_webhook("failed");
            return Ok(received);
        }
    };

    let Some((payment, applied)) = outcome else {
        match ctx.payment_manager.find_by_order_code(order_code).await {
            Ok(Some(_)) => {
                tracing::info!("Duplicate webhook for order {}", order_code);
                metrics::record_webhook("duplicate");
            }
            Ok(None) => {
                tracing::warn!("Webhook for unknown order {}", order_code);
                metrics::record_webhook("unknown_order");
            }
            Err(e) => tracing::warn!("Could not look up order {}: {}", order_code, e),
        }
        return Ok(received);
    };

    if let Some(correlation) = event.correlation() {
        if correlation.ad_id != payment.ad_id
            || correlation.payment_type != payment.payment_type.as_str()
        {
            tracing::warn!(
                "Webhook correlation {:?} disagrees with order {}; using the stored order",
                correlation,
                order_code
            );
        }
    }

    metrics::record_webhook("completed");
    metrics::record_payment_completed(payment.payment_type.as_str());
    tracing::info!(
        "Payment {} completed: {} for ad {}",
        payment.order_code,
        payment.payment_type.as_str(),
        payment.ad_id
    );

    if applied {
        notify_payer(&ctx, &payment).await;
    } else {
        tracing::warn!(
            "Ad {} no longer exists; payment {} has no effect",
            payment.ad_id,
            payment.order_code
        );
    }

    Ok(received)
}

/// Complete a pending order and apply its ad effect in one transaction
///
/// `None` when the order is unknown or already completed. On error nothing
/// is committed and the order is still pending.
async fn complete_and_apply(
    ctx: &AppContext,
    order_code: i64,
    transaction_id: Option<&str>,
) -> MarketResult<Option<(Payment, bool)>> {
    let now = Utc::now();
    let mut tx = ctx.db.begin().await?;

    let Some(payment) =
        PaymentManager::complete_on(&mut *tx, order_code, transaction_id, now).await?
    else {
        tx.rollback().await?;
        return Ok(None);
    };

    let applied =
        match AdManager::apply_payment_effect_on(&mut *tx, &payment.ad_id, payment.payment_type, now)
            .await
        {
            Ok(applied) => applied,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

    tx.commit().await?;
    Ok(Some((payment, applied)))
}

/// Queue the payment confirmation; lookup failures only skip the email
async fn notify_payer(ctx: &AppContext, payment: &Payment) {
    let ad = ctx.ad_manager.find(&payment.ad_id).await;
    let payer = ctx.account_manager.find_user(&payment.user_id).await;

    match (ad, payer) {
        (Ok(Some(ad)), Ok(Some(payer))) => {
            ctx.notifier.enqueue(
                payer.email,
                Notification::PaymentSuccess {
                    user_name: payer.name,
                    ad_id: ad.ad_id,
                    ad_title: ad.title,
                    payment_type: payment.payment_type,
                    amount: payment.amount,
                },
            );
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(
                "Skipping confirmation for payment {}: {}",
                payment.order_code,
                e
            );
        }
        _ => {}
    }
}

/// Payment status for the returning checkout page
async fn verify_payment(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(order_code): Path<i64>,
) -> MarketResult<Json<VerifyPaymentResponse>> {
    let payment = ctx
        .payment_manager
        .find_by_order_code(order_code)
        .await?
        .filter(|p| p.user_id == auth.user.user_id || auth.user.is_admin())
        .ok_or_else(|| MarketError::NotFound("Payment not found".to_string()))?;

    Ok(Json(VerifyPaymentResponse {
        order_code: payment.order_code,
        status: payment.status,
        payment_type: payment.payment_type,
        ad_id: payment.ad_id,
    }))
}
