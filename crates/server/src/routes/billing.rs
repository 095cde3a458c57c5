use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use marquee_billing::chapa::parse_verification;
use marquee_billing::webhook::SIGNATURE_HEADERS;
use marquee_billing::{CheckoutRequest, TransactionStatus, generate_tx_ref};
use marquee_core::error::ApiError;
use marquee_db::repo::{payments, plans, subscriptions, users};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::views::{PaymentView, PlanView, SubscriptionView, load_subscription};
use super::{PageQuery, Paged};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;
use crate::subscription_pipeline::{PaymentOutcome, apply_verification};
use crate::validation::split_name;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/subscriptions/me", get(my_subscription))
        .route("/subscriptions/checkout", post(checkout))
        .route("/subscriptions/me/cancel", post(cancel))
        .route("/subscriptions/me/resume", post(resume))
        .route("/payments/chapa/webhook", post(chapa_webhook))
        .route("/payments/verify/{tx_ref}", get(verify_payment))
        .route("/me/payments", get(my_payments))
}

async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<PlanView>>, AppError> {
    let rows = plans::list_plans(&state.db, false).await?;
    Ok(Json(rows.iter().map(PlanView::from).collect()))
}

async fn my_subscription(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Option<SubscriptionView>>, AppError> {
    Ok(Json(load_subscription(&state.db, &auth.user_id).await?))
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CheckoutBody {
    plan_id: String,
}

#[derive(Serialize)]
struct CheckoutResponse {
    checkout_url: String,
    tx_ref: String,
}

async fn checkout(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let plan = plans::get_plan(&state.db, &body.plan_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::NotFound("plan not found".into()))?;
    let user = users::find_by_id(&state.db, &auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    let tx_ref = generate_tx_ref();
    payments::create_pending(
        &state.db,
        &user.id,
        &plan.id,
        &tx_ref,
        plan.price_cents,
        &plan.currency,
    )
    .await?;

    let (first_name, last_name) = split_name(user.name.as_deref());
    let request = CheckoutRequest {
        tx_ref: tx_ref.clone(),
        amount_cents: plan.price_cents,
        currency: plan.currency.clone(),
        email: user.email.clone(),
        first_name,
        last_name,
        callback_url: format!("{}/api/v1/payments/chapa/webhook", state.public_url),
        return_url: format!(
            "{}/subscription/success?tx_ref={tx_ref}",
            state.frontend_url
        ),
        title: "Marquee".to_string(),
        description: format!("{} subscription", plan.name),
    };

    let session = match state.payments.initialize(request).await {
        Ok(session) => session,
        Err(e) => {
            warn!(tx_ref = %tx_ref, error = %e, "checkout initialization failed");
            payments::mark_failed(&state.db, &tx_ref, &e.to_string()).await?;
            return Err(e.into());
        }
    };

    payments::set_checkout_url(&state.db, &tx_ref, &session.checkout_url).await?;
    info!(
        tx_ref = %tx_ref,
        user_id = %user.id,
        plan = %plan.name,
        gateway = state.payments.name(),
        "checkout started"
    );

    Ok(Json(CheckoutResponse {
        checkout_url: session.checkout_url,
        tx_ref,
    }))
}

// ---------------------------------------------------------------------------
// Cancel / resume
// ---------------------------------------------------------------------------

async fn cancel(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Option<SubscriptionView>>, AppError> {
    set_cancel(auth, state, true).await
}

async fn resume(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Option<SubscriptionView>>, AppError> {
    set_cancel(auth, state, false).await
}

async fn set_cancel(
    auth: AuthUser,
    state: AppState,
    cancel: bool,
) -> Result<Json<Option<SubscriptionView>>, AppError> {
    let now = marquee_db::now_ts();
    subscriptions::expire_if_lapsed(&state.db, &auth.user_id, now).await?;

    if !subscriptions::set_cancel_at_period_end(&state.db, &auth.user_id, cancel).await? {
        let msg = if cancel {
            "no active subscription to cancel"
        } else {
            "no canceled subscription to resume"
        };
        return Err(ApiError::NotFound(msg.into()).into());
    }

    info!(user_id = %auth.user_id, cancel_at_period_end = cancel, "subscription updated");
    Ok(Json(load_subscription(&state.db, &auth.user_id).await?))
}

// ---------------------------------------------------------------------------
// Payment confirmation
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PaymentResult {
    tx_ref: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl PaymentResult {
    fn new(tx_ref: &str, outcome: &PaymentOutcome) -> Self {
        Self {
            tx_ref: tx_ref.to_string(),
            status: outcome.payment_status().as_str().to_string(),
            reason: match outcome {
                PaymentOutcome::Failed { reason } => Some(reason.clone()),
                _ => None,
            },
        }
    }
}

/// Chapa posts either the transaction itself or an envelope with it under `data`.
fn event_data(event: &Value) -> &Value {
    if event["data"].is_object() {
        &event["data"]
    } else {
        event
    }
}

fn event_tx_ref(data: &Value) -> Option<&str> {
    data["tx_ref"]
        .as_str()
        .or_else(|| data["trx_ref"].as_str())
        .filter(|s| !s.is_empty())
}

async fn chapa_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PaymentResult>, AppError> {
    let verified = SIGNATURE_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .filter(|sig| !sig.is_empty())
        .any(|sig| state.payments.verify_webhook(&body, sig));
    if !verified {
        warn!("rejected webhook with a bad signature");
        return Err(ApiError::Unauthorized("invalid webhook signature".into()).into());
    }

    let event: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook payload: {e}")))?;
    let data = event_data(&event);
    let tx_ref = event_tx_ref(data)
        .ok_or_else(|| ApiError::BadRequest("webhook payload has no tx_ref".into()))?;

    let payment = payments::get_by_tx_ref(&state.db, tx_ref)
        .await?
        .ok_or_else(|| ApiError::NotFound("unknown transaction".into()))?;

    let mut verification = parse_verification(data)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook payload: {e}")))?;
    // Webhooks only report settled transactions.
    if verification.status == TransactionStatus::Pending {
        verification.status = TransactionStatus::Failed;
    }

    let outcome = apply_verification(&state.db, &payment, &verification).await?;
    info!(tx_ref = %tx_ref, status = %outcome.payment_status(), "webhook processed");
    Ok(Json(PaymentResult::new(tx_ref, &outcome)))
}

#[derive(Serialize)]
struct VerifyResponse {
    #[serde(flatten)]
    result: PaymentResult,
    subscription: Option<SubscriptionView>,
}

async fn verify_payment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(tx_ref): Path<String>,
) -> Result<Json<VerifyResponse>, AppError> {
    let payment = payments::get_by_tx_ref(&state.db, &tx_ref)
        .await?
        .ok_or_else(|| ApiError::NotFound("unknown transaction".into()))?;
    if payment.user_id != auth.user_id && !auth.is_admin() {
        // Don't reveal other users' transactions.
        return Err(ApiError::NotFound("unknown transaction".into()).into());
    }

    let outcome = if payment.status == "completed" {
        PaymentOutcome::AlreadyCompleted
    } else {
        let verification = state.payments.verify(&tx_ref).await?;
        apply_verification(&state.db, &payment, &verification).await?
    };

    let subscription = load_subscription(&state.db, &payment.user_id).await?;
    Ok(Json(VerifyResponse {
        result: PaymentResult::new(&tx_ref, &outcome),
        subscription,
    }))
}

async fn my_payments(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<Paged<PaymentView>>, AppError> {
    let window = q.window();
    let (rows, total) = payments::list_payments(
        &state.db,
        Some(&auth.user_id),
        None,
        window.limit(),
        window.offset(),
    )
    .await?;
    Ok(Json(Paged::new(
        rows.into_iter().map(PaymentView::from).collect(),
        window,
        total,
    )))
}
