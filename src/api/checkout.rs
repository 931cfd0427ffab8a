// src/api/checkout.rs

use actix_web::{post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::maybe_user;
use crate::api::stripe_client::CreateCheckoutSession;
use crate::error::ApiError;
use crate::{db, ledger, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub file_id: Uuid,
}

/// Opens a hosted checkout session for a file and seeds a pending
/// transaction correlated by the session id. The buyer identity comes from
/// the bearer token when present; price, fee, and payout routing are all
/// resolved server-side from the file and seller records.
#[utoipa::path(
    post,
    path = "/checkout",
    tag = "checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Redirect URL to the hosted checkout"),
        (status = 400, description = "File is not purchasable"),
        (status = 502, description = "Payment processor unavailable")
    )
)]
#[post("/checkout")]
pub async fn start_checkout(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, ApiError> {
    let buyer = maybe_user(&req);

    let file = db::get_file_by_id(&state.pool, payload.file_id)
        .await?
        .ok_or_else(|| ApiError::Validation("file not found".into()))?;

    // Fail fast before any external call: every precondition for a
    // purchasable file is checked here, no partial state on rejection.
    if !file.is_active {
        return Err(ApiError::Validation("file is no longer available".into()));
    }
    if file.is_expired(chrono::Utc::now()) {
        return Err(ApiError::Validation("this content has expired".into()));
    }
    if file.price_cents <= 0 {
        return Err(ApiError::Validation("file has no price set".into()));
    }
    let Some(price_id) = file.stripe_price_id.as_deref() else {
        return Err(ApiError::Validation(
            "file is not purchasable: price not provisioned".into(),
        ));
    };

    let seller = db::get_profile_by_user(&state.pool, file.creator_id)
        .await?
        .ok_or_else(|| ApiError::Validation("seller profile not found".into()))?;
    let Some(seller_account_id) = seller.stripe_account_id.as_deref() else {
        return Err(ApiError::Validation(
            "file is not purchasable: seller has no payout account".into(),
        ));
    };
    if !seller.stripe_onboarding_complete {
        return Err(ApiError::Validation(
            "file is not purchasable: seller onboarding incomplete".into(),
        ));
    }

    let amount = file.price_cents as i64;
    let fee = ledger::platform_fee(amount, state.platform_fee_percent);

    let success_url = format!(
        "{}/stripe-success?session_id={{CHECKOUT_SESSION_ID}}",
        state.app_base_url
    );
    let cancel_url = format!("{}/paywall/{}", state.app_base_url, file.id);

    let buyer_id_string = buyer.as_ref().map(|u| u.id.to_string());
    let session = state
        .stripe
        .create_checkout_session(CreateCheckoutSession {
            price_id,
            seller_account_id,
            application_fee_cents: fee,
            success_url: &success_url,
            cancel_url: &cancel_url,
            file_id: &file.id.to_string(),
            buyer_user_id: buyer_id_string.as_deref(),
            customer_email: buyer.as_ref().map(|u| u.email.as_str()),
        })
        .await
        .map_err(|e| ApiError::Upstream(format!("checkout session create failed: {e}")))?;

    let Some(url) = session.url.clone() else {
        return Err(ApiError::Upstream("no checkout URL returned".into()));
    };

    let tx = ledger::create_pending_transaction(
        &state.pool,
        ledger::NewPendingTransaction {
            file_id: file.id,
            buyer_id: buyer.as_ref().map(|u| u.id),
            seller_id: file.creator_id,
            buyer_email: buyer.map(|u| u.email),
            stripe_session_id: session.id.clone(),
            amount_cents: amount,
            currency: file.currency.clone(),
            platform_fee_cents: fee,
            access_expires_at: file.expires_at,
        },
    )
    .await?;

    log::info!(
        "checkout started tx={} file={} session={}",
        tx.transaction_number,
        file.id,
        session.id
    );

    Ok(HttpResponse::Ok().json(json!({
        "sessionId": session.id,
        "url": url
    })))
}
