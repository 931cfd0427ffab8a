// src/api/webhooks.rs

use actix_web::{post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::{notifications, stripe};
use crate::error::ApiError;
use crate::{db, ledger, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StripeEventData {
    #[schema(value_type = Object)]
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: Option<std::collections::HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct AccountObject {
    id: String,
    #[serde(default)]
    details_submitted: bool,
    #[serde(default)]
    charges_enabled: bool,
}

/// The authoritative consumer of processor events. Signature verification
/// comes first and nothing is mutated when it fails; every verified,
/// parseable event is acked with 2xx even when the type is unrecognized, so
/// the processor stops redelivering.
#[utoipa::path(
    post,
    path = "/webhook/stripe",
    tag = "webhooks",
    responses(
        (status = 200, description = "Event received"),
        (status = 400, description = "Bad signature or malformed body")
    )
)]
#[post("/webhook/stripe")]
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let signature = req
        .headers()
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Signature("missing stripe-signature header".into()))?;

    stripe::verify_signature(
        &body,
        signature,
        &state.stripe_webhook_secret,
        Utc::now().timestamp(),
    )?;

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("malformed event body: {e}")))?;

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = serde_json::from_value(event.data.object)
                .map_err(|e| ApiError::Validation(format!("malformed session object: {e}")))?;
            handle_checkout_completed(&state, session).await?;
        }
        "checkout.session.expired" => {
            let session: CheckoutSessionObject = serde_json::from_value(event.data.object)
                .map_err(|e| ApiError::Validation(format!("malformed session object: {e}")))?;
            if ledger::fail_transaction(&state.pool, &session.id).await? {
                log::info!("checkout abandoned session={}", session.id);
            }
        }
        "account.updated" => {
            let account: AccountObject = serde_json::from_value(event.data.object)
                .map_err(|e| ApiError::Validation(format!("malformed account object: {e}")))?;
            let complete = account.details_submitted && account.charges_enabled;
            if db::set_onboarding_complete(&state.pool, &account.id, complete).await? {
                log::info!(
                    "payout account updated account={} onboarding_complete={}",
                    account.id,
                    complete
                );
            }
        }
        other => {
            log::debug!("unhandled stripe event id={} type={}", event.id, other);
        }
    }

    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}

async fn handle_checkout_completed(
    state: &web::Data<AppState>,
    session: CheckoutSessionObject,
) -> Result<(), ApiError> {
    match ledger::complete_transaction(&state.pool, &session.id, session.payment_intent.as_deref())
        .await?
    {
        ledger::Completion::Transitioned(tx) => {
            log::info!(
                "payment completed tx={} file={} session={}",
                tx.transaction_number,
                tx.file_id,
                session.id
            );

            // Notification is best-effort: the processor retries ack-less
            // webhooks, and a duplicate charge is worse than a missed email.
            if let Some(buyer_id) = tx.buyer_id {
                if let Err(e) =
                    notifications::send_purchase_emails(state, tx.file_id, buyer_id, &session.id)
                        .await
                {
                    log::warn!(
                        "purchase notification failed tx={} session={}: {e}",
                        tx.transaction_number,
                        session.id
                    );
                }
            }
        }
        ledger::Completion::AlreadyDone(tx) => {
            log::info!(
                "duplicate completion ignored tx={} session={}",
                tx.transaction_number,
                session.id
            );
        }
        ledger::Completion::NotFound => {
            // Metadata from the session may reference a file we never saw;
            // ack anyway so the processor stops retrying.
            let file_id = session
                .metadata
                .as_ref()
                .and_then(|m| m.get("file_id").cloned())
                .unwrap_or_default();
            log::warn!(
                "completion for unknown session={} file_id={}",
                session.id,
                file_id
            );
        }
    }

    Ok(())
}
