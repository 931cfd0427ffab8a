// src/api/notifications.rs

use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::error::ApiError;
use crate::{db, ledger, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct NotificationRequest {
    pub file_id: Uuid,
    pub buyer_id: Uuid,
    pub session_id: String,
}

#[post("/notifications")]
pub async fn send_notification(
    state: web::Data<AppState>,
    _user: web::ReqData<AuthUser>,
    payload: web::Json<NotificationRequest>,
) -> Result<HttpResponse, ApiError> {
    send_purchase_emails(&state, payload.file_id, payload.buyer_id, &payload.session_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

fn format_cents(cents: i64) -> String {
    format!("{:.2}", cents as f64 / 100.0)
}

/// Buyer confirmation + seller sale notice through the external email
/// collaborator. Fire-and-forget from the webhook's point of view: callers
/// log failures instead of propagating them into the ack path.
pub async fn send_purchase_emails(
    state: &AppState,
    file_id: Uuid,
    buyer_id: Uuid,
    session_id: &str,
) -> Result<(), ApiError> {
    let file = db::get_file_by_id(&state.pool, file_id)
        .await?
        .ok_or_else(|| ApiError::Validation("file not found".into()))?;
    let seller = db::get_profile_by_user(&state.pool, file.creator_id)
        .await?
        .ok_or_else(|| ApiError::Validation("seller profile not found".into()))?;
    let buyer_email = db::get_user_email(&state.pool, buyer_id)
        .await?
        .ok_or_else(|| ApiError::Validation("buyer not found".into()))?;

    let amount = file.price_cents as i64;
    let fee = ledger::platform_fee(amount, state.platform_fee_percent);
    let earnings = amount - fee;

    let content_url = format!("{}/content/{}", state.app_base_url, file.slug);
    let price = format_cents(amount);

    let buyer_html = format!(
        "<h2>Thank you for your purchase!</h2>\
         <p>You have successfully purchased <strong>{}</strong> from {}.</p>\
         <p><strong>Amount paid:</strong> ${}</p>\
         <p><strong>Access your content:</strong> <a href=\"{}\">Click here</a></p>",
        file.title, seller.username, price, content_url
    );

    let seller_html = format!(
        "<h2>You made a sale!</h2>\
         <p><strong>{}</strong> was purchased by {}.</p>\
         <p><strong>Sale amount:</strong> ${}</p>\
         <p><strong>Your earnings:</strong> ${} (after {}% platform fee)</p>",
        file.title,
        buyer_email,
        price,
        format_cents(earnings),
        state.platform_fee_percent
    );

    send_email(state, &buyer_email, "Purchase confirmation", &buyer_html).await?;
    send_email(state, &seller.email, "New sale", &seller_html).await?;

    log::info!(
        "purchase emails sent file={} buyer={} session={}",
        file.id,
        buyer_id,
        session_id
    );

    Ok(())
}

async fn send_email(
    state: &AppState,
    to: &str,
    subject: &str,
    html: &str,
) -> Result<(), ApiError> {
    let Some(url) = state.email_api_url.as_deref() else {
        log::info!("email sender not configured, skipping to={to} subject={subject}");
        return Ok(());
    };

    let mut req = state.http.post(url).json(&json!({
        "to": to,
        "subject": subject,
        "html": html,
    }));
    if let Some(key) = state.email_api_key.as_deref() {
        req = req.bearer_auth(key);
    }

    let resp = req
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("email send failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(ApiError::Upstream(format!(
            "email sender status={}",
            resp.status()
        )));
    }

    Ok(())
}
