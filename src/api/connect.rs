// src/api/connect.rs

use actix_web::{post, web, HttpResponse};
use serde_json::json;

use crate::api::auth::AuthUser;
use crate::error::ApiError;
use crate::{db, AppState};

/// Payout onboarding. A connected account is created at most once per
/// profile; the id slot is claimed with a conditional update so a concurrent
/// second request cannot reassign it. Onboarding completion itself arrives
/// later through the `account.updated` webhook.
#[post("/connect/onboard")]
pub async fn onboard(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let profile = db::ensure_profile(&state.pool, user.id, &user.email).await?;

    let account_id = match profile.stripe_account_id {
        Some(id) => id,
        None => {
            let account = state
                .stripe
                .create_express_account(&user.email)
                .await
                .map_err(|e| ApiError::Upstream(format!("account create failed: {e}")))?;

            if db::set_connected_account_once(&state.pool, user.id, &account.id).await? {
                account.id
            } else {
                // Raced with another onboard call; use the id that won.
                db::get_profile_by_user(&state.pool, user.id)
                    .await?
                    .and_then(|p| p.stripe_account_id)
                    .ok_or_else(|| ApiError::Upstream("payout account claim raced".into()))?
            }
        }
    };

    let refresh_url = format!("{}/dashboard?stripe_refresh=true", state.app_base_url);
    let return_url = format!("{}/dashboard?stripe_success=true", state.app_base_url);

    let link = state
        .stripe
        .create_account_link(&account_id, &refresh_url, &return_url)
        .await
        .map_err(|e| ApiError::Upstream(format!("account link failed: {e}")))?;

    log::info!("onboarding link issued user={} account={}", user.id, account_id);

    Ok(HttpResponse::Ok().json(json!({
        "accountId": account_id,
        "onboardingUrl": link.url
    })))
}
