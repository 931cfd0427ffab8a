// src/api/profiles.rs

use actix_web::{get, put, web, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::auth::AuthUser;
use crate::error::ApiError;
use crate::{db, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
}

/// Profiles are created lazily on first authenticated access; there is no
/// explicit signup step for them.
#[get("/profile")]
pub async fn get_profile(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let profile = db::ensure_profile(&state.pool, user.id, &user.email).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Display fields only. Payout-account fields are owned by the onboarding
/// flow and the processor's account events, never by this endpoint.
#[put("/profile")]
pub async fn update_profile(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    if let Some(username) = payload.username.as_deref() {
        let ok = username.len() >= 3
            && username.len() <= 20
            && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !ok {
            return Err(ApiError::Validation(
                "username must be 3-20 alphanumeric characters".into(),
            ));
        }
    }

    db::ensure_profile(&state.pool, user.id, &user.email).await?;
    let profile = db::update_profile_display(
        &state.pool,
        user.id,
        payload.username.as_deref(),
        payload.full_name.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(profile))
}
