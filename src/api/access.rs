// src/api/access.rs

use std::time::Duration;

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::error::ApiError;
use crate::models::AccessStatus;
use crate::{db, ledger, s3_utils, AppState};

const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignedUrlRequest {
    pub file_id: Uuid,
}

/// Converts a granted access decision into a one-hour retrieval credential.
/// Denial never touches storage, and a missing file answers exactly like a
/// denied one.
#[utoipa::path(
    post,
    path = "/api/files/signed-url",
    tag = "access",
    request_body = SignedUrlRequest,
    responses(
        (status = 200, description = "Time-limited download URL"),
        (status = 400, description = "Access denied or unknown file")
    )
)]
#[post("/files/signed-url")]
pub async fn issue_signed_url(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<SignedUrlRequest>,
) -> Result<HttpResponse, ApiError> {
    let file = db::get_file_by_id(&state.pool, payload.file_id)
        .await?
        .ok_or(ApiError::AccessDenied)?;

    match ledger::evaluate_access(&state.pool, &file, user.id).await? {
        AccessStatus::Granted => {
            let url = s3_utils::presigned_get_url(
                &state.s3_client,
                &state.s3_bucket,
                &file.storage_key,
                SIGNED_URL_TTL,
            )
            .await?;

            Ok(HttpResponse::Ok().json(json!({ "url": url })))
        }
        AccessStatus::Denied => Err(ApiError::AccessDenied),
    }
}

/// Side-effect-free access re-check; the buyer's browser polls this after
/// returning from the hosted checkout page.
#[get("/files/{id}/access")]
pub async fn check_access(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let file_id = path.into_inner();
    let file = db::get_file_by_id(&state.pool, file_id)
        .await?
        .ok_or(ApiError::AccessDenied)?;

    let status = ledger::evaluate_access(&state.pool, &file, user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "access": status })))
}
