// src/api/files.rs

use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use aws_sdk_s3::primitives::ByteStream;
use futures_util::StreamExt;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::{maybe_user, AuthUser};
use crate::error::ApiError;
use crate::models::FileRecord;
use crate::s3_utils::build_public_url;
use crate::{db, ledger, AppState};

fn sanitize(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '.' || *c == '_' || *c == '-')
        .collect()
}

fn slugify(title: &str) -> String {
    let base: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    if base.is_empty() {
        suffix
    } else {
        format!("{base}-{suffix}")
    }
}

/// Multipart upload: bytes go to object storage, then the file row is
/// created (price 0 until a processor price is provisioned).
#[post("/files/upload")]
pub async fn upload_file(
    mut payload: Multipart,
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let mut file_bytes: Vec<u8> = Vec::new();
    let mut original_filename = "file.bin".to_string();
    let mut content_type: Option<String> = None;
    let mut title: Option<String> = None;

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(f) => f,
            Err(_) => continue,
        };

        let (field_name, filename) = {
            let cd = field.content_disposition();
            (
                cd.get_name().unwrap_or("").to_string(),
                cd.get_filename().map(sanitize),
            )
        };

        if field_name == "title" {
            let mut buf = Vec::new();
            while let Some(chunk) = field.next().await {
                if let Ok(data) = chunk {
                    buf.extend_from_slice(&data);
                }
            }
            title = String::from_utf8(buf).ok().filter(|t| !t.trim().is_empty());
            continue;
        }

        if let Some(name) = filename {
            original_filename = name;
        }
        content_type = field.content_type().map(|m| m.to_string());

        while let Some(chunk) = field.next().await {
            if let Ok(data) = chunk {
                file_bytes.extend_from_slice(&data);
            }
        }
    }

    if file_bytes.is_empty() {
        return Err(ApiError::Validation("no file uploaded".into()));
    }

    let size = file_bytes.len() as i64;
    let storage_key = format!(
        "uploads/{}/{}-{}",
        user.id,
        Uuid::new_v4(),
        original_filename
    );
    let stream = ByteStream::from(file_bytes);

    state
        .s3_client
        .put_object()
        .bucket(&state.s3_bucket)
        .key(&storage_key)
        .content_type(content_type.as_deref().unwrap_or("application/octet-stream"))
        .body(stream)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("s3 upload failed: {e}")))?;

    let title = title.unwrap_or_else(|| original_filename.clone());
    let file_url = build_public_url(&state.s3_public_base_url, &state.s3_bucket, &storage_key);

    let row = sqlx::query(
        r#"INSERT INTO files
               (creator_id, slug, title, file_name, storage_key, file_url,
                file_size_bytes, content_type)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
           RETURNING *"#,
    )
    .bind(user.id)
    .bind(slugify(&title))
    .bind(&title)
    .bind(&original_filename)
    .bind(&storage_key)
    .bind(&file_url)
    .bind(size)
    .bind(&content_type)
    .fetch_one(&state.pool)
    .await?;

    let file = FileRecord::from_row(&row);
    log::info!("file uploaded file={} key={}", file.id, storage_key);

    Ok(HttpResponse::Created().json(file))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FileRecordInput {
    pub file_name: String,
    pub file_url: String,
    pub storage_key: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub content_type: Option<String>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub screenshot_protection: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SeriesInput {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFileRecordsRequest {
    pub files: Vec<FileRecordInput>,
    #[serde(default)]
    pub group: bool,
    pub series: Option<SeriesInput>,
}

/// Batch record creation for files whose bytes are already in storage;
/// optionally groups the batch into a new collection.
#[post("/files/records")]
pub async fn create_file_records(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CreateFileRecordsRequest>,
) -> Result<HttpResponse, ApiError> {
    if payload.files.is_empty() {
        return Err(ApiError::Validation("no files given".into()));
    }

    let collection_id: Option<Uuid> = match (&payload.series, payload.group) {
        (Some(series), true) => {
            let row = sqlx::query(
                r#"INSERT INTO file_collections (creator_id, slug, title, description)
                   VALUES ($1, $2, $3, $4)
                   RETURNING id"#,
            )
            .bind(user.id)
            .bind(slugify(&series.title))
            .bind(&series.title)
            .bind(&series.description)
            .fetch_one(&state.pool)
            .await?;
            Some(row.get("id"))
        }
        _ => None,
    };

    let mut created = Vec::with_capacity(payload.files.len());
    for input in &payload.files {
        let title = input
            .title
            .clone()
            .unwrap_or_else(|| input.file_name.clone());

        let row = sqlx::query(
            r#"INSERT INTO files
                   (creator_id, collection_id, slug, title, description, file_name,
                    storage_key, file_url, file_size_bytes, content_type,
                    expires_at, screenshot_protection)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING *"#,
        )
        .bind(user.id)
        .bind(collection_id)
        .bind(slugify(&title))
        .bind(&title)
        .bind(&input.description)
        .bind(&input.file_name)
        .bind(&input.storage_key)
        .bind(&input.file_url)
        .bind(input.file_size_bytes)
        .bind(&input.content_type)
        .bind(input.expires_at)
        .bind(input.screenshot_protection.unwrap_or(false))
        .fetch_one(&state.pool)
        .await?;

        created.push(FileRecord::from_row(&row));
    }

    Ok(HttpResponse::Created().json(json!({ "created": created })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProvisionPriceRequest {
    pub price_cents: i64,
    pub currency: Option<String>,
}

/// Provisions a processor product + price for a file on the seller's
/// connected account. Once a price ref exists the file's price and currency
/// are frozen (processor prices are immutable).
#[post("/files/{id}/price")]
pub async fn provision_price(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    payload: web::Json<ProvisionPriceRequest>,
) -> Result<HttpResponse, ApiError> {
    let file_id = path.into_inner();

    if payload.price_cents <= 0 {
        return Err(ApiError::Validation("price must be positive".into()));
    }

    let file = db::get_file_by_id(&state.pool, file_id)
        .await?
        .ok_or_else(|| ApiError::Validation("file not found".into()))?;
    if file.creator_id != user.id {
        return Err(ApiError::AccessDenied);
    }
    if file.stripe_price_id.is_some() {
        return Err(ApiError::Validation(
            "price already provisioned and immutable".into(),
        ));
    }

    let seller = db::get_profile_by_user(&state.pool, user.id)
        .await?
        .ok_or_else(|| ApiError::Validation("profile not found".into()))?;
    let Some(account_id) = seller.stripe_account_id.as_deref() else {
        return Err(ApiError::Validation(
            "connect a payout account before pricing a file".into(),
        ));
    };

    let currency = payload
        .currency
        .clone()
        .unwrap_or_else(|| "usd".to_string())
        .to_lowercase();

    let (product, price) = state
        .stripe
        .create_product_and_price(account_id, &file.title, payload.price_cents, &currency)
        .await
        .map_err(|e| ApiError::Upstream(format!("price provisioning failed: {e}")))?;

    let stored = db::set_file_price_refs(
        &state.pool,
        file.id,
        &product.id,
        &price.id,
        payload.price_cents,
        &currency,
    )
    .await?;
    if !stored {
        // A concurrent provision won; the existing refs stand.
        return Err(ApiError::Validation(
            "price already provisioned and immutable".into(),
        ));
    }

    log::info!(
        "price provisioned file={} product={} price={}",
        file.id,
        product.id,
        price.id
    );

    Ok(HttpResponse::Ok().json(json!({
        "productId": product.id,
        "priceId": price.id
    })))
}

#[get("/files")]
pub async fn list_my_files(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let files = db::list_creator_files(&state.pool, user.id).await?;
    Ok(HttpResponse::Ok().json(files))
}

/// Public paywall view for a shared link. When a bearer token is present the
/// response also carries the viewer's live access status so the page can
/// decide between "buy" and "open".
#[get("/files/{slug}")]
pub async fn paywall_view(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let slug = path.into_inner();
    let details = db::get_file_details_by_slug(&state.pool, &slug)
        .await?
        .ok_or_else(|| ApiError::Validation("file not found".into()))?;

    db::bump_view_count(&state.pool, details.id).await?;

    let access = match maybe_user(&req) {
        Some(viewer) => {
            let file = db::get_file_by_id(&state.pool, details.id)
                .await?
                .ok_or_else(|| ApiError::Validation("file not found".into()))?;
            Some(ledger::evaluate_access(&state.pool, &file, viewer.id).await?)
        }
        None => None,
    };

    Ok(HttpResponse::Ok().json(json!({
        "file": details,
        "access": access
    })))
}

#[get("/purchases")]
pub async fn list_purchases(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let purchases = db::list_purchases(&state.pool, user.id).await?;
    Ok(HttpResponse::Ok().json(purchases))
}

#[get("/sales")]
pub async fn list_sales(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let sales = db::list_sales(&state.pool, user.id).await?;
    Ok(HttpResponse::Ok().json(sales))
}
