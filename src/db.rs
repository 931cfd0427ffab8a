// src/db.rs

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{FileDetails, FileRecord, Profile, TransactionDetails};

pub async fn get_file_by_id(pool: &PgPool, id: Uuid) -> Result<Option<FileRecord>, ApiError> {
    let row = sqlx::query("SELECT * FROM files WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| FileRecord::from_row(&r)))
}

pub async fn get_file_details_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<FileDetails>, ApiError> {
    let row = sqlx::query("SELECT * FROM file_details WHERE slug = $1 AND is_active = true")
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| FileDetails::from_row(&r)))
}

pub async fn list_creator_files(
    pool: &PgPool,
    creator_id: Uuid,
) -> Result<Vec<FileDetails>, ApiError> {
    let rows = sqlx::query(
        r#"SELECT * FROM file_details
           WHERE creator_id = $1
           ORDER BY created_at DESC"#,
    )
    .bind(creator_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(FileDetails::from_row).collect())
}

pub async fn bump_view_count(pool: &PgPool, file_id: Uuid) -> Result<(), ApiError> {
    sqlx::query("UPDATE files SET view_count = view_count + 1 WHERE id = $1")
        .bind(file_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn get_profile_by_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<Profile>, ApiError> {
    let row = sqlx::query("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| Profile::from_row(&r)))
}

pub async fn get_profile_by_account(
    pool: &PgPool,
    stripe_account_id: &str,
) -> Result<Option<Profile>, ApiError> {
    let row = sqlx::query("SELECT * FROM profiles WHERE stripe_account_id = $1")
        .bind(stripe_account_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| Profile::from_row(&r)))
}

/// Creates the profile row on first authenticated access. The username is
/// derived from the email local part; on a collision a random suffix is
/// appended once.
pub async fn ensure_profile(
    pool: &PgPool,
    user_id: Uuid,
    email: &str,
) -> Result<Profile, ApiError> {
    if let Some(profile) = get_profile_by_user(pool, user_id).await? {
        return Ok(profile);
    }

    let base = email
        .split('@')
        .next()
        .unwrap_or("user")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>();
    let base = if base.is_empty() { "user".to_string() } else { base };

    let insert = sqlx::query(
        r#"INSERT INTO profiles (user_id, email, username)
           VALUES ($1, $2, $3)
           ON CONFLICT (user_id) DO NOTHING
           RETURNING *"#,
    )
    .bind(user_id)
    .bind(email)
    .bind(&base)
    .fetch_optional(pool)
    .await;

    match insert {
        Ok(Some(row)) => return Ok(Profile::from_row(&row)),
        Ok(None) => {}
        Err(_) => {
            // username taken by another user; retry once with a suffix
            let suffixed = format!("{}_{}", base, &Uuid::new_v4().simple().to_string()[..6]);
            let row = sqlx::query(
                r#"INSERT INTO profiles (user_id, email, username)
                   VALUES ($1, $2, $3)
                   ON CONFLICT (user_id) DO NOTHING
                   RETURNING *"#,
            )
            .bind(user_id)
            .bind(email)
            .bind(&suffixed)
            .fetch_optional(pool)
            .await?;
            if let Some(row) = row {
                return Ok(Profile::from_row(&row));
            }
        }
    }

    // Lost the race to a concurrent request; the row exists now.
    let row = sqlx::query("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(Profile::from_row(&row))
}

pub async fn update_profile_display(
    pool: &PgPool,
    user_id: Uuid,
    username: Option<&str>,
    full_name: Option<&str>,
) -> Result<Profile, ApiError> {
    let row = sqlx::query(
        r#"UPDATE profiles
           SET username = COALESCE($2, username),
               full_name = COALESCE($3, full_name),
               updated_at = NOW()
           WHERE user_id = $1
           RETURNING *"#,
    )
    .bind(user_id)
    .bind(username)
    .bind(full_name)
    .fetch_one(pool)
    .await?;

    Ok(Profile::from_row(&row))
}

/// Claims the payout-account slot. The `IS NULL` guard is the "set at most
/// once, never reassigned" invariant; returns false when another account id
/// already won.
pub async fn set_connected_account_once(
    pool: &PgPool,
    user_id: Uuid,
    stripe_account_id: &str,
) -> Result<bool, ApiError> {
    let result = sqlx::query(
        r#"UPDATE profiles
           SET stripe_account_id = $2, is_creator = true, updated_at = NOW()
           WHERE user_id = $1 AND stripe_account_id IS NULL"#,
    )
    .bind(user_id)
    .bind(stripe_account_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Derived state from the processor's account event; always overwritten
/// wholesale, never merged.
pub async fn set_onboarding_complete(
    pool: &PgPool,
    stripe_account_id: &str,
    complete: bool,
) -> Result<bool, ApiError> {
    let result = sqlx::query(
        r#"UPDATE profiles
           SET stripe_onboarding_complete = $2, updated_at = NOW()
           WHERE stripe_account_id = $1"#,
    )
    .bind(stripe_account_id)
    .bind(complete)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Stores the processor product/price refs. Guarded so an already-provisioned
/// price is never replaced (processor prices are immutable).
pub async fn set_file_price_refs(
    pool: &PgPool,
    file_id: Uuid,
    product_id: &str,
    price_id: &str,
    price_cents: i64,
    currency: &str,
) -> Result<bool, ApiError> {
    let result = sqlx::query(
        r#"UPDATE files
           SET stripe_product_id = $2,
               stripe_price_id = $3,
               price_cents = $4,
               currency = $5,
               updated_at = NOW()
           WHERE id = $1 AND stripe_price_id IS NULL"#,
    )
    .bind(file_id)
    .bind(product_id)
    .bind(price_id)
    .bind(price_cents as i32)
    .bind(currency)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_purchases(
    pool: &PgPool,
    buyer_id: Uuid,
) -> Result<Vec<TransactionDetails>, ApiError> {
    let rows = sqlx::query(
        r#"SELECT * FROM transaction_details
           WHERE buyer_id = $1
           ORDER BY created_at DESC"#,
    )
    .bind(buyer_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(TransactionDetails::from_row).collect())
}

pub async fn list_sales(
    pool: &PgPool,
    seller_id: Uuid,
) -> Result<Vec<TransactionDetails>, ApiError> {
    let rows = sqlx::query(
        r#"SELECT * FROM transaction_details
           WHERE seller_id = $1
           ORDER BY created_at DESC"#,
    )
    .bind(seller_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(TransactionDetails::from_row).collect())
}

pub async fn get_user_email(pool: &PgPool, user_id: Uuid) -> Result<Option<String>, ApiError> {
    let row = sqlx::query("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("email")))
}
