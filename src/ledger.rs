// src/ledger.rs
//
// Transaction records and the access-grant decision. Everything that touches
// a purchase row goes through here; the webhook handler and the checkout
// handler never write transaction state themselves.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{AccessStatus, FileRecord, Transaction};

/// The one authoritative platform-fee computation. Checkout and the
/// notification emails both go through this; the percentage is configuration.
pub fn platform_fee(amount_cents: i64, fee_percent: f64) -> i64 {
    (amount_cents as f64 * fee_percent / 100.0).round() as i64
}

fn to_base36_upper(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

/// `TXN-<base36 millis>-<random>`. Collisions are negligible; the unique
/// constraint on the column is the only enforcement.
pub fn generate_transaction_number() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("TXN-{}-{}", to_base36_upper(millis), suffix)
}

pub struct NewPendingTransaction {
    pub file_id: Uuid,
    pub buyer_id: Option<Uuid>,
    pub seller_id: Uuid,
    pub buyer_email: Option<String>,
    pub stripe_session_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub platform_fee_cents: i64,
    pub access_expires_at: Option<DateTime<Utc>>,
}

/// Outcome of a completion attempt, keyed by session reference.
#[derive(Debug)]
pub enum Completion {
    /// This call performed the pending -> completed transition.
    Transitioned(Transaction),
    /// The transaction had already left pending; idempotent no-op.
    AlreadyDone(Transaction),
    /// No transaction is correlated with the session reference.
    NotFound,
}

/// Writes one pending row. Amount and fee are validated before any write.
pub async fn create_pending_transaction(
    pool: &PgPool,
    new: NewPendingTransaction,
) -> Result<Transaction, ApiError> {
    if new.amount_cents <= 0 {
        return Err(ApiError::Validation("amount must be positive".into()));
    }
    if new.platform_fee_cents < 0 || new.platform_fee_cents > new.amount_cents {
        return Err(ApiError::Validation(
            "platform fee must be between zero and the amount".into(),
        ));
    }

    let seller_earnings = new.amount_cents - new.platform_fee_cents;
    let row = sqlx::query(
        r#"INSERT INTO transactions
               (transaction_number, file_id, buyer_id, seller_id, buyer_email,
                stripe_session_id, amount_cents, currency, platform_fee_cents,
                seller_earnings_cents, status, access_expires_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', $11)
           RETURNING *"#,
    )
    .bind(generate_transaction_number())
    .bind(new.file_id)
    .bind(new.buyer_id)
    .bind(new.seller_id)
    .bind(&new.buyer_email)
    .bind(&new.stripe_session_id)
    .bind(new.amount_cents as i32)
    .bind(&new.currency)
    .bind(new.platform_fee_cents as i32)
    .bind(seller_earnings as i32)
    .bind(new.access_expires_at)
    .fetch_one(pool)
    .await?;

    Ok(Transaction::from_row(&row))
}

/// Pending -> completed, exactly once. The status guard in the UPDATE is what
/// makes concurrent duplicate webhook deliveries converge: only one caller
/// observes `Transitioned`, and only that caller bumps the seller/file
/// aggregates.
pub async fn complete_transaction(
    pool: &PgPool,
    session_id: &str,
    payment_intent_id: Option<&str>,
) -> Result<Completion, ApiError> {
    let row = sqlx::query(
        r#"UPDATE transactions
           SET status = 'completed',
               completed_at = NOW(),
               stripe_payment_intent_id = COALESCE($2, stripe_payment_intent_id)
           WHERE stripe_session_id = $1 AND status = 'pending'
           RETURNING *"#,
    )
    .bind(session_id)
    .bind(payment_intent_id)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        let tx = Transaction::from_row(&row);

        sqlx::query(
            r#"UPDATE profiles
               SET total_earnings_cents = total_earnings_cents + $1,
                   total_sales_count = total_sales_count + 1,
                   updated_at = NOW()
               WHERE user_id = $2"#,
        )
        .bind(tx.seller_earnings_cents as i64)
        .bind(tx.seller_id)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"UPDATE files
               SET purchase_count = purchase_count + 1,
                   total_revenue_cents = total_revenue_cents + $1,
                   updated_at = NOW()
               WHERE id = $2"#,
        )
        .bind(tx.amount_cents as i64)
        .bind(tx.file_id)
        .execute(pool)
        .await?;

        return Ok(Completion::Transitioned(tx));
    }

    let existing = sqlx::query("SELECT * FROM transactions WHERE stripe_session_id = $1")
        .bind(session_id)
        .fetch_optional(pool)
        .await?;

    Ok(match existing {
        Some(row) => Completion::AlreadyDone(Transaction::from_row(&row)),
        None => Completion::NotFound,
    })
}

/// Pending -> failed (abandoned/expired checkout). Same conditional-update
/// discipline; a transaction that already completed is left alone.
pub async fn fail_transaction(pool: &PgPool, session_id: &str) -> Result<bool, ApiError> {
    let result = sqlx::query(
        r#"UPDATE transactions
           SET status = 'failed'
           WHERE stripe_session_id = $1 AND status = 'pending'"#,
    )
    .bind(session_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// The access-grant decision. Creator of the file is always granted; anyone
/// else needs a completed transaction whose access window is still open.
/// "Never purchased" and "expired" are the same `Denied` to the caller.
pub async fn evaluate_access(
    pool: &PgPool,
    file: &FileRecord,
    viewer_id: Uuid,
) -> Result<AccessStatus, ApiError> {
    if viewer_id == file.creator_id {
        return Ok(AccessStatus::Granted);
    }

    let row = sqlx::query(
        r#"SELECT access_expires_at
           FROM transactions
           WHERE file_id = $1 AND buyer_id = $2 AND status = 'completed'
           ORDER BY completed_at DESC
           LIMIT 1"#,
    )
    .bind(file.id)
    .bind(viewer_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(AccessStatus::Denied);
    };

    let expires_at: Option<DateTime<Utc>> = row.get("access_expires_at");
    Ok(match expires_at {
        None => AccessStatus::Granted,
        Some(t) if t > Utc::now() => AccessStatus::Granted,
        Some(_) => AccessStatus::Denied,
    })
}
