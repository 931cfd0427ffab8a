// src/models.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub is_creator: bool,
    pub stripe_account_id: Option<String>,
    pub stripe_onboarding_complete: bool,
    pub total_earnings_cents: i64,
    pub total_sales_count: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn from_row(r: &PgRow) -> Self {
        Self {
            id: r.get("id"),
            user_id: r.get("user_id"),
            email: r.get("email"),
            username: r.get("username"),
            full_name: r.get("full_name"),
            is_creator: r.get("is_creator"),
            stripe_account_id: r.get("stripe_account_id"),
            stripe_onboarding_complete: r.get("stripe_onboarding_complete"),
            total_earnings_cents: r.get("total_earnings_cents"),
            total_sales_count: r.get("total_sales_count"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileRecord {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub collection_id: Option<Uuid>,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub storage_key: String,
    pub file_url: String,
    pub file_size_bytes: Option<i64>,
    pub content_type: Option<String>,
    pub price_cents: i32,
    pub currency: String,
    pub stripe_product_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub screenshot_protection: bool,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn from_row(r: &PgRow) -> Self {
        Self {
            id: r.get("id"),
            creator_id: r.get("creator_id"),
            collection_id: r.get("collection_id"),
            slug: r.get("slug"),
            title: r.get("title"),
            description: r.get("description"),
            file_name: r.get("file_name"),
            storage_key: r.get("storage_key"),
            file_url: r.get("file_url"),
            file_size_bytes: r.get("file_size_bytes"),
            content_type: r.get("content_type"),
            price_cents: r.get("price_cents"),
            currency: r.get("currency"),
            stripe_product_id: r.get("stripe_product_id"),
            stripe_price_id: r.get("stripe_price_id"),
            expires_at: r.get("expires_at"),
            screenshot_protection: r.get("screenshot_protection"),
            is_active: r.get("is_active"),
            created_at: r.get("created_at"),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(t) if t <= now)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    pub transaction_number: String,
    pub file_id: Uuid,
    pub buyer_id: Option<Uuid>,
    pub seller_id: Uuid,
    pub buyer_email: Option<String>,
    pub stripe_session_id: String,
    pub stripe_payment_intent_id: Option<String>,
    pub amount_cents: i32,
    pub currency: String,
    pub platform_fee_cents: i32,
    pub seller_earnings_cents: i32,
    pub status: String, // pending | completed | failed | refunded
    pub access_expires_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn from_row(r: &PgRow) -> Self {
        Self {
            id: r.get("id"),
            transaction_number: r.get("transaction_number"),
            file_id: r.get("file_id"),
            buyer_id: r.get("buyer_id"),
            seller_id: r.get("seller_id"),
            buyer_email: r.get("buyer_email"),
            stripe_session_id: r.get("stripe_session_id"),
            stripe_payment_intent_id: r.get("stripe_payment_intent_id"),
            amount_cents: r.get("amount_cents"),
            currency: r.get("currency"),
            platform_fee_cents: r.get("platform_fee_cents"),
            seller_earnings_cents: r.get("seller_earnings_cents"),
            status: r.get("status"),
            access_expires_at: r.get("access_expires_at"),
            created_at: r.get("created_at"),
            completed_at: r.get("completed_at"),
        }
    }
}

/// Denormalized read model over files: creator username plus live sales
/// aggregates. Display only, never consulted for access decisions.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileDetails {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub content_type: Option<String>,
    pub price_cents: i32,
    pub currency: String,
    pub stripe_price_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub screenshot_protection: bool,
    pub view_count: i32,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub creator_username: Option<String>,
    pub sales_count: i64,
    pub revenue_cents: i64,
}

impl FileDetails {
    pub fn from_row(r: &PgRow) -> Self {
        Self {
            id: r.get("id"),
            creator_id: r.get("creator_id"),
            slug: r.get("slug"),
            title: r.get("title"),
            description: r.get("description"),
            file_name: r.get("file_name"),
            content_type: r.get("content_type"),
            price_cents: r.get("price_cents"),
            currency: r.get("currency"),
            stripe_price_id: r.get("stripe_price_id"),
            expires_at: r.get("expires_at"),
            screenshot_protection: r.get("screenshot_protection"),
            view_count: r.get("view_count"),
            is_active: r.get("is_active"),
            created_at: r.get("created_at"),
            creator_username: r.get("creator_username"),
            sales_count: r.get("sales_count"),
            revenue_cents: r.get("revenue_cents"),
        }
    }
}

/// Read model over transactions with file title/slug and both usernames.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionDetails {
    pub id: Uuid,
    pub transaction_number: String,
    pub file_id: Uuid,
    pub buyer_id: Option<Uuid>,
    pub seller_id: Uuid,
    pub amount_cents: i32,
    pub currency: String,
    pub platform_fee_cents: i32,
    pub seller_earnings_cents: i32,
    pub status: String,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub file_title: Option<String>,
    pub file_slug: Option<String>,
    pub seller_username: Option<String>,
    pub buyer_username: Option<String>,
}

impl TransactionDetails {
    pub fn from_row(r: &PgRow) -> Self {
        Self {
            id: r.get("id"),
            transaction_number: r.get("transaction_number"),
            file_id: r.get("file_id"),
            buyer_id: r.get("buyer_id"),
            seller_id: r.get("seller_id"),
            amount_cents: r.get("amount_cents"),
            currency: r.get("currency"),
            platform_fee_cents: r.get("platform_fee_cents"),
            seller_earnings_cents: r.get("seller_earnings_cents"),
            status: r.get("status"),
            access_expires_at: r.get("access_expires_at"),
            created_at: r.get("created_at"),
            completed_at: r.get("completed_at"),
            file_title: r.get("file_title"),
            file_slug: r.get("file_slug"),
            seller_username: r.get("seller_username"),
            buyer_username: r.get("buyer_username"),
        }
    }
}

/// Live access decision for a (file, viewer) pair. Recomputed against current
/// time on every check, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Granted,
    Denied,
}

impl AccessStatus {
    pub fn is_granted(self) -> bool {
        self == AccessStatus::Granted
    }
}
