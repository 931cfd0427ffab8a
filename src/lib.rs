pub mod api;
pub mod db;
pub mod docs;
pub mod error;
pub mod ledger;
pub mod models;
pub mod s3_utils;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::api::stripe_client::StripeClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub s3_client: S3Client,
    pub s3_bucket: String,
    pub s3_public_base_url: String,
    pub app_base_url: String,
    pub stripe: StripeClient,
    pub stripe_webhook_secret: String,
    pub platform_fee_percent: f64,
    pub http: reqwest::Client,
    pub email_api_url: Option<String>,
    pub email_api_key: Option<String>,
}
