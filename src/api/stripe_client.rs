// src/api/stripe_client.rs
//
// Minimal client for the Stripe REST API (https://api.stripe.com).
// Form-encoded requests, bearer auth with the platform secret key; calls on
// behalf of a connected account carry the Stripe-Account header.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stripe api error status={status} body={body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionResponse {
    pub id: String,
    pub url: Option<String>,
    pub payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct PriceResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountLinkResponse {
    pub url: String,
}

pub struct CreateCheckoutSession<'a> {
    pub price_id: &'a str,
    pub seller_account_id: &'a str,
    pub application_fee_cents: i64,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub file_id: &'a str,
    pub buyer_user_id: Option<&'a str>,
    pub customer_email: Option<&'a str>,
}

impl StripeClient {
    /// All outbound calls share one client with a hard timeout; a hung
    /// processor surfaces as a retryable upstream error, never a stuck
    /// request.
    pub fn new(secret_key: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            secret_key,
            base_url: STRIPE_API_BASE.to_string(),
        }
    }

    /// Point the client at a stub server. Test hook.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
        stripe_account: Option<&str>,
    ) -> Result<T, StripeError> {
        let mut req = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form);

        if let Some(account) = stripe_account {
            req = req.header("Stripe-Account", account);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(StripeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<T>(&body)
            .map_err(|e| StripeError::InvalidResponse(format!("{e}; body={body}")))
    }

    /// Hosted checkout session with destination-charge routing: the platform
    /// fee stays with us, the remainder transfers to the seller's connected
    /// account. Correlation metadata rides on both the session and the
    /// payment intent.
    pub async fn create_checkout_session(
        &self,
        req: CreateCheckoutSession<'_>,
    ) -> Result<CheckoutSessionResponse, StripeError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("line_items[0][price]".into(), req.price_id.into()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("success_url".into(), req.success_url.into()),
            ("cancel_url".into(), req.cancel_url.into()),
            (
                "payment_intent_data[application_fee_amount]".into(),
                req.application_fee_cents.to_string(),
            ),
            (
                "payment_intent_data[transfer_data][destination]".into(),
                req.seller_account_id.into(),
            ),
            ("metadata[file_id]".into(), req.file_id.into()),
            (
                "payment_intent_data[metadata][file_id]".into(),
                req.file_id.into(),
            ),
            (
                "metadata[seller_account_id]".into(),
                req.seller_account_id.into(),
            ),
        ];

        if let Some(buyer) = req.buyer_user_id {
            form.push(("metadata[buyer_user_id]".into(), buyer.into()));
            form.push((
                "payment_intent_data[metadata][buyer_user_id]".into(),
                buyer.into(),
            ));
        }
        if let Some(email) = req.customer_email {
            form.push(("customer_email".into(), email.into()));
        }

        self.post_form("/v1/checkout/sessions", &form, None).await
    }

    /// Product + price provisioned on the seller's connected account. Stripe
    /// prices are immutable, which is why the caller guards against
    /// re-provisioning.
    pub async fn create_product_and_price(
        &self,
        seller_account_id: &str,
        title: &str,
        price_cents: i64,
        currency: &str,
    ) -> Result<(ProductResponse, PriceResponse), StripeError> {
        let product: ProductResponse = self
            .post_form(
                "/v1/products",
                &[("name".to_string(), title.to_string())],
                Some(seller_account_id),
            )
            .await?;

        let price: PriceResponse = self
            .post_form(
                "/v1/prices",
                &[
                    ("product".to_string(), product.id.clone()),
                    ("unit_amount".to_string(), price_cents.to_string()),
                    ("currency".to_string(), currency.to_string()),
                ],
                Some(seller_account_id),
            )
            .await?;

        Ok((product, price))
    }

    pub async fn create_express_account(&self, email: &str) -> Result<AccountResponse, StripeError> {
        self.post_form(
            "/v1/accounts",
            &[
                ("type".to_string(), "express".to_string()),
                ("email".to_string(), email.to_string()),
                ("business_type".to_string(), "individual".to_string()),
                (
                    "capabilities[card_payments][requested]".to_string(),
                    "true".to_string(),
                ),
                (
                    "capabilities[transfers][requested]".to_string(),
                    "true".to_string(),
                ),
            ],
            None,
        )
        .await
    }

    pub async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<AccountLinkResponse, StripeError> {
        self.post_form(
            "/v1/account_links",
            &[
                ("account".to_string(), account_id.to_string()),
                ("refresh_url".to_string(), refresh_url.to_string()),
                ("return_url".to_string(), return_url.to_string()),
                ("type".to_string(), "account_onboarding".to_string()),
            ],
            None,
        )
        .await
    }
}
