// src/main.rs
use std::env;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client as S3Client;
use dotenvy::dotenv;
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use payview::api::stripe_client::StripeClient;
use payview::{api, docs, AppState};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    // Required configuration fails here, at startup, not at first use.
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let app_base_url = env::var("APP_BASE_URL").expect("APP_BASE_URL required");
    let _jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET required");
    let stripe_secret_key = env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY required");
    let stripe_webhook_secret =
        env::var("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET required");
    let s3_bucket = env::var("S3_BUCKET").expect("S3_BUCKET required");

    let s3_endpoint = env::var("S3_ENDPOINT").ok();
    let s3_public_base_url = env::var("S3_PUBLIC_BASE_URL")
        .unwrap_or_else(|_| format!("https://{}.s3.amazonaws.com", s3_bucket));
    let platform_fee_percent = env::var("PLATFORM_FEE_PERCENT")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(5.0);
    let email_api_url = env::var("EMAIL_API_URL").ok();
    let email_api_key = env::var("EMAIL_API_KEY").ok();
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await;
    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

    // Allow custom S3-compatible endpoints (e.g., MinIO)
    if let Some(endpoint) = s3_endpoint {
        s3_config_builder = s3_config_builder
            .endpoint_url(endpoint)
            .force_path_style(true);
    }

    let s3_client = S3Client::from_conf(s3_config_builder.build());

    let http = reqwest::Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .expect("http client");

    let state = web::Data::new(AppState {
        pool,
        s3_client,
        s3_bucket: s3_bucket.clone(),
        s3_public_base_url: s3_public_base_url.clone(),
        app_base_url,
        stripe: StripeClient::new(stripe_secret_key, UPSTREAM_TIMEOUT),
        stripe_webhook_secret,
        platform_fee_percent,
        http,
        email_api_url,
        email_api_key,
    });

    log::info!("listening on {bind_addr}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Public routes
            .service(api::auth::register)
            .service(api::auth::login)
            .service(api::checkout::start_checkout)
            .service(api::webhooks::stripe_webhook)
            .service(api::files::paywall_view)
            // Protected routes
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware)
                    .service(api::profiles::get_profile)
                    .service(api::profiles::update_profile)
                    .service(api::connect::onboard)
                    .service(api::files::upload_file)
                    .service(api::files::create_file_records)
                    .service(api::files::provision_price)
                    .service(api::files::list_my_files)
                    .service(api::files::list_purchases)
                    .service(api::files::list_sales)
                    .service(api::access::issue_signed_url)
                    .service(api::access::check_access)
                    .service(api::notifications::send_notification),
            )
    })
    .bind(bind_addr.as_str())?
    .run()
    .await
}
