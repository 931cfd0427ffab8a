use std::env;
use std::sync::OnceLock;
use std::time::Duration;

use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use payview::api::stripe_client::StripeClient;
use payview::AppState;

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

pub async fn init_test_db() -> TestDb {
    dotenvy::dotenv().ok();
    env::set_var("JWT_SECRET", "test-jwt-secret");
    let test_url = env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let (admin_url, db_name) =
        split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url)
        .await
        .expect("connect admin db");

    let _ = sqlx::query("SELECT pg_advisory_lock(424242)")
        .execute(&admin_pool)
        .await;

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
    let create_result = sqlx::query(&create_sql).execute(&admin_pool).await;
    if let Err(e) = create_result {
        eprintln!("create test db error: {e}");
        let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
        sqlx::query(&create_sql)
            .execute(&admin_pool)
            .await
            .expect("create test db retry");
    }

    let _ = sqlx::query("SELECT pg_advisory_unlock(424242)")
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;

    let pool = PgPool::connect(&test_url)
        .await
        .expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    TestDb { pool, _guard: guard }
}

pub async fn build_state(pool: PgPool, webhook_secret: &str) -> AppState {
    let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await;
    // Static credentials so URL presigning works without an AWS environment.
    let s3_client = S3Client::from_conf(
        aws_sdk_s3::config::Builder::from(&aws_config)
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                "test", "test", None, None, "static",
            ))
            .build(),
    );

    AppState {
        pool,
        s3_client,
        s3_bucket: "test-bucket".to_string(),
        s3_public_base_url: "http://localhost".to_string(),
        app_base_url: "http://localhost".to_string(),
        stripe: StripeClient::new("sk_test_xxx".to_string(), Duration::from_secs(5)),
        stripe_webhook_secret: webhook_secret.to_string(),
        platform_fee_percent: 5.0,
        http: reqwest::Client::new(),
        email_api_url: None,
        email_api_key: None,
    }
}

pub struct Seeded {
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub file_id: Uuid,
}

/// Seller with a connected payout account, a buyer, and a priced file.
pub async fn seed_purchase_fixture(pool: &PgPool) -> Seeded {
    let suffix = Uuid::new_v4().simple().to_string();
    let account_id = format!("acct_{}", &suffix[..12]);

    let seller_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (email, password_hash) VALUES ($1, 'test-hash') RETURNING id",
    )
    .bind(format!("seller_{suffix}@example.com"))
    .fetch_one(pool)
    .await
    .expect("insert seller");

    let buyer_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (email, password_hash) VALUES ($1, 'test-hash') RETURNING id",
    )
    .bind(format!("buyer_{suffix}@example.com"))
    .fetch_one(pool)
    .await
    .expect("insert buyer");

    sqlx::query(
        r#"INSERT INTO profiles
               (user_id, email, username, is_creator, stripe_account_id,
                stripe_onboarding_complete)
           VALUES ($1, $2, $3, true, $4, true)"#,
    )
    .bind(seller_id)
    .bind(format!("seller_{suffix}@example.com"))
    .bind(format!("seller_{suffix}"))
    .bind(&account_id)
    .execute(pool)
    .await
    .expect("insert seller profile");

    sqlx::query(
        r#"INSERT INTO profiles (user_id, email, username)
           VALUES ($1, $2, $3)"#,
    )
    .bind(buyer_id)
    .bind(format!("buyer_{suffix}@example.com"))
    .bind(format!("buyer_{suffix}"))
    .execute(pool)
    .await
    .expect("insert buyer profile");

    let file_id: Uuid = sqlx::query_scalar(
        r#"INSERT INTO files
               (creator_id, slug, title, file_name, storage_key, file_url,
                price_cents, currency, stripe_product_id, stripe_price_id)
           VALUES ($1, $2, 'Test Guide', 'guide.pdf', $3, $4,
                   1999, 'usd', 'prod_test', 'price_test')
           RETURNING id"#,
    )
    .bind(seller_id)
    .bind(format!("test-guide-{}", &suffix[..6]))
    .bind(format!("uploads/{seller_id}/guide.pdf"))
    .bind("https://test-bucket.s3.amazonaws.com/guide.pdf")
    .fetch_one(pool)
    .await
    .expect("insert file");

    Seeded {
        seller_id,
        buyer_id,
        file_id,
    }
}
