// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{post, web, Error, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::task::{Context, Poll};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    email: String,
    exp: usize,
}

/// Identity established by bearer-token verification; what the hosted
/// identity provider would hand us.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = AuthResponse),
        (status = 400, description = "Email taken or invalid")
    )
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') || !email.contains('.') {
        return Err(ApiError::Validation("invalid email".into()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::Validation("password too short".into()));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)
        .map_err(|e| ApiError::Upstream(format!("password hash: {e}")))?;

    let row = sqlx::query(
        r#"INSERT INTO users (email, password_hash)
           VALUES ($1, $2)
           ON CONFLICT (email) DO NOTHING
           RETURNING id"#,
    )
    .bind(&email)
    .bind(password_hash)
    .fetch_optional(&state.pool)
    .await?;

    let Some(row) = row else {
        return Err(ApiError::Validation("account already exists".into()));
    };

    let user_id: Uuid = row.get("id");
    let token = generate_jwt(user_id, &email)
        .map_err(|e| ApiError::Upstream(format!("jwt encode: {e}")))?;

    Ok(HttpResponse::Ok().json(AuthResponse { token, user_id }))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = payload.email.trim().to_lowercase();

    let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?;

    let Some(row) = row else {
        return Err(ApiError::Unauthorized);
    };

    let user_id: Uuid = row.get("id");
    let password_hash: String = row.get("password_hash");

    match verify(&payload.password, &password_hash) {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::Unauthorized),
        Err(e) => return Err(ApiError::Upstream(format!("password verify: {e}"))),
    }

    let token = generate_jwt(user_id, &email)
        .map_err(|e| ApiError::Upstream(format!("jwt encode: {e}")))?;

    Ok(HttpResponse::Ok().json(AuthResponse { token, user_id }))
}

pub fn generate_jwt(user_id: Uuid, email: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET required");

    let expiration = Utc::now()
        .checked_add_signed(Duration::days(30))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

fn decode_token(token: &str, secret: &str) -> Option<AuthUser> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| AuthUser {
        id: data.claims.sub,
        email: data.claims.email,
    })
    .ok()
}

/// Best-effort identity for public endpoints where the viewer may be
/// anonymous (paywall view, checkout). Invalid tokens read as anonymous.
pub fn maybe_user(req: &HttpRequest) -> Option<AuthUser> {
    let secret = std::env::var("JWT_SECRET").ok()?;
    let header = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    let token = header.strip_prefix("Bearer ")?;
    decode_token(token, &secret)
}

/// Middleware for the protected scope:
/// - takes `Authorization: Bearer <jwt>`
/// - validates the token
/// - puts an `AuthUser` into `req.extensions_mut()`
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner { service }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let secret = match std::env::var("JWT_SECRET") {
            Ok(s) => s,
            Err(_) => {
                return Box::pin(async move {
                    Err(actix_web::error::ErrorInternalServerError(
                        "JWT secret not set",
                    ))
                })
            }
        };

        let auth_header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            if let Some(user) = decode_token(token, &secret) {
                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                return Box::pin(async move { fut.await });
            }
            return Box::pin(async move {
                Err(actix_web::error::ErrorUnauthorized("Invalid token"))
            });
        }

        Box::pin(async move {
            Err(actix_web::error::ErrorUnauthorized(
                "Missing or invalid Authorization header",
            ))
        })
    }
}
