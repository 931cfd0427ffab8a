use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::checkout::start_checkout,
        crate::api::webhooks::stripe_webhook,
        crate::api::access::issue_signed_url
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::checkout::CheckoutRequest,
            crate::api::access::SignedUrlRequest,
            crate::api::webhooks::StripeEvent,
            crate::api::webhooks::StripeEventData
        )
    ),
    tags(
        (name = "auth", description = "Authentication"),
        (name = "checkout", description = "Hosted checkout"),
        (name = "webhooks", description = "Payment processor callbacks"),
        (name = "access", description = "Protected content delivery")
    )
)]
pub struct ApiDoc;
