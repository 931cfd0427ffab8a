// Helpers for public and time-limited S3-compatible URLs.

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;

use crate::error::ApiError;

pub fn build_public_url(base: &str, bucket: &str, key: &str) -> String {
    let trimmed = base.trim_end_matches('/');

    // Allow simple templating: https://host/{bucket}/{key} or https://bucket.host/{key}
    if trimmed.contains("{bucket}") || trimmed.contains("{key}") {
        return trimmed.replace("{bucket}", bucket).replace("{key}", key);
    }

    // If the base already includes the bucket, append only the key.
    if trimmed.contains(bucket) {
        format!("{}/{}", trimmed, key)
    } else {
        format!("{}/{}/{}", trimmed, bucket, key)
    }
}

/// Time-limited signed GET for a protected object. Scoped to viewer-and-time
/// by construction; callers must not cache it keyed by file alone.
pub async fn presigned_get_url(
    client: &S3Client,
    bucket: &str,
    key: &str,
    expires_in: Duration,
) -> Result<String, ApiError> {
    let config = PresigningConfig::expires_in(expires_in)
        .map_err(|e| ApiError::Upstream(format!("presigning config: {e}")))?;

    let presigned = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .presigned(config)
        .await
        .map_err(|e| ApiError::Upstream(format!("s3 presign failed: {e}")))?;

    Ok(presigned.uri().to_string())
}

#[cfg(test)]
mod tests {
    use super::build_public_url;

    #[test]
    fn public_url_appends_bucket_and_key() {
        assert_eq!(
            build_public_url("https://s3.example.com", "uploads", "a/b.pdf"),
            "https://s3.example.com/uploads/a/b.pdf"
        );
    }

    #[test]
    fn public_url_honors_templates() {
        assert_eq!(
            build_public_url("https://{bucket}.cdn.example.com/{key}", "uploads", "a.pdf"),
            "https://uploads.cdn.example.com/a.pdf"
        );
    }

    #[test]
    fn public_url_skips_duplicate_bucket() {
        assert_eq!(
            build_public_url("https://uploads.s3.amazonaws.com", "uploads", "a.pdf"),
            "https://uploads.s3.amazonaws.com/a.pdf"
        );
    }
}
