/// Logical namespace for generated images inside the bucket.
pub const DEFAULT_KEY_PREFIX: &str = "wordclouds";

/// Object key for one generated image. The request id is the uniqueness
/// source (Lambda request id in AWS, UUID v4 locally), so concurrent
/// requests never collide and no manifest needs to be maintained.
pub fn image_object_key(prefix: &str, request_id: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        format!("wordcloud_{request_id}.png")
    } else {
        format!("{trimmed}/wordcloud_{request_id}.png")
    }
}

/// Public URL of an object on the AWS endpoint, `https://{bucket}.s3.amazonaws.com/{key}`.
pub fn public_object_url(bucket: &str, key: &str) -> String {
    format!(
        "https://{bucket}.s3.amazonaws.com/{}",
        key.trim_start_matches('/')
    )
}

/// Public URL of an object behind a caller-supplied base URL, for non-AWS
/// endpoints. Trailing slashes on the base are tolerated.
pub fn public_object_url_with_base(base_url: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

/// Resolve the public URL for an object: an explicit base URL wins,
/// otherwise the AWS endpoint for the bucket is derived.
pub fn resolve_public_url(bucket: &str, base_url: Option<&str>, key: &str) -> String {
    match base_url {
        Some(base) if !base.trim().is_empty() => public_object_url_with_base(base, key),
        _ => public_object_url(bucket, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_image_key_under_prefix() {
        let key = image_object_key("wordclouds", "req-123");
        assert_eq!(key, "wordclouds/wordcloud_req-123.png");
    }

    #[test]
    fn trims_prefix_slashes() {
        let key = image_object_key("/wordclouds/", "req-123");
        assert_eq!(key, "wordclouds/wordcloud_req-123.png");
    }

    #[test]
    fn empty_prefix_stores_at_bucket_root() {
        let key = image_object_key("", "req-123");
        assert_eq!(key, "wordcloud_req-123.png");
    }

    #[test]
    fn builds_aws_public_url() {
        let url = public_object_url("wordcloud-generator-dev", "wordclouds/wordcloud_req-123.png");
        assert_eq!(
            url,
            "https://wordcloud-generator-dev.s3.amazonaws.com/wordclouds/wordcloud_req-123.png"
        );
    }

    #[test]
    fn base_url_override_wins() {
        let url = resolve_public_url(
            "unused-bucket",
            Some("http://localhost:9000/images/"),
            "wordclouds/wordcloud_req-123.png",
        );
        assert_eq!(
            url,
            "http://localhost:9000/images/wordclouds/wordcloud_req-123.png"
        );
    }

    #[test]
    fn blank_base_url_falls_back_to_aws_endpoint() {
        let url = resolve_public_url("bucket-a", Some("  "), "k.png");
        assert_eq!(url, "https://bucket-a.s3.amazonaws.com/k.png");
    }
}
