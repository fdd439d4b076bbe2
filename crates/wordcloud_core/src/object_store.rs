//! Executable model of the storage unit: a versioned key→bytes bucket with
//! tag-gated public reads, server-side encryption as a bucket setting, and
//! lifecycle expiry of noncurrent versions.
//!
//! Write access control is not modeled here: the model is only ever handed
//! to the compute unit, mirroring the bucket policy that restricts writes to
//! the function's execution identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ONE_DAY_MS;

/// Object tag granting anonymous reads under [`PublicAccessMode::TagGated`].
pub const PUBLIC_READ_TAG_KEY: &str = "public-read";
pub const PUBLIC_READ_TAG_VALUE: &str = "true";

/// Retention window for superseded object versions.
pub const DEFAULT_NONCURRENT_EXPIRY_DAYS: u32 = 30;

/// Public-read posture of the bucket. `TagGated` is the target posture;
/// the other two are deprecated historical configurations kept so the
/// reconciler can plan a migration off them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicAccessMode {
    /// Anonymous reads allowed only for objects tagged `public-read=true`.
    #[default]
    TagGated,
    /// Deprecated: bucket policy opens every object to anonymous reads.
    BucketWide,
    /// Deprecated: per-object canned ACLs; behaves like tag gating here.
    LegacyObjectAcl,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerSideEncryption {
    None,
    #[default]
    Aes256,
}

/// Lifecycle rule: expire noncurrent versions this many days after they are
/// superseded. Current versions are never auto-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRule {
    pub noncurrent_expiry_days: u32,
}

impl Default for LifecycleRule {
    fn default() -> Self {
        Self {
            noncurrent_expiry_days: DEFAULT_NONCURRENT_EXPIRY_DAYS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSettings {
    pub versioning_enabled: bool,
    pub encryption: ServerSideEncryption,
    pub public_access: PublicAccessMode,
    pub lifecycle: LifecycleRule,
}

impl BucketSettings {
    /// The strictest configuration: versioning on, AES-256, tag-gated reads,
    /// 30-day noncurrent retention.
    pub fn strict() -> Self {
        Self {
            versioning_enabled: true,
            encryption: ServerSideEncryption::Aes256,
            public_access: PublicAccessMode::TagGated,
            lifecycle: LifecycleRule::default(),
        }
    }
}

/// Per-write options supplied by the compute unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectWriteOptions {
    pub content_type: String,
    /// Marks the object for anonymous readability (the explicit per-object
    /// public marking from the storage contract).
    pub public_read: bool,
}

impl ObjectWriteOptions {
    pub fn public_png() -> Self {
        Self {
            content_type: "image/png".to_string(),
            public_read: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub version_id: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub public_read: bool,
    pub checksum: String,
    pub encrypted: bool,
    pub created_at_ms: u64,
    /// `None` while this version is the current one.
    pub noncurrent_since_ms: Option<u64>,
}

impl ObjectVersion {
    pub fn is_current(&self) -> bool {
        self.noncurrent_since_ms.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub key: String,
    pub version_id: String,
    pub checksum: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    NotFound,
    AccessDenied,
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => f.write_str("object not found"),
            Self::AccessDenied => f.write_str("anonymous access denied"),
        }
    }
}

impl std::error::Error for ReadError {}

/// SHA-256 hex digest of object content; used for version ids and write
/// integrity checks.
pub fn content_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct BucketModel {
    name: String,
    settings: BucketSettings,
    objects: BTreeMap<String, Vec<ObjectVersion>>,
    version_seq: u64,
}

impl BucketModel {
    pub fn new(name: impl Into<String>, settings: BucketSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            objects: BTreeMap::new(),
            version_seq: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BucketSettings {
        &self.settings
    }

    /// Write a new current version under `key`. With versioning enabled the
    /// previous current version is demoted to noncurrent and stamped with
    /// `now_ms`; without it the previous content is replaced outright.
    pub fn put_object(
        &mut self,
        key: &str,
        body: &[u8],
        options: &ObjectWriteOptions,
        now_ms: u64,
    ) -> PutReceipt {
        let checksum = content_checksum(body);
        self.version_seq += 1;
        let version_id = format!("v{:06}-{}", self.version_seq, &checksum[..8]);

        let versions = self.objects.entry(key.to_string()).or_default();
        if self.settings.versioning_enabled {
            for version in versions.iter_mut() {
                if version.is_current() {
                    version.noncurrent_since_ms = Some(now_ms);
                }
            }
        } else {
            versions.clear();
        }

        versions.push(ObjectVersion {
            version_id: version_id.clone(),
            body: body.to_vec(),
            content_type: options.content_type.clone(),
            public_read: options.public_read,
            checksum: checksum.clone(),
            encrypted: self.settings.encryption == ServerSideEncryption::Aes256,
            created_at_ms: now_ms,
            noncurrent_since_ms: None,
        });

        PutReceipt {
            key: key.to_string(),
            version_id,
            checksum,
        }
    }

    /// Owner read of the current version, ignoring public-access gating.
    pub fn read_current(&self, key: &str) -> Option<&ObjectVersion> {
        self.objects
            .get(key)?
            .iter()
            .rev()
            .find(|version| version.is_current())
    }

    /// Anonymous read of the current version, subject to the bucket's
    /// public-access posture.
    pub fn read_anonymous(&self, key: &str) -> Result<&ObjectVersion, ReadError> {
        let version = self.read_current(key).ok_or(ReadError::NotFound)?;
        let allowed = match self.settings.public_access {
            PublicAccessMode::BucketWide => true,
            PublicAccessMode::TagGated | PublicAccessMode::LegacyObjectAcl => version.public_read,
        };
        if allowed {
            Ok(version)
        } else {
            Err(ReadError::AccessDenied)
        }
    }

    /// Keys with a live current version under `prefix`, in key order.
    pub fn list_current_keys(&self, prefix: &str) -> Vec<String> {
        self.objects
            .iter()
            .filter(|(key, versions)| {
                key.starts_with(prefix) && versions.iter().any(ObjectVersion::is_current)
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn version_count(&self, key: &str) -> usize {
        self.objects.get(key).map_or(0, Vec::len)
    }

    pub fn noncurrent_version_count(&self, key: &str) -> usize {
        self.objects.get(key).map_or(0, |versions| {
            versions
                .iter()
                .filter(|version| !version.is_current())
                .count()
        })
    }

    /// The provider's lifecycle sweep: remove noncurrent versions whose
    /// retention window has elapsed. Returns the number of versions removed.
    pub fn apply_lifecycle(&mut self, now_ms: u64) -> usize {
        let retention_ms = u64::from(self.settings.lifecycle.noncurrent_expiry_days) * ONE_DAY_MS;
        let mut removed = 0;
        self.objects.retain(|_, versions| {
            versions.retain(|version| {
                let expired = version
                    .noncurrent_since_ms
                    .is_some_and(|since_ms| now_ms >= since_ms + retention_ms);
                if expired {
                    removed += 1;
                }
                !expired
            });
            !versions.is_empty()
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict_bucket() -> BucketModel {
        BucketModel::new("wordcloud-generator-dev", BucketSettings::strict())
    }

    #[test]
    fn put_creates_current_version_with_content_checksum() {
        let mut bucket = strict_bucket();
        let receipt = bucket.put_object(
            "wordclouds/a.png",
            b"png-bytes",
            &ObjectWriteOptions::public_png(),
            100,
        );

        let version = bucket
            .read_current("wordclouds/a.png")
            .expect("current version should exist");
        assert_eq!(version.version_id, receipt.version_id);
        assert_eq!(version.checksum, content_checksum(b"png-bytes"));
        assert_eq!(version.content_type, "image/png");
        assert!(version.encrypted);
        assert!(version.is_current());
    }

    #[test]
    fn second_put_demotes_previous_version() {
        let mut bucket = strict_bucket();
        let first = bucket.put_object("k", b"one", &ObjectWriteOptions::public_png(), 100);
        let second = bucket.put_object("k", b"two", &ObjectWriteOptions::public_png(), 200);

        assert_ne!(first.version_id, second.version_id);
        assert_eq!(bucket.version_count("k"), 2);
        assert_eq!(bucket.noncurrent_version_count("k"), 1);

        let current = bucket.read_current("k").expect("current should exist");
        assert_eq!(current.body, b"two");
        assert_eq!(current.version_id, second.version_id);
    }

    #[test]
    fn disabled_versioning_replaces_instead_of_stacking() {
        let settings = BucketSettings {
            versioning_enabled: false,
            ..BucketSettings::strict()
        };
        let mut bucket = BucketModel::new("plain", settings);
        bucket.put_object("k", b"one", &ObjectWriteOptions::public_png(), 100);
        bucket.put_object("k", b"two", &ObjectWriteOptions::public_png(), 200);

        assert_eq!(bucket.version_count("k"), 1);
        assert_eq!(
            bucket.read_current("k").expect("current should exist").body,
            b"two"
        );
    }

    #[test]
    fn tag_gated_mode_requires_public_marking() {
        let mut bucket = strict_bucket();
        bucket.put_object(
            "private.png",
            b"secret",
            &ObjectWriteOptions {
                content_type: "image/png".to_string(),
                public_read: false,
            },
            100,
        );
        bucket.put_object("public.png", b"open", &ObjectWriteOptions::public_png(), 100);

        assert_eq!(
            bucket.read_anonymous("private.png").expect_err("should deny"),
            ReadError::AccessDenied
        );
        assert!(bucket.read_anonymous("public.png").is_ok());
        assert_eq!(
            bucket.read_anonymous("missing.png").expect_err("should miss"),
            ReadError::NotFound
        );
    }

    #[test]
    fn deprecated_bucket_wide_mode_ignores_marking() {
        let settings = BucketSettings {
            public_access: PublicAccessMode::BucketWide,
            ..BucketSettings::strict()
        };
        let mut bucket = BucketModel::new("open", settings);
        bucket.put_object(
            "k",
            b"bytes",
            &ObjectWriteOptions {
                content_type: "image/png".to_string(),
                public_read: false,
            },
            100,
        );

        assert!(bucket.read_anonymous("k").is_ok());
    }

    #[test]
    fn lifecycle_expires_noncurrent_versions_after_retention() {
        let mut bucket = strict_bucket();
        bucket.put_object("k", b"one", &ObjectWriteOptions::public_png(), 0);
        let demoted_at = 1_000;
        bucket.put_object("k", b"two", &ObjectWriteOptions::public_png(), demoted_at);

        let retention_ms = u64::from(DEFAULT_NONCURRENT_EXPIRY_DAYS) * ONE_DAY_MS;
        assert_eq!(bucket.apply_lifecycle(demoted_at + retention_ms - 1), 0);
        assert_eq!(bucket.noncurrent_version_count("k"), 1);

        assert_eq!(bucket.apply_lifecycle(demoted_at + retention_ms), 1);
        assert_eq!(bucket.noncurrent_version_count("k"), 0);

        // The current version survives the sweep and stays readable.
        let current = bucket.read_current("k").expect("current should remain");
        assert_eq!(current.body, b"two");
    }

    #[test]
    fn lifecycle_never_touches_current_versions() {
        let mut bucket = strict_bucket();
        bucket.put_object("k", b"only", &ObjectWriteOptions::public_png(), 0);

        let ten_years_ms = 3_650 * ONE_DAY_MS;
        assert_eq!(bucket.apply_lifecycle(ten_years_ms), 0);
        assert!(bucket.read_current("k").is_some());
    }

    #[test]
    fn list_current_keys_filters_by_prefix() {
        let mut bucket = strict_bucket();
        bucket.put_object(
            "wordclouds/a.png",
            b"a",
            &ObjectWriteOptions::public_png(),
            0,
        );
        bucket.put_object(
            "wordclouds/b.png",
            b"b",
            &ObjectWriteOptions::public_png(),
            0,
        );
        bucket.put_object("other/c.png", b"c", &ObjectWriteOptions::public_png(), 0);

        assert_eq!(
            bucket.list_current_keys("wordclouds/"),
            vec!["wordclouds/a.png".to_string(), "wordclouds/b.png".to_string()]
        );
        assert_eq!(bucket.list_current_keys("").len(), 3);
    }

    #[test]
    fn unencrypted_bucket_records_plaintext_versions() {
        let settings = BucketSettings {
            encryption: ServerSideEncryption::None,
            ..BucketSettings::strict()
        };
        let mut bucket = BucketModel::new("plain", settings);
        bucket.put_object("k", b"bytes", &ObjectWriteOptions::public_png(), 0);
        assert!(!bucket.read_current("k").expect("should exist").encrypted);
    }
}
