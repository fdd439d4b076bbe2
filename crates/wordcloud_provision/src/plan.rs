//! Pure field-level diff between desired and observed state. The plan is
//! granular so the applier touches only what drifted, never re-creating a
//! resource that merely needs one setting changed.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use wordcloud_core::object_store::{LifecycleRule, PublicAccessMode, ServerSideEncryption};
use wordcloud_core::throttle::ThrottleConfig;

use crate::state::{DesiredState, FunctionSpec, ObservedState};

#[derive(Debug, Clone, PartialEq)]
pub enum PlannedAction {
    CreateBucket {
        name: String,
    },
    PutBucketVersioning {
        name: String,
        enabled: bool,
    },
    PutBucketEncryption {
        name: String,
        encryption: ServerSideEncryption,
    },
    PutBucketLifecycle {
        name: String,
        rule: LifecycleRule,
    },
    PutBucketAccessPolicy {
        name: String,
        mode: PublicAccessMode,
    },
    CreateFunction {
        spec: FunctionSpec,
    },
    UpdateFunctionCode {
        name: String,
        zip_path: String,
        source_hash: String,
    },
    UpdateFunctionSettings {
        name: String,
        runtime: String,
        handler: String,
        memory_mb: u32,
        timeout_seconds: u32,
    },
    UpdateFunctionEnvironment {
        name: String,
        environment: BTreeMap<String, String>,
    },
    PutApiRoute {
        name: String,
        route: String,
        methods: Vec<String>,
        cors_enabled: bool,
    },
    PutApiThrottle {
        name: String,
        throttle: ThrottleConfig,
    },
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateBucket { name } => write!(f, "create_bucket {name}"),
            Self::PutBucketVersioning { name, enabled } => {
                write!(f, "put_bucket_versioning {name} enabled={enabled}")
            }
            Self::PutBucketEncryption { name, .. } => write!(f, "put_bucket_encryption {name}"),
            Self::PutBucketLifecycle { name, rule } => write!(
                f,
                "put_bucket_lifecycle {name} noncurrent_expiry_days={}",
                rule.noncurrent_expiry_days
            ),
            Self::PutBucketAccessPolicy { name, mode } => {
                write!(f, "put_bucket_access_policy {name} mode={mode:?}")
            }
            Self::CreateFunction { spec } => write!(f, "create_function {}", spec.name),
            Self::UpdateFunctionCode { name, .. } => write!(f, "update_function_code {name}"),
            Self::UpdateFunctionSettings { name, .. } => {
                write!(f, "update_function_settings {name}")
            }
            Self::UpdateFunctionEnvironment { name, .. } => {
                write!(f, "update_function_environment {name}")
            }
            Self::PutApiRoute { name, route, .. } => write!(f, "put_api_route {name} {route}"),
            Self::PutApiThrottle { name, .. } => write!(f, "put_api_throttle {name}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub actions: Vec<PlannedAction>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

/// Diff `desired` against `observed`. An absent resource plans a create
/// followed by every setting put; an existing one plans only the drifted
/// fields.
pub fn plan(desired: &DesiredState, observed: &ObservedState) -> ReconcilePlan {
    let mut actions = Vec::new();
    plan_bucket(desired, observed, &mut actions);
    plan_function(desired, observed, &mut actions);
    plan_api(desired, observed, &mut actions);
    ReconcilePlan { actions }
}

fn plan_bucket(desired: &DesiredState, observed: &ObservedState, actions: &mut Vec<PlannedAction>) {
    let want = &desired.bucket;
    let have = observed
        .bucket
        .as_ref()
        .filter(|bucket| bucket.name == want.name);

    let Some(have) = have else {
        actions.push(PlannedAction::CreateBucket {
            name: want.name.clone(),
        });
        actions.push(PlannedAction::PutBucketVersioning {
            name: want.name.clone(),
            enabled: want.settings.versioning_enabled,
        });
        actions.push(PlannedAction::PutBucketEncryption {
            name: want.name.clone(),
            encryption: want.settings.encryption,
        });
        actions.push(PlannedAction::PutBucketLifecycle {
            name: want.name.clone(),
            rule: want.settings.lifecycle,
        });
        actions.push(PlannedAction::PutBucketAccessPolicy {
            name: want.name.clone(),
            mode: want.settings.public_access,
        });
        return;
    };

    if have.settings.versioning_enabled != want.settings.versioning_enabled {
        actions.push(PlannedAction::PutBucketVersioning {
            name: want.name.clone(),
            enabled: want.settings.versioning_enabled,
        });
    }
    if have.settings.encryption != want.settings.encryption {
        actions.push(PlannedAction::PutBucketEncryption {
            name: want.name.clone(),
            encryption: want.settings.encryption,
        });
    }
    if have.settings.lifecycle != want.settings.lifecycle {
        actions.push(PlannedAction::PutBucketLifecycle {
            name: want.name.clone(),
            rule: want.settings.lifecycle,
        });
    }
    if have.settings.public_access != want.settings.public_access {
        actions.push(PlannedAction::PutBucketAccessPolicy {
            name: want.name.clone(),
            mode: want.settings.public_access,
        });
    }
}

fn plan_function(
    desired: &DesiredState,
    observed: &ObservedState,
    actions: &mut Vec<PlannedAction>,
) {
    let want = &desired.function;
    let have = observed
        .function
        .as_ref()
        .filter(|function| function.name == want.name);

    let Some(have) = have else {
        actions.push(PlannedAction::CreateFunction { spec: want.clone() });
        return;
    };

    if have.source_hash != want.artifact.source_hash {
        actions.push(PlannedAction::UpdateFunctionCode {
            name: want.name.clone(),
            zip_path: want.artifact.zip_path.clone(),
            source_hash: want.artifact.source_hash.clone(),
        });
    }
    if have.runtime != want.runtime
        || have.handler != want.handler
        || have.memory_mb != want.memory_mb
        || have.timeout_seconds != want.timeout_seconds
    {
        actions.push(PlannedAction::UpdateFunctionSettings {
            name: want.name.clone(),
            runtime: want.runtime.clone(),
            handler: want.handler.clone(),
            memory_mb: want.memory_mb,
            timeout_seconds: want.timeout_seconds,
        });
    }
    if have.environment != want.environment {
        actions.push(PlannedAction::UpdateFunctionEnvironment {
            name: want.name.clone(),
            environment: want.environment.clone(),
        });
    }
}

fn plan_api(desired: &DesiredState, observed: &ObservedState, actions: &mut Vec<PlannedAction>) {
    let want = &desired.api;
    let have = observed.api.as_ref().filter(|api| api.name == want.name);

    let route_action = PlannedAction::PutApiRoute {
        name: want.name.clone(),
        route: want.route.clone(),
        methods: want.methods.clone(),
        cors_enabled: want.cors_enabled,
    };
    let throttle_action = PlannedAction::PutApiThrottle {
        name: want.name.clone(),
        throttle: want.throttle,
    };

    let Some(have) = have else {
        actions.push(route_action);
        actions.push(throttle_action);
        return;
    };

    if have.route != want.route
        || have.methods != want.methods
        || have.cors_enabled != want.cors_enabled
    {
        actions.push(route_action);
    }
    if have.throttle != want.throttle {
        actions.push(throttle_action);
    }
}

/// Bucket policy document for a public-access posture. `LegacyObjectAcl`
/// predates bucket policies (per-object ACLs) and therefore has none.
pub fn bucket_policy_document(bucket: &str, mode: PublicAccessMode) -> Option<Value> {
    match mode {
        PublicAccessMode::TagGated => Some(json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Sid": "TagGatedPublicRead",
                "Effect": "Allow",
                "Principal": "*",
                "Action": "s3:GetObject",
                "Resource": format!("arn:aws:s3:::{bucket}/*"),
                "Condition": {
                    "StringEquals": {
                        "s3:ExistingObjectTag/public-read": "true"
                    }
                }
            }]
        })),
        PublicAccessMode::BucketWide => Some(json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Sid": "PublicRead",
                "Effect": "Allow",
                "Principal": "*",
                "Action": "s3:GetObject",
                "Resource": format!("arn:aws:s3:::{bucket}/*")
            }]
        })),
        PublicAccessMode::LegacyObjectAcl => None,
    }
}
