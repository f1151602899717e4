/* Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

use crate::error::ConfigError;
use crate::traits::Validatable;
use serde::{Deserialize, Serialize};

const SUPPORTED_PROFILE_VERSION: u32 = 1;

/// Versioned on-disk envelope for a load profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadProfile {
    pub version: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub spec: LoadProfileSpec,
}

impl LoadProfile {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let profile: Self = serde_yml::from_str(content)?;
        profile.validate()?;
        Ok(profile)
    }
}

impl Validatable<ConfigError> for LoadProfile {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.version != SUPPORTED_PROFILE_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        self.spec.validate()
    }
}

/// Traffic mix, volume and concurrency of one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadProfileSpec {
    /// Maximum requests per second across the whole engine. Zero means
    /// unlimited.
    pub rate: u32,
    /// Total requests to issue. Zero means run until the caller cancels.
    pub total: u64,
    /// Number of distinct transports the caller preallocates.
    pub conns: u32,
    /// Number of concurrent workers. Workers reuse transports by index
    /// modulo `conns` when `client > conns`.
    pub client: u32,
    pub content_type: ContentType,
    #[serde(rename = "disableHTTP2")]
    pub disable_http2: bool,
    /// Retries per individual request, handled in the client layer.
    pub max_retries: u32,
    pub requests: Vec<WeightedRequest>,
}

impl Default for LoadProfileSpec {
    fn default() -> Self {
        Self {
            rate: 0,
            total: 0,
            conns: 1,
            client: 1,
            content_type: ContentType::Json,
            disable_http2: false,
            max_retries: 0,
            requests: Vec::new(),
        }
    }
}

impl Validatable<ConfigError> for LoadProfileSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.client < 1 {
            return Err(ConfigError::NoClients);
        }
        if self.conns < 1 {
            return Err(ConfigError::NoConns);
        }
        if self.requests.is_empty() {
            return Err(ConfigError::NoRequests);
        }
        for (index, request) in self.requests.iter().enumerate() {
            if request.shares == 0 {
                return Err(ConfigError::ZeroShares { index });
            }
            request.kind.validate(index)?;
        }
        Ok(())
    }
}

/// One entry of the traffic mix: a positive weight plus exactly one
/// request kind, e.g.
///
/// ```yaml
/// - shares: 10
///   staleList:
///     version: v1
///     resource: pods
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedRequest {
    pub shares: u32,
    #[serde(flatten)]
    pub kind: RequestKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    StaleList(RequestList),
    QuorumList(RequestList),
    WatchList(RequestWatchList),
    StaleGet(RequestGet),
    QuorumGet(RequestGet),
    GetPodLog(RequestGetPodLog),
    Patch(RequestPatch),
    PostDel(RequestPostDel),
}

impl RequestKind {
    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let require = |value: &str, field: &'static str| {
            if value.is_empty() {
                Err(ConfigError::MissingField { index, field })
            } else {
                Ok(())
            }
        };
        match self {
            Self::StaleList(list) | Self::QuorumList(list) => {
                require(&list.version, "version")?;
                require(&list.resource, "resource")
            }
            Self::WatchList(watch) => {
                require(&watch.version, "version")?;
                require(&watch.resource, "resource")
            }
            Self::StaleGet(get) | Self::QuorumGet(get) => {
                require(&get.version, "version")?;
                require(&get.resource, "resource")?;
                require(&get.name, "name")
            }
            Self::GetPodLog(log) => {
                require(&log.namespace, "namespace")?;
                require(&log.name, "name")
            }
            Self::Patch(patch) => {
                require(&patch.version, "version")?;
                require(&patch.resource, "resource")?;
                require(&patch.name, "name")?;
                require(&patch.body, "body")?;
                if patch.key_space_size == 0 {
                    return Err(ConfigError::ZeroKeySpace { index });
                }
                Ok(())
            }
            Self::PostDel(post_del) => {
                require(&post_del.version, "version")?;
                require(&post_del.resource, "resource")?;
                if !(0.0..=1.0).contains(&post_del.delete_ratio) {
                    return Err(ConfigError::DeleteRatioOutOfRange {
                        index,
                        ratio: post_del.delete_ratio,
                    });
                }
                Ok(())
            }
        }
    }
}

/// List against a resource collection. Used by both the stale and the
/// quorum variants; the engine forces the resource-version semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestList {
    pub group: String,
    pub version: String,
    pub resource: String,
    pub namespace: String,
    pub limit: i64,
    pub selector: String,
    pub field_selector: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestGet {
    pub group: String,
    pub version: String,
    pub resource: String,
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestWatchList {
    pub group: String,
    pub version: String,
    pub resource: String,
    pub namespace: String,
    pub selector: String,
    pub field_selector: String,
}

/// Streams one container's log. Always served by the core `v1` group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestGetPodLog {
    pub namespace: String,
    pub name: String,
    pub container: String,
    pub tail_lines: Option<i64>,
    pub limit_bytes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestPatch {
    pub group: String,
    pub version: String,
    pub resource: String,
    pub namespace: String,
    /// Base name; the engine appends a random suffix drawn from
    /// `[0, key_space_size)` on every request.
    pub name: String,
    pub patch_type: PatchType,
    pub body: String,
    pub key_space_size: u32,
}

/// Create/delete churn against one resource collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestPostDel {
    pub group: String,
    pub version: String,
    pub resource: String,
    pub namespace: String,
    /// Probability in `[0, 1]` that a build attempts a DELETE instead of
    /// a POST.
    pub delete_ratio: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Json,
    Protobuf,
}

impl ContentType {
    pub const fn accept_header(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Protobuf => "application/vnd.kubernetes.protobuf",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchType {
    #[default]
    Strategic,
    Merge,
    Json,
}

impl PatchType {
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Strategic => "application/strategic-merge-patch+json",
            Self::Merge => "application/merge-patch+json",
            Self::Json => "application/json-patch+json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_spec(kind: RequestKind) -> LoadProfileSpec {
        LoadProfileSpec {
            requests: vec![WeightedRequest { shares: 1, kind }],
            ..Default::default()
        }
    }

    #[test]
    fn parses_full_profile_from_yaml() {
        let yaml = r#"
version: 1
description: mixed read workload
spec:
  rate: 100
  total: 1000
  conns: 10
  client: 20
  contentType: protobuf
  disableHTTP2: true
  maxRetries: 2
  requests:
    - shares: 10
      staleList:
        version: v1
        resource: pods
        limit: 500
        selector: app=web
    - shares: 5
      quorumGet:
        version: v1
        resource: configmaps
        namespace: default
        name: kube-root-ca.crt
    - shares: 1
      postDel:
        version: v1
        resource: pods
        namespace: churn
        deleteRatio: 0.5
"#;
        let profile = LoadProfile::from_yaml(yaml).unwrap();
        assert_eq!(profile.spec.rate, 100);
        assert_eq!(profile.spec.client, 20);
        assert_eq!(profile.spec.content_type, ContentType::Protobuf);
        assert!(profile.spec.disable_http2);
        assert_eq!(profile.spec.requests.len(), 3);
        match &profile.spec.requests[0].kind {
            RequestKind::StaleList(list) => {
                assert_eq!(list.resource, "pods");
                assert_eq!(list.limit, 500);
                assert_eq!(list.selector, "app=web");
            }
            other => panic!("expected staleList, got {other:?}"),
        }
        match &profile.spec.requests[2].kind {
            RequestKind::PostDel(post_del) => assert_eq!(post_del.delete_ratio, 0.5),
            other => panic!("expected postDel, got {other:?}"),
        }
    }

    #[test]
    fn rejects_two_kinds_in_one_entry() {
        let yaml = r#"
version: 1
spec:
  requests:
    - shares: 1
      staleList:
        version: v1
        resource: pods
      quorumList:
        version: v1
        resource: pods
"#;
        assert!(matches!(
            LoadProfile::from_yaml(yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        let yaml = "version: 2\nspec:\n  requests:\n    - shares: 1\n      staleList:\n        version: v1\n        resource: pods\n";
        assert!(matches!(
            LoadProfile::from_yaml(yaml),
            Err(ConfigError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn rejects_empty_requests() {
        let spec = LoadProfileSpec::default();
        assert!(matches!(spec.validate(), Err(ConfigError::NoRequests)));
    }

    #[test]
    fn rejects_zero_shares() {
        let mut spec = minimal_spec(RequestKind::StaleList(RequestList {
            version: "v1".into(),
            resource: "pods".into(),
            ..Default::default()
        }));
        spec.requests[0].shares = 0;
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::ZeroShares { index: 0 })
        ));
    }

    #[test]
    fn rejects_zero_workers_and_conns() {
        let mut spec = minimal_spec(RequestKind::StaleList(RequestList {
            version: "v1".into(),
            resource: "pods".into(),
            ..Default::default()
        }));
        spec.client = 0;
        assert!(matches!(spec.validate(), Err(ConfigError::NoClients)));
        spec.client = 1;
        spec.conns = 0;
        assert!(matches!(spec.validate(), Err(ConfigError::NoConns)));
    }

    #[test]
    fn rejects_missing_required_fields() {
        let spec = minimal_spec(RequestKind::StaleGet(RequestGet {
            version: "v1".into(),
            resource: "pods".into(),
            ..Default::default()
        }));
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::MissingField { field: "name", .. })
        ));
    }

    #[test]
    fn rejects_zero_key_space() {
        let spec = minimal_spec(RequestKind::Patch(RequestPatch {
            version: "v1".into(),
            resource: "pods".into(),
            name: "foo".into(),
            body: "{}".into(),
            key_space_size: 0,
            ..Default::default()
        }));
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::ZeroKeySpace { index: 0 })
        ));
    }

    #[test]
    fn rejects_delete_ratio_outside_unit_interval() {
        let spec = minimal_spec(RequestKind::PostDel(RequestPostDel {
            version: "v1".into(),
            resource: "pods".into(),
            delete_ratio: 1.5,
            ..Default::default()
        }));
        assert!(matches!(
            spec.validate(),
            Err(ConfigError::DeleteRatioOutOfRange { .. })
        ));
    }

    #[test]
    fn unknown_patch_type_fails_to_parse() {
        let yaml = r#"
version: 1
spec:
  requests:
    - shares: 1
      patch:
        version: v1
        resource: pods
        name: foo
        patchType: replace
        body: "{}"
        keySpaceSize: 10
"#;
        assert!(matches!(
            LoadProfile::from_yaml(yaml),
            Err(ConfigError::Parse(_))
        ));
    }
}
