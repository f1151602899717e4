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

use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no manifest template for resource {0:?}")]
    UnknownResource(String),

    #[error("failed to encode manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct TemplateParams<'a> {
    pub name_pattern: &'a str,
    pub namespace: &'a str,
}

/// Renders the POST payload for one churned resource, keyed by the plural
/// resource name. Pods get a pause container so the manifest is admissible
/// on real clusters and kwok alike.
pub fn render_template(resource: &str, params: &TemplateParams<'_>) -> Result<Vec<u8>, TemplateError> {
    let mut metadata = json!({ "name": params.name_pattern });
    if !params.namespace.is_empty() {
        metadata["namespace"] = json!(params.namespace);
    }

    let manifest = match resource {
        "pods" => json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": metadata,
            "spec": {
                "containers": [{
                    "name": "app",
                    "image": "registry.k8s.io/pause:3.9",
                }],
            },
        }),
        "configmaps" => json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": metadata,
            "data": { "key": params.name_pattern },
        }),
        other => return Err(TemplateError::UnknownResource(other.to_owned())),
    };

    Ok(serde_json::to_vec(&manifest)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_pod_manifest_with_name_and_namespace() {
        let body = render_template(
            "pods",
            &TemplateParams {
                name_pattern: "173-1",
                namespace: "churn",
            },
        )
        .unwrap();
        let manifest: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(manifest["kind"], "Pod");
        assert_eq!(manifest["metadata"]["name"], "173-1");
        assert_eq!(manifest["metadata"]["namespace"], "churn");
    }

    #[test]
    fn omits_namespace_when_empty() {
        let body = render_template(
            "configmaps",
            &TemplateParams {
                name_pattern: "x",
                namespace: "",
            },
        )
        .unwrap();
        let manifest: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(manifest["metadata"].get("namespace").is_none());
    }

    #[test]
    fn unknown_resource_is_an_error() {
        let err = render_template(
            "widgets",
            &TemplateParams {
                name_pattern: "x",
                namespace: "",
            },
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::UnknownResource(_)));
    }
}
