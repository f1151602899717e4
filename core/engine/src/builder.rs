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

use crate::cache::NameCache;
use crate::client::RestClient;
use crate::options::{
    GetOptions, ListOptions, PodLogOptions, RESOURCE_VERSION_MATCH_NOT_OLDER_THAN,
};
use crate::requester::{DiscardRequester, PostDelOp, PostDelRequester, Requester, WatchListRequester};
use crate::template::{TemplateParams, render_template};
use kload_common::{
    PatchType, RequestGet, RequestGetPodLog, RequestKind, RequestList, RequestPatch,
    RequestPostDel, RequestWatchList,
};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Resource version forced onto stale reads; quorum reads omit the
/// parameter instead.
const STALE_RESOURCE_VERSION: &str = "0";

/// Factory for one request kind. Builders are constructed once per run
/// and are immutable afterwards, so workers can build concurrently.
pub trait RequestBuilder: Send + Sync {
    fn build(&self, client: &RestClient) -> Requester;
}

pub(crate) fn builder_for(kind: &RequestKind, max_retries: u32) -> Arc<dyn RequestBuilder> {
    match kind {
        RequestKind::StaleList(src) => Arc::new(ListBuilder::new(
            src,
            Some(STALE_RESOURCE_VERSION.to_owned()),
            max_retries,
        )),
        RequestKind::QuorumList(src) => Arc::new(ListBuilder::new(src, None, max_retries)),
        RequestKind::WatchList(src) => Arc::new(WatchListBuilder::new(src, max_retries)),
        RequestKind::StaleGet(src) => Arc::new(GetBuilder::new(
            src,
            Some(STALE_RESOURCE_VERSION.to_owned()),
            max_retries,
        )),
        RequestKind::QuorumGet(src) => Arc::new(GetBuilder::new(src, None, max_retries)),
        RequestKind::GetPodLog(src) => Arc::new(PodLogBuilder::new(src, max_retries)),
        RequestKind::Patch(src) => Arc::new(PatchBuilder::new(src, max_retries)),
        RequestKind::PostDel(src) => Arc::new(PostDelBuilder::new(src, max_retries)),
    }
}

#[derive(Debug, Clone)]
struct GroupVersion {
    group: String,
    version: String,
}

impl GroupVersion {
    fn new(group: &str, version: &str) -> Self {
        Self {
            group: group.to_owned(),
            version: version.to_owned(),
        }
    }

    /// Path components up to the collection, following the API server's
    /// convention: core resources live under `/api/{version}`, grouped
    /// ones under `/apis/{group}/{version}`.
    fn collection_path<'a>(&'a self, namespace: &'a str, resource: &'a str) -> Vec<&'a str> {
        let mut components = if self.group.is_empty() {
            vec!["api", self.version.as_str()]
        } else {
            vec!["apis", self.group.as_str(), self.version.as_str()]
        };
        if !namespace.is_empty() {
            components.extend(["namespaces", namespace]);
        }
        components.push(resource);
        components
    }
}

struct GetBuilder {
    version: GroupVersion,
    resource: String,
    namespace: String,
    name: String,
    resource_version: Option<String>,
    max_retries: u32,
}

impl GetBuilder {
    fn new(src: &RequestGet, resource_version: Option<String>, max_retries: u32) -> Self {
        Self {
            version: GroupVersion::new(&src.group, &src.version),
            resource: src.resource.clone(),
            namespace: src.namespace.clone(),
            name: src.name.clone(),
            resource_version,
            max_retries,
        }
    }
}

impl RequestBuilder for GetBuilder {
    fn build(&self, client: &RestClient) -> Requester {
        let mut components = self.version.collection_path(&self.namespace, &self.resource);
        components.push(&self.name);

        Requester::Discard(DiscardRequester {
            op: "GET",
            request: client
                .get()
                .abs_path(components)
                .versioned_params(&GetOptions {
                    resource_version: self.resource_version.clone(),
                })
                .max_retries(self.max_retries),
        })
    }
}

struct ListBuilder {
    version: GroupVersion,
    resource: String,
    namespace: String,
    limit: i64,
    label_selector: String,
    field_selector: String,
    resource_version: Option<String>,
    max_retries: u32,
}

impl ListBuilder {
    fn new(src: &RequestList, resource_version: Option<String>, max_retries: u32) -> Self {
        Self {
            version: GroupVersion::new(&src.group, &src.version),
            resource: src.resource.clone(),
            namespace: src.namespace.clone(),
            limit: src.limit,
            label_selector: src.selector.clone(),
            field_selector: src.field_selector.clone(),
            resource_version,
            max_retries,
        }
    }
}

impl RequestBuilder for ListBuilder {
    fn build(&self, client: &RestClient) -> Requester {
        let components = self.version.collection_path(&self.namespace, &self.resource);

        Requester::Discard(DiscardRequester {
            op: "LIST",
            request: client
                .get()
                .abs_path(components)
                .versioned_params(&ListOptions {
                    label_selector: self.label_selector.clone(),
                    field_selector: self.field_selector.clone(),
                    resource_version: self.resource_version.clone(),
                    limit: self.limit,
                    ..Default::default()
                })
                .max_retries(self.max_retries),
        })
    }
}

struct WatchListBuilder {
    version: GroupVersion,
    resource: String,
    namespace: String,
    label_selector: String,
    field_selector: String,
    max_retries: u32,
}

impl WatchListBuilder {
    fn new(src: &RequestWatchList, max_retries: u32) -> Self {
        Self {
            version: GroupVersion::new(&src.group, &src.version),
            resource: src.resource.clone(),
            namespace: src.namespace.clone(),
            label_selector: src.selector.clone(),
            field_selector: src.field_selector.clone(),
            max_retries,
        }
    }
}

impl RequestBuilder for WatchListBuilder {
    fn build(&self, client: &RestClient) -> Requester {
        let components = self.version.collection_path(&self.namespace, &self.resource);

        Requester::WatchList(WatchListRequester {
            request: client
                .get()
                .abs_path(components)
                .versioned_params(&ListOptions {
                    label_selector: self.label_selector.clone(),
                    field_selector: self.field_selector.clone(),
                    watch: true,
                    send_initial_events: Some(true),
                    resource_version_match: Some(RESOURCE_VERSION_MATCH_NOT_OLDER_THAN),
                    allow_watch_bookmarks: true,
                    ..Default::default()
                })
                .max_retries(self.max_retries),
        })
    }
}

/// Pod logs are always served by the core `v1` group.
struct PodLogBuilder {
    namespace: String,
    name: String,
    container: String,
    tail_lines: Option<i64>,
    limit_bytes: Option<i64>,
    max_retries: u32,
}

impl PodLogBuilder {
    fn new(src: &RequestGetPodLog, max_retries: u32) -> Self {
        Self {
            namespace: src.namespace.clone(),
            name: src.name.clone(),
            container: src.container.clone(),
            tail_lines: src.tail_lines,
            limit_bytes: src.limit_bytes,
            max_retries,
        }
    }
}

impl RequestBuilder for PodLogBuilder {
    fn build(&self, client: &RestClient) -> Requester {
        let components = [
            "api",
            "v1",
            "namespaces",
            self.namespace.as_str(),
            "pods",
            self.name.as_str(),
            "log",
        ];

        Requester::Discard(DiscardRequester {
            op: "POD_LOG",
            request: client
                .get()
                .abs_path(components)
                .versioned_params(&PodLogOptions {
                    container: self.container.clone(),
                    tail_lines: self.tail_lines,
                    limit_bytes: self.limit_bytes,
                })
                .max_retries(self.max_retries),
        })
    }
}

struct PatchBuilder {
    version: GroupVersion,
    resource: String,
    namespace: String,
    name: String,
    key_space_size: u32,
    patch_type: PatchType,
    body: Vec<u8>,
    max_retries: u32,
}

impl PatchBuilder {
    fn new(src: &RequestPatch, max_retries: u32) -> Self {
        Self {
            version: GroupVersion::new(&src.group, &src.version),
            resource: src.resource.clone(),
            namespace: src.namespace.clone(),
            name: src.name.clone(),
            key_space_size: src.key_space_size,
            patch_type: src.patch_type,
            body: src.body.clone().into_bytes(),
            max_retries,
        }
    }
}

impl RequestBuilder for PatchBuilder {
    fn build(&self, client: &RestClient) -> Requester {
        // Spread patches over the keyspace so parallel workers hit
        // different objects; the thread-local RNG keeps draws independent
        // across workers.
        let suffix = rand::rng().random_range(0..u64::from(self.key_space_size));
        let target = format!("{}-{suffix}", self.name);

        let mut components = self.version.collection_path(&self.namespace, &self.resource);
        components.push(&target);

        Requester::Discard(DiscardRequester {
            op: "PATCH",
            request: client
                .patch(self.patch_type)
                .abs_path(components)
                .body(self.body.clone())
                .max_retries(self.max_retries),
        })
    }
}

/// Interleaves POSTs and DELETEs against one collection, backed by a FIFO
/// of names this builder has created.
struct PostDelBuilder {
    version: GroupVersion,
    resource: String,
    namespace: String,
    delete_ratio: f64,
    max_retries: u32,
    cache: Arc<NameCache>,
    counter: AtomicI64,
}

impl PostDelBuilder {
    fn new(src: &RequestPostDel, max_retries: u32) -> Self {
        Self {
            version: GroupVersion::new(&src.group, &src.version),
            resource: src.resource.clone(),
            namespace: src.namespace.clone(),
            delete_ratio: src.delete_ratio,
            max_retries,
            cache: Arc::new(NameCache::new()),
            counter: AtomicI64::new(0),
        }
    }

    /// Wall-clock nanoseconds plus a per-builder counter; time alone is
    /// not unique when workers build within the same tick.
    fn next_name(&self) -> String {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_nanos());
        format!("{nanos}-{counter}")
    }
}

impl RequestBuilder for PostDelBuilder {
    fn build(&self, client: &RestClient) -> Requester {
        let roll = rand::rng().random_range(0..1000u32);
        let should_delete = f64::from(roll) / 1000.0 < self.delete_ratio;

        if should_delete && let Some(name) = self.cache.pop() {
            let mut components = self.version.collection_path(&self.namespace, &self.resource);
            components.push(&name);
            let request = client
                .delete()
                .abs_path(&components)
                .max_retries(self.max_retries);

            return Requester::PostDel(PostDelRequester {
                op: PostDelOp::Delete,
                name: name.clone(),
                cache: self.cache.clone(),
                inner: DiscardRequester {
                    op: "DELETE",
                    request,
                },
            });
        }

        // Cache empty or the coin said POST.
        let name = self.next_name();
        let components = self.version.collection_path(&self.namespace, &self.resource);
        let request = client.post().abs_path(components);
        let request = match render_template(
            &self.resource,
            &TemplateParams {
                name_pattern: &name,
                namespace: &self.namespace,
            },
        ) {
            Ok(body) => request.body(body),
            Err(err) => request.fail(err.to_string()),
        };

        Requester::PostDel(PostDelRequester {
            op: PostDelOp::Post,
            name,
            cache: self.cache.clone(),
            inner: DiscardRequester {
                op: "POST",
                request: request.max_retries(self.max_retries),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConfig, build_clients};
    use kload_common::LoadProfileSpec;
    use url::Url;

    fn test_client() -> RestClient {
        let config = ClientConfig::new(Url::parse("https://127.0.0.1:6443").unwrap());
        build_clients(&LoadProfileSpec::default(), &config)
            .unwrap()
            .remove(0)
    }

    fn pods_list() -> RequestList {
        RequestList {
            version: "v1".into(),
            resource: "pods".into(),
            namespace: "default".into(),
            ..Default::default()
        }
    }

    #[test]
    fn stale_list_forces_resource_version_zero() {
        let builder = builder_for(&RequestKind::StaleList(pods_list()), 0);
        let requester = builder.build(&test_client());
        assert_eq!(requester.op(), "LIST");
        assert_eq!(requester.url().path(), "/api/v1/namespaces/default/pods");
        assert_eq!(requester.url().query(), Some("resourceVersion=0"));
    }

    #[test]
    fn quorum_list_omits_resource_version() {
        let builder = builder_for(&RequestKind::QuorumList(pods_list()), 0);
        let requester = builder.build(&test_client());
        assert_eq!(requester.url().query(), None);
    }

    #[test]
    fn grouped_resource_uses_apis_prefix() {
        let mut list = pods_list();
        list.group = "apps".into();
        list.resource = "deployments".into();
        let builder = builder_for(&RequestKind::QuorumList(list), 0);
        let requester = builder.build(&test_client());
        assert_eq!(
            requester.url().path(),
            "/apis/apps/v1/namespaces/default/deployments"
        );
    }

    #[test]
    fn watch_list_sets_streaming_parameters() {
        let builder = builder_for(
            &RequestKind::WatchList(RequestWatchList {
                version: "v1".into(),
                resource: "pods".into(),
                ..Default::default()
            }),
            0,
        );
        let requester = builder.build(&test_client());
        assert_eq!(requester.op(), "WATCHLIST");
        let query = requester.url().query().unwrap();
        assert!(query.contains("watch=true"));
        assert!(query.contains("sendInitialEvents=true"));
        assert!(query.contains("resourceVersionMatch=NotOlderThan"));
        assert!(query.contains("allowWatchBookmarks=true"));
    }

    #[test]
    fn pod_log_path_is_core_v1() {
        let builder = builder_for(
            &RequestKind::GetPodLog(RequestGetPodLog {
                namespace: "kube-system".into(),
                name: "coredns-0".into(),
                tail_lines: Some(50),
                ..Default::default()
            }),
            0,
        );
        let requester = builder.build(&test_client());
        assert_eq!(
            requester.url().path(),
            "/api/v1/namespaces/kube-system/pods/coredns-0/log"
        );
        assert_eq!(requester.url().query(), Some("tailLines=50"));
    }

    #[test]
    fn patch_names_stay_inside_keyspace() {
        let builder = builder_for(
            &RequestKind::Patch(RequestPatch {
                version: "v1".into(),
                resource: "configmaps".into(),
                namespace: "default".into(),
                name: "foo".into(),
                body: "{}".into(),
                key_space_size: 10,
                ..Default::default()
            }),
            0,
        );
        let client = test_client();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let requester = builder.build(&client);
            let path = requester.url().path().to_owned();
            let (_, target) = path.rsplit_once('/').unwrap();
            let (base, suffix) = target.rsplit_once('-').unwrap();
            assert_eq!(base, "foo");
            let suffix: u64 = suffix.parse().unwrap();
            assert!(suffix < 10, "suffix {suffix} escaped the keyspace");
            seen.insert(suffix);
        }
        // 200 draws over 10 keys miss a given key with probability ~7e-10.
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn post_del_posts_with_unique_counter_names() {
        let builder = PostDelBuilder::new(
            &RequestPostDel {
                version: "v1".into(),
                resource: "pods".into(),
                namespace: "churn".into(),
                delete_ratio: 0.0,
                ..Default::default()
            },
            0,
        );
        let client = test_client();
        let first = builder.build(&client);
        let second = builder.build(&client);
        assert_eq!(first.op(), "POST");
        assert_eq!(first.url().path(), "/api/v1/namespaces/churn/pods");
        let name_of = |requester: &Requester| match requester {
            Requester::PostDel(inner) => inner.name.clone(),
            other => panic!("expected postDel requester, got {}", other.op()),
        };
        let first_name = name_of(&first);
        let second_name = name_of(&second);
        assert_ne!(first_name, second_name);
        assert!(first_name.ends_with("-1"));
        assert!(second_name.ends_with("-2"));
    }

    #[test]
    fn post_del_deletes_popped_name_when_cache_has_one() {
        let builder = PostDelBuilder::new(
            &RequestPostDel {
                version: "v1".into(),
                resource: "pods".into(),
                namespace: "churn".into(),
                delete_ratio: 1.0,
                ..Default::default()
            },
            0,
        );
        builder.cache.push("victim".into());
        let requester = builder.build(&test_client());
        assert_eq!(requester.op(), "DELETE");
        assert_eq!(requester.url().path(), "/api/v1/namespaces/churn/pods/victim");
        assert!(builder.cache.is_empty());
    }

    #[test]
    fn post_del_falls_back_to_post_when_cache_is_empty() {
        let builder = PostDelBuilder::new(
            &RequestPostDel {
                version: "v1".into(),
                resource: "pods".into(),
                delete_ratio: 1.0,
                ..Default::default()
            },
            0,
        );
        let requester = builder.build(&test_client());
        assert_eq!(requester.op(), "POST");
    }

    #[tokio::test]
    async fn post_del_with_unknown_resource_fails_without_io() {
        let builder = PostDelBuilder::new(
            &RequestPostDel {
                version: "v1".into(),
                resource: "widgets".into(),
                delete_ratio: 0.0,
                ..Default::default()
            },
            0,
        );
        let requester = builder.build(&test_client());
        assert_eq!(requester.op(), "POST");

        let token = tokio_util::sync::CancellationToken::new();
        let (bytes, err) = requester.execute(&token).await;
        assert_eq!(bytes, 0);
        assert!(matches!(err, Some(crate::error::RequestError::Build(_))));
        // A failed POST must not publish its name.
        assert!(builder.cache.is_empty());
    }
}
