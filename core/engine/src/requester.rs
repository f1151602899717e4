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
use crate::client::RestRequest;
use crate::error::RequestError;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One executable request. Every variant streams the response body into
/// nothing while counting bytes; they differ in lifetime and
/// post-conditions.
pub enum Requester {
    Discard(DiscardRequester),
    WatchList(WatchListRequester),
    PostDel(PostDelRequester),
}

impl Requester {
    pub fn url(&self) -> &Url {
        match self {
            Self::Discard(requester) => requester.request.url(),
            Self::WatchList(requester) => requester.request.url(),
            Self::PostDel(requester) => requester.inner.request.url(),
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Self::Discard(requester) => requester.op,
            Self::WatchList(_) => "WATCHLIST",
            Self::PostDel(requester) => match requester.op {
                PostDelOp::Post => "POST",
                PostDelOp::Delete => "DELETE",
            },
        }
    }

    /// Runs the request to completion. Always returns the bytes read so
    /// far, plus the error if the request did not finish cleanly.
    pub async fn execute(self, token: &CancellationToken) -> (u64, Option<RequestError>) {
        match self {
            Self::Discard(requester) => discard_body(requester.request, token).await,
            Self::WatchList(requester) => discard_body(requester.request, token).await,
            Self::PostDel(requester) => requester.execute(token).await,
        }
    }
}

/// Streams a bounded response body to a discard sink.
pub struct DiscardRequester {
    pub(crate) op: &'static str,
    pub(crate) request: RestRequest,
}

/// Streams an open-ended watch. The server decides when the stream ends;
/// cancellation closes it immediately.
pub struct WatchListRequester {
    pub(crate) request: RestRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PostDelOp {
    Post,
    Delete,
}

/// Create/delete request that keeps its builder's name cache coherent:
/// a successful POST publishes the new name, a failed DELETE restores the
/// popped name since the resource probably still exists server-side.
pub struct PostDelRequester {
    pub(crate) op: PostDelOp,
    pub(crate) name: String,
    pub(crate) cache: Arc<NameCache>,
    pub(crate) inner: DiscardRequester,
}

impl PostDelRequester {
    async fn execute(self, token: &CancellationToken) -> (u64, Option<RequestError>) {
        let (bytes, err) = discard_body(self.inner.request, token).await;
        match self.op {
            PostDelOp::Post => {
                if err.is_none() {
                    self.cache.push(self.name);
                }
            }
            PostDelOp::Delete => {
                if err.is_some() {
                    self.cache.push(self.name);
                }
            }
        }
        (bytes, err)
    }
}

pub(crate) async fn discard_body(
    request: RestRequest,
    token: &CancellationToken,
) -> (u64, Option<RequestError>) {
    let response = tokio::select! {
        result = request.stream() => match result {
            Ok(response) => response,
            Err(err) => return (0, Some(err)),
        },
        () = token.cancelled() => return (0, Some(RequestError::Cancelled)),
    };

    let mut bytes: u64 = 0;
    let mut body = Box::pin(response.bytes_stream());
    loop {
        tokio::select! {
            chunk = body.next() => match chunk {
                Some(Ok(data)) => bytes += data.len() as u64,
                Some(Err(err)) => return (bytes, Some(RequestError::Stream(err))),
                None => return (bytes, None),
            },
            () = token.cancelled() => return (bytes, Some(RequestError::Cancelled)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConfig, build_clients};
    use kload_common::LoadProfileSpec;
    use url::Url;

    fn failing_delete(cache: Arc<NameCache>, name: &str) -> Requester {
        let config = ClientConfig::new(Url::parse("https://127.0.0.1:6443").unwrap());
        let client = build_clients(&LoadProfileSpec::default(), &config)
            .unwrap()
            .remove(0);
        Requester::PostDel(PostDelRequester {
            op: PostDelOp::Delete,
            name: name.to_owned(),
            cache,
            inner: DiscardRequester {
                op: "DELETE",
                request: client.delete().fail("forced failure".into()),
            },
        })
    }

    #[tokio::test]
    async fn failed_delete_restores_the_popped_name() {
        let cache = Arc::new(NameCache::new());
        cache.push("victim".into());
        let popped = cache.pop().unwrap();
        let before = cache.len();

        let token = CancellationToken::new();
        let (bytes, err) = failing_delete(cache.clone(), &popped).execute(&token).await;
        assert_eq!(bytes, 0);
        assert!(err.is_some());
        // The resource probably still exists server-side, so the name
        // must come back and the length match its pre-pop value plus one.
        assert_eq!(cache.len(), before + 1);
        assert_eq!(cache.pop().as_deref(), Some("victim"));
    }
}
