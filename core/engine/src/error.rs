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

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of one request. Recorded in the final failure list, never
/// propagated out of a worker.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request could not be constructed, e.g. the payload template
    /// failed to render or the query parameters did not encode.
    #[error("failed to build request: {0}")]
    Build(String),

    /// Connection-level failure before a response arrived, including the
    /// per-request timeout.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    Status { status: StatusCode, url: String },

    /// The body stream broke mid-flight. Bytes read so far still count.
    #[error("response stream interrupted: {0}")]
    Stream(#[source] reqwest::Error),

    /// The run was cancelled while the request was in flight.
    #[error("request cancelled")]
    Cancelled,
}

impl RequestError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
