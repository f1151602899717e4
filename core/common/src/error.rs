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

use thiserror::Error;

/// Rejection of a load profile before any request is issued.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse load profile: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("profile version {0} is not supported")]
    UnsupportedVersion(u32),

    #[error("requests must not be empty")]
    NoRequests,

    #[error("client must be at least 1")]
    NoClients,

    #[error("conns must be at least 1")]
    NoConns,

    #[error("request #{index}: shares must be positive")]
    ZeroShares { index: usize },

    #[error("request #{index}: {field} must not be empty")]
    MissingField { index: usize, field: &'static str },

    #[error("request #{index}: keySpaceSize must be at least 1")]
    ZeroKeySpace { index: usize },

    #[error("request #{index}: deleteRatio {ratio} is outside [0, 1]")]
    DeleteRatioOutOfRange { index: usize, ratio: f64 },
}

/// Outcome of a whole engine run. Individual request failures are never
/// surfaced here; they land in the final stats instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid load profile: {0}")]
    Config(#[from] ConfigError),

    #[error("run cancelled before any request completed")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}
