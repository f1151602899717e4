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

//! Load-generation engine for a Kubernetes API server: turns a declarative
//! load profile into a weighted-random stream of typed REST requests,
//! dispatches them across a fixed transport pool under a shared token
//! bucket, and aggregates latency, failure and byte statistics.

mod builder;
mod cache;
mod client;
mod error;
mod generator;
mod metrics;
mod options;
mod requester;
mod schedule;
mod template;

pub use builder::RequestBuilder;
pub use cache::NameCache;
pub use client::{ClientConfig, RestClient, RestRequest, build_clients};
pub use error::RequestError;
pub use generator::WeightedRandomRequests;
pub use metrics::{GatheredMetrics, PercentileLatencies, ResponseMetric, ResponseStats};
pub use options::{GetOptions, ListOptions, PodLogOptions};
pub use requester::{DiscardRequester, PostDelRequester, Requester, WatchListRequester};
pub use schedule::schedule;
pub use template::{TemplateError, TemplateParams, render_template};
