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

use crate::error::RequestError;
use kload_common::EngineError;
use serde::{Serialize, Serializer};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

/// Latency summary at the quantiles a benchmark report cares about.
/// Computed from the raw series, so the values are exact order statistics
/// rather than estimates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PercentileLatencies {
    pub p0: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub p100: f64,
}

impl PercentileLatencies {
    fn from_sorted(sorted: &[f64]) -> Self {
        let Some(last) = sorted.last() else {
            return Self::default();
        };
        let nearest_rank = |quantile: f64| {
            let rank = (quantile * sorted.len() as f64).ceil() as usize;
            sorted[rank.clamp(1, sorted.len()) - 1]
        };
        Self {
            p0: sorted[0],
            p50: nearest_rank(0.5),
            p90: nearest_rank(0.9),
            p95: nearest_rank(0.95),
            p99: nearest_rank(0.99),
            p100: *last,
        }
    }
}

/// Everything the sink accumulated over one run.
#[derive(Debug)]
pub struct GatheredMetrics {
    pub latencies: PercentileLatencies,
    pub failure_list: Vec<RequestError>,
    pub received_bytes: u64,
    /// Number of latency observations, i.e. requests that ran to an
    /// outcome (success or failure).
    pub observations: u64,
}

/// Thread-safe accumulator for per-request observations. Counters are
/// atomics; the latency series and the failure list sit behind mutexes
/// with short critical sections.
#[derive(Debug, Default)]
pub struct ResponseMetric {
    latencies: Mutex<Vec<f64>>,
    failures: Mutex<Vec<RequestError>>,
    failure_count: AtomicU64,
    received_bytes: AtomicU64,
}

impl ResponseMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_latency(&self, seconds: f64) {
        self.latencies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(seconds);
    }

    pub fn observe_failure(&self, err: RequestError) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(err);
    }

    pub fn observe_received_bytes(&self, count: u64) {
        self.received_bytes.fetch_add(count, Ordering::Relaxed);
    }

    /// Drains the sink into a summary. Called once at end-of-run; a
    /// poisoned series (a worker panicked mid-observation) is the only
    /// failure mode.
    pub fn gather(&self) -> Result<GatheredMetrics, EngineError> {
        let mut series = self
            .latencies
            .lock()
            .map_err(|_| EngineError::Internal("latency series poisoned".into()))?
            .split_off(0);
        let failure_list = self
            .failures
            .lock()
            .map_err(|_| EngineError::Internal("failure list poisoned".into()))?
            .split_off(0);

        let counted = self.failure_count.load(Ordering::Relaxed);
        if counted != failure_list.len() as u64 {
            // The list is authoritative; the counter is a cross-check.
            warn!(
                counted,
                listed = failure_list.len(),
                "failure counter diverged from failure list"
            );
        }

        series.sort_unstable_by(f64::total_cmp);
        Ok(GatheredMetrics {
            latencies: PercentileLatencies::from_sorted(&series),
            failure_list,
            received_bytes: self.received_bytes.load(Ordering::Relaxed),
            observations: series.len() as u64,
        })
    }
}

/// Final report of one engine run. `total` echoes the configured request
/// count; the observation-derived fields tell the actually-run story.
#[derive(Debug, Serialize)]
pub struct ResponseStats {
    pub total: u64,
    pub duration: Duration,
    pub total_received_bytes: u64,
    pub percentile_latencies: PercentileLatencies,
    #[serde(serialize_with = "failures_as_strings")]
    pub failure_list: Vec<RequestError>,
}

impl ResponseStats {
    pub fn failure_count(&self) -> usize {
        self.failure_list.len()
    }
}

fn failures_as_strings<S: Serializer>(
    failures: &[RequestError],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(failures.iter().map(ToString::to_string))
}
