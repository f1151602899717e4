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

use crate::client::RestClient;
use crate::generator::WeightedRandomRequests;
use crate::metrics::{ResponseMetric, ResponseStats};
use governor::{Quota, RateLimiter};
use kload_common::{EngineError, LoadProfileSpec};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Stand-in QPS when the profile asks for an unlimited rate.
const UNLIMITED_QPS: u32 = i32::MAX as u32;

/// Maximum instantaneous credit in the token bucket.
const LIMITER_BURST: u32 = 10;

/// Runs one load profile against the given transport pool and reports
/// aggregated latency, failure and byte statistics.
///
/// Worker `k` binds to `clients[k % clients.len()]`. A single request
/// failure is recorded and the run continues; only cancellation stops the
/// whole schedule, and it surfaces as an error only when nothing ran.
pub async fn schedule(
    token: &CancellationToken,
    spec: &LoadProfileSpec,
    clients: Vec<RestClient>,
) -> Result<ResponseStats, EngineError> {
    let generator = Arc::new(WeightedRandomRequests::new(spec)?);
    if clients.is_empty() {
        return Err(EngineError::Internal("transport pool is empty".into()));
    }
    if token.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    let run_token = token.child_token();

    let qps = if spec.rate == 0 { UNLIMITED_QPS } else { spec.rate };
    let quota = Quota::per_second(NonZeroU32::new(qps).unwrap_or(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(LIMITER_BURST).unwrap_or(NonZeroU32::MIN));
    let limiter = Arc::new(RateLimiter::direct(quota));

    let receiver = generator
        .take_receiver()
        .ok_or_else(|| EngineError::Internal("generator receiver already taken".into()))?;
    let receiver = Arc::new(Mutex::new(receiver));
    let metric = Arc::new(ResponseMetric::new());

    info!(
        rate = spec.rate,
        total = spec.total,
        workers = spec.client,
        conns = clients.len(),
        "starting load run"
    );

    let mut workers: JoinSet<()> = JoinSet::new();
    for index in 0..spec.client {
        let client = clients[index as usize % clients.len()].clone();
        let receiver = receiver.clone();
        let limiter = limiter.clone();
        let metric = metric.clone();
        let run_token = run_token.clone();

        workers.spawn(async move {
            loop {
                let Some(builder) = receiver.lock().await.recv().await else {
                    break;
                };

                // Cancellation beats an available token, like a rate
                // limiter wait on an already-cancelled context.
                tokio::select! {
                    biased;
                    () = run_token.cancelled() => {
                        debug!(worker = index, "limiter wait cancelled, worker exiting");
                        break;
                    }
                    () = limiter.until_ready() => {}
                }

                let requester = builder.build(&client);
                debug!(op = requester.op(), url = %requester.url(), "dispatching request");

                let start = Instant::now();
                let (bytes, err) = requester.execute(&run_token).await;
                metric.observe_latency(start.elapsed().as_secs_f64());
                metric.observe_received_bytes(bytes);
                if let Some(err) = err {
                    debug!(worker = index, "request failed: {err}");
                    metric.observe_failure(err);
                }
            }
        });
    }

    let start = Instant::now();
    generator.run(&run_token, spec.total).await;
    generator.stop();
    while workers.join_next().await.is_some() {}
    let duration = start.elapsed();

    let gathered = metric.gather()?;
    if run_token.is_cancelled() && gathered.observations == 0 {
        return Err(EngineError::Cancelled);
    }

    info!(
        observations = gathered.observations,
        failures = gathered.failure_list.len(),
        received_bytes = gathered.received_bytes,
        duration_secs = duration.as_secs_f64(),
        "load run finished"
    );

    Ok(ResponseStats {
        total: spec.total,
        duration,
        total_received_bytes: gathered.received_bytes,
        percentile_latencies: gathered.latencies,
        failure_list: gathered.failure_list,
    })
}
