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

use crate::builder::{RequestBuilder, builder_for};
use kload_common::{ConfigError, LoadProfileSpec, Validatable};
use rand::SeedableRng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Produces a weighted-random stream of request builders over a capacity-1
/// hand-off channel, so the generator only runs as fast as workers
/// consume. Buffering here would let bursts bypass limiter pressure.
pub struct WeightedRandomRequests {
    token: CancellationToken,
    dist: WeightedIndex<u32>,
    builders: Vec<Arc<dyn RequestBuilder>>,
    sender: Mutex<Option<mpsc::Sender<Arc<dyn RequestBuilder>>>>,
    receiver: Mutex<Option<mpsc::Receiver<Arc<dyn RequestBuilder>>>>,
}

impl WeightedRandomRequests {
    /// Validates the profile and prepares one builder per request entry.
    pub fn new(spec: &LoadProfileSpec) -> Result<Self, ConfigError> {
        spec.validate()?;

        let shares: Vec<u32> = spec.requests.iter().map(|request| request.shares).collect();
        let builders: Vec<Arc<dyn RequestBuilder>> = spec
            .requests
            .iter()
            .map(|request| builder_for(&request.kind, spec.max_retries))
            .collect();
        // Validation guarantees at least one positive share.
        let dist = WeightedIndex::new(&shares).map_err(|_| ConfigError::NoRequests)?;

        let (sender, receiver) = mpsc::channel(1);
        Ok(Self {
            token: CancellationToken::new(),
            dist,
            builders,
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// Hands out the consuming end of the channel. Yields once.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<Arc<dyn RequestBuilder>>> {
        self.receiver
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }

    /// Feeds the channel until `total` builders were handed off, or
    /// forever when `total` is zero, or until either token cancels. The
    /// channel stays open; closing is `stop`'s job.
    pub async fn run(&self, ctx: &CancellationToken, total: u64) {
        let Some(sender) = self
            .sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
        else {
            return;
        };

        let mut rng = StdRng::from_os_rng();
        let mut sent: u64 = 0;
        loop {
            if total > 0 && sent >= total {
                break;
            }
            let builder = self.builders[self.dist.sample(&mut rng)].clone();
            tokio::select! {
                result = sender.send(builder) => {
                    if result.is_err() {
                        break;
                    }
                    sent += 1;
                }
                () = self.token.cancelled() => break,
                () = ctx.cancelled() => break,
            }
        }
    }

    /// Cancels the generator and closes the hand-off channel so draining
    /// workers observe end-of-stream. Safe to call more than once.
    pub fn stop(&self) {
        self.token.cancel();
        self.sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
    }
}
