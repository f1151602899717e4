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

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// FIFO of resource names known to exist server-side. Each post/delete
/// builder owns one; requesters push on POST success and push back on
/// DELETE failure so the content converges to the true set of live names.
#[derive(Debug, Default)]
pub struct NameCache {
    names: Mutex<VecDeque<String>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a name to the tail.
    pub fn push(&self, name: String) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(name);
    }

    /// Removes and returns the oldest name, or `None` when empty.
    pub fn pop(&self) -> Option<String> {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
