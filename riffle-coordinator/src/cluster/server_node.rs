// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use chrono::Utc;
use riffle_common::protocol::{ShuffleServerHeartbeatRequest, ShuffleServerId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// Snapshot of a shuffle server as of its latest heartbeat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerNode {
    pub id: String,
    pub ip: String,
    pub port: i32,

    // Resource state
    pub used_memory: i64,
    pub pre_allocated_memory: i64,
    pub available_memory: i64,
    pub event_num_in_flush: i32,

    // Wall clock millis of the heartbeat this snapshot came from
    pub timestamp: i64,

    pub tags: HashSet<String>,
}

impl ServerNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        ip: &str,
        port: i32,
        used_memory: i64,
        pre_allocated_memory: i64,
        available_memory: i64,
        event_num_in_flush: i32,
        tags: HashSet<String>,
    ) -> Self {
        Self {
            id: id.to_string(),
            ip: ip.to_string(),
            port,
            used_memory,
            pre_allocated_memory,
            available_memory,
            event_num_in_flush,
            timestamp: Utc::now().timestamp_millis(),
            tags,
        }
    }

    pub fn total_memory(&self) -> i64 {
        self.used_memory + self.pre_allocated_memory + self.available_memory
    }

    pub fn matches_tags(&self, required_tags: &HashSet<String>) -> bool {
        required_tags.iter().all(|tag| self.tags.contains(tag))
    }

    pub fn is_expired(&self, now_millis: i64, heartbeat_timeout_ms: i64) -> bool {
        now_millis - self.timestamp > heartbeat_timeout_ms
    }

    /// Replica selection order: more available memory first, then fewer flushing
    /// events, then id.
    pub fn cmp_for_assignment(&self, other: &ServerNode) -> Ordering {
        other
            .available_memory
            .cmp(&self.available_memory)
            .then_with(|| self.event_num_in_flush.cmp(&other.event_num_in_flush))
            .then_with(|| self.id.cmp(&other.id))
    }

    pub fn to_server_id(&self) -> ShuffleServerId {
        ShuffleServerId {
            id: self.id.clone(),
            ip: self.ip.clone(),
            port: self.port,
        }
    }
}

impl From<ShuffleServerHeartbeatRequest> for ServerNode {
    fn from(request: ShuffleServerHeartbeatRequest) -> Self {
        ServerNode::new(
            &request.server_id,
            &request.ip,
            request.port,
            request.used_memory,
            request.pre_allocated_memory,
            request.available_memory,
            request.event_num_in_flush,
            request.tags.into_iter().collect(),
        )
    }
}

impl fmt::Display for ServerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServerNode[id={}, ip={}, port={}, usedMemory={}, preAllocatedMemory={}, availableMemory={}, eventNumInFlush={}, tags={:?}]",
            self.id,
            self.ip,
            self.port,
            self.used_memory,
            self.pre_allocated_memory,
            self.available_memory,
            self.event_num_in_flush,
            self.tags
        )
    }
}
