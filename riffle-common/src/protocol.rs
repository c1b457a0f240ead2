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

//! Request and response shapes exchanged with the network layer, independent of any
//! transport. A transport binding converts its wire messages into these structs and calls
//! the service traits below.

use crate::constant::StatusCode;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Inclusive interval of partition ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionRange {
    pub start: i32,
    pub end: i32,
}

impl PartitionRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, partition_id: i32) -> bool {
        partition_id >= self.start && partition_id <= self.end
    }

    pub fn partition_num(&self) -> i32 {
        self.end - self.start + 1
    }
}

impl fmt::Display for PartitionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionRange[{}, {}]", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse {
    pub status: StatusCode,
    pub ret_msg: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: StatusCode::SUCCESS,
            ret_msg: "".to_string(),
        }
    }

    pub fn failure(status: StatusCode, ret_msg: impl Into<String>) -> Self {
        Self {
            status,
            ret_msg: ret_msg.into(),
        }
    }
}

// ==================== Shuffle server ====================

#[derive(Debug, Clone)]
pub struct RegisterShuffleRequest {
    pub app_id: String,
    pub shuffle_id: i32,
    pub partition_ranges: Vec<PartitionRange>,
}

#[derive(Debug, Clone)]
pub struct ReportShuffleResultRequest {
    pub app_id: String,
    pub shuffle_id: i32,
    pub task_attempt_id: i64,
    pub bitmap_num: i32,
    pub partition_to_block_ids: HashMap<i32, Vec<i64>>,
}

#[derive(Debug, Clone)]
pub struct GetShuffleResultRequest {
    pub app_id: String,
    pub shuffle_id: i32,
    pub partition_id: i32,
}

#[derive(Debug, Clone)]
pub struct GetShuffleResultForMultiPartRequest {
    pub app_id: String,
    pub shuffle_id: i32,
    pub partitions: Vec<i32>,
}

#[derive(Debug, Clone)]
pub struct GetShuffleResultResponse {
    pub status: StatusCode,
    pub ret_msg: String,
    pub serialized_bitmap: Bytes,
}

#[derive(Debug, Clone)]
pub struct AppHeartbeatRequest {
    pub app_id: String,
}

#[derive(Debug, Clone)]
pub struct UnregisterShuffleRequest {
    pub app_id: String,
    pub shuffle_id: i32,
}

#[derive(Debug, Clone)]
pub struct UnregisterAppRequest {
    pub app_id: String,
}

#[async_trait]
pub trait ShuffleServerService: Send + Sync {
    async fn register_shuffle(&self, request: RegisterShuffleRequest) -> Result<StatusResponse>;

    async fn report_shuffle_result(
        &self,
        request: ReportShuffleResultRequest,
    ) -> Result<StatusResponse>;

    async fn get_shuffle_result(
        &self,
        request: GetShuffleResultRequest,
    ) -> Result<GetShuffleResultResponse>;

    async fn get_shuffle_result_for_multi_part(
        &self,
        request: GetShuffleResultForMultiPartRequest,
    ) -> Result<GetShuffleResultResponse>;

    async fn app_heartbeat(&self, request: AppHeartbeatRequest) -> Result<StatusResponse>;

    async fn unregister_shuffle(
        &self,
        request: UnregisterShuffleRequest,
    ) -> Result<StatusResponse>;

    async fn unregister_app(&self, request: UnregisterAppRequest) -> Result<StatusResponse>;
}

// ==================== Coordinator ====================

#[derive(Debug, Clone)]
pub struct ShuffleServerHeartbeatRequest {
    pub server_id: String,
    pub ip: String,
    pub port: i32,
    pub used_memory: i64,
    pub pre_allocated_memory: i64,
    pub available_memory: i64,
    pub event_num_in_flush: i32,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShuffleServerId {
    pub id: String,
    pub ip: String,
    pub port: i32,
}

#[derive(Debug, Clone)]
pub struct GetShuffleAssignmentsRequest {
    pub app_id: String,
    pub shuffle_id: i32,
    pub partition_num: i32,
    pub partition_num_per_range: i32,
    pub replica: i32,
    pub require_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionRangeServers {
    pub range: PartitionRange,
    pub servers: Vec<ShuffleServerId>,
}

#[derive(Debug, Clone)]
pub struct GetShuffleAssignmentsResponse {
    pub status: StatusCode,
    pub ret_msg: String,
    pub assignments: Vec<PartitionRangeServers>,
}

#[derive(Debug, Clone)]
pub struct GetShuffleServerListResponse {
    pub servers: Vec<ShuffleServerId>,
}

#[async_trait]
pub trait CoordinatorService: Send + Sync {
    async fn heartbeat(&self, request: ShuffleServerHeartbeatRequest) -> Result<StatusResponse>;

    async fn get_shuffle_assignments(
        &self,
        request: GetShuffleAssignmentsRequest,
    ) -> Result<GetShuffleAssignmentsResponse>;

    async fn app_heartbeat(&self, request: AppHeartbeatRequest) -> Result<StatusResponse>;

    async fn get_shuffle_server_list(&self) -> Result<GetShuffleServerListResponse>;

    async fn get_shuffle_server_num(&self) -> Result<i32>;
}

#[cfg(test)]
mod tests {
    use crate::protocol::PartitionRange;

    #[test]
    fn partition_range_test() {
        let range = PartitionRange::new(2, 4);
        assert!(range.contains(2));
        assert!(range.contains(4));
        assert!(!range.contains(5));
        assert_eq!(3, range.partition_num());
        assert_eq!("PartitionRange[2, 4]", range.to_string());

        let mut ranges = vec![PartitionRange::new(4, 5), PartitionRange::new(0, 1)];
        ranges.sort();
        assert_eq!(PartitionRange::new(0, 1), ranges[0]);
    }
}
