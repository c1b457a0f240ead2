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

use anyhow::Result;
use log::{error, warn};
use riffle_common::constant::StatusCode;
use riffle_common::error::RiffleError;
use riffle_common::protocol::{
    AppHeartbeatRequest, CoordinatorService, GetShuffleAssignmentsRequest,
    GetShuffleAssignmentsResponse, PartitionRange, ShuffleServerHeartbeatRequest,
    ShuffleServerId,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Placement of one shuffle, indexed both ways.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShuffleAssignmentsInfo {
    pub partition_to_servers: HashMap<i32, Vec<ShuffleServerId>>,
    pub server_to_partition_ranges: HashMap<ShuffleServerId, Vec<PartitionRange>>,
}

impl ShuffleAssignmentsInfo {
    pub fn from(response: &GetShuffleAssignmentsResponse) -> Result<Self, RiffleError> {
        let mut info = ShuffleAssignmentsInfo::default();
        for assignment in &response.assignments {
            for partition_id in assignment.range.start..=assignment.range.end {
                if !assignment.servers.is_empty() {
                    info.partition_to_servers
                        .insert(partition_id, assignment.servers.clone());
                }
            }
            for server in &assignment.servers {
                info.server_to_partition_ranges
                    .entry(server.clone())
                    .or_default()
                    .push(assignment.range);
            }
        }
        if info.partition_to_servers.is_empty() {
            return Err(RiffleError::EMPTY_ASSIGNMENT);
        }
        Ok(info)
    }
}

/// Client side of the coordinator. Every call runs under the rpc timeout, and transport
/// failures are reported as `TIMEOUT` or `INTERNAL_ERROR`.
#[derive(Clone)]
pub struct CoordinatorClient {
    service: Arc<dyn CoordinatorService>,
    rpc_timeout: Duration,
}

impl CoordinatorClient {
    pub fn new(service: Arc<dyn CoordinatorService>, rpc_timeout: Duration) -> Self {
        Self {
            service,
            rpc_timeout,
        }
    }

    async fn invoke<T, F>(&self, rpc_name: &str, future: F) -> Result<T, RiffleError>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.rpc_timeout, future).await {
            Err(_) => {
                warn!(
                    "Rpc: {} to coordinator timed out after {:?}",
                    rpc_name, self.rpc_timeout
                );
                Err(RiffleError::RPC_FAILED(
                    StatusCode::TIMEOUT,
                    format!("{} timed out", rpc_name),
                ))
            }
            Ok(Err(err)) => {
                error!("Errors on rpc: {} to coordinator. err: {:?}", rpc_name, err);
                Err(RiffleError::RPC_FAILED(
                    StatusCode::INTERNAL_ERROR,
                    err.to_string(),
                ))
            }
            Ok(Ok(value)) => Ok(value),
        }
    }

    pub async fn send_heartbeat(&self, request: ShuffleServerHeartbeatRequest) -> StatusCode {
        match self
            .invoke("heartbeat", self.service.heartbeat(request))
            .await
        {
            Ok(response) => response.status,
            Err(err) => status_of(&err),
        }
    }

    pub async fn send_app_heartbeat(&self, app_id: &str) -> StatusCode {
        let request = AppHeartbeatRequest {
            app_id: app_id.to_string(),
        };
        match self
            .invoke("app_heartbeat", self.service.app_heartbeat(request))
            .await
        {
            Ok(response) => response.status,
            Err(err) => status_of(&err),
        }
    }

    pub async fn get_shuffle_assignments(
        &self,
        request: GetShuffleAssignmentsRequest,
    ) -> Result<ShuffleAssignmentsInfo, RiffleError> {
        let response = self
            .invoke(
                "get_shuffle_assignments",
                self.service.get_shuffle_assignments(request),
            )
            .await?;
        if !response.status.is_success() {
            return Err(RiffleError::RPC_FAILED(response.status, response.ret_msg));
        }
        ShuffleAssignmentsInfo::from(&response)
    }

    pub async fn get_shuffle_server_num(&self) -> Result<i32, RiffleError> {
        self.invoke(
            "get_shuffle_server_num",
            self.service.get_shuffle_server_num(),
        )
        .await
    }
}

fn status_of(err: &RiffleError) -> StatusCode {
    match err {
        RiffleError::RPC_FAILED(status, _) => *status,
        _ => StatusCode::INTERNAL_ERROR,
    }
}
