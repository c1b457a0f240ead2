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
use async_trait::async_trait;
use log::{debug, error, info};
use riffle_common::constant::StatusCode;
use riffle_common::protocol::{
    AppHeartbeatRequest, CoordinatorService, GetShuffleAssignmentsRequest,
    GetShuffleAssignmentsResponse, GetShuffleServerListResponse, ShuffleServerHeartbeatRequest,
    StatusResponse,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::cluster::application::ApplicationManagerRef;
use crate::cluster::assignment::{AssignmentStrategy, PartitionRangeAssignment};
use crate::cluster::server_node::ServerNode;
use crate::cluster::ClusterManagerRef;
use crate::metric::TOTAL_ASSIGNMENT_FAILED;

#[derive(Clone)]
pub struct DefaultCoordinatorServer {
    cluster_manager: ClusterManagerRef,
    application_manager: ApplicationManagerRef,
    assignment_strategy: Arc<dyn AssignmentStrategy>,
}

impl DefaultCoordinatorServer {
    pub fn new(
        cluster_manager: ClusterManagerRef,
        application_manager: ApplicationManagerRef,
        assignment_strategy: Arc<dyn AssignmentStrategy>,
    ) -> Self {
        Self {
            cluster_manager,
            application_manager,
            assignment_strategy,
        }
    }
}

#[async_trait]
impl CoordinatorService for DefaultCoordinatorServer {
    async fn heartbeat(&self, request: ShuffleServerHeartbeatRequest) -> Result<StatusResponse> {
        let node = ServerNode::from(request);
        self.cluster_manager.add_or_update(node);
        Ok(StatusResponse::success())
    }

    async fn get_shuffle_assignments(
        &self,
        request: GetShuffleAssignmentsRequest,
    ) -> Result<GetShuffleAssignmentsResponse> {
        let app_id = request.app_id;
        let shuffle_id = request.shuffle_id;
        if request.replica <= 0 {
            return Ok(GetShuffleAssignmentsResponse {
                status: StatusCode::INTERNAL_ERROR,
                ret_msg: format!("Illegal replica: {}", request.replica),
                assignments: vec![],
            });
        }
        self.application_manager.refresh_app(&app_id);

        let required_tags: HashSet<String> = request.require_tags.into_iter().collect();
        let assignment = self.assignment_strategy.assign(
            request.partition_num,
            request.partition_num_per_range,
            request.replica as usize,
            &required_tags,
        );

        match &assignment {
            PartitionRangeAssignment::Assigned(_) => {
                info!(
                    "Shuffle servers are assigned for app: {}, shuffle: {}. {}",
                    &app_id, shuffle_id, &assignment
                );
                Ok(GetShuffleAssignmentsResponse {
                    status: StatusCode::SUCCESS,
                    ret_msg: "".to_string(),
                    assignments: assignment.to_range_servers(),
                })
            }
            PartitionRangeAssignment::Failed(err) => {
                TOTAL_ASSIGNMENT_FAILED.inc();
                error!(
                    "Errors on assigning shuffle servers for app: {}, shuffle: {}. err: {}",
                    &app_id, shuffle_id, err
                );
                Ok(GetShuffleAssignmentsResponse {
                    status: StatusCode::INTERNAL_ERROR,
                    ret_msg: format!("Cannot place shuffle, retry later. {}", err),
                    assignments: vec![],
                })
            }
        }
    }

    async fn app_heartbeat(&self, request: AppHeartbeatRequest) -> Result<StatusResponse> {
        debug!("Accepted heartbeat of app: {}", &request.app_id);
        self.application_manager.refresh_app(&request.app_id);
        Ok(StatusResponse::success())
    }

    async fn get_shuffle_server_list(&self) -> Result<GetShuffleServerListResponse> {
        let servers = self
            .cluster_manager
            .get_server_list(&HashSet::new())
            .iter()
            .map(|node| node.to_server_id())
            .collect();
        Ok(GetShuffleServerListResponse { servers })
    }

    async fn get_shuffle_server_num(&self) -> Result<i32> {
        Ok(self.cluster_manager.get_server_num() as i32)
    }
}

#[cfg(test)]
mod tests {
    use crate::cluster::application::ApplicationManager;
    use crate::cluster::assignment::BasicAssignmentStrategy;
    use crate::cluster::ClusterManager;
    use crate::config::Config;
    use crate::service::DefaultCoordinatorServer;
    use anyhow::Result;
    use riffle_common::constant::StatusCode;
    use riffle_common::protocol::{
        AppHeartbeatRequest, CoordinatorService, GetShuffleAssignmentsRequest,
        ShuffleServerHeartbeatRequest,
    };
    use std::sync::Arc;

    fn server() -> (DefaultCoordinatorServer, Arc<ApplicationManager>) {
        let config = Config::default();
        let cluster_manager = ClusterManager::new(&config);
        let application_manager = ApplicationManager::new(&config);
        let strategy = Arc::new(BasicAssignmentStrategy::new(
            cluster_manager.clone(),
            config.shuffle_nodes_max,
        ));
        (
            DefaultCoordinatorServer::new(cluster_manager, application_manager.clone(), strategy),
            application_manager,
        )
    }

    fn heartbeat(id: &str, tags: Vec<String>) -> ShuffleServerHeartbeatRequest {
        ShuffleServerHeartbeatRequest {
            server_id: id.to_string(),
            ip: "127.0.0.1".to_string(),
            port: 19997,
            used_memory: 0,
            pre_allocated_memory: 0,
            available_memory: 1024,
            event_num_in_flush: 0,
            tags,
        }
    }

    fn assignments_request(replica: i32) -> GetShuffleAssignmentsRequest {
        GetShuffleAssignmentsRequest {
            app_id: "app-1".to_string(),
            shuffle_id: 0,
            partition_num: 4,
            partition_num_per_range: 1,
            replica,
            require_tags: vec!["ss_v4".to_string()],
        }
    }

    #[tokio::test]
    async fn assignment_test() -> Result<()> {
        let (server, application_manager) = server();

        // no servers yet
        let response = server.get_shuffle_assignments(assignments_request(1)).await?;
        assert_eq!(StatusCode::INTERNAL_ERROR, response.status);
        assert!(response.ret_msg.contains("retry later"));

        server
            .heartbeat(heartbeat("s1", vec!["ss_v4".to_string()]))
            .await?;
        server
            .heartbeat(heartbeat("s2", vec!["ss_v4".to_string()]))
            .await?;
        server.heartbeat(heartbeat("s3", vec![])).await?;
        assert_eq!(3, server.get_shuffle_server_num().await?);
        assert_eq!(3, server.get_shuffle_server_list().await?.servers.len());

        let response = server.get_shuffle_assignments(assignments_request(2)).await?;
        assert_eq!(StatusCode::SUCCESS, response.status);
        assert_eq!(4, response.assignments.len());
        for range_servers in &response.assignments {
            assert_eq!(2, range_servers.servers.len());
            assert!(range_servers.servers.iter().all(|s| s.id != "s3"));
        }
        assert!(application_manager.get_app("app-1").is_some());

        // only two servers carry the tag
        let response = server.get_shuffle_assignments(assignments_request(3)).await?;
        assert_eq!(StatusCode::INTERNAL_ERROR, response.status);

        let response = server.get_shuffle_assignments(assignments_request(0)).await?;
        assert_eq!(StatusCode::INTERNAL_ERROR, response.status);
        Ok(())
    }

    #[tokio::test]
    async fn app_heartbeat_test() -> Result<()> {
        let (server, application_manager) = server();
        let response = server
            .app_heartbeat(AppHeartbeatRequest {
                app_id: "app-2".to_string(),
            })
            .await?;
        assert_eq!(StatusCode::SUCCESS, response.status);
        assert!(application_manager.get_apps().contains("app-2"));
        Ok(())
    }
}
