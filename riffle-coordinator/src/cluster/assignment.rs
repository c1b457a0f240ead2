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

use super::server_node::ServerNode;
use crate::cluster::ClusterManagerRef;
use log::warn;
use rand::seq::SliceRandom;
use riffle_common::protocol::{PartitionRange, PartitionRangeServers};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssignmentError {
    #[error("No available servers for assignment")]
    NoAvailableServers,

    #[error("Insufficient servers for replication: required {required}, available {available}")]
    InsufficientServersForReplication { required: usize, available: usize },
}

/// Servers chosen for every partition range of a shuffle, ordered by range start.
#[derive(Clone, Debug)]
pub enum PartitionRangeAssignment {
    Assigned(BTreeMap<PartitionRange, Vec<ServerNode>>),
    Failed(AssignmentError),
}

impl PartitionRangeAssignment {
    pub fn is_assigned(&self) -> bool {
        matches!(self, PartitionRangeAssignment::Assigned(_))
    }

    pub fn assignments(&self) -> Option<&BTreeMap<PartitionRange, Vec<ServerNode>>> {
        match self {
            PartitionRangeAssignment::Assigned(assignments) => Some(assignments),
            PartitionRangeAssignment::Failed(_) => None,
        }
    }

    pub fn to_range_servers(&self) -> Vec<PartitionRangeServers> {
        match self {
            PartitionRangeAssignment::Assigned(assignments) => assignments
                .iter()
                .map(|(range, nodes)| PartitionRangeServers {
                    range: *range,
                    servers: nodes.iter().map(|node| node.to_server_id()).collect(),
                })
                .collect(),
            PartitionRangeAssignment::Failed(_) => vec![],
        }
    }
}

impl fmt::Display for PartitionRangeAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionRangeAssignment::Assigned(assignments) => {
                for (range, nodes) in assignments {
                    let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
                    write!(f, "{} -> servers={:?}; ", range, ids)?;
                }
                Ok(())
            }
            PartitionRangeAssignment::Failed(err) => write!(f, "Failed({})", err),
        }
    }
}

pub trait AssignmentStrategy: Send + Sync {
    /// Never fails hard. Shortage of servers is returned as [`PartitionRangeAssignment::Failed`]
    /// and the caller decides whether to retry.
    fn assign(
        &self,
        total_partition_num: i32,
        partition_num_per_range: i32,
        replica: usize,
        required_tags: &HashSet<String>,
    ) -> PartitionRangeAssignment;
}

/// Splits `[0, total_partition_num)` into inclusive ranges of `partition_num_per_range`
/// partitions. The last range may be smaller.
pub fn generate_ranges(
    total_partition_num: i32,
    partition_num_per_range: i32,
) -> Vec<PartitionRange> {
    if total_partition_num <= 0 || partition_num_per_range <= 0 {
        return vec![];
    }
    (0..total_partition_num)
        .step_by(partition_num_per_range as usize)
        .map(|start| {
            let end = std::cmp::min(
                start as i64 + partition_num_per_range as i64 - 1,
                total_partition_num as i64 - 1,
            );
            PartitionRange::new(start, end as i32)
        })
        .collect()
}

/// Picks the servers with the most available memory and walks them round-robin across
/// all ranges.
pub struct BasicAssignmentStrategy {
    cluster_manager: ClusterManagerRef,
    shuffle_nodes_max: usize,
}

impl BasicAssignmentStrategy {
    pub fn new(cluster_manager: ClusterManagerRef, shuffle_nodes_max: usize) -> Self {
        Self {
            cluster_manager,
            shuffle_nodes_max,
        }
    }

    fn get_required_servers(&self, required_tags: &HashSet<String>) -> Vec<ServerNode> {
        let mut servers = self.cluster_manager.get_server_list(required_tags);
        // all servers look alike right after startup, avoid always picking the same ones
        servers.shuffle(&mut rand::thread_rng());
        servers.sort_by(|a, b| a.cmp_for_assignment(b));
        if self.shuffle_nodes_max > servers.len() {
            warn!(
                "Can't get expected servers [{}] and found only [{}]",
                self.shuffle_nodes_max,
                servers.len()
            );
        }
        servers.truncate(self.shuffle_nodes_max);
        servers
    }
}

impl AssignmentStrategy for BasicAssignmentStrategy {
    fn assign(
        &self,
        total_partition_num: i32,
        partition_num_per_range: i32,
        replica: usize,
        required_tags: &HashSet<String>,
    ) -> PartitionRangeAssignment {
        let ranges = generate_ranges(total_partition_num, partition_num_per_range);
        let servers = self.get_required_servers(required_tags);

        if servers.is_empty() {
            return PartitionRangeAssignment::Failed(AssignmentError::NoAvailableServers);
        }
        if servers.len() < replica {
            return PartitionRangeAssignment::Failed(
                AssignmentError::InsufficientServersForReplication {
                    required: replica,
                    available: servers.len(),
                },
            );
        }

        let mut assignments = BTreeMap::new();
        let mut idx = 0;
        for range in ranges {
            let mut nodes = Vec::with_capacity(replica);
            for _ in 0..replica {
                nodes.push(servers[idx].clone());
                idx = (idx + 1) % servers.len();
            }
            assignments.insert(range, nodes);
        }
        PartitionRangeAssignment::Assigned(assignments)
    }
}

#[cfg(test)]
mod tests {
    use crate::cluster::assignment::{
        generate_ranges, AssignmentError, AssignmentStrategy, BasicAssignmentStrategy,
        PartitionRangeAssignment,
    };
    use crate::cluster::server_node::ServerNode;
    use crate::cluster::ClusterManager;
    use crate::config::Config;
    use riffle_common::protocol::PartitionRange;
    use std::collections::HashSet;

    fn tags() -> HashSet<String> {
        ["test".to_string()].into_iter().collect()
    }

    fn strategy_with_nodes(node_num: i64, shuffle_nodes_max: usize) -> BasicAssignmentStrategy {
        let manager = ClusterManager::new(&Config::default());
        for i in 0..node_num {
            manager.add_or_update(ServerNode::new(
                &format!("sn{}", i),
                "ip",
                0,
                0,
                0,
                100 - i,
                0,
                tags(),
            ));
        }
        BasicAssignmentStrategy::new(manager, shuffle_nodes_max)
    }

    #[test]
    fn generate_ranges_test() {
        assert_eq!(
            vec![
                PartitionRange::new(0, 2),
                PartitionRange::new(3, 5),
                PartitionRange::new(6, 6)
            ],
            generate_ranges(7, 3)
        );
        assert_eq!(vec![PartitionRange::new(0, 0)], generate_ranges(1, 1));
        assert!(generate_ranges(0, 3).is_empty());
        assert!(generate_ranges(5, 0).is_empty());
        assert!(generate_ranges(-1, -1).is_empty());
    }

    #[test]
    fn round_robin_across_ranges_test() {
        let strategy = strategy_with_nodes(5, 9);
        let assignment = strategy.assign(8, 2, 2, &tags());
        let assignments = assignment.assignments().unwrap();
        assert_eq!(4, assignments.len());

        let picked: Vec<Vec<String>> = assignments
            .values()
            .map(|nodes| nodes.iter().map(|n| n.id.clone()).collect())
            .collect();
        // sorted by available memory desc: sn0..sn4, the index keeps advancing
        assert_eq!(vec!["sn0", "sn1"], picked[0]);
        assert_eq!(vec!["sn2", "sn3"], picked[1]);
        assert_eq!(vec!["sn4", "sn0"], picked[2]);
        assert_eq!(vec!["sn1", "sn2"], picked[3]);

        let range_servers = assignment.to_range_servers();
        assert_eq!(PartitionRange::new(0, 1), range_servers[0].range);
        assert_eq!(2, range_servers[0].servers.len());
    }

    #[test]
    fn shuffle_nodes_max_test() {
        let strategy = strategy_with_nodes(5, 2);
        let assignment = strategy.assign(10, 1, 1, &tags());
        let used: HashSet<String> = assignment
            .assignments()
            .unwrap()
            .values()
            .flatten()
            .map(|n| n.id.clone())
            .collect();
        let expected: HashSet<String> = ["sn0".to_string(), "sn1".to_string()].into_iter().collect();
        assert_eq!(expected, used);
    }

    #[test]
    fn insufficient_servers_test() {
        let strategy = strategy_with_nodes(0, 9);
        match strategy.assign(10, 1, 1, &tags()) {
            PartitionRangeAssignment::Failed(AssignmentError::NoAvailableServers) => {}
            _ => panic!("no server must fail the assignment"),
        }

        let strategy = strategy_with_nodes(2, 9);
        let assignment = strategy.assign(10, 1, 3, &tags());
        assert!(!assignment.is_assigned());
        assert!(assignment.to_range_servers().is_empty());
        match assignment {
            PartitionRangeAssignment::Failed(
                AssignmentError::InsufficientServersForReplication {
                    required,
                    available,
                },
            ) => {
                assert_eq!(3, required);
                assert_eq!(2, available);
            }
            _ => panic!(),
        }

        // required tags filter out every server
        let other_tags: HashSet<String> = ["other".to_string()].into_iter().collect();
        assert!(!strategy.assign(10, 1, 1, &other_tags).is_assigned());
    }

    #[test]
    fn empty_ranges_test() {
        let strategy = strategy_with_nodes(3, 9);
        let assignment = strategy.assign(0, 1, 1, &tags());
        assert!(assignment.is_assigned());
        assert!(assignment.assignments().unwrap().is_empty());
    }
}
