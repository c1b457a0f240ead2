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
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::server_node::ServerNode;
use crate::config::Config;
use crate::metric::{
    GAUGE_EXCLUDED_SERVER_NUMBER, GAUGE_SERVER_NUMBER, TOTAL_TIMEOUT_REMOVED_SERVER,
};

pub type ClusterManagerRef = Arc<ClusterManager>;

/// Tracks the live shuffle servers, their tag index and the exclude list.
pub struct ClusterManager {
    servers: DashMap<String, ServerNode>,

    // tag -> ids of the servers carrying it
    tag_to_nodes: DashMap<String, HashSet<String>>,

    exclude_nodes: RwLock<Arc<HashSet<String>>>,
    // raw bytes of the latest loaded exclude file
    exclude_nodes_content: Mutex<Option<Vec<u8>>>,

    heartbeat_timeout_ms: i64,
    node_expiry_check_interval: Duration,
    exclude_nodes_file_path: Option<PathBuf>,
    exclude_nodes_check_interval: Duration,
}

impl ClusterManager {
    /// Creates the manager without any background task.
    pub fn new(config: &Config) -> ClusterManagerRef {
        let manager = Self {
            servers: DashMap::new(),
            tag_to_nodes: DashMap::new(),
            exclude_nodes: RwLock::new(Arc::new(HashSet::new())),
            exclude_nodes_content: Mutex::new(None),
            heartbeat_timeout_ms: config.heartbeat_timeout_ms as i64,
            node_expiry_check_interval: Duration::from_millis(
                config.node_expiry_check_interval_ms,
            ),
            exclude_nodes_file_path: config.exclude_nodes_file_path.as_ref().map(PathBuf::from),
            exclude_nodes_check_interval: Duration::from_millis(
                config.exclude_nodes_check_interval_ms,
            ),
        };
        manager.refresh_exclude_nodes();
        Arc::new(manager)
    }

    /// Creates the manager and spawns the expiry checker and the exclude list refresher
    /// on the current tokio runtime.
    pub fn start(config: &Config) -> ClusterManagerRef {
        let manager = Self::new(config);

        let manager_cloned = manager.clone();
        tokio::spawn(async move {
            info!("Starting shuffle server expiry checker...");
            loop {
                tokio::time::sleep(manager_cloned.node_expiry_check_interval).await;
                manager_cloned.nodes_check(Utc::now().timestamp_millis());
            }
        });

        if manager.exclude_nodes_file_path.is_some() {
            let manager_cloned = manager.clone();
            tokio::spawn(async move {
                info!("Starting exclude nodes refresher...");
                loop {
                    tokio::time::sleep(manager_cloned.exclude_nodes_check_interval).await;
                    let manager = manager_cloned.clone();
                    if let Err(err) =
                        tokio::task::spawn_blocking(move || manager.refresh_exclude_nodes()).await
                    {
                        warn!("Errors on refreshing exclude nodes. err: {}", err);
                    }
                }
            });
        }

        manager
    }

    // ==================== Heartbeat Handling ====================

    /// Replaces any previous snapshot of the same server, stamps the heartbeat time
    /// and re-indexes its tags.
    pub fn add_or_update(&self, node: ServerNode) {
        self.add_or_update_at(node, Utc::now().timestamp_millis());
    }

    pub(crate) fn add_or_update_at(&self, mut node: ServerNode, now_millis: i64) {
        let server_id = node.id.clone();
        // the entry guard serialises updates of the same server
        match self.servers.entry(server_id.clone()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.get();
                // never move the heartbeat time backwards
                node.timestamp = now_millis.max(previous.timestamp);
                let stale_tags: Vec<String> =
                    previous.tags.difference(&node.tags).cloned().collect();
                let new_tags: Vec<String> =
                    node.tags.difference(&previous.tags).cloned().collect();
                for tag in &stale_tags {
                    self.unindex_tag(tag, &server_id);
                }
                for tag in &new_tags {
                    self.index_tag(tag, &server_id);
                }
                debug!("Shuffle server heartbeat: {}", &node);
                entry.insert(node);
            }
            Entry::Vacant(entry) => {
                node.timestamp = now_millis;
                for tag in &node.tags {
                    self.index_tag(tag, &server_id);
                }
                info!("New shuffle server registered: {}", &node);
                entry.insert(node);
            }
        }
        GAUGE_SERVER_NUMBER.set(self.servers.len() as i64);
    }

    fn index_tag(&self, tag: &str, server_id: &str) {
        self.tag_to_nodes
            .entry(tag.to_string())
            .or_insert_with(HashSet::new)
            .insert(server_id.to_string());
    }

    fn unindex_tag(&self, tag: &str, server_id: &str) {
        if let Some(mut ids) = self.tag_to_nodes.get_mut(tag) {
            ids.remove(server_id);
        }
        self.tag_to_nodes.remove_if(tag, |_, ids| ids.is_empty());
    }

    // ==================== Server Query ====================

    /// Returns the live, non-excluded servers carrying every required tag.
    pub fn get_server_list(&self, required_tags: &HashSet<String>) -> Vec<ServerNode> {
        let now = Utc::now().timestamp_millis();
        let exclude_nodes = self.get_exclude_nodes();
        self.servers
            .iter()
            .filter(|entry| {
                let node = entry.value();
                !node.is_expired(now, self.heartbeat_timeout_ms)
                    && !exclude_nodes.contains(&node.id)
                    && node.matches_tags(required_tags)
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn get_server_num(&self) -> usize {
        self.get_server_list(&HashSet::new()).len()
    }

    pub fn get_server_by_id(&self, server_id: &str) -> Option<ServerNode> {
        self.servers.get(server_id).map(|entry| entry.value().clone())
    }

    pub fn get_tag_to_nodes(&self) -> HashMap<String, HashSet<String>> {
        self.tag_to_nodes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    // ==================== Expiry ====================

    /// Removes servers whose latest heartbeat is older than the timeout.
    pub fn nodes_check(&self, now_millis: i64) -> Vec<String> {
        let candidates: Vec<String> = self
            .servers
            .iter()
            .filter(|entry| entry.value().is_expired(now_millis, self.heartbeat_timeout_ms))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = vec![];
        for server_id in candidates {
            // a heartbeat may have landed after the scan, check again under the entry lock
            if let Entry::Occupied(entry) = self.servers.entry(server_id) {
                let node = entry.get();
                if !node.is_expired(now_millis, self.heartbeat_timeout_ms) {
                    continue;
                }
                warn!(
                    "Removing expired shuffle server: {}, latest heartbeat: {}, now: {}",
                    &node.id, node.timestamp, now_millis
                );
                let tags: Vec<String> = node.tags.iter().cloned().collect();
                for tag in &tags {
                    self.unindex_tag(tag, entry.key());
                }
                let (server_id, _) = entry.remove_entry();
                removed.push(server_id);
            }
        }

        if !removed.is_empty() {
            TOTAL_TIMEOUT_REMOVED_SERVER.inc_by(removed.len() as u64);
        }
        GAUGE_SERVER_NUMBER.set(self.servers.len() as i64);
        removed
    }

    // ==================== Exclude Nodes ====================

    pub fn get_exclude_nodes(&self) -> Arc<HashSet<String>> {
        self.exclude_nodes.read().clone()
    }

    /// Reloads the exclude list file. The current set is kept as is when the file
    /// content is unchanged. A missing or unreadable file clears the set.
    /// The file is read before any lock is taken, callers on the runtime go through
    /// `spawn_blocking`.
    pub fn refresh_exclude_nodes(&self) {
        let path = match &self.exclude_nodes_file_path {
            Some(path) => path,
            None => return,
        };
        self.update_exclude_nodes(path, std::fs::read(path));
    }

    fn update_exclude_nodes(&self, path: &Path, content: std::io::Result<Vec<u8>>) {
        let mut last_content = self.exclude_nodes_content.lock();
        match content {
            Ok(content) => {
                if last_content.as_deref() == Some(content.as_slice()) {
                    return;
                }
                let nodes = parse_exclude_nodes(&String::from_utf8_lossy(&content));
                info!(
                    "Updating exclude nodes from {:?}, {} nodes: {:?}",
                    path,
                    nodes.len(),
                    &nodes
                );
                GAUGE_EXCLUDED_SERVER_NUMBER.set(nodes.len() as i64);
                *self.exclude_nodes.write() = Arc::new(nodes);
                *last_content = Some(content);
            }
            Err(err) => {
                if last_content.is_some() || !self.exclude_nodes.read().is_empty() {
                    warn!(
                        "Exclude nodes file {:?} can't be read, clearing exclude nodes. err: {}",
                        path, err
                    );
                    *self.exclude_nodes.write() = Arc::new(HashSet::new());
                    GAUGE_EXCLUDED_SERVER_NUMBER.set(0);
                }
                *last_content = None;
            }
        }
    }

    pub fn heartbeat_timeout_ms(&self) -> i64 {
        self.heartbeat_timeout_ms
    }
}

fn parse_exclude_nodes(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}
