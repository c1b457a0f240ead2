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

use crate::app_manager::purge_event::PurgeReason;
use crate::block_id_manager::BlockIdManager;
use dashmap::DashMap;
use log::info;
use riffle_common::bitmap::BitSet64;
use riffle_common::error::RiffleError;
use riffle_common::protocol::PartitionRange;
use riffle_common::util::now_timestamp_as_millis;
use std::collections::HashMap;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicBool, AtomicU64};

pub struct App {
    pub app_id: String,
    latest_heartbeat_time: AtomicU64,

    // key: shuffle_id, val: the partition ranges served by this server
    registered_shuffles: DashMap<i32, Vec<PartitionRange>>,

    block_id_manager: BlockIdManager,

    // set once a heartbeat timeout purge has been requested
    expiry_notified: AtomicBool,

    pub(crate) start_timestamp: u64,
}

impl App {
    pub fn new(app_id: &str) -> Self {
        let now = now_timestamp_as_millis();
        App {
            app_id: app_id.to_string(),
            latest_heartbeat_time: AtomicU64::new(now),
            registered_shuffles: DashMap::new(),
            block_id_manager: BlockIdManager::default(),
            expiry_notified: AtomicBool::new(false),
            start_timestamp: now,
        }
    }

    pub fn get_latest_heartbeat_time(&self) -> u64 {
        self.latest_heartbeat_time.load(SeqCst)
    }

    pub fn heartbeat(&self) {
        self.latest_heartbeat_time
            .store(now_timestamp_as_millis(), SeqCst);
    }

    pub fn register_shuffle(&self, shuffle_id: i32, partition_ranges: Vec<PartitionRange>) {
        self.heartbeat();
        let mut ranges = self.registered_shuffles.entry(shuffle_id).or_default();
        for range in partition_ranges {
            if !ranges.contains(&range) {
                ranges.push(range);
            }
        }
        ranges.sort();
    }

    pub fn is_shuffle_registered(&self, shuffle_id: i32) -> bool {
        self.registered_shuffles.contains_key(&shuffle_id)
    }

    pub fn get_partition_ranges(&self, shuffle_id: i32) -> Option<Vec<PartitionRange>> {
        self.registered_shuffles
            .get(&shuffle_id)
            .map(|ranges| ranges.value().clone())
    }

    pub fn registered_shuffle_ids(&self) -> Vec<i32> {
        self.registered_shuffles.iter().map(|e| *e.key()).collect()
    }

    pub fn report_block_ids(
        &self,
        shuffle_id: i32,
        task_attempt_id: i64,
        bitmap_num: i32,
        partitioned_block_ids: HashMap<i32, Vec<i64>>,
    ) -> Result<u64, RiffleError> {
        if bitmap_num <= 0 {
            return Err(RiffleError::INVALID_ARGUMENT(format!(
                "Illegal bitmap number: {} reported by task: {}",
                bitmap_num, task_attempt_id
            )));
        }
        self.heartbeat();
        if !self.is_shuffle_registered(shuffle_id) {
            info!(
                "Registering shuffle: {} of app: {} on its first report",
                shuffle_id, &self.app_id
            );
            self.registered_shuffles.entry(shuffle_id).or_default();
        }
        self.block_id_manager.report_multi_block_ids(
            shuffle_id,
            bitmap_num as usize,
            partitioned_block_ids,
        )
    }

    pub fn get_block_ids(
        &self,
        shuffle_id: i32,
        partition_id: i32,
    ) -> Result<BitSet64, RiffleError> {
        self.check_shuffle(shuffle_id)?;
        Ok(self.block_id_manager.get_block_ids(shuffle_id, partition_id))
    }

    pub fn get_multi_block_ids(
        &self,
        shuffle_id: i32,
        partition_ids: &[i32],
    ) -> Result<BitSet64, RiffleError> {
        self.check_shuffle(shuffle_id)?;
        Ok(self
            .block_id_manager
            .get_multi_block_ids(shuffle_id, partition_ids))
    }

    fn check_shuffle(&self, shuffle_id: i32) -> Result<(), RiffleError> {
        self.heartbeat();
        if !self.is_shuffle_registered(shuffle_id) {
            return Err(RiffleError::SHUFFLE_IS_NOT_FOUND(
                self.app_id.to_string(),
                shuffle_id,
            ));
        }
        Ok(())
    }

    pub fn block_id_manager(&self) -> &BlockIdManager {
        &self.block_id_manager
    }

    pub fn get_blocks_number(&self) -> u64 {
        self.block_id_manager.get_blocks_number()
    }

    /// Returns true only for the first caller, so one timeout yields one purge event.
    pub(crate) fn mark_expiry_notified(&self) -> bool {
        self.expiry_notified
            .compare_exchange(false, true, SeqCst, SeqCst)
            .is_ok()
    }

    /// Drops the block ids covered by the reason, returns how many were removed.
    pub fn purge(&self, reason: &PurgeReason) -> u64 {
        let (_, shuffle_id) = reason.extract();
        let purged = match shuffle_id {
            Some(shuffle_id) => {
                self.registered_shuffles.remove(&shuffle_id);
                self.block_id_manager.purge_block_ids(shuffle_id)
            }
            None => {
                self.registered_shuffles.clear();
                self.block_id_manager.purge_all()
            }
        };
        info!(
            "Purged {} block ids of app: {} with reason: {}",
            purged, &self.app_id, reason
        );
        purged
    }
}
