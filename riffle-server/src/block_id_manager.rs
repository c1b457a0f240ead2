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

use crate::metric::{BLOCK_ID_NUMBER, TOTAL_REPORTED_BLOCK_IDS};
use dashmap::DashMap;
use parking_lot::RwLock;
use riffle_common::bitmap::BitSet64;
use riffle_common::error::RiffleError;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::Arc;

/// Block ids of one partition, split across independently locked shards.
/// A block id lands in shard `block_id mod shard_num`.
pub struct PartitionBlockIdShards {
    shards: Vec<RwLock<BitSet64>>,
}

impl PartitionBlockIdShards {
    fn new(shard_num: usize) -> Self {
        let shards = (0..shard_num)
            .map(|_| RwLock::new(BitSet64::new()))
            .collect();
        Self { shards }
    }

    pub fn shard_num(&self) -> usize {
        self.shards.len()
    }

    fn shard_index(&self, block_id: i64) -> usize {
        block_id.rem_euclid(self.shards.len() as i64) as usize
    }

    /// Returns how many of the given ids were not present yet.
    fn add(&self, block_ids: &[i64]) -> u64 {
        let mut grouped: Vec<Vec<u64>> = vec![vec![]; self.shards.len()];
        for block_id in block_ids {
            grouped[self.shard_index(*block_id)].push(*block_id as u64);
        }
        let mut added = 0;
        for (idx, ids) in grouped.into_iter().enumerate() {
            if ids.is_empty() {
                continue;
            }
            let mut shard = self.shards[idx].write();
            for id in ids {
                if !shard.contains(id) {
                    shard.add(id);
                    added += 1;
                }
            }
        }
        added
    }

    pub fn shard(&self, idx: usize) -> Option<BitSet64> {
        self.shards.get(idx).map(|shard| shard.read().clone())
    }

    /// Union of all shards.
    pub fn snapshot(&self) -> BitSet64 {
        let mut union = BitSet64::new();
        for shard in &self.shards {
            union.union_with(&shard.read());
        }
        union
    }

    fn cardinality(&self) -> u64 {
        self.shards.iter().map(|shard| shard.read().cardinality()).sum()
    }
}

#[derive(Default)]
pub struct BlockIdManager {
    number: AtomicU64,
    // key: (shuffle_id, partition_id)
    block_id_bitmap: DashMap<(i32, i32), Arc<PartitionBlockIdShards>>,
}

impl BlockIdManager {
    /// Adds the reported ids of every partition. The shard array of a partition is
    /// sized by the first report that touches it.
    pub fn report_multi_block_ids(
        &self,
        shuffle_id: i32,
        bitmap_num: usize,
        partitioned_block_ids: HashMap<i32, Vec<i64>>,
    ) -> Result<u64, RiffleError> {
        if bitmap_num == 0 {
            return Err(RiffleError::INVALID_ARGUMENT(
                "bitmap number must be positive".to_string(),
            ));
        }
        let mut number = 0;
        let mut reported = 0;
        for (pid, block_ids) in partitioned_block_ids {
            reported += block_ids.len() as u64;
            // the entry guard is held until the counters are updated, so a concurrent
            // purge either sees these ids or runs before the partition exists
            let shards = self
                .block_id_bitmap
                .entry((shuffle_id, pid))
                .or_insert_with(|| Arc::new(PartitionBlockIdShards::new(bitmap_num)));
            let added = shards.add(&block_ids);
            BLOCK_ID_NUMBER.add(added as i64);
            self.number.fetch_add(added, SeqCst);
            drop(shards);
            number += added;
        }
        TOTAL_REPORTED_BLOCK_IDS.inc_by(reported);
        Ok(number)
    }

    pub fn get_partition_shards(
        &self,
        shuffle_id: i32,
        partition_id: i32,
    ) -> Option<Arc<PartitionBlockIdShards>> {
        self.block_id_bitmap
            .get(&(shuffle_id, partition_id))
            .map(|shards| shards.value().clone())
    }

    pub fn get_block_ids(&self, shuffle_id: i32, partition_id: i32) -> BitSet64 {
        self.get_partition_shards(shuffle_id, partition_id)
            .map(|shards| shards.snapshot())
            .unwrap_or_default()
    }

    pub fn get_multi_block_ids(&self, shuffle_id: i32, partition_ids: &[i32]) -> BitSet64 {
        let mut bitmap = BitSet64::new();
        for pid in partition_ids {
            if let Some(shards) = self.get_partition_shards(shuffle_id, *pid) {
                bitmap.union_with(&shards.snapshot());
            }
        }
        bitmap
    }

    pub fn purge_block_ids(&self, shuffle_id: i32) -> u64 {
        let deletion_keys: Vec<(i32, i32)> = self
            .block_id_bitmap
            .iter()
            .filter(|entry| entry.key().0 == shuffle_id)
            .map(|entry| *entry.key())
            .collect();
        self.remove_keys(deletion_keys)
    }

    pub fn purge_all(&self) -> u64 {
        let deletion_keys: Vec<(i32, i32)> =
            self.block_id_bitmap.iter().map(|entry| *entry.key()).collect();
        self.remove_keys(deletion_keys)
    }

    fn remove_keys(&self, keys: Vec<(i32, i32)>) -> u64 {
        let mut number = 0;
        for key in keys {
            if let Some((_, shards)) = self.block_id_bitmap.remove(&key) {
                number += shards.cardinality();
            }
        }
        BLOCK_ID_NUMBER.sub(number as i64);
        self.number.fetch_sub(number, SeqCst);
        number
    }

    pub fn get_blocks_number(&self) -> u64 {
        self.number.load(SeqCst)
    }

    pub fn get_partition_number(&self) -> usize {
        self.block_id_bitmap.len()
    }
}
