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

use crate::error::RiffleError;
use once_cell::sync::Lazy;

pub static DEFAULT_BLOCK_ID_LAYOUT: Lazy<IdLayout> = Lazy::new(|| {
    IdLayout::build(
        DEFAULT_SEQUENCE_NO_BIT,
        DEFAULT_PARTITION_ID_BIT,
        DEFAULT_TASK_ID_BIT,
    )
});

const DEFAULT_SEQUENCE_NO_BIT: i32 = 18;
const DEFAULT_PARTITION_ID_BIT: i32 = 24;
const DEFAULT_TASK_ID_BIT: i32 = 21;

// the sign bit is never used, block ids stay non-negative
const MAX_TOTAL_BITS: i32 = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockIdParts {
    pub sequence_no: i64,
    pub partition_id: i64,
    pub task_attempt_id: i64,
}

/// Bit layout of a block id, from the highest bits to the lowest:
/// `| sequence_no | partition_id | task_attempt_id |`.
///
/// Readers mask the lowest bits to get the task attempt of a block, so that field
/// must stay at offset zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdLayout {
    sequence_no_bits: i32,
    partition_id_bits: i32,
    task_attempt_id_bits: i32,

    max_sequence_no: i64,
    max_partition_id: i64,
    max_task_attempt_id: i64,

    sequence_no_offset: i32,
    partition_id_offset: i32,
}

impl IdLayout {
    pub fn new(
        sequence_no_bits: i32,
        partition_id_bits: i32,
        task_attempt_id_bits: i32,
    ) -> Result<Self, RiffleError> {
        if sequence_no_bits <= 0 || partition_id_bits <= 0 || task_attempt_id_bits <= 0 {
            return Err(RiffleError::INVALID_ARGUMENT(format!(
                "All bit widths of block id layout must be positive, but got sequence: {}, partition: {}, task attempt: {}",
                sequence_no_bits, partition_id_bits, task_attempt_id_bits
            )));
        }
        let total = sequence_no_bits + partition_id_bits + task_attempt_id_bits;
        if total > MAX_TOTAL_BITS {
            return Err(RiffleError::INVALID_ARGUMENT(format!(
                "Total bits of block id layout must not exceed {}, but got {}",
                MAX_TOTAL_BITS, total
            )));
        }
        Ok(Self::build(
            sequence_no_bits,
            partition_id_bits,
            task_attempt_id_bits,
        ))
    }

    fn build(sequence_no_bits: i32, partition_id_bits: i32, task_attempt_id_bits: i32) -> Self {
        Self {
            sequence_no_bits,
            partition_id_bits,
            task_attempt_id_bits,
            max_sequence_no: (1i64 << sequence_no_bits) - 1,
            max_partition_id: (1i64 << partition_id_bits) - 1,
            max_task_attempt_id: (1i64 << task_attempt_id_bits) - 1,
            sequence_no_offset: partition_id_bits + task_attempt_id_bits,
            partition_id_offset: task_attempt_id_bits,
        }
    }

    pub fn encode(
        &self,
        sequence_no: i64,
        partition_id: i64,
        task_attempt_id: i64,
    ) -> Result<i64, RiffleError> {
        check_bound("sequenceNo", sequence_no, self.max_sequence_no)?;
        check_bound("partitionId", partition_id, self.max_partition_id)?;
        check_bound("taskAttemptId", task_attempt_id, self.max_task_attempt_id)?;

        let s = sequence_no << self.sequence_no_offset;
        let p = partition_id << self.partition_id_offset;
        Ok(s | p | task_attempt_id)
    }

    pub fn decode(&self, block_id: i64) -> BlockIdParts {
        BlockIdParts {
            sequence_no: self.get_sequence_no(block_id),
            partition_id: self.get_partition_id(block_id),
            task_attempt_id: self.get_task_attempt_id(block_id),
        }
    }

    pub fn get_sequence_no(&self, block_id: i64) -> i64 {
        (block_id >> self.sequence_no_offset) & self.max_sequence_no
    }

    pub fn get_partition_id(&self, block_id: i64) -> i64 {
        (block_id >> self.partition_id_offset) & self.max_partition_id
    }

    pub fn get_task_attempt_id(&self, block_id: i64) -> i64 {
        block_id & self.max_task_attempt_id
    }

    pub fn max_sequence_no(&self) -> i64 {
        self.max_sequence_no
    }

    pub fn max_partition_id(&self) -> i64 {
        self.max_partition_id
    }

    pub fn max_task_attempt_id(&self) -> i64 {
        self.max_task_attempt_id
    }
}

impl Default for IdLayout {
    fn default() -> Self {
        DEFAULT_BLOCK_ID_LAYOUT.clone()
    }
}

fn check_bound(field: &str, value: i64, max: i64) -> Result<(), RiffleError> {
    if value < 0 || value > max {
        return Err(RiffleError::INVALID_ARGUMENT(format!(
            "Can't encode block id, {} {} is out of range [0, {}]",
            field, value, max
        )));
    }
    Ok(())
}
