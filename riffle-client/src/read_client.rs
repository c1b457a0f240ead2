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

use crate::handler::{BufferSegment, ClientReadHandler};
use bytes::Bytes;
use log::info;
use riffle_common::bitmap::BitSet64;
use riffle_common::error::RiffleError;
use riffle_common::id_layout::IdLayout;
use riffle_common::util::get_crc;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct CompressedShuffleBlock {
    pub data: Bytes,
    pub uncompress_length: i32,
}

/// Reads the blocks of one partition exactly once.
///
/// Blocks written more than once, blocks of other partitions sharing the same files and
/// blocks of task attempts that aren't authoritative are all skipped. After the last block,
/// [`ShuffleReadClient::check_processed_block_ids`] verifies that every expected block was
/// seen.
pub struct ShuffleReadClient {
    shuffle_id: i32,
    partition_id: i32,

    expected_block_ids: BitSet64,
    task_id_bitmap: BitSet64,
    processed_block_ids: BitSet64,

    buffer_segments: VecDeque<BufferSegment>,
    read_buffer: Bytes,
    segment_index: usize,
    handler: Box<dyn ClientReadHandler>,

    read_data_time: Duration,
    copy_time: Duration,
    crc_check_time: Duration,
}

impl ShuffleReadClient {
    pub fn new(
        shuffle_id: i32,
        partition_id: i32,
        mut expected_block_ids: BitSet64,
        task_id_bitmap: BitSet64,
        layout: &IdLayout,
        handler: Box<dyn ClientReadHandler>,
    ) -> Self {
        expected_block_ids.retain(|block_id| {
            task_id_bitmap.contains(layout.get_task_attempt_id(block_id as i64) as u64)
        });
        Self {
            shuffle_id,
            partition_id,
            expected_block_ids,
            task_id_bitmap,
            processed_block_ids: BitSet64::new(),
            buffer_segments: VecDeque::new(),
            read_buffer: Bytes::new(),
            segment_index: 0,
            handler,
            read_data_time: Duration::ZERO,
            copy_time: Duration::ZERO,
            crc_check_time: Duration::ZERO,
        }
    }

    /// Returns the next accepted block, or `None` once the storage has no more data.
    pub fn read_next_block(&mut self) -> Result<Option<CompressedShuffleBlock>, RiffleError> {
        if self.expected_block_ids.is_empty() {
            return Ok(None);
        }
        loop {
            if self.buffer_segments.is_empty() && self.read()? == 0 {
                return Ok(None);
            }
            while let Some(segment) = self.buffer_segments.pop_front() {
                let block_id = segment.block_id as u64;
                let accepted = !self.processed_block_ids.contains(block_id)
                    && self.expected_block_ids.contains(block_id)
                    && self
                        .task_id_bitmap
                        .contains(segment.task_attempt_id as u64);
                self.processed_block_ids.add(block_id);
                if accepted {
                    return self.copy_block(&segment).map(Some);
                }
            }
        }
    }

    fn read(&mut self) -> Result<usize, RiffleError> {
        let start = Instant::now();
        let result = self.handler.read_shuffle_data(self.segment_index)?;
        self.segment_index += 1;
        self.read_data_time += start.elapsed();

        match result {
            Some(result) if !result.is_empty() => {
                let segment_num = result.buffer_segments.len();
                self.read_buffer = result.data;
                self.buffer_segments.extend(result.buffer_segments);
                Ok(segment_num)
            }
            _ => Ok(0),
        }
    }

    fn copy_block(
        &mut self,
        segment: &BufferSegment,
    ) -> Result<CompressedShuffleBlock, RiffleError> {
        let start = Instant::now();
        let offset = segment.offset;
        let end = offset + segment.length as i64;
        if offset < 0 || segment.length < 0 || end > self.read_buffer.len() as i64 {
            return Err(RiffleError::DATA_CORRUPTED(format!(
                "Can't read data for blockId[{}], range [{}, {}) is out of the read buffer with length {}",
                segment.block_id,
                offset,
                end,
                self.read_buffer.len()
            )));
        }
        let data = self.read_buffer.slice(offset as usize..end as usize);
        self.copy_time += start.elapsed();

        let start = Instant::now();
        let actual = get_crc(&data);
        self.crc_check_time += start.elapsed();
        if actual != segment.crc {
            return Err(RiffleError::CHECKSUM_MISMATCH {
                block_id: segment.block_id,
                expected: segment.crc,
                actual,
            });
        }
        Ok(CompressedShuffleBlock {
            data,
            uncompress_length: segment.uncompress_length,
        })
    }

    pub fn expected_block_ids(&self) -> &BitSet64 {
        &self.expected_block_ids
    }

    pub fn processed_block_ids(&self) -> &BitSet64 {
        &self.processed_block_ids
    }

    /// Fails unless every expected block has been processed.
    pub fn check_processed_block_ids(&self) -> Result<(), RiffleError> {
        let processed = self.expected_block_ids.and(&self.processed_block_ids);
        if processed != self.expected_block_ids {
            return Err(RiffleError::BLOCKS_READ_INCONSISTENT {
                expected: self.expected_block_ids.cardinality(),
                actual: processed.cardinality(),
            });
        }
        Ok(())
    }

    pub fn log_statics(&self) {
        info!(
            "Metrics for shuffleId[{}], partitionId[{}], read data cost {} ms, copy data cost {} ms, crc check cost {} ms",
            self.shuffle_id,
            self.partition_id,
            self.read_data_time.as_millis(),
            self.copy_time.as_millis(),
            self.crc_check_time.as_millis()
        );
    }

    pub fn close(&mut self) {
        self.handler.close();
    }
}

#[cfg(test)]
mod tests {
    use crate::handler::{BufferSegment, ClientReadHandler, ShuffleDataResult};
    use crate::read_client::ShuffleReadClient;
    use anyhow::Result;
    use bytes::{Bytes, BytesMut};
    use riffle_common::bitmap::BitSet64;
    use riffle_common::error::RiffleError;
    use riffle_common::id_layout::DEFAULT_BLOCK_ID_LAYOUT;
    use riffle_common::util::get_crc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const TASK_A: i64 = 1;
    const TASK_B: i64 = 2;

    /// Serves prepared chunks from memory.
    struct MemoryReadHandler {
        chunks: Vec<ShuffleDataResult>,
        closed: Arc<AtomicBool>,
    }

    impl ClientReadHandler for MemoryReadHandler {
        fn read_shuffle_data(
            &mut self,
            segment_index: usize,
        ) -> Result<Option<ShuffleDataResult>, RiffleError> {
            Ok(self.chunks.get(segment_index).cloned())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn block_id(seq: i64, task: i64) -> i64 {
        DEFAULT_BLOCK_ID_LAYOUT.encode(seq, 0, task).unwrap()
    }

    /// Lays out (block_id, task, payload) triples into one chunk.
    fn chunk(blocks: &[(i64, i64, &str)]) -> ShuffleDataResult {
        let mut data = BytesMut::new();
        let mut buffer_segments = vec![];
        for (block_id, task, payload) in blocks {
            let payload = payload.as_bytes();
            buffer_segments.push(BufferSegment {
                block_id: *block_id,
                offset: data.len() as i64,
                length: payload.len() as i32,
                uncompress_length: payload.len() as i32 * 2,
                crc: get_crc(payload),
                task_attempt_id: *task,
            });
            data.extend_from_slice(payload);
        }
        ShuffleDataResult {
            data: data.freeze(),
            buffer_segments,
        }
    }

    fn new_client(
        expected: &[i64],
        tasks: &[i64],
        chunks: Vec<ShuffleDataResult>,
    ) -> (ShuffleReadClient, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let handler = MemoryReadHandler {
            chunks,
            closed: closed.clone(),
        };
        let client = ShuffleReadClient::new(
            0,
            0,
            expected.iter().map(|id| *id as u64).collect(),
            tasks.iter().map(|id| *id as u64).collect(),
            &DEFAULT_BLOCK_ID_LAYOUT,
            Box::new(handler),
        );
        (client, closed)
    }

    #[test]
    fn dedup_test() -> Result<()> {
        let (b1, b2, b3) = (block_id(1, TASK_A), block_id(2, TASK_A), block_id(3, TASK_A));
        let chunks = vec![
            chunk(&[(b1, TASK_A, "aa"), (b2, TASK_A, "bbb")]),
            // a speculative copy of block 2 and a block of another attempt
            chunk(&[
                (b2, TASK_A, "bbb"),
                (block_id(4, TASK_B), TASK_B, "dd"),
                (b3, TASK_A, "c"),
            ]),
        ];
        let (mut client, closed) = new_client(&[b1, b2, b3], &[TASK_A], chunks);

        let mut blocks = vec![];
        while let Some(block) = client.read_next_block()? {
            blocks.push(block);
        }
        assert_eq!(3, blocks.len());
        assert_eq!(Bytes::from_static(b"bbb"), blocks[1].data);
        assert_eq!(6, blocks[1].uncompress_length);
        assert_eq!(Bytes::from_static(b"c"), blocks[2].data);
        client.check_processed_block_ids()?;
        assert_eq!(4, client.processed_block_ids().cardinality());

        client.log_statics();
        client.close();
        assert!(closed.load(Ordering::SeqCst));
        Ok(())
    }

    #[test]
    fn task_filter_test() -> Result<()> {
        let b1 = block_id(1, TASK_A);
        let (mut client, _) = new_client(&[b1], &[], vec![chunk(&[(b1, TASK_A, "aa")])]);
        assert!(client.expected_block_ids().is_empty());
        assert!(client.read_next_block()?.is_none());
        assert!(client.processed_block_ids().is_empty());
        client.check_processed_block_ids()?;

        // the expected set only keeps blocks of the given attempts
        let b2 = block_id(2, TASK_B);
        let (client, _) = new_client(&[b1, b2], &[TASK_B], vec![]);
        assert_eq!(BitSet64::from_iter(vec![b2 as u64]), *client.expected_block_ids());
        Ok(())
    }

    #[test]
    fn empty_chunks_are_skipped_test() -> Result<()> {
        let (b1, b2) = (block_id(1, TASK_A), block_id(2, TASK_A));
        let chunks = vec![
            // nothing expected in the first two chunks
            chunk(&[(block_id(9, TASK_B), TASK_B, "xx")]),
            chunk(&[(b1, TASK_A, "a")]),
            chunk(&[(b1, TASK_A, "a")]),
            chunk(&[(b2, TASK_A, "b")]),
        ];
        let (mut client, _) = new_client(&[b1, b2], &[TASK_A], chunks);
        assert_eq!(Bytes::from_static(b"a"), client.read_next_block()?.unwrap().data);
        assert_eq!(Bytes::from_static(b"b"), client.read_next_block()?.unwrap().data);
        assert!(client.read_next_block()?.is_none());
        client.check_processed_block_ids()?;
        Ok(())
    }

    #[test]
    fn missing_block_test() -> Result<()> {
        let (b1, b2) = (block_id(1, TASK_A), block_id(2, TASK_A));
        let chunks = vec![chunk(&[(b1, TASK_A, "a")])];
        let (mut client, _) = new_client(&[b1, b2], &[TASK_A], chunks);
        assert!(client.read_next_block()?.is_some());
        assert!(client.read_next_block()?.is_none());
        match client.check_processed_block_ids() {
            Err(RiffleError::BLOCKS_READ_INCONSISTENT { expected, actual }) => {
                assert_eq!(2, expected);
                assert_eq!(1, actual);
            }
            _ => panic!("missing block must be detected"),
        }
        Ok(())
    }

    #[test]
    fn crc_mismatch_test() -> Result<()> {
        let b1 = block_id(1, TASK_A);
        let mut corrupted = chunk(&[(b1, TASK_A, "abcd")]);
        let mut data = corrupted.data.to_vec();
        data[1] ^= 0xff;
        corrupted.data = Bytes::from(data);

        let (mut client, _) = new_client(&[b1], &[TASK_A], vec![corrupted]);
        let err = client.read_next_block().unwrap_err();
        assert!(err.is_data_integrity_error());
        assert!(matches!(err, RiffleError::CHECKSUM_MISMATCH { block_id, .. } if block_id == b1));
        Ok(())
    }

    #[test]
    fn out_of_range_segment_test() -> Result<()> {
        let b1 = block_id(1, TASK_A);
        let mut truncated = chunk(&[(b1, TASK_A, "abcd")]);
        truncated.data = truncated.data.slice(0..2);

        let (mut client, _) = new_client(&[b1], &[TASK_A], vec![truncated]);
        assert!(matches!(
            client.read_next_block(),
            Err(RiffleError::DATA_CORRUPTED(_))
        ));
        Ok(())
    }
}
