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

use anyhow::{anyhow, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::warn;

pub const INDEX_BLOCK_SIZE: usize = 40;

pub struct IndexCodec;

/// One record of a partition index file, locating a block inside the data file.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexBlock {
    pub offset: i64,
    pub length: i32,
    pub uncompress_length: i32,
    pub crc: i64,
    pub block_id: i64,
    pub task_attempt_id: i64,
}

impl IndexCodec {
    pub fn encode(block: &IndexBlock, container: &mut BytesMut) {
        container.reserve(INDEX_BLOCK_SIZE);
        container.put_i64(block.offset);
        container.put_i32(block.length);
        container.put_i32(block.uncompress_length);
        container.put_i64(block.crc);
        container.put_i64(block.block_id);
        container.put_i64(block.task_attempt_id);
    }

    pub fn decode(mut bytes: Bytes) -> Result<IndexBlock> {
        if bytes.len() < INDEX_BLOCK_SIZE {
            return Err(anyhow!("Not enough bytes to decode"));
        }
        Ok(IndexBlock {
            offset: bytes.get_i64(),
            length: bytes.get_i32(),
            uncompress_length: bytes.get_i32(),
            crc: bytes.get_i64(),
            block_id: bytes.get_i64(),
            task_attempt_id: bytes.get_i64(),
        })
    }

    /// Decodes every complete record. A trailing partial record is dropped.
    pub fn decode_all(mut bytes: Bytes) -> Result<Vec<IndexBlock>> {
        let remainder = bytes.len() % INDEX_BLOCK_SIZE;
        if remainder != 0 {
            warn!(
                "Index data length[{}] is not aligned. Will abort {} extra bytes.",
                bytes.len(),
                remainder
            );
        }
        let mut blocks = Vec::with_capacity(bytes.len() / INDEX_BLOCK_SIZE);
        while bytes.len() >= INDEX_BLOCK_SIZE {
            blocks.push(Self::decode(bytes.split_to(INDEX_BLOCK_SIZE))?);
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use crate::handler::index_codec::{IndexBlock, IndexCodec, INDEX_BLOCK_SIZE};
    use bytes::{BufMut, BytesMut};

    #[test]
    fn test_encode_decode_index_block() -> anyhow::Result<()> {
        let index_block = IndexBlock {
            offset: 0,
            length: 1,
            uncompress_length: 0,
            crc: 0,
            block_id: 1,
            task_attempt_id: 0,
        };
        let mut container = BytesMut::new();
        IndexCodec::encode(&index_block, &mut container);
        assert_eq!(INDEX_BLOCK_SIZE, container.len());
        // big endian
        assert_eq!(1, container[11]);

        let decoded_index_block = IndexCodec::decode(container.freeze())?;
        assert_eq!(index_block, decoded_index_block);
        Ok(())
    }

    #[test]
    fn test_decode_all() -> anyhow::Result<()> {
        let mut container = BytesMut::new();
        for idx in 0..3 {
            let block = IndexBlock {
                offset: idx * 10,
                length: 10,
                uncompress_length: 20,
                crc: idx,
                block_id: idx,
                task_attempt_id: 7,
            };
            IndexCodec::encode(&block, &mut container);
        }
        container.put_u8(1);

        let blocks = IndexCodec::decode_all(container.freeze())?;
        assert_eq!(3, blocks.len());
        assert_eq!(20, blocks[2].offset);
        assert_eq!(7, blocks[1].task_attempt_id);

        assert!(IndexCodec::decode(BytesMut::new().freeze()).is_err());
        Ok(())
    }
}
