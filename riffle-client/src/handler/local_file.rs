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

use crate::handler::index_codec::{IndexBlock, IndexCodec};
use crate::handler::{BufferSegment, ClientReadHandler, ShuffleDataResult};
use bytes::Bytes;
use log::{debug, info, warn};
use riffle_common::error::RiffleError;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;

/// Reads one partition from a local data file and its index file.
pub struct LocalFileClientReadHandler {
    data_file_path: PathBuf,
    index_file_path: PathBuf,
    read_buffer_size: usize,

    // lazily loaded from the index file on the first read
    chunks: Option<Vec<Vec<IndexBlock>>>,
    data_file: Option<File>,
}

impl LocalFileClientReadHandler {
    pub fn new(
        data_file_path: impl Into<PathBuf>,
        index_file_path: impl Into<PathBuf>,
        read_buffer_size: usize,
    ) -> Self {
        Self {
            data_file_path: data_file_path.into(),
            index_file_path: index_file_path.into(),
            read_buffer_size,
            chunks: None,
            data_file: None,
        }
    }

    fn load_chunks(&mut self) -> Result<&Vec<Vec<IndexBlock>>, RiffleError> {
        if self.chunks.is_none() {
            let index_blocks = match std::fs::read(&self.index_file_path) {
                Ok(data) => IndexCodec::decode_all(Bytes::from(data))?,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    info!("Index file: {:?} doesn't exist", &self.index_file_path);
                    vec![]
                }
                Err(err) => return Err(err.into()),
            };
            self.chunks = Some(group_into_chunks(index_blocks, self.read_buffer_size));
        }
        Ok(self.chunks.get_or_insert_with(Vec::new))
    }

    fn read_range(&mut self, offset: u64, length: u64) -> Result<Bytes, RiffleError> {
        if self.data_file.is_none() {
            self.data_file = Some(File::open(&self.data_file_path)?);
        }
        let file = match self.data_file.as_mut() {
            Some(file) => file,
            None => return Ok(Bytes::new()),
        };
        // never buffer past the end of the file, a short file surfaces later as an
        // out-of-range segment
        let length = length.min(file.metadata()?.len().saturating_sub(offset));
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = Vec::with_capacity(length as usize);
        file.take(length).read_to_end(&mut buffer)?;
        Ok(Bytes::from(buffer))
    }
}

/// Groups consecutive index blocks into chunks of at most `read_buffer_size` bytes. A block
/// larger than the limit forms its own chunk.
fn group_into_chunks(
    index_blocks: Vec<IndexBlock>,
    read_buffer_size: usize,
) -> Vec<Vec<IndexBlock>> {
    let mut chunks = vec![];
    let mut current: Vec<IndexBlock> = vec![];
    let mut current_size = 0usize;
    for block in index_blocks {
        let length = block.length.max(0) as usize;
        if !current.is_empty() && current_size + length > read_buffer_size {
            chunks.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current_size += length;
        current.push(block);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

impl ClientReadHandler for LocalFileClientReadHandler {
    fn read_shuffle_data(
        &mut self,
        segment_index: usize,
    ) -> Result<Option<ShuffleDataResult>, RiffleError> {
        let chunk = match self.load_chunks()?.get(segment_index) {
            Some(chunk) => chunk.clone(),
            None => return Ok(None),
        };
        let start = chunk.iter().map(|b| b.offset).min().unwrap_or(0).max(0);
        let mut end = start;
        for block in &chunk {
            let block_end = block.offset.checked_add(block.length as i64).ok_or_else(|| {
                RiffleError::DATA_CORRUPTED(format!(
                    "Index of {:?} has block: {} with offset: {} and length: {} overflowing",
                    &self.index_file_path, block.block_id, block.offset, block.length
                ))
            })?;
            end = end.max(block_end);
        }

        let data = match self.read_range(start as u64, (end - start) as u64) {
            Ok(data) => data,
            Err(RiffleError::Other(err)) if is_not_found(&err) => {
                warn!("Data file: {:?} doesn't exist", &self.data_file_path);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        debug!(
            "Read chunk: {} of {:?}, range: [{}, {}), blocks: {}",
            segment_index,
            &self.data_file_path,
            start,
            end,
            chunk.len()
        );

        let buffer_segments = chunk
            .into_iter()
            .map(|block| BufferSegment {
                block_id: block.block_id,
                offset: block.offset - start,
                length: block.length,
                uncompress_length: block.uncompress_length,
                crc: block.crc,
                task_attempt_id: block.task_attempt_id,
            })
            .collect();
        Ok(Some(ShuffleDataResult {
            data,
            buffer_segments,
        }))
    }

    fn close(&mut self) {
        self.data_file = None;
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .map(|e| e.kind() == ErrorKind::NotFound)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use crate::handler::index_codec::{IndexBlock, IndexCodec};
    use crate::handler::local_file::group_into_chunks;
    use crate::handler::{ClientReadHandler, LocalFileClientReadHandler};
    use anyhow::Result;
    use riffle_common::error::RiffleError;
    use bytes::BytesMut;

    fn index_block(offset: i64, length: i32, block_id: i64) -> IndexBlock {
        IndexBlock {
            offset,
            length,
            uncompress_length: length,
            crc: 0,
            block_id,
            task_attempt_id: 1,
        }
    }

    #[test]
    fn chunk_grouping_test() {
        let blocks = vec![
            index_block(0, 10, 1),
            index_block(10, 10, 2),
            index_block(20, 50, 3),
            index_block(70, 5, 4),
        ];
        let chunks = group_into_chunks(blocks, 20);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(vec![2, 1, 1], sizes);
        assert_eq!(3, chunks[1][0].block_id);
        assert!(group_into_chunks(vec![], 20).is_empty());
    }

    #[test]
    fn read_test() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let data_path = dir.path().join("0.data");
        let index_path = dir.path().join("0.index");

        let data: Vec<u8> = (0..30u8).collect();
        std::fs::write(&data_path, &data)?;
        let mut index = BytesMut::new();
        for idx in 0..3 {
            IndexCodec::encode(&index_block(idx * 10, 10, idx), &mut index);
        }
        std::fs::write(&index_path, &index)?;

        let mut handler = LocalFileClientReadHandler::new(&data_path, &index_path, 15);
        let first = handler.read_shuffle_data(0)?.unwrap();
        assert_eq!(10, first.data.len());
        assert_eq!(1, first.buffer_segments.len());

        let second = handler.read_shuffle_data(1)?.unwrap();
        assert_eq!(&data[10..20], &second.data[..]);
        // offsets are relative to the chunk
        assert_eq!(0, second.buffer_segments[0].offset);
        assert_eq!(1, second.buffer_segments[0].block_id);

        assert!(handler.read_shuffle_data(2)?.is_some());
        assert!(handler.read_shuffle_data(3)?.is_none());
        handler.close();
        Ok(())
    }

    #[test]
    fn missing_files_test() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut handler = LocalFileClientReadHandler::new(
            dir.path().join("1.data"),
            dir.path().join("1.index"),
            1024,
        );
        assert!(handler.read_shuffle_data(0)?.is_none());

        // index without data
        let index_path = dir.path().join("2.index");
        let mut index = BytesMut::new();
        IndexCodec::encode(&index_block(0, 10, 1), &mut index);
        std::fs::write(&index_path, &index)?;
        let mut handler =
            LocalFileClientReadHandler::new(dir.path().join("2.data"), &index_path, 1024);
        assert!(handler.read_shuffle_data(0)?.is_none());
        Ok(())
    }

    #[test]
    fn corrupted_index_offsets_test() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let data_path = dir.path().join("3.data");
        let index_path = dir.path().join("3.index");
        std::fs::write(&data_path, (0..30u8).collect::<Vec<u8>>())?;

        // a far-out offset reads no more than the data file holds
        let mut index = BytesMut::new();
        IndexCodec::encode(&index_block(0, 10, 1), &mut index);
        IndexCodec::encode(&index_block(1 << 40, 10, 2), &mut index);
        std::fs::write(&index_path, &index)?;
        let mut handler = LocalFileClientReadHandler::new(&data_path, &index_path, 1024);
        let result = handler.read_shuffle_data(0)?.unwrap();
        assert_eq!(30, result.data.len());
        assert_eq!(2, result.buffer_segments.len());

        // offset plus length overflowing
        let mut index = BytesMut::new();
        IndexCodec::encode(&index_block(0, 10, 1), &mut index);
        IndexCodec::encode(&index_block(i64::MAX - 5, 10, 2), &mut index);
        std::fs::write(&index_path, &index)?;
        let mut handler = LocalFileClientReadHandler::new(&data_path, &index_path, 1024);
        match handler.read_shuffle_data(0) {
            Err(RiffleError::DATA_CORRUPTED(_)) => {}
            other => panic!("unexpected result: {:?}", other.map(|r| r.is_some())),
        }
        Ok(())
    }
}
