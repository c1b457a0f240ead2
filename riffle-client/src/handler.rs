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

pub mod index_codec;
pub mod local_file;

use bytes::Bytes;
use riffle_common::error::RiffleError;

pub use local_file::LocalFileClientReadHandler;

/// Location of one block inside the data of a [`ShuffleDataResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSegment {
    pub block_id: i64,
    pub offset: i64,
    pub length: i32,
    pub uncompress_length: i32,
    pub crc: i64,
    pub task_attempt_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ShuffleDataResult {
    pub data: Bytes,
    pub buffer_segments: Vec<BufferSegment>,
}

impl ShuffleDataResult {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Storage side of the reader. Chunks are addressed by a cursor starting at 0, and `None`
/// marks that no data is left.
pub trait ClientReadHandler: Send {
    fn read_shuffle_data(
        &mut self,
        segment_index: usize,
    ) -> Result<Option<ShuffleDataResult>, RiffleError>;

    fn close(&mut self);
}
