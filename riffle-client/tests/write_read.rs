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
use bytes::BytesMut;
use riffle_client::handler::index_codec::{IndexBlock, IndexCodec};
use riffle_client::handler::LocalFileClientReadHandler;
use riffle_client::read_client::ShuffleReadClient;
use riffle_common::bitmap::BitSet64;
use riffle_common::constant::StatusCode;
use riffle_common::id_layout::DEFAULT_BLOCK_ID_LAYOUT;
use riffle_common::log_service::LogService;
use riffle_common::protocol::{
    GetShuffleResultRequest, PartitionRange, RegisterShuffleRequest, ReportShuffleResultRequest,
    ShuffleServerService,
};
use riffle_common::util::get_crc;
use riffle_server::app_manager::AppManager;
use riffle_server::config::Config;
use riffle_server::service::DefaultShuffleServer;
use std::collections::HashMap;
use std::path::Path;

const APP_ID: &str = "A";
const SHUFFLE_ID: i32 = 0;
const TASK_ATTEMPT_ID: i64 = 1;

/// Appends the blocks to the data file and their records to the index file, the way the
/// server side segment writer lays them out.
fn write_segments(dir: &Path, blocks: &[(i64, Vec<u8>)]) -> Result<()> {
    let mut data = BytesMut::new();
    let mut index = BytesMut::new();
    for (block_id, payload) in blocks {
        let block = IndexBlock {
            offset: data.len() as i64,
            length: payload.len() as i32,
            uncompress_length: payload.len() as i32,
            crc: get_crc(payload),
            block_id: *block_id,
            task_attempt_id: DEFAULT_BLOCK_ID_LAYOUT.get_task_attempt_id(*block_id),
        };
        IndexCodec::encode(&block, &mut index);
        data.extend_from_slice(payload);
    }
    std::fs::write(dir.join("0-1.data"), &data)?;
    std::fs::write(dir.join("0-1.index"), &index)?;
    Ok(())
}

#[tokio::test]
async fn write_read_test() -> Result<()> {
    LogService::init_for_test();
    let server = DefaultShuffleServer::from(AppManager::get_ref(&Config::default()));

    let response = server
        .register_shuffle(RegisterShuffleRequest {
            app_id: APP_ID.to_string(),
            shuffle_id: SHUFFLE_ID,
            partition_ranges: vec![PartitionRange::new(0, 1)],
        })
        .await?;
    assert_eq!(StatusCode::SUCCESS, response.status);

    let block_ids: Vec<i64> = (0..5)
        .map(|seq| DEFAULT_BLOCK_ID_LAYOUT.encode(seq, 0, TASK_ATTEMPT_ID))
        .collect::<Result<_, _>>()?;
    let response = server
        .report_shuffle_result(ReportShuffleResultRequest {
            app_id: APP_ID.to_string(),
            shuffle_id: SHUFFLE_ID,
            task_attempt_id: TASK_ATTEMPT_ID,
            bitmap_num: 1,
            partition_to_block_ids: HashMap::from([(0, block_ids.clone())]),
        })
        .await?;
    assert_eq!(StatusCode::SUCCESS, response.status);

    let response = server
        .get_shuffle_result(GetShuffleResultRequest {
            app_id: APP_ID.to_string(),
            shuffle_id: SHUFFLE_ID,
            partition_id: 0,
        })
        .await?;
    assert_eq!(StatusCode::SUCCESS, response.status);
    let expected = BitSet64::deserialize(&response.serialized_bitmap)?;
    assert_eq!(
        block_ids.iter().map(|id| *id as u64).collect::<BitSet64>(),
        expected
    );

    // partition 1 shares the files of the range, and block 2 was written twice
    let other_partition_block = DEFAULT_BLOCK_ID_LAYOUT.encode(0, 1, TASK_ATTEMPT_ID)?;
    let mut blocks: Vec<(i64, Vec<u8>)> = block_ids
        .iter()
        .enumerate()
        .map(|(idx, id)| (*id, vec![idx as u8; 16 + idx]))
        .collect();
    blocks.insert(3, (block_ids[2], vec![2u8; 18]));
    blocks.insert(1, (other_partition_block, vec![9u8; 8]));

    let dir = tempfile::tempdir()?;
    write_segments(dir.path(), &blocks)?;

    let handler = LocalFileClientReadHandler::new(
        dir.path().join("0-1.data"),
        dir.path().join("0-1.index"),
        40,
    );
    let mut client = ShuffleReadClient::new(
        SHUFFLE_ID,
        0,
        expected,
        BitSet64::from_iter(vec![TASK_ATTEMPT_ID as u64]),
        &DEFAULT_BLOCK_ID_LAYOUT,
        Box::new(handler),
    );

    let mut read = vec![];
    while let Some(block) = client.read_next_block()? {
        read.push(block);
    }
    assert_eq!(5, read.len());
    for (idx, block) in read.iter().enumerate() {
        assert_eq!(16 + idx, block.data.len());
        assert!(block.data.iter().all(|b| *b == idx as u8));
    }
    client.check_processed_block_ids()?;
    client.log_statics();
    client.close();
    Ok(())
}
