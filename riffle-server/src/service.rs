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

use crate::app_manager::AppManagerRef;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error, info};
use riffle_common::bitmap::BitSet64;
use riffle_common::constant::StatusCode;
use riffle_common::error::RiffleError;
use riffle_common::protocol::{
    AppHeartbeatRequest, GetShuffleResultForMultiPartRequest, GetShuffleResultRequest,
    GetShuffleResultResponse, RegisterShuffleRequest, ReportShuffleResultRequest,
    ShuffleServerService, StatusResponse, UnregisterAppRequest, UnregisterShuffleRequest,
};

#[derive(Clone)]
pub struct DefaultShuffleServer {
    app_manager_ref: AppManagerRef,
}

impl DefaultShuffleServer {
    pub fn from(app_manager_ref: AppManagerRef) -> Self {
        Self { app_manager_ref }
    }
}

fn to_result_response(result: Result<BitSet64, RiffleError>) -> GetShuffleResultResponse {
    match result {
        Ok(bitmap) => GetShuffleResultResponse {
            status: StatusCode::SUCCESS,
            ret_msg: "".to_string(),
            serialized_bitmap: bitmap.serialize(),
        },
        Err(err) => GetShuffleResultResponse {
            status: StatusCode::INTERNAL_ERROR,
            ret_msg: err.to_string(),
            serialized_bitmap: Bytes::new(),
        },
    }
}

#[async_trait]
impl ShuffleServerService for DefaultShuffleServer {
    async fn register_shuffle(&self, request: RegisterShuffleRequest) -> Result<StatusResponse> {
        self.app_manager_ref.register_shuffle(
            &request.app_id,
            request.shuffle_id,
            request.partition_ranges,
        );
        Ok(StatusResponse::success())
    }

    async fn report_shuffle_result(
        &self,
        request: ReportShuffleResultRequest,
    ) -> Result<StatusResponse> {
        let app_id = request.app_id;
        let shuffle_id = request.shuffle_id;
        let task_attempt_id = request.task_attempt_id;
        let partition_num = request.partition_to_block_ids.len();

        match self.app_manager_ref.report_shuffle_result(
            &app_id,
            shuffle_id,
            task_attempt_id,
            request.bitmap_num,
            request.partition_to_block_ids,
        ) {
            Ok(number) => {
                debug!(
                    "Accepted {} block ids of {} partitions. app: {}, shuffle: {}, task: {}",
                    number, partition_num, &app_id, shuffle_id, task_attempt_id
                );
                Ok(StatusResponse::success())
            }
            Err(err) => {
                error!(
                    "Errors on reporting shuffle result. app: {}, shuffle: {}, task: {}. err: {}",
                    &app_id, shuffle_id, task_attempt_id, err
                );
                Ok(StatusResponse::failure(
                    StatusCode::INTERNAL_ERROR,
                    err.to_string(),
                ))
            }
        }
    }

    async fn get_shuffle_result(
        &self,
        request: GetShuffleResultRequest,
    ) -> Result<GetShuffleResultResponse> {
        let result = self.app_manager_ref.get_shuffle_result(
            &request.app_id,
            request.shuffle_id,
            request.partition_id,
        );
        if let Err(err) = &result {
            error!(
                "Errors on getting shuffle result. app: {}, shuffle: {}, partition: {}. err: {}",
                &request.app_id, request.shuffle_id, request.partition_id, err
            );
        }
        Ok(to_result_response(result))
    }

    async fn get_shuffle_result_for_multi_part(
        &self,
        request: GetShuffleResultForMultiPartRequest,
    ) -> Result<GetShuffleResultResponse> {
        let result = self.app_manager_ref.get_shuffle_result_for_multi_part(
            &request.app_id,
            request.shuffle_id,
            &request.partitions,
        );
        if let Err(err) = &result {
            error!(
                "Errors on getting shuffle result. app: {}, shuffle: {}, partitions: {:?}. err: {}",
                &request.app_id, request.shuffle_id, &request.partitions, err
            );
        }
        Ok(to_result_response(result))
    }

    async fn app_heartbeat(&self, request: AppHeartbeatRequest) -> Result<StatusResponse> {
        self.app_manager_ref.app_heartbeat(&request.app_id);
        Ok(StatusResponse::success())
    }

    async fn unregister_shuffle(
        &self,
        request: UnregisterShuffleRequest,
    ) -> Result<StatusResponse> {
        info!(
            "Accepted unregister shuffle request. app: {}, shuffle: {}",
            &request.app_id, request.shuffle_id
        );
        self.app_manager_ref
            .unregister_shuffle(&request.app_id, request.shuffle_id)
            .await?;
        Ok(StatusResponse::success())
    }

    async fn unregister_app(&self, request: UnregisterAppRequest) -> Result<StatusResponse> {
        info!("Accepted unregister app request. app: {}", &request.app_id);
        self.app_manager_ref.unregister_app(&request.app_id).await?;
        Ok(StatusResponse::success())
    }
}
