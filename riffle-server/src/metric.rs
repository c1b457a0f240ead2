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

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntGauge, Registry};
use std::sync::Once;

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static BLOCK_ID_NUMBER: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("block_id_number", "block_id_number").expect("metric should be created")
});

pub static GAUGE_APP_NUMBER: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("app_number", "app_number").expect("metric should be created"));

pub static TOTAL_APP_NUMBER: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("total_app_number", "total_app_number").expect("metric should be created")
});

pub static TOTAL_REPORTED_BLOCK_IDS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("total_reported_block_ids", "total_reported_block_ids")
        .expect("metric should be created")
});

pub static PURGE_FAILED_COUNTER: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("purge_failed_count", "purge_failed_count").expect("metric should be created")
});

pub static TOTAL_UPLOADED_FILES_DELETE_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "total_uploaded_files_delete_failed",
        "total_uploaded_files_delete_failed",
    )
    .expect("metric should be created")
});

static REGISTER: Once = Once::new();

pub fn register_custom_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(BLOCK_ID_NUMBER.clone()))
            .expect("block_id_number must be registered");
        REGISTRY
            .register(Box::new(GAUGE_APP_NUMBER.clone()))
            .expect("app_number must be registered");
        REGISTRY
            .register(Box::new(TOTAL_APP_NUMBER.clone()))
            .expect("total_app_number must be registered");
        REGISTRY
            .register(Box::new(TOTAL_REPORTED_BLOCK_IDS.clone()))
            .expect("total_reported_block_ids must be registered");
        REGISTRY
            .register(Box::new(PURGE_FAILED_COUNTER.clone()))
            .expect("purge_failed_count must be registered");
        REGISTRY
            .register(Box::new(TOTAL_UPLOADED_FILES_DELETE_FAILED.clone()))
            .expect("total_uploaded_files_delete_failed must be registered");
    });
}
