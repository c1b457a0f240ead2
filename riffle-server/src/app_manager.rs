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

pub mod app;
pub mod purge_event;

use crate::app_manager::app::App;
use crate::app_manager::purge_event::{PurgeEvent, PurgeReason};
use crate::config::Config;
use crate::metric::{GAUGE_APP_NUMBER, PURGE_FAILED_COUNTER, TOTAL_APP_NUMBER};
use anyhow::{anyhow, Result};
use dashmap::DashMap;
use log::{error, info, warn};
use riffle_common::bitmap::BitSet64;
use riffle_common::error::RiffleError;
use riffle_common::protocol::PartitionRange;
use riffle_common::util::now_timestamp_as_millis;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub type AppManagerRef = Arc<AppManager>;

/// Tracks the reported block ids of every running app, and purges them on explicit
/// unregister or heartbeat timeout.
pub struct AppManager {
    // key: app_id
    apps: DashMap<String, Arc<App>>,
    receiver: async_channel::Receiver<PurgeEvent>,
    sender: async_channel::Sender<PurgeEvent>,
    app_heartbeat_timeout_ms: u64,
    app_expiry_check_interval: Duration,
}

impl AppManager {
    fn new(config: &Config) -> Self {
        let (sender, receiver) = async_channel::unbounded();
        AppManager {
            apps: DashMap::new(),
            receiver,
            sender,
            app_heartbeat_timeout_ms: config.app_heartbeat_timeout_ms,
            app_expiry_check_interval: Duration::from_millis(config.app_expiry_check_interval_ms),
        }
    }

    /// Builds the manager and spawns the heartbeat checker and the purger onto the
    /// current tokio runtime.
    pub fn get_ref(config: &Config) -> AppManagerRef {
        let app_ref = Arc::new(AppManager::new(config));

        let app_manager_ref_cloned = app_ref.clone();
        tokio::spawn(async move {
            info!("Starting app heartbeat checker...");
            loop {
                tokio::time::sleep(app_manager_ref_cloned.app_expiry_check_interval).await;
                app_manager_ref_cloned
                    .detect_expired_apps(now_timestamp_as_millis())
                    .await;
            }
        });

        let app_manager_cloned = app_ref.clone();
        tokio::spawn(async move {
            info!("Starting purge event handler...");
            while let Ok(event) = app_manager_cloned.receiver.recv().await {
                let reason = event.reason;
                info!("Purging data with reason: {}", &reason);
                if let Err(err) = app_manager_cloned.purge_app_data(&reason).await {
                    PURGE_FAILED_COUNTER.inc();
                    error!(
                        "Errors on purging data with reason: {}. err: {:?}",
                        &reason, err
                    );
                }
            }
        });

        app_ref
    }

    pub fn app_is_exist(&self, app_id: &str) -> bool {
        self.apps.contains_key(app_id)
    }

    pub fn get_app(&self, app_id: &str) -> Option<Arc<App>> {
        self.apps.get(app_id).map(|v| v.value().clone())
    }

    pub fn get_alive_app_number(&self) -> usize {
        self.apps.len()
    }

    fn get_or_create_app(&self, app_id: &str) -> Arc<App> {
        self.apps
            .entry(app_id.to_string())
            .or_insert_with(|| {
                info!("Accepting new app: {}", app_id);
                TOTAL_APP_NUMBER.inc();
                GAUGE_APP_NUMBER.inc();
                Arc::new(App::new(app_id))
            })
            .clone()
    }

    fn get_existing_app(&self, app_id: &str) -> Result<Arc<App>, RiffleError> {
        self.get_app(app_id)
            .ok_or_else(|| RiffleError::APP_IS_NOT_FOUND(app_id.to_string()))
    }

    pub fn register_shuffle(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_ranges: Vec<PartitionRange>,
    ) {
        info!(
            "Accepting registry. app_id: {}, shuffle_id: {}, ranges: {:?}",
            app_id, shuffle_id, &partition_ranges
        );
        self.get_or_create_app(app_id)
            .register_shuffle(shuffle_id, partition_ranges);
    }

    pub fn report_shuffle_result(
        &self,
        app_id: &str,
        shuffle_id: i32,
        task_attempt_id: i64,
        bitmap_num: i32,
        partitioned_block_ids: HashMap<i32, Vec<i64>>,
    ) -> Result<u64, RiffleError> {
        self.get_existing_app(app_id)?.report_block_ids(
            shuffle_id,
            task_attempt_id,
            bitmap_num,
            partitioned_block_ids,
        )
    }

    pub fn get_shuffle_result(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_id: i32,
    ) -> Result<BitSet64, RiffleError> {
        self.get_existing_app(app_id)?
            .get_block_ids(shuffle_id, partition_id)
    }

    pub fn get_shuffle_result_for_multi_part(
        &self,
        app_id: &str,
        shuffle_id: i32,
        partition_ids: &[i32],
    ) -> Result<BitSet64, RiffleError> {
        self.get_existing_app(app_id)?
            .get_multi_block_ids(shuffle_id, partition_ids)
    }

    pub fn app_heartbeat(&self, app_id: &str) {
        self.get_or_create_app(app_id).heartbeat();
    }

    pub async fn unregister_shuffle(&self, app_id: &str, shuffle_id: i32) -> Result<()> {
        self.sender
            .send(PurgeEvent {
                reason: PurgeReason::SHUFFLE_LEVEL_EXPLICIT_UNREGISTER(
                    app_id.to_string(),
                    shuffle_id,
                ),
            })
            .await?;
        Ok(())
    }

    pub async fn unregister_app(&self, app_id: &str) -> Result<()> {
        self.sender
            .send(PurgeEvent {
                reason: PurgeReason::APP_LEVEL_EXPLICIT_UNREGISTER(app_id.to_string()),
            })
            .await?;
        Ok(())
    }

    /// Sends one heartbeat timeout purge event per newly expired app and returns their ids.
    pub async fn detect_expired_apps(&self, now_millis: u64) -> Vec<String> {
        let expired: Vec<String> = self
            .apps
            .iter()
            .filter(|entry| {
                let last_time = entry.value().get_latest_heartbeat_time();
                now_millis.saturating_sub(last_time) > self.app_heartbeat_timeout_ms
            })
            .filter(|entry| entry.value().mark_expiry_notified())
            .map(|entry| entry.key().clone())
            .collect();

        for app_id in &expired {
            info!(
                "Detected app:{} heartbeat timeout. now: {}. timeout threshold: {}(ms)",
                app_id, now_millis, self.app_heartbeat_timeout_ms
            );
            if self
                .sender
                .send(PurgeEvent {
                    reason: PurgeReason::APP_LEVEL_HEARTBEAT_TIMEOUT(app_id.clone()),
                })
                .await
                .is_err()
            {
                error!(
                    "Errors on sending purge event when app: {} heartbeat timeout",
                    app_id
                );
            }
        }
        expired
    }

    pub(crate) async fn purge_app_data(&self, reason: &PurgeReason) -> Result<u64> {
        let (app_id, shuffle_id_option) = reason.extract();
        let app = self.get_app(&app_id).ok_or(anyhow!(
            "App:{} don't exist when purging data, this should not happen",
            &app_id
        ))?;
        if shuffle_id_option.is_none() {
            if self.apps.remove(&app_id).is_some() {
                GAUGE_APP_NUMBER.dec();
            } else {
                warn!("App:{} has been removed by another purge", &app_id);
            }
        }
        Ok(app.purge(reason))
    }
}
