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

use chrono::Utc;
use dashmap::DashMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::metric::{GAUGE_APP_NUMBER, TOTAL_APP_NUMBER};

/// Information about a running application
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub app_id: String,
    pub last_heartbeat: i64,
    pub registration_time: i64,
}

impl ApplicationInfo {
    fn new(app_id: &str, now_millis: i64) -> Self {
        Self {
            app_id: app_id.to_string(),
            last_heartbeat: now_millis,
            registration_time: now_millis,
        }
    }
}

pub type ApplicationManagerRef = Arc<ApplicationManager>;

/// Running applications, kept alive by app heartbeats.
pub struct ApplicationManager {
    apps: DashMap<String, ApplicationInfo>,
    app_expired_ms: i64,
}

impl ApplicationManager {
    pub fn new(config: &Config) -> ApplicationManagerRef {
        Arc::new(Self {
            apps: DashMap::new(),
            app_expired_ms: config.app_expired_ms as i64,
        })
    }

    pub fn start(config: &Config) -> ApplicationManagerRef {
        let manager = Self::new(config);
        let manager_cloned = manager.clone();
        let interval = Duration::from_millis((config.app_expired_ms / 2).max(1));
        tokio::spawn(async move {
            info!("Starting application expiry checker...");
            loop {
                tokio::time::sleep(interval).await;
                manager_cloned.check_expired_apps(Utc::now().timestamp_millis());
            }
        });
        manager
    }

    pub fn refresh_app(&self, app_id: &str) {
        let now = Utc::now().timestamp_millis();
        self.apps
            .entry(app_id.to_string())
            .and_modify(|app| app.last_heartbeat = now)
            .or_insert_with(|| {
                info!("New application registered: {}", app_id);
                TOTAL_APP_NUMBER.inc();
                GAUGE_APP_NUMBER.inc();
                ApplicationInfo::new(app_id, now)
            });
    }

    pub fn get_apps(&self) -> HashSet<String> {
        self.apps.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn get_app(&self, app_id: &str) -> Option<ApplicationInfo> {
        self.apps.get(app_id).map(|entry| entry.value().clone())
    }

    pub fn check_expired_apps(&self, now_millis: i64) -> Vec<String> {
        let mut expired = vec![];
        self.apps.retain(|app_id, app| {
            let is_expired = now_millis - app.last_heartbeat > self.app_expired_ms;
            if is_expired {
                warn!(
                    "Removing expired application: {}, latest heartbeat: {}",
                    app_id, app.last_heartbeat
                );
                expired.push(app_id.clone());
            }
            !is_expired
        });
        GAUGE_APP_NUMBER.sub(expired.len() as i64);
        expired
    }
}

#[cfg(test)]
mod tests {
    use crate::cluster::application::ApplicationManager;
    use crate::config::Config;
    use chrono::Utc;

    #[test]
    fn app_expiry_test() {
        let config = Config {
            app_expired_ms: 1000,
            ..Default::default()
        };
        let manager = ApplicationManager::new(&config);
        manager.refresh_app("app-1");
        manager.refresh_app("app-2");
        manager.refresh_app("app-1");
        assert_eq!(2, manager.get_apps().len());

        let registration = manager.get_app("app-1").unwrap().registration_time;
        let now = Utc::now().timestamp_millis();
        assert!(manager.check_expired_apps(now).is_empty());

        let expired = manager.check_expired_apps(registration + 5000);
        assert_eq!(2, expired.len());
        assert!(manager.get_apps().is_empty());
    }
}
