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

pub static GAUGE_SERVER_NUMBER: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("total_server_num", "total_server_num").expect("metric should be created")
});

pub static GAUGE_EXCLUDED_SERVER_NUMBER: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("excluded_server_num", "excluded_server_num")
        .expect("metric should be created")
});

pub static TOTAL_TIMEOUT_REMOVED_SERVER: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("total_timeout_removed_server", "total_timeout_removed_server")
        .expect("metric should be created")
});

pub static GAUGE_APP_NUMBER: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("running_app_num", "running_app_num").expect("metric should be created")
});

pub static TOTAL_APP_NUMBER: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("total_app_num", "total_app_num").expect("metric should be created")
});

pub static TOTAL_ASSIGNMENT_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("total_assignment_failed", "total_assignment_failed")
        .expect("metric should be created")
});

static REGISTER: Once = Once::new();

pub fn register_custom_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(GAUGE_SERVER_NUMBER.clone()))
            .expect("total_server_num must be registered");
        REGISTRY
            .register(Box::new(GAUGE_EXCLUDED_SERVER_NUMBER.clone()))
            .expect("excluded_server_num must be registered");
        REGISTRY
            .register(Box::new(TOTAL_TIMEOUT_REMOVED_SERVER.clone()))
            .expect("total_timeout_removed_server must be registered");
        REGISTRY
            .register(Box::new(GAUGE_APP_NUMBER.clone()))
            .expect("running_app_num must be registered");
        REGISTRY
            .register(Box::new(TOTAL_APP_NUMBER.clone()))
            .expect("total_app_num must be registered");
        REGISTRY
            .register(Box::new(TOTAL_ASSIGNMENT_FAILED.clone()))
            .expect("total_assignment_failed must be registered");
    });
}

#[cfg(test)]
mod tests {
    use crate::metric::{register_custom_metrics, REGISTRY};

    #[test]
    fn register_twice_test() {
        register_custom_metrics();
        register_custom_metrics();
        let names: Vec<String> = REGISTRY
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"total_server_num".to_string()));
    }
}
