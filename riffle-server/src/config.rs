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
use riffle_common::config::{load_toml_config, LogConfig};
use riffle_common::config_option::{any_value, positive_u64, ConfigOption, OptionDescriptor};
use riffle_common::error::RiffleError;
use serde::Deserialize;

pub const RPC_PORT: ConfigOption<u16> = ConfigOption::new(
    "rpc_port",
    "port the shuffle server service is bound to",
    19997,
    any_value,
);

pub const APP_HEARTBEAT_TIMEOUT_MS: ConfigOption<u64> = ConfigOption::new(
    "app_heartbeat_timeout_ms",
    "apps without heartbeat for this long are purged with all their block ids, must be positive",
    60_000,
    positive_u64,
);

pub const APP_EXPIRY_CHECK_INTERVAL_MS: ConfigOption<u64> = ConfigOption::new(
    "app_expiry_check_interval_ms",
    "interval of the app heartbeat checker, must be positive",
    10_000,
    positive_u64,
);

pub const TAGS: ConfigOption<Vec<String>> = ConfigOption::new(
    "tags",
    "tags reported to the coordinator for tag-based assignment",
    Vec::new(),
    any_value,
);

pub const COORDINATOR_QUORUM: ConfigOption<Vec<String>> = ConfigOption::new(
    "coordinator_quorum",
    "coordinator addresses as host:port",
    Vec::new(),
    any_value,
);

pub fn option_descriptors() -> Vec<OptionDescriptor> {
    vec![
        RPC_PORT.descriptor(),
        APP_HEARTBEAT_TIMEOUT_MS.descriptor(),
        APP_EXPIRY_CHECK_INTERVAL_MS.descriptor(),
        TAGS.descriptor(),
        COORDINATOR_QUORUM.descriptor(),
    ]
}

fn as_default_rpc_port() -> u16 {
    RPC_PORT.default_value()
}

fn as_default_app_heartbeat_timeout_ms() -> u64 {
    APP_HEARTBEAT_TIMEOUT_MS.default_value()
}

fn as_default_app_expiry_check_interval_ms() -> u64 {
    APP_EXPIRY_CHECK_INTERVAL_MS.default_value()
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "as_default_rpc_port")]
    pub rpc_port: u16,

    #[serde(default = "as_default_app_heartbeat_timeout_ms")]
    pub app_heartbeat_timeout_ms: u64,
    #[serde(default = "as_default_app_expiry_check_interval_ms")]
    pub app_expiry_check_interval_ms: u64,

    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub coordinator_quorum: Vec<String>,

    pub log: Option<LogConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_port: as_default_rpc_port(),
            app_heartbeat_timeout_ms: as_default_app_heartbeat_timeout_ms(),
            app_expiry_check_interval_ms: as_default_app_expiry_check_interval_ms(),
            tags: TAGS.default_value(),
            coordinator_quorum: COORDINATOR_QUORUM.default_value(),
            log: None,
        }
    }
}

impl Config {
    pub fn from(cfg_path: &str) -> Result<Self> {
        let config: Config = load_toml_config(cfg_path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RiffleError> {
        RPC_PORT.check(&self.rpc_port)?;
        APP_HEARTBEAT_TIMEOUT_MS.check(&self.app_heartbeat_timeout_ms)?;
        APP_EXPIRY_CHECK_INTERVAL_MS.check(&self.app_expiry_check_interval_ms)?;
        TAGS.check(&self.tags)?;
        COORDINATOR_QUORUM.check(&self.coordinator_quorum)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{option_descriptors, Config};

    #[test]
    fn config_test() {
        let toml_str = r#"
        app_heartbeat_timeout_ms = 120000
        tags = ["ss_v5", "GRPC"]
        coordinator_quorum = ["xxxxxxx1:19999"]
        "#;

        let config = Config::from_toml_str(toml_str).unwrap();
        assert_eq!(120_000, config.app_heartbeat_timeout_ms);
        assert_eq!(10_000, config.app_expiry_check_interval_ms);
        assert_eq!(19997, config.rpc_port);
        assert_eq!(vec!["ss_v5".to_string(), "GRPC".to_string()], config.tags);
        assert_eq!(1, config.coordinator_quorum.len());
        assert!(config.log.is_none());
    }

    #[test]
    fn invalid_config_test() {
        assert!(Config::from_toml_str("app_expiry_check_interval_ms = 0").is_err());
        assert!(Config::from_toml_str("app_heartbeat_timeout_ms = 0").is_err());
    }

    #[test]
    fn descriptors_test() {
        let descriptors = option_descriptors();
        assert_eq!(5, descriptors.len());
        assert!(descriptors.iter().any(|d| d.key == "coordinator_quorum"));
    }
}
