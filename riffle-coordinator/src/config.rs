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
use riffle_common::config_option::{
    any_value, positive_u64, positive_usize, ConfigOption, OptionDescriptor,
};
use riffle_common::error::RiffleError;
use serde::Deserialize;

pub const RPC_PORT: ConfigOption<u16> = ConfigOption::new(
    "rpc_port",
    "port the coordinator service is bound to",
    19999,
    any_value,
);

pub const HEARTBEAT_TIMEOUT_MS: ConfigOption<u64> = ConfigOption::new(
    "heartbeat_timeout_ms",
    "shuffle servers without heartbeat for this long are removed, must be positive",
    30_000,
    positive_u64,
);

pub const NODE_EXPIRY_CHECK_INTERVAL_MS: ConfigOption<u64> = ConfigOption::new(
    "node_expiry_check_interval_ms",
    "interval of the expired shuffle servers scan, must be positive",
    10_000,
    positive_u64,
);

pub const EXCLUDE_NODES_FILE_PATH: ConfigOption<Option<String>> = ConfigOption::new(
    "exclude_nodes_file_path",
    "file listing excluded shuffle server ids, one per line",
    None,
    any_value,
);

pub const EXCLUDE_NODES_CHECK_INTERVAL_MS: ConfigOption<u64> = ConfigOption::new(
    "exclude_nodes_check_interval_ms",
    "polling interval of the exclude nodes file, must be positive",
    60_000,
    positive_u64,
);

pub const SHUFFLE_NODES_MAX: ConfigOption<usize> = ConfigOption::new(
    "shuffle_nodes_max",
    "max number of shuffle servers used by one shuffle, must be positive",
    9,
    positive_usize,
);

pub const APP_EXPIRED_MS: ConfigOption<u64> = ConfigOption::new(
    "app_expired_ms",
    "apps without heartbeat for this long are removed, must be positive",
    60_000,
    positive_u64,
);

pub fn option_descriptors() -> Vec<OptionDescriptor> {
    vec![
        RPC_PORT.descriptor(),
        HEARTBEAT_TIMEOUT_MS.descriptor(),
        NODE_EXPIRY_CHECK_INTERVAL_MS.descriptor(),
        EXCLUDE_NODES_FILE_PATH.descriptor(),
        EXCLUDE_NODES_CHECK_INTERVAL_MS.descriptor(),
        SHUFFLE_NODES_MAX.descriptor(),
        APP_EXPIRED_MS.descriptor(),
    ]
}

fn as_default_rpc_port() -> u16 {
    RPC_PORT.default_value()
}

fn as_default_heartbeat_timeout_ms() -> u64 {
    HEARTBEAT_TIMEOUT_MS.default_value()
}

fn as_default_node_expiry_check_interval_ms() -> u64 {
    NODE_EXPIRY_CHECK_INTERVAL_MS.default_value()
}

fn as_default_exclude_nodes_file_path() -> Option<String> {
    EXCLUDE_NODES_FILE_PATH.default_value()
}

fn as_default_exclude_nodes_check_interval_ms() -> u64 {
    EXCLUDE_NODES_CHECK_INTERVAL_MS.default_value()
}

fn as_default_shuffle_nodes_max() -> usize {
    SHUFFLE_NODES_MAX.default_value()
}

fn as_default_app_expired_ms() -> u64 {
    APP_EXPIRED_MS.default_value()
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "as_default_rpc_port")]
    pub rpc_port: u16,

    #[serde(default = "as_default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    #[serde(default = "as_default_node_expiry_check_interval_ms")]
    pub node_expiry_check_interval_ms: u64,

    #[serde(default = "as_default_exclude_nodes_file_path")]
    pub exclude_nodes_file_path: Option<String>,
    #[serde(default = "as_default_exclude_nodes_check_interval_ms")]
    pub exclude_nodes_check_interval_ms: u64,

    #[serde(default = "as_default_shuffle_nodes_max")]
    pub shuffle_nodes_max: usize,

    #[serde(default = "as_default_app_expired_ms")]
    pub app_expired_ms: u64,

    pub log: Option<LogConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_port: as_default_rpc_port(),
            heartbeat_timeout_ms: as_default_heartbeat_timeout_ms(),
            node_expiry_check_interval_ms: as_default_node_expiry_check_interval_ms(),
            exclude_nodes_file_path: as_default_exclude_nodes_file_path(),
            exclude_nodes_check_interval_ms: as_default_exclude_nodes_check_interval_ms(),
            shuffle_nodes_max: as_default_shuffle_nodes_max(),
            app_expired_ms: as_default_app_expired_ms(),
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
        HEARTBEAT_TIMEOUT_MS.check(&self.heartbeat_timeout_ms)?;
        NODE_EXPIRY_CHECK_INTERVAL_MS.check(&self.node_expiry_check_interval_ms)?;
        EXCLUDE_NODES_FILE_PATH.check(&self.exclude_nodes_file_path)?;
        EXCLUDE_NODES_CHECK_INTERVAL_MS.check(&self.exclude_nodes_check_interval_ms)?;
        SHUFFLE_NODES_MAX.check(&self.shuffle_nodes_max)?;
        APP_EXPIRED_MS.check(&self.app_expired_ms)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{option_descriptors, Config, HEARTBEAT_TIMEOUT_MS};

    #[test]
    fn config_test() {
        let toml_str = r#"
        heartbeat_timeout_ms = 5000
        node_expiry_check_interval_ms = 1000
        exclude_nodes_file_path = "/tmp/riffle/exclude_nodes"

        [log]
        path = "/tmp/riffle/logs"
        "#;

        let config = Config::from_toml_str(toml_str).unwrap();
        assert_eq!(5000, config.heartbeat_timeout_ms);
        assert_eq!(1000, config.node_expiry_check_interval_ms);
        assert_eq!(
            Some("/tmp/riffle/exclude_nodes".to_string()),
            config.exclude_nodes_file_path
        );
        assert_eq!(9, config.shuffle_nodes_max);
        assert_eq!(60_000, config.exclude_nodes_check_interval_ms);
        assert_eq!("/tmp/riffle/logs", config.log.unwrap().path);
    }

    #[test]
    fn invalid_config_test() {
        assert!(Config::from_toml_str("heartbeat_timeout_ms = 0").is_err());
        assert!(Config::from_toml_str("shuffle_nodes_max = 0").is_err());
        assert!(Config::from_toml_str("node_expiry_check_interval_ms = 0").is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn descriptors_test() {
        let descriptors = option_descriptors();
        assert_eq!(7, descriptors.len());
        let timeout = descriptors
            .iter()
            .find(|d| d.key == HEARTBEAT_TIMEOUT_MS.key())
            .unwrap();
        assert_eq!("30000", timeout.default_value);
    }
}
