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

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::RiffleError;

/// Reads a toml file into the given config type.
pub fn load_toml_config<T: DeserializeOwned>(cfg_path: &str) -> Result<T> {
    let path = Path::new(cfg_path);
    let file_content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", cfg_path))?;
    let config = toml::from_str(&file_content)
        .with_context(|| format!("Failed to parse config file: {}", cfg_path))?;
    Ok(config)
}

// =========================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "as_default_log_path")]
    pub path: String,
    #[serde(default = "as_default_rotation_config")]
    pub rotation: RotationConfig,
    #[serde(default = "as_default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default = "as_default_log_level")]
    pub log_level: LogLevel,
}

fn as_default_log_path() -> String {
    "/tmp/".to_string()
}

fn as_default_rotation_config() -> RotationConfig {
    RotationConfig::Daily
}

fn as_default_max_log_files() -> usize {
    10
}

fn as_default_log_level() -> LogLevel {
    LogLevel::INFO
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            path: as_default_log_path(),
            rotation: as_default_rotation_config(),
            max_log_files: as_default_max_log_files(),
            log_level: as_default_log_level(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum RotationConfig {
    Hourly,
    Daily,
    Never,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum LogLevel {
    DEBUG,
    INFO,
    WARN,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::DEBUG => "debug",
            LogLevel::INFO => "info",
            LogLevel::WARN => "warn",
        }
    }
}

impl FromStr for LogLevel {
    type Err = RiffleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::DEBUG),
            "INFO" => Ok(LogLevel::INFO),
            "WARN" => Ok(LogLevel::WARN),
            _ => Err(RiffleError::INVALID_CONFIG(format!(
                "Unknown log level: {}",
                s
            ))),
        }
    }
}
