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
use log::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogConfig, RotationConfig};

pub struct LogService;
impl LogService {
    pub fn init_for_test() {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let formatting_layer = fmt::layer().pretty().with_writer(std::io::stderr);

        // tests in the same process share the global subscriber
        let _ = Registry::default()
            .with(env_filter)
            .with(formatting_layer)
            .try_init();
    }

    pub fn init(log: &LogConfig, log_file_name: &str) -> Result<WorkerGuard> {
        let rotation = match log.rotation {
            RotationConfig::Hourly => Rotation::HOURLY,
            RotationConfig::Daily => Rotation::DAILY,
            RotationConfig::Never => Rotation::NEVER,
        };
        let file_appender = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(log_file_name)
            .max_log_files(log.max_log_files)
            .build(&log.path)?;

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log.log_level.as_filter_directive()));
        let formatting_layer = fmt::layer().pretty().with_writer(std::io::stderr);

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_line_number(true)
            .with_writer(non_blocking);

        Registry::default()
            .with(env_filter)
            .with(formatting_layer)
            .with(file_layer)
            .try_init()?;

        info!(
            "Logging to {}/{} with level: {:?}",
            &log.path, log_file_name, &log.log_level
        );
        // The guard flushes buffered logs on drop, callers must hold it until exit.
        Ok(guard)
    }
}
