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
use clap::Parser;
use log::info;
use riffle_common::config::LogLevel;
use riffle_common::log_service::LogService;
use riffle_server::app_manager::AppManager;
use riffle_server::config::{option_descriptors, Config};
use riffle_server::metric::register_custom_metrics;
use riffle_server::service::DefaultShuffleServer;

const LOG_FILE_NAME: &str = "riffle-server.log";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Print every supported option with its default and exit.
    #[arg(long, default_value_t = false)]
    print_options: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.print_options {
        println!("{}", serde_json::to_string_pretty(&option_descriptors())?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::from(path)?,
        None => Config::default(),
    };
    let mut log_config = config.log.clone().unwrap_or_default();
    if let Some(level) = args.log_level {
        log_config.log_level = level;
    }
    let _guard = LogService::init(&log_config, LOG_FILE_NAME)?;

    info!("The specified config show as follows: \n {:#?}", config);

    register_custom_metrics();

    let app_manager_ref = AppManager::get_ref(&config);
    let _service = DefaultShuffleServer::from(app_manager_ref);

    info!(
        "Riffle shuffle server has been started, rpc port: {}, tags: {:?}",
        config.rpc_port, &config.tags
    );

    tokio::signal::ctrl_c().await?;
    info!("Riffle shuffle server is shutting down");
    Ok(())
}
