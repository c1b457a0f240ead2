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

use strum_macros::Display;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Display, PartialEq)]
pub enum PurgeReason {
    SHUFFLE_LEVEL_EXPLICIT_UNREGISTER(String, i32),
    APP_LEVEL_EXPLICIT_UNREGISTER(String),
    APP_LEVEL_HEARTBEAT_TIMEOUT(String),
}

impl PurgeReason {
    pub fn extract(&self) -> (String, Option<i32>) {
        match &self {
            PurgeReason::SHUFFLE_LEVEL_EXPLICIT_UNREGISTER(x, y) => (x.to_owned(), Some(*y)),
            PurgeReason::APP_LEVEL_EXPLICIT_UNREGISTER(x) => (x.to_owned(), None),
            PurgeReason::APP_LEVEL_HEARTBEAT_TIMEOUT(x) => (x.to_owned(), None),
        }
    }

    pub fn extract_app_id(&self) -> &str {
        match &self {
            PurgeReason::SHUFFLE_LEVEL_EXPLICIT_UNREGISTER(x, _) => x,
            PurgeReason::APP_LEVEL_EXPLICIT_UNREGISTER(x) => x,
            PurgeReason::APP_LEVEL_HEARTBEAT_TIMEOUT(x) => x,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PurgeEvent {
    pub(crate) reason: PurgeReason,
}
