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

use serde::{Deserialize, Serialize};

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum StatusCode {
    SUCCESS = 0,
    INTERNAL_ERROR = 6,
    TIMEOUT = 7,
}

impl Into<i32> for StatusCode {
    fn into(self) -> i32 {
        self as i32
    }
}

impl From<i32> for StatusCode {
    // Codes outside the closed set are never treated as success.
    fn from(code: i32) -> Self {
        match code {
            0 => StatusCode::SUCCESS,
            7 => StatusCode::TIMEOUT,
            _ => StatusCode::INTERNAL_ERROR,
        }
    }
}

impl StatusCode {
    pub fn is_success(&self) -> bool {
        *self == StatusCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use crate::constant::StatusCode;

    #[test]
    fn status_code_conversion_test() {
        let code: i32 = StatusCode::TIMEOUT.into();
        assert_eq!(7, code);
        assert_eq!(StatusCode::SUCCESS, StatusCode::from(0));
        assert_eq!(StatusCode::TIMEOUT, StatusCode::from(7));
        assert_eq!(StatusCode::INTERNAL_ERROR, StatusCode::from(6));
        // unknown codes
        assert_eq!(StatusCode::INTERNAL_ERROR, StatusCode::from(3));
        assert_eq!(StatusCode::INTERNAL_ERROR, StatusCode::from(-1));
        assert_eq!("TIMEOUT", StatusCode::TIMEOUT.to_string());
    }
}
