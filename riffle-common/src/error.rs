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

use crate::constant::StatusCode;
use anyhow::Error;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(non_camel_case_types)]
pub enum RiffleError {
    #[error("Invalid argument: {0}")]
    INVALID_ARGUMENT(String),

    #[error("Invalid config: {0}")]
    INVALID_CONFIG(String),

    #[error("Bitmap bytes can't be deserialized")]
    BITMAP_DESERIALIZE_FAILED,

    #[error("Can't find shuffle data, app: {0} is not found")]
    APP_IS_NOT_FOUND(String),

    #[error("Can't find shuffle data, shuffle: {1} of app: {0} is not registered")]
    SHUFFLE_IS_NOT_FOUND(String, i32),

    #[error("Unexpected crc value for blockId[{block_id}], expected:{expected}, actual:{actual}")]
    CHECKSUM_MISMATCH {
        block_id: i64,
        expected: i64,
        actual: i64,
    },

    #[error("Shuffle data is corrupted: {0}")]
    DATA_CORRUPTED(String),

    #[error("Blocks read inconsistent: expected {expected} blocks, actual {actual} blocks")]
    BLOCKS_READ_INCONSISTENT { expected: u64, actual: u64 },

    #[error("Empty assignment to shuffle servers, please check the coordinator")]
    EMPTY_ASSIGNMENT,

    #[error("Rpc failed with status: {0}, message: {1}")]
    RPC_FAILED(StatusCode, String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RiffleError {
    /// Integrity failures end the current read and must not be retried in place.
    pub fn is_data_integrity_error(&self) -> bool {
        matches!(
            self,
            RiffleError::CHECKSUM_MISMATCH { .. }
                | RiffleError::DATA_CORRUPTED(_)
                | RiffleError::BLOCKS_READ_INCONSISTENT { .. }
        )
    }
}

impl From<std::io::Error> for RiffleError {
    fn from(err: std::io::Error) -> Self {
        RiffleError::Other(Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::RiffleError;

    #[test]
    fn error_message_test() {
        let err = RiffleError::BLOCKS_READ_INCONSISTENT {
            expected: 5,
            actual: 3,
        };
        assert_eq!(
            "Blocks read inconsistent: expected 5 blocks, actual 3 blocks",
            err.to_string()
        );
        assert!(err.is_data_integrity_error());

        let err = RiffleError::APP_IS_NOT_FOUND("app-1".to_string());
        assert!(!err.is_data_integrity_error());
    }

    #[test]
    fn io_error_conversion_test() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: RiffleError = io_err.into();
        match err {
            RiffleError::Other(_) => {}
            _ => panic!(),
        }
    }
}
