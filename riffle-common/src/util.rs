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

use crc32fast::Hasher;
use std::time::{SystemTime, UNIX_EPOCH};

const LENGTH_PER_CRC: usize = 4 * 1024;

/// CRC32 over the bytes in 4KB steps, the same value the engine side clients compute.
pub fn get_crc(bytes: &[u8]) -> i64 {
    let mut crc32 = Hasher::new();
    for chunk in bytes.chunks(LENGTH_PER_CRC) {
        crc32.update(chunk);
    }
    crc32.finalize() as i64
}

pub fn now_timestamp_as_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn now_timestamp_as_sec() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod test {
    use crate::util::{get_crc, now_timestamp_as_millis, now_timestamp_as_sec};
    use bytes::Bytes;

    #[test]
    fn time_test() {
        let sec = now_timestamp_as_sec();
        let millis = now_timestamp_as_millis();
        assert!(millis / 1000 >= sec);
    }

    #[test]
    fn crc_test() {
        let data = Bytes::from("hello world! hello china!");
        let crc_value = get_crc(&data);
        // This value is the same with java's implementation
        assert_eq!(3871485936, crc_value);

        // larger than one crc step
        let data = vec![7u8; 10 * 1024 + 3];
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&data);
        assert_eq!(hasher.finalize() as i64, get_crc(&data));
    }
}
