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

//! Statically declared config options.
//!
//! Every option a service understands is declared once as a `const ConfigOption`, carrying
//! its key, default and validator. Config structs take their serde defaults from these
//! declarations and validate themselves against them right after loading.

use crate::error::RiffleError;
use serde::Serialize;
use std::fmt::Debug;

pub struct ConfigOption<T: 'static> {
    key: &'static str,
    description: &'static str,
    default_value: T,
    validator: fn(&T) -> bool,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct OptionDescriptor {
    pub key: &'static str,
    pub value_type: &'static str,
    pub default_value: String,
    pub description: &'static str,
}

impl<T> ConfigOption<T> {
    pub const fn new(
        key: &'static str,
        description: &'static str,
        default_value: T,
        validator: fn(&T) -> bool,
    ) -> Self {
        Self {
            key,
            description,
            default_value,
            validator,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }
}

impl<T: Clone + Debug> ConfigOption<T> {
    pub fn default_value(&self) -> T {
        self.default_value.clone()
    }

    pub fn check(&self, value: &T) -> Result<(), RiffleError> {
        if !(self.validator)(value) {
            return Err(RiffleError::INVALID_CONFIG(format!(
                "Illegal value {:?} for option [{}]: {}",
                value, self.key, self.description
            )));
        }
        Ok(())
    }

    pub fn descriptor(&self) -> OptionDescriptor {
        OptionDescriptor {
            key: self.key,
            value_type: std::any::type_name::<T>(),
            default_value: format!("{:?}", self.default_value),
            description: self.description,
        }
    }
}

pub fn positive_u64(value: &u64) -> bool {
    *value > 0
}

pub fn positive_usize(value: &usize) -> bool {
    *value > 0
}

pub fn any_value<T>(_value: &T) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use crate::config_option::{any_value, positive_u64, ConfigOption};
    use crate::error::RiffleError;

    const TIMEOUT_MS: ConfigOption<u64> = ConfigOption::new(
        "timeout_ms",
        "timeout in milliseconds, must be positive",
        3000,
        positive_u64,
    );

    const OPTIONAL_PATH: ConfigOption<Option<String>> =
        ConfigOption::new("path", "an optional path", None, any_value);

    #[test]
    fn check_test() {
        assert!(TIMEOUT_MS.check(&1).is_ok());
        match TIMEOUT_MS.check(&0) {
            Err(RiffleError::INVALID_CONFIG(msg)) => assert!(msg.contains("timeout_ms")),
            _ => panic!(),
        }
        assert!(OPTIONAL_PATH.check(&None).is_ok());
    }

    #[test]
    fn descriptor_test() {
        assert_eq!(3000, TIMEOUT_MS.default_value());
        let descriptor = TIMEOUT_MS.descriptor();
        assert_eq!("timeout_ms", descriptor.key);
        assert_eq!("u64", descriptor.value_type);
        assert_eq!("3000", descriptor.default_value);

        assert_eq!("None", OPTIONAL_PATH.descriptor().default_value);
    }
}
