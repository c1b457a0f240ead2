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

use crate::error::RiffleError;
use bytes::Bytes;
use croaring::{JvmLegacy, Treemap};
use std::fmt;

/// Compressed set of 64-bit integers.
///
/// The serialized form is the portable layout of the JVM `Roaring64NavigableMap`, which is
/// what engine side clients decode.
#[derive(Clone)]
pub struct BitSet64 {
    inner: Treemap,
}

impl BitSet64 {
    pub fn new() -> Self {
        Self {
            inner: Treemap::new(),
        }
    }

    pub fn add(&mut self, value: u64) {
        self.inner.add(value);
    }

    pub fn add_all(&mut self, values: impl IntoIterator<Item = u64>) {
        self.inner.extend(values);
    }

    pub fn remove(&mut self, value: u64) {
        self.inner.remove(value);
    }

    pub fn contains(&self, value: u64) -> bool {
        self.inner.contains(value)
    }

    pub fn cardinality(&self) -> u64 {
        self.inner.cardinality()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.inner.iter()
    }

    pub fn union_with(&mut self, other: &BitSet64) {
        self.inner.or_inplace(&other.inner);
    }

    pub fn intersect_with(&mut self, other: &BitSet64) {
        self.inner.and_inplace(&other.inner);
    }

    pub fn or(&self, other: &BitSet64) -> BitSet64 {
        let mut result = self.clone();
        result.union_with(other);
        result
    }

    pub fn and(&self, other: &BitSet64) -> BitSet64 {
        let mut result = self.clone();
        result.intersect_with(other);
        result
    }

    /// Keeps only the values matching the predicate.
    pub fn retain<F>(&mut self, mut predicate: F)
    where
        F: FnMut(u64) -> bool,
    {
        let removed: Vec<u64> = self.inner.iter().filter(|v| !predicate(*v)).collect();
        for value in removed {
            self.inner.remove(value);
        }
    }

    pub fn serialize(&self) -> Bytes {
        Bytes::from(self.inner.serialize::<JvmLegacy>())
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, RiffleError> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        Treemap::try_deserialize::<JvmLegacy>(bytes)
            .map(|inner| Self { inner })
            .ok_or(RiffleError::BITMAP_DESERIALIZE_FAILED)
    }
}

impl Default for BitSet64 {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for BitSet64 {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl fmt::Debug for BitSet64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitSet64(cardinality={})", self.cardinality())
    }
}

impl FromIterator<u64> for BitSet64 {
    fn from_iter<T: IntoIterator<Item = u64>>(iter: T) -> Self {
        Self {
            inner: Treemap::from_iter(iter),
        }
    }
}

impl From<Treemap> for BitSet64 {
    fn from(inner: Treemap) -> Self {
        Self { inner }
    }
}
