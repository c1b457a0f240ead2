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

//! Completion contract of the tiered-storage uploader. The uploader pushes local data and
//! index files to remote storage on a best-effort basis. Only the local files whose
//! partitions are confirmed in the upload result may be deleted afterwards.

use crate::metric::TOTAL_UPLOADED_FILES_DELETE_FAILED;
use async_trait::async_trait;
use log::{info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShuffleUploadResult {
    // total bytes of the successfully uploaded files
    pub size: u64,
    pub partitions: Vec<i32>,
}

impl ShuffleUploadResult {
    pub fn new(size: u64, partitions: Vec<i32>) -> Self {
        Self { size, partitions }
    }

    /// Each uploaded partition accounts for one data file and one index file.
    pub fn files_num(&self) -> usize {
        self.partitions.len() * 2
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalPartitionFiles {
    pub partition_id: i32,
    pub data_file: PathBuf,
    pub index_file: PathBuf,
}

#[async_trait]
pub trait ShuffleUploadHandler: Send + Sync {
    /// Uploads the i-th data and index file as the files of the i-th partition. Files that
    /// fail are left out of the result.
    async fn upload(
        &self,
        data_files: &[PathBuf],
        index_files: &[PathBuf],
        partitions: &[i32],
    ) -> ShuffleUploadResult;
}

/// Uploads into another directory, which stands in for a mounted remote filesystem.
pub struct LocalDirUploadHandler {
    target_dir: PathBuf,
}

impl LocalDirUploadHandler {
    pub fn new(target_dir: impl AsRef<Path>) -> Self {
        Self {
            target_dir: target_dir.as_ref().to_path_buf(),
        }
    }

    async fn copy_file(&self, file: &Path) -> std::io::Result<u64> {
        let file_name = file.file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("No file name in path: {:?}", file),
            )
        })?;
        tokio::fs::create_dir_all(&self.target_dir).await?;
        tokio::fs::copy(file, self.target_dir.join(file_name)).await
    }
}

#[async_trait]
impl ShuffleUploadHandler for LocalDirUploadHandler {
    async fn upload(
        &self,
        data_files: &[PathBuf],
        index_files: &[PathBuf],
        partitions: &[i32],
    ) -> ShuffleUploadResult {
        let mut result = ShuffleUploadResult::default();
        for ((data_file, index_file), partition_id) in
            data_files.iter().zip(index_files).zip(partitions)
        {
            let data_size = match self.copy_file(data_file).await {
                Ok(size) => size,
                Err(err) => {
                    warn!("Errors on uploading data file: {:?}. err: {}", data_file, err);
                    continue;
                }
            };
            let index_size = match self.copy_file(index_file).await {
                Ok(size) => size,
                Err(err) => {
                    warn!(
                        "Errors on uploading index file: {:?}. err: {}",
                        index_file, err
                    );
                    continue;
                }
            };
            result.size += data_size + index_size;
            result.partitions.push(*partition_id);
        }
        info!(
            "Uploaded {} files of partitions: {:?} to {:?}, total size: {}",
            result.files_num(),
            &result.partitions,
            &self.target_dir,
            result.size
        );
        result
    }
}

pub struct UploadedFilesCleaner;

impl UploadedFilesCleaner {
    /// Local data and index files whose partitions are confirmed uploaded.
    pub fn deletable_files(
        result: &ShuffleUploadResult,
        local_files: &[LocalPartitionFiles],
    ) -> Vec<PathBuf> {
        let uploaded: HashSet<i32> = result.partitions.iter().copied().collect();
        local_files
            .iter()
            .filter(|files| uploaded.contains(&files.partition_id))
            .flat_map(|files| [files.data_file.clone(), files.index_file.clone()])
            .collect()
    }

    /// Removes the deletable files and returns how many were removed. A failed deletion is
    /// logged and skipped.
    pub fn delete_uploaded(
        result: &ShuffleUploadResult,
        local_files: &[LocalPartitionFiles],
    ) -> usize {
        let mut deleted = 0;
        for file in Self::deletable_files(result, local_files) {
            match std::fs::remove_file(&file) {
                Ok(_) => deleted += 1,
                Err(err) => {
                    TOTAL_UPLOADED_FILES_DELETE_FAILED.inc();
                    warn!("Errors on deleting uploaded file: {:?}. err: {}", &file, err);
                }
            }
        }
        deleted
    }
}
