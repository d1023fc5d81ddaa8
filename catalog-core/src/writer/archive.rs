//! Page Writer -- Archive variant (§4.5): pages are staged as files under a
//! per-task temp tree; flush tar-gzips the tree deterministically, hashes it,
//! and either short-circuits as unchanged or uploads it to the ingress.
//! Grounded on `original_source/internal/tarwriter/tarwriter.go` (staging
//! lifecycle), `internal/tarfiles/tarfiles.go` (tar/gzip walk), and
//! `internal/upload/upload.go` (multipart POST).

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tar::{Builder, EntryType, Header};
use tempfile::TempDir;

use crate::error::WriterError;
use crate::task::Page;
use crate::task_client::{TaskClient, TaskPatch};
use crate::writer::PageWriter;

/// Everything the Archive Writer needs to reach the ingress upload endpoint,
/// resolved once by the Request Processor from process configuration (§4.7,
/// §6 "Ingress upload").
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub upload_url: String,
    pub client: Client,
    /// Last path segment of the task URL, embedded in the upload content-type.
    pub task_id: String,
}

pub struct ArchiveWriter {
    staging_dir: TempDir,
    task_client: Arc<TaskClient>,
    upload: UploadConfig,
    previous_sha: Option<String>,
    previous_size: Option<u64>,
    flushed: bool,
}

impl ArchiveWriter {
    pub fn new(
        task_client: Arc<TaskClient>,
        upload: UploadConfig,
        previous_sha: Option<String>,
        previous_size: Option<u64>,
    ) -> Result<Self, WriterError> {
        let staging_dir = TempDir::new()?;
        Ok(Self {
            staging_dir,
            task_client,
            upload,
            previous_sha,
            previous_size,
            flushed: false,
        })
    }

    async fn try_flush(&mut self) -> Result<(), WriterError> {
        // A second temp directory, distinct from the staging tree `write`
        // populated, holds the built archive -- mirrors tarwriter.go's
        // separate `tmpdir` for `inventory.tgz`. Dropped (and removed) at
        // the end of this function on every exit path.
        let build_dir = TempDir::new()?;
        let archive_path = build_dir.path().join("inventory.tgz");
        build_archive(self.staging_dir.path(), &archive_path)?;
        let archive = fs::read(&archive_path)?;

        let mut hasher = Sha256::new();
        hasher.update(&archive);
        let sha256 = hex::encode(hasher.finalize());
        let tar_size = archive.len() as u64;

        if self.previous_sha.as_deref() == Some(sha256.as_str())
            && self.previous_size == Some(tar_size)
        {
            self.task_client
                .update(TaskPatch {
                    state: Some("completed"),
                    status: Some("unchanged"),
                    output: None,
                    message: Some(
                        "Upload skipped since nothing has changed from last refresh".to_string(),
                    ),
                })
                .await?;
            return Ok(());
        }

        let ingress = self.upload_archive(archive).await?;
        self.task_client
            .update(TaskPatch {
                state: Some("completed"),
                status: Some("ok"),
                output: Some(json!({
                    "ingress": ingress,
                    "sha256": sha256,
                    "tar_size": tar_size,
                })),
                message: Some("Archive Completed Successfully".to_string()),
            })
            .await?;
        Ok(())
    }

    async fn upload_archive(&self, archive: Vec<u8>) -> Result<Value, WriterError> {
        let content_type = format!("application/vnd.redhat.catalog.{}+tgz", self.upload.task_id);
        let part = Part::bytes(archive)
            .file_name("inventory.tgz")
            .mime_str(&content_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .upload
            .client
            .post(&self.upload.upload_url)
            .multipart(form)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        if status != 202 {
            return Err(WriterError::UnexpectedUploadStatus { status });
        }
        let ingress: Value = serde_json::from_slice(&body)?;
        Ok(ingress)
    }
}

#[async_trait]
impl PageWriter for ArchiveWriter {
    async fn write(&mut self, page: Page) -> Result<(), WriterError> {
        let relative = page.name.trim_start_matches('/');
        let dest = self.staging_dir.path().join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, &page.data)?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), WriterError> {
        if self.flushed {
            tracing::warn!("ArchiveWriter::flush called more than once, ignoring");
            return Ok(());
        }
        self.flushed = true;
        match self.try_flush().await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!("archive flush failed, reporting as task error: {e}");
                self.task_client
                    .update(TaskPatch {
                        state: Some("completed"),
                        status: Some("error"),
                        output: Some(json!({ "errors": [e.to_string()] })),
                        message: Some("Task Ended with errors".to_string()),
                    })
                    .await?;
                Ok(())
            }
        }
    }

    async fn flush_errors(&mut self, messages: Vec<String>) -> Result<(), WriterError> {
        if self.flushed {
            tracing::warn!("ArchiveWriter::flush_errors called more than once, ignoring");
            return Ok(());
        }
        self.flushed = true;
        self.task_client
            .update(TaskPatch {
                state: Some("completed"),
                status: Some("error"),
                output: Some(json!({ "errors": messages })),
                message: Some("Task Ended with errors".to_string()),
            })
            .await?;
        Ok(())
    }
}

/// Tar-gzip `root` to the file at `dest` with deterministic headers: zero
/// mtime/uid/gid, `unknown` uname/gname, forward-slash paths relative to
/// `root`, root entry `./`.
fn build_archive(root: &Path, dest: &Path) -> Result<(), WriterError> {
    let file = fs::File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);
    append_entry(&mut builder, "./", true, &[])?;
    append_dir(&mut builder, root, root)?;
    let encoder = builder.into_inner().map_err(WriterError::Io)?;
    encoder.finish().map_err(WriterError::Io)?;
    Ok(())
}

fn append_dir<W: std::io::Write>(
    builder: &mut Builder<W>,
    root: &Path,
    current: &Path,
) -> Result<(), WriterError> {
    let mut entries: Vec<_> = fs::read_dir(current)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        if path.is_dir() {
            append_entry(builder, &format!("{relative}/"), true, &[])?;
            append_dir(builder, root, &path)?;
        } else {
            let data = fs::read(&path)?;
            append_entry(builder, &relative, false, &data)?;
        }
    }
    Ok(())
}

fn append_entry<W: std::io::Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    is_dir: bool,
    data: &[u8],
) -> Result<(), WriterError> {
    let mut header = Header::new_gnu();
    header.set_path(archive_path)?;
    header.set_size(data.len() as u64);
    header.set_mode(if is_dir { 0o755 } else { 0o644 });
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_username("unknown")?;
    header.set_groupname("unknown")?;
    header.set_entry_type(if is_dir {
        EntryType::Directory
    } else {
        EntryType::Regular
    });
    header.set_cksum();
    builder.append(&header, data)?;
    Ok(())
}
