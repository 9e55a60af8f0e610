//! Multipart upload through presigned URLs.
//!
//! An upload runs in three steps: ask the API for an upload session with one
//! presigned URL per part, PUT each part in order and collect its ETag, then
//! hand the ETags back to the API to assemble the object. Parts are sent one
//! at a time; the first failure aborts the whole upload.

mod planner;
mod transport;

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::{debug, info, warn};

use crate::client::D3Client;
use crate::error::{D3Error, Result};
use crate::helpers::resolve_mime_type;
use crate::models::{
    CompleteUploadRequest, CompleteUploadResponse, InitiateUploadRequest, UploadSession,
    UploadedPart,
};
use crate::observer::{BoxObserver, Observer};

pub use planner::{DEFAULT_CHUNK_SIZE, MAX_PARTS, MIN_PARTS, PartPlan, PartRange, plan};
pub use transport::{PartTransport, extract_etag};

/// Progress reported after each part is uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub current_part: u32,
    pub total_parts: u32,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    /// `floor(bytes_uploaded * 100 / total_bytes)`
    pub percentage: u8,
}

impl UploadProgress {
    fn new(current_part: u32, total_parts: u32, bytes_uploaded: u64, total_bytes: u64) -> Self {
        let percentage = if total_bytes == 0 {
            100
        } else {
            (bytes_uploaded.saturating_mul(100) / total_bytes).min(100) as u8
        };
        Self {
            current_part,
            total_parts,
            bytes_uploaded,
            total_bytes,
            percentage,
        }
    }
}

/// What to upload and how
pub struct UploadOptions {
    pub file: PathBuf,
    /// Name the file is registered under; also drives MIME detection
    pub file_name: String,
    pub mime_type: Option<String>,
    /// Requested part count; `None` or zero lets the planner decide
    pub parts: Option<u32>,
    on_progress: Option<BoxObserver<UploadProgress>>,
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("file", &self.file)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("parts", &self.parts)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl UploadOptions {
    pub fn new(file: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            file_name: file_name.into(),
            mime_type: None,
            parts: None,
            on_progress: None,
        }
    }

    /// Use the local file's own name as the declared name
    pub fn from_path(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::new(file, file_name)
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn parts(mut self, parts: u32) -> Self {
        self.parts = Some(parts);
        self
    }

    /// Call `f` after every uploaded part; an error from `f` aborts the upload
    pub fn on_progress<F>(self, f: F) -> Self
    where
        F: FnMut(&UploadProgress) -> Result<()> + Send + 'static,
    {
        self.observer(f)
    }

    pub fn observer(mut self, observer: impl Observer<UploadProgress> + 'static) -> Self {
        self.on_progress = Some(Box::new(observer));
        self
    }
}

impl D3Client {
    /// Upload a local file and return the session it was stored under
    ///
    /// # Errors
    ///
    /// - `D3Error::Validation` if the declared file name is empty
    /// - `D3Error::Upload` for any failure of the upload protocol, including
    ///   the initiate and complete calls
    /// - whatever the progress observer returns
    pub async fn upload_file(&self, options: UploadOptions) -> Result<UploadSession> {
        let UploadOptions {
            file: path,
            file_name,
            mime_type,
            parts,
            mut on_progress,
        } = options;

        if file_name.trim().is_empty() {
            return Err(D3Error::validation("file_name is required"));
        }

        // The handle is owned here and closed on every return path
        let (mut file, file_size) = open_local_file(&path).await?;

        let mime_type = resolve_mime_type(&file_name, mime_type.as_deref());
        let plan = plan(file_size, parts);

        info!(
            "Starting upload of {} as '{}' ({} bytes, {} parts, {})",
            path.display(),
            file_name,
            file_size,
            plan.part_count,
            mime_type
        );

        let session = self
            .initiate_upload(&InitiateUploadRequest {
                file_name: &file_name,
                size: file_size,
                mime_type: &mime_type,
                parts: plan.part_count,
            })
            .await?;

        validate_session(&session, &plan)?;

        debug!(
            "Upload session {} issued for file key {}",
            session.upload_id, session.file_key
        );

        let uploaded = self
            .upload_parts(
                &mut file,
                &session,
                &plan,
                &mime_type,
                file_size,
                &mut on_progress,
            )
            .await
            .inspect_err(|e| warn!("Upload {} aborted: {}", session.upload_id, e))?;

        drop(file);

        let completed = self
            .complete_upload(&CompleteUploadRequest {
                file_key: &session.file_key,
                upload_id: &session.upload_id,
                object_name: &session.object_name,
                parts: &uploaded,
            })
            .await
            .map_err(|e| e.with_upload_id(&session.upload_id))?;

        info!(
            "Successfully completed upload: {} -> {} ({})",
            path.display(),
            session.file_key,
            completed.message
        );

        Ok(session)
    }

    async fn initiate_upload(&self, request: &InitiateUploadRequest<'_>) -> Result<UploadSession> {
        self.post_json("/initiate-upload", request, "failed to request presigned URLs")
            .await
            .map_err(D3Error::into_upload)
    }

    async fn complete_upload(
        &self,
        request: &CompleteUploadRequest<'_>,
    ) -> Result<CompleteUploadResponse> {
        self.post_json("/complete-upload", request, "failed to complete upload")
            .await
            .map_err(D3Error::into_upload)
    }

    async fn upload_parts(
        &self,
        file: &mut File,
        session: &UploadSession,
        plan: &PartPlan,
        mime_type: &str,
        file_size: u64,
        on_progress: &mut Option<BoxObserver<UploadProgress>>,
    ) -> Result<Vec<UploadedPart>> {
        let mut uploaded = Vec::with_capacity(plan.parts.len());
        let mut bytes_uploaded = 0u64;

        for (part, url) in plan.parts.iter().zip(&session.presigned_urls) {
            let chunk = read_part(file, part)
                .await
                .map_err(|e| e.with_upload_id(&session.upload_id))?;

            debug!(
                "Uploading part {}/{} ({} bytes)",
                part.part_number,
                plan.part_count,
                chunk.len()
            );

            let etag = self
                .transport()
                .put_part(url, part.part_number, mime_type, chunk)
                .await
                .map_err(|e| e.with_upload_id(&session.upload_id))?;

            uploaded.push(UploadedPart {
                etag,
                part_number: part.part_number,
            });

            bytes_uploaded += part.length;

            if let Some(observer) = on_progress.as_mut() {
                observer.notify(&UploadProgress::new(
                    part.part_number,
                    plan.part_count,
                    bytes_uploaded,
                    file_size,
                ))?;
            }
        }

        Ok(uploaded)
    }
}

async fn open_local_file(path: &Path) -> Result<(File, u64)> {
    let file = File::open(path)
        .await
        .map_err(|e| D3Error::upload(format!("file not found: {}: {}", path.display(), e)))?;

    let metadata = file.metadata().await.map_err(|e| {
        D3Error::upload(format!(
            "failed to get file metadata: {}: {}",
            path.display(),
            e
        ))
    })?;

    if !metadata.is_file() {
        return Err(D3Error::upload(format!(
            "not a regular file: {}",
            path.display()
        )));
    }

    if metadata.len() == 0 {
        return Err(D3Error::upload(format!("file is empty: {}", path.display())));
    }

    Ok((file, metadata.len()))
}

fn validate_session(session: &UploadSession, plan: &PartPlan) -> Result<()> {
    if session.presigned_urls.len() != plan.part_count as usize {
        return Err(D3Error::upload(format!(
            "mismatch: requested {} parts but received {} presigned URLs",
            plan.part_count,
            session.presigned_urls.len()
        ))
        .with_upload_id(&session.upload_id));
    }

    if session.upload_id.is_empty() {
        return Err(D3Error::upload("upload ID not received from server"));
    }

    Ok(())
}

/// Read exactly the bytes of `part`; a short read is an error
async fn read_part(file: &mut File, part: &PartRange) -> Result<Vec<u8>> {
    let read_error = |e: std::io::Error| {
        D3Error::upload_part(
            part.part_number,
            format!("failed to read part {}: {}", part.part_number, e),
            None,
        )
    };

    file.seek(SeekFrom::Start(part.start))
        .await
        .map_err(read_error)?;

    let len = usize::try_from(part.length).map_err(|_| {
        D3Error::upload_part(
            part.part_number,
            format!("part {} is too large to buffer", part.part_number),
            None,
        )
    })?;

    let mut buffer = vec![0u8; len];
    file.read_exact(&mut buffer).await.map_err(read_error)?;

    Ok(buffer)
}
