use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::UploadConfig;
use crate::encoder::EncodedSlice;
use crate::transport::{ArchiveSession, ReceiptCode, StoreReceipt};

pub const UPLOAD_FIELD: &str = "file";
pub const UPLOAD_FILE_NAME: &str = "slice.dcm";
pub const DICOM_MEDIA_TYPE: &str = "application/dicom";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Posts each Part 10 file to an HTTP upload endpoint as multipart form data
pub struct RestUploader {
    client: reqwest::Client,
    base_url: String,
    upload_url: String,
    closed: AtomicBool,
}

impl RestUploader {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            upload_url: config.upload_url(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    fn form(item: &EncodedSlice) -> Result<Form, reqwest::Error> {
        let part = Part::bytes(item.bytes().to_vec())
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(DICOM_MEDIA_TYPE)?;
        Ok(Form::new().part(UPLOAD_FIELD, part))
    }
}

#[async_trait]
impl ArchiveSession for RestUploader {
    /// Anything short of a server error means the endpoint is up
    async fn verify_connectivity(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        match self.client.get(&self.base_url).send().await {
            Ok(response) => {
                debug!("{} answered {}", self.base_url, response.status());
                !response.status().is_server_error()
            }
            Err(e) => {
                warn!("Upload endpoint {} unreachable: {}", self.base_url, e);
                false
            }
        }
    }

    async fn store(&self, item: &EncodedSlice) -> StoreReceipt {
        if self.closed.load(Ordering::Acquire) {
            return StoreReceipt::failed(ReceiptCode::Closed, "store after close");
        }
        let form = match Self::form(item) {
            Ok(form) => form,
            Err(e) => return StoreReceipt::failed(ReceiptCode::Error, e.to_string()),
        };

        match self.client.post(&self.upload_url).multipart(form).send().await {
            Ok(response) => {
                let status = response.status();
                if status == reqwest::StatusCode::OK {
                    StoreReceipt::stored(ReceiptCode::Http(status.as_u16()))
                } else {
                    let body = response.text().await.unwrap_or_default();
                    StoreReceipt::failed(ReceiptCode::Http(status.as_u16()), truncate(&body, 200))
                }
            }
            Err(e) if e.is_timeout() => StoreReceipt::failed(ReceiptCode::Timeout, e.to_string()),
            Err(e) if e.is_connect() => {
                StoreReceipt::failed(ReceiptCode::Unreachable, e.to_string())
            }
            Err(e) => StoreReceipt::failed(ReceiptCode::Error, e.to_string()),
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("REST uploader for {} closed", self.upload_url);
        }
    }

    fn describe(&self) -> String {
        format!("REST {}", self.upload_url)
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
