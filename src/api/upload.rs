//! Multipart upload extraction

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;

use super::error::ApiError;
use crate::models::{Artifact, Uploader};
use crate::services::detection::{upload_rules, ValidationError, ValidationErrorKind};

const FILE_FIELD: &str = "file";
const LAST_MODIFIED_FIELD: &str = "lastModified";

#[derive(Debug, Default)]
pub struct Upload {
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
    pub last_modified: Option<i64>,
}

impl Upload {
    pub fn into_artifact(self, uploader: Uploader) -> Artifact {
        let mime = self
            .mime_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Artifact::file(uploader, self.file_name, mime, self.bytes, self.last_modified)
    }
}

fn multipart_error(err: MultipartError, uploader: Uploader) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::Validation(ValidationError {
            kind: ValidationErrorKind::TooLarge,
            message: upload_rules(uploader).too_large_message.to_string(),
        });
    }
    ApiError::BadRequest(err.body_text())
}

/// Read the `file` part (and optional `lastModified` part). `None` when no file was sent.
pub async fn read_upload(
    mut multipart: Multipart,
    uploader: Uploader,
) -> Result<Option<Upload>, ApiError> {
    let mut upload: Option<Upload> = None;
    let mut last_modified: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, uploader))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let file_name = field.file_name().map(str::to_string);
                let mime_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, uploader))?;
                upload = Some(Upload {
                    file_name,
                    mime_type,
                    bytes: bytes.to_vec(),
                    last_modified: None,
                });
            }
            Some(LAST_MODIFIED_FIELD) => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, uploader))?;
                last_modified = value.trim().parse::<i64>().ok();
            }
            _ => {}
        }
    }

    Ok(upload.map(|mut u| {
        u.last_modified = last_modified;
        u
    }))
}
