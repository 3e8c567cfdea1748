use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::common::{Attachment, AttachmentKind, ClientResult};
use crate::sync::PendingFile;

/// Field name the backend's multipart handler reads files from.
const FILES_FIELD: &str = "files";

/// Descriptor the backend returns for every stored file.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredFile {
    pub url: String,
    #[serde(rename = "originalName", default)]
    pub original_name: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
}

/// `/upload` answers either with a bare list or with `{ "files": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    List(Vec<StoredFile>),
    Wrapped { files: Vec<StoredFile> },
}

impl UploadResponse {
    pub fn into_attachments(self) -> Vec<Attachment> {
        let files = match self {
            UploadResponse::List(files) | UploadResponse::Wrapped { files } => files,
        };
        files
            .into_iter()
            .map(|file| Attachment {
                kind: Some(AttachmentKind::from_media_type(&file.mime_type)),
                url: file.url,
                file_name: file.original_name,
                media_type: file.mime_type,
            })
            .collect()
    }
}

pub async fn build_form(files: &[PendingFile]) -> ClientResult<Form> {
    let mut form = Form::new();
    for file in files {
        file.validate()?;
        let bytes = tokio::fs::read(&file.path).await?;
        log::debug!("Uploading {} ({} bytes)", file.file_name, bytes.len());
        let part = Part::bytes(bytes)
            .file_name(file.file_name.clone())
            .mime_str(&file.media_type)?;
        form = form.part(FILES_FIELD, part);
    }
    Ok(form)
}
