//! Multipart form reading: a JSON `data` field plus named file fields.

use std::collections::HashMap;

use axum::extract::Multipart;
use serde::de::DeserializeOwned;
use validator::Validate;

use easypaies_infra::storage::Upload;

use crate::app::errors::AppError;

/// Largest accepted multipart body: ten maximal files plus the form data.
pub const MAX_BODY_BYTES: usize = 11 * easypaies_infra::storage::MAX_FILE_BYTES;

#[derive(Debug, Default)]
pub struct FormParts {
    data: Option<String>,
    files: HashMap<String, Vec<Upload>>,
}

impl FormParts {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut parts = FormParts::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;

            if name == "data" && file_name.is_none() {
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|_| AppError::validation("the data field must be UTF-8 JSON"))?;
                parts.data = Some(text);
                continue;
            }
            parts.files.entry(name).or_default().push(Upload {
                file_name,
                content_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
                bytes: bytes.to_vec(),
            });
        }
        Ok(parts)
    }

    /// Parse and validate the `data` field.
    pub fn data<T: DeserializeOwned + Validate>(&self) -> Result<T, AppError> {
        let raw = self
            .data
            .as_deref()
            .ok_or_else(|| AppError::validation("the form has no data field"))?;
        let value: T = serde_json::from_str(raw)?;
        value.validate()?;
        Ok(value)
    }

    /// All files sent under `name` (possibly none).
    pub fn take_files(&mut self, name: &str) -> Vec<Upload> {
        self.files.remove(name).unwrap_or_default()
    }

    /// Exactly one file under `name`.
    pub fn take_single(&mut self, name: &str) -> Result<Upload, AppError> {
        let mut files = self.take_files(name);
        match files.len() {
            1 => Ok(files.remove(0)),
            0 => Err(AppError::validation(format!("Please upload a file in the '{name}' field"))),
            n => Err(AppError::validation(format!("Only one file is accepted in '{name}' ({n} sent)"))),
        }
    }
}
