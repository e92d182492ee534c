use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use axum::extract::{Multipart, multipart::Field};
use tokio::{fs::File, io::AsyncWriteExt};

use crate::utils::filename::decode_upload_name;

pub type UploadResult<T> = Result<T, UploadError>;

/// Transport-level rejection of a multipart upload.
#[derive(Debug)]
pub enum UploadError {
    Malformed(String),
    UnexpectedField(String),
    TooManyFiles { field: String, limit: usize },
    FileTooLarge { name: String, limit: u64 },
    Storage(std::io::Error),
}

impl UploadError {
    pub fn message(&self) -> String {
        match self {
            UploadError::Malformed(detail) => format!("解析上传表单失败: {detail}"),
            UploadError::UnexpectedField(field) => format!("不支持的文件字段: `{field}`"),
            UploadError::TooManyFiles { field, limit } => {
                format!("字段 `{field}` 上传文件数量超过限制 (最多 {limit})")
            }
            UploadError::FileTooLarge { name, limit } => {
                format!("文件 `{name}` 超过大小限制 (最多 {limit} 字节)")
            }
            UploadError::Storage(err) => format!("保存文件失败: {err}"),
        }
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for UploadError {}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::Storage(err)
    }
}

/// Limits for the one multipart field that may carry files.
#[derive(Debug, Clone, Copy)]
pub struct FileFieldConfig<'a> {
    pub field_name: &'a str,
    pub max_files: usize,
    pub max_file_size: u64,
}

/// An upload written to the static directory.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub content_type: Option<String>,
    pub file_size: u64,
}

#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub files: Vec<SavedFile>,
    pub text_fields: HashMap<String, Vec<String>>,
}

impl UploadOutcome {
    pub fn first_text(&self, field_name: &str) -> Option<&str> {
        self.text_fields
            .get(field_name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Streams the form into `dest_dir`.
///
/// Files of `config.field_name` are written under their decoded, path-safe
/// names; a name repeated within the same form gets a numeric suffix. Text
/// fields are collected. Files under any other field are rejected, as is a
/// file that grows past the size limit. A file that fails mid-stream is
/// removed from disk.
pub async fn process_upload_form(
    mut multipart: Multipart,
    dest_dir: &Path,
    config: FileFieldConfig<'_>,
) -> UploadResult<UploadOutcome> {
    tokio::fs::create_dir_all(dest_dir).await?;

    let mut outcome = UploadOutcome::default();
    let mut taken: HashSet<String> = HashSet::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::Malformed(err.to_string()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        let Some(original_name) = field.file_name().map(str::to_string) else {
            let value = field
                .text()
                .await
                .map_err(|err| UploadError::Malformed(err.to_string()))?;
            outcome.text_fields.entry(field_name).or_default().push(value);
            continue;
        };

        if field_name != config.field_name {
            return Err(UploadError::UnexpectedField(field_name));
        }
        if outcome.files.len() >= config.max_files {
            return Err(UploadError::TooManyFiles {
                field: field_name,
                limit: config.max_files,
            });
        }

        let content_type = field.content_type().map(str::to_string);
        let stored_name = claim_name(
            stored_file_name(&original_name, outcome.files.len()),
            &mut taken,
        );
        let stored_path = dest_dir.join(&stored_name);
        let file_size =
            write_field(field, &stored_path, &original_name, config.max_file_size).await?;

        outcome.files.push(SavedFile {
            original_name,
            stored_name,
            stored_path,
            content_type,
            file_size,
        });
    }

    Ok(outcome)
}

async fn write_field(
    field: Field<'_>,
    path: &Path,
    original_name: &str,
    max_file_size: u64,
) -> UploadResult<u64> {
    let written = stream_to_file(field, path, original_name, max_file_size).await;
    if written.is_err() {
        let _ = tokio::fs::remove_file(path).await;
    }
    written
}

async fn stream_to_file(
    mut field: Field<'_>,
    path: &Path,
    original_name: &str,
    max_file_size: u64,
) -> UploadResult<u64> {
    let mut file = File::create(path).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|err| UploadError::Malformed(err.to_string()))?
    {
        written += chunk.len() as u64;
        if written > max_file_size {
            return Err(UploadError::FileTooLarge {
                name: original_name.to_string(),
                limit: max_file_size,
            });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}

/// Disk name for an upload: the decoded original name, made path-safe.
/// Falls back to `file_{index}` (keeping the extension) when nothing survives.
pub fn stored_file_name(original_name: &str, index: usize) -> String {
    let sanitized = sanitize_filename::sanitize(decode_upload_name(original_name));
    if !sanitized.is_empty() {
        return sanitized;
    }

    match Path::new(original_name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("file_{index}.{}", ext.to_ascii_lowercase()),
        _ => format!("file_{index}"),
    }
}

fn claim_name(candidate: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(candidate.clone()) {
        return candidate;
    }

    let path = Path::new(&candidate);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&candidate)
        .to_string();
    let extension = path.extension().and_then(|s| s.to_str()).map(str::to_string);

    (1usize..)
        .map(|n| match &extension {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        })
        .find(|name| taken.insert(name.clone()))
        .unwrap_or(candidate)
}
