use std::cmp::Ordering;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::ApiError;
use crate::resolve::{has_short_ext, is_hidden};

pub const DIR_TYPE: &str = "dir";

/// Wire shape of a single file or directory. Built fresh from a live
/// stat on every request; the filesystem is the only durable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceModel {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    pub mtime: DateTime<Utc>,
}

impl ResourceModel {
    pub fn is_dir(&self) -> bool {
        self.kind == DIR_TYPE
    }
}

pub async fn build_model(
    base_url: &str,
    id: &str,
    fs_path: &Path,
    meta: &std::fs::Metadata,
) -> Result<ResourceModel, ApiError> {
    let mut id = id.to_string();
    if meta.is_dir() && !id.ends_with('/') {
        id.push('/');
    }

    let name = id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    let kind = if meta.is_dir() {
        DIR_TYPE.to_string()
    } else {
        mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    };

    let size = if meta.is_dir() { None } else { Some(meta.len()) };
    let count = if meta.is_dir() {
        Some(count_children(fs_path).await?)
    } else {
        None
    };

    let mtime = DateTime::<Utc>::from(meta.modified()?);
    let url = public_url(base_url, &id);

    Ok(ResourceModel {
        id,
        name,
        url,
        kind,
        size,
        count,
        mtime,
    })
}

// Immediate children only; hidden and extensionless entries don't count.
async fn count_children(dir: &Path) -> Result<u64, ApiError> {
    let mut entries = fs::read_dir(dir).await?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_hidden(&name) && has_short_ext(&name) {
            count += 1;
        }
    }
    Ok(count)
}

pub fn public_url(base_url: &str, id: &str) -> String {
    let encoded = id
        .trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", base_url.trim_end_matches('/'), encoded)
}

/// Display order for sibling entries: directories first, directories by
/// case-insensitive name, files by mtime descending. The sort is stable,
/// so ties keep their enumeration order.
pub fn sort_models(models: &mut [ResourceModel]) {
    models.sort_by(compare);
}

fn compare(a: &ResourceModel, b: &ResourceModel) -> Ordering {
    match (a.is_dir(), b.is_dir()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        (false, false) => b.mtime.cmp(&a.mtime),
    }
}
