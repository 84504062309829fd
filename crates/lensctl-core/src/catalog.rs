// ── File catalog ──
//
// Folder and file listings on the camera's storage, recursive walks and
// deletion. Folder paths are absolute; `""` means the root.

use std::collections::HashMap;

use indexmap::IndexSet;
use lensctl_transport::{DeviceTransport, FilePath, StatusCode};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::session::{Access, Lease};

/// A file or folder on the camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedFile {
    /// Folder containing this entry.
    pub folder: String,
    pub name: String,
    pub is_directory: bool,
    /// Entries inside a directory: files first, then sub-folders.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CapturedFile>,
}

impl CapturedFile {
    /// Absolute path of the entry.
    pub fn path(&self) -> String {
        if self.name.is_empty() {
            self.folder.clone()
        } else {
            FilePath::new(self.folder.as_str(), self.name.as_str()).to_string()
        }
    }

    /// Number of files in this subtree.
    pub fn file_count(&self) -> usize {
        if self.is_directory {
            self.children.iter().map(Self::file_count).sum()
        } else {
            1
        }
    }
}

impl From<&FilePath> for CapturedFile {
    fn from(file: &FilePath) -> Self {
        Self {
            folder: file.folder.clone(),
            name: file.name.clone(),
            is_directory: false,
            children: Vec::new(),
        }
    }
}

/// `""` -> `"/"`, `"/DCIM/"` -> `"/DCIM"`.
fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".into()
    } else {
        trimmed.into()
    }
}

fn with_slash(folder: &str) -> String {
    if folder.ends_with('/') {
        folder.into()
    } else {
        format!("{folder}/")
    }
}

fn split_folder(folder: &str) -> (String, String) {
    match folder.rsplit_once('/') {
        Some(("", name)) if !name.is_empty() => ("/".into(), name.into()),
        Some((parent, name)) if !name.is_empty() => (parent.into(), name.into()),
        _ => ("/".into(), String::new()),
    }
}

// ── FileCatalog ──────────────────────────────────────────────────────

/// Storage access for a connected [`Session`](crate::Session).
pub struct FileCatalog<'s, T: DeviceTransport> {
    access: Access<'s, T>,
}

impl<'s, T: DeviceTransport> FileCatalog<'s, T> {
    pub(crate) fn new(access: Access<'s, T>) -> Self {
        Self { access }
    }

    /// Names of the folders directly inside `path`.
    pub async fn list_folders(&self, path: &str) -> Result<Vec<String>, CoreError> {
        let held = self.access.lease().await?;
        let lease = &*held;
        folders_in(lease, &normalize(path)).await
    }

    /// Every folder below `path`, depth-first, as absolute paths with a
    /// trailing slash.
    pub async fn list_folders_recursive(&self, path: &str) -> Result<Vec<String>, CoreError> {
        let held = self.access.lease().await?;
        let lease = &*held;
        let base = with_slash(&normalize(path));

        let mut found = Vec::new();
        let mut stack: Vec<String> = children_of(lease, &base).await?;
        stack.reverse();
        while let Some(folder) = stack.pop() {
            let mut nested = children_of(lease, &folder).await?;
            nested.reverse();
            found.push(folder);
            stack.extend(nested);
        }
        debug!(base, folders = found.len(), "recursive folder listing");
        Ok(found)
    }

    /// Names of the files directly inside `path`.
    pub async fn list_files(&self, path: &str) -> Result<Vec<String>, CoreError> {
        let held = self.access.lease().await?;
        let lease = &*held;
        files_in(lease, &normalize(path)).await
    }

    /// Remove the file at absolute `path`.
    pub async fn delete_file(&self, path: &str) -> Result<(), CoreError> {
        let Some(file) = FilePath::parse(path) else {
            return Err(CoreError::Delete {
                path: path.into(),
                code: StatusCode::BAD_PARAMETERS,
            });
        };
        let held = self.access.lease().await?;
        let lease = &*held;
        lease
            .transport()
            .file_delete(lease.context(), lease.device(), &file.folder, &file.name)
            .await
            .map_err(|e| CoreError::Delete {
                path: path.into(),
                code: e.code(),
            })?;
        info!(path, "file deleted");
        Ok(())
    }

    /// Directory tree rooted at `path`, with files and nested folders.
    pub async fn tree(&self, path: &str) -> Result<CapturedFile, CoreError> {
        let held = self.access.lease().await?;
        let lease = &*held;
        let base = normalize(path);

        let mut listings: HashMap<String, (Vec<String>, Vec<String>)> = HashMap::new();
        let mut pending = vec![base.clone()];
        while let Some(folder) = pending.pop() {
            let subfolders = folders_in(lease, &folder).await?;
            let files = files_in(lease, &folder).await?;
            let prefix = with_slash(&folder);
            pending.extend(subfolders.iter().map(|name| format!("{prefix}{name}")));
            listings.insert(folder, (subfolders, files));
        }

        Ok(assemble(&base, &listings))
    }
}

fn assemble(folder: &str, listings: &HashMap<String, (Vec<String>, Vec<String>)>) -> CapturedFile {
    let (parent, name) = split_folder(folder);
    let mut node = CapturedFile {
        folder: parent,
        name,
        is_directory: true,
        children: Vec::new(),
    };
    if let Some((subfolders, files)) = listings.get(folder) {
        node.children.extend(files.iter().map(|file| CapturedFile {
            folder: folder.into(),
            name: file.clone(),
            is_directory: false,
            children: Vec::new(),
        }));
        let prefix = with_slash(folder);
        node.children.extend(
            subfolders
                .iter()
                .map(|sub| assemble(&format!("{prefix}{sub}"), listings)),
        );
    }
    node
}

async fn folders_in<T: DeviceTransport>(
    lease: &Lease<'_, T>,
    folder: &str,
) -> Result<Vec<String>, CoreError> {
    let entries = lease
        .transport()
        .list_folders(lease.context(), lease.device(), folder)
        .await
        .map_err(|e| CoreError::Listing {
            path: folder.into(),
            code: e.code(),
        })?;
    Ok(entries
        .into_iter()
        .map(|e| e.name)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect())
}

async fn files_in<T: DeviceTransport>(
    lease: &Lease<'_, T>,
    folder: &str,
) -> Result<Vec<String>, CoreError> {
    let entries = lease
        .transport()
        .list_files(lease.context(), lease.device(), folder)
        .await
        .map_err(|e| CoreError::Listing {
            path: folder.into(),
            code: e.code(),
        })?;
    Ok(entries
        .into_iter()
        .map(|e| e.name)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect())
}

/// Absolute, slash-terminated paths of the folders inside `base`.
async fn children_of<T: DeviceTransport>(
    lease: &Lease<'_, T>,
    base: &str,
) -> Result<Vec<String>, CoreError> {
    let names = folders_in(lease, &normalize(base)).await?;
    Ok(names
        .into_iter()
        .map(|name| format!("{base}{name}/"))
        .collect())
}
