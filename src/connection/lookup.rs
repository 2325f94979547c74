//! Read-only remote queries
//!
//! [`RemoteLookup`] bundles the multi-step exchanges behind metadata and
//! existence queries. Each public method holds the transport mutex for its
//! whole exchange. The associated `*_with` functions run the same exchange
//! on a transport the caller has already locked.

use super::paths::{leaf_name, remote_parent};
use crate::error::{Error, Result};
use crate::protocol::constants::features;
use crate::protocol::decode::parse_time_val;
use crate::protocol::RemoteFile;
use crate::transport::{Transport, TransportError};
use chrono::NaiveDateTime;
use std::fmt;
use std::sync::Arc;

/// Modification time of a remote path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifiedTime {
    /// Reported by the server (UTC)
    At(NaiveDateTime),
    /// Not supported by the server, or the path does not exist
    Unknown,
}

impl ModifiedTime {
    /// Parse an `MDTM` time-val
    pub fn from_time_val(value: &str) -> Self {
        parse_time_val(value).map_or(Self::Unknown, Self::At)
    }
}

impl fmt::Display for ModifiedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(time) => write!(f, "{}", time.format("%Y-%m-%d %H:%M:%S")),
            Self::Unknown => write!(f, "cannot be determined"),
        }
    }
}

/// Status, size and modification time of a remote path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStats {
    /// `STAT` reply text
    pub status: Option<String>,
    /// `SIZE` in bytes
    pub size: Option<u64>,
    /// `MDTM`
    pub modified: ModifiedTime,
}

/// Read-only queries against a shared transport
///
/// Errors are returned as they are; no connection state is tracked here.
/// [`Connection`](crate::Connection) runs the same exchanges and drops to idle
/// on fatal errors.
pub struct RemoteLookup<T: Transport> {
    transport: Arc<tokio::sync::Mutex<T>>,
}

impl<T: Transport> Clone for RemoteLookup<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> fmt::Debug for RemoteLookup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteLookup").finish_non_exhaustive()
    }
}

fn fault<'a, T: Transport>(
    transport: &'a T,
    context: &str,
) -> impl FnOnce(TransportError) -> Error + 'a {
    let context = context.to_string();
    move |err| Error::from_transport(err, context, transport.last_reply())
}

impl<T: Transport> RemoteLookup<T> {
    /// Create a lookup over a shared transport
    pub fn new(transport: Arc<tokio::sync::Mutex<T>>) -> Self {
        Self { transport }
    }

    /// Metadata of a single remote entry
    pub async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>> {
        let mut transport = self.transport.lock().await;
        Self::get_file_with(&mut *transport, path).await
    }

    /// Entries of a remote directory, without `.` and `..`
    pub async fn list_directory(&self, path: &str) -> Result<Option<Vec<RemoteFile>>> {
        let mut transport = self.transport.lock().await;
        Self::list_directory_with(&mut *transport, path).await
    }

    /// Whether a remote directory (`is_dir`) or file exists
    pub async fn path_exists(&self, path: &str, is_dir: bool) -> Result<bool> {
        let mut transport = self.transport.lock().await;
        Self::path_exists_with(&mut *transport, path, is_dir).await
    }

    /// `STAT` of the server, or of a path
    pub async fn status(&self, path: Option<&str>) -> Result<Option<String>> {
        let mut transport = self.transport.lock().await;
        Self::status_with(&mut *transport, path).await
    }

    /// `SIZE` of a remote file
    pub async fn size(&self, path: &str) -> Result<Option<u64>> {
        let mut transport = self.transport.lock().await;
        Self::size_with(&mut *transport, path).await
    }

    /// `MDTM` of a remote file
    pub async fn modification_time(&self, path: &str) -> Result<ModifiedTime> {
        let mut transport = self.transport.lock().await;
        Self::modification_time_with(&mut *transport, path).await
    }

    /// Status, size and modification time in one exchange
    pub async fn path_stats(&self, path: &str) -> Result<PathStats> {
        let mut transport = self.transport.lock().await;
        Self::path_stats_with(&mut *transport, path).await
    }

    pub(crate) async fn get_file_with(transport: &mut T, path: &str) -> Result<Option<RemoteFile>> {
        let mlst = transport
            .has_feature(features::MLST)
            .await
            .map_err(fault(transport, "FEAT"))?;
        if mlst {
            return transport
                .machine_list_file(path)
                .await
                .map_err(fault(transport, "MLST"));
        }

        let name = leaf_name(path);
        let entries = transport
            .list(path)
            .await
            .map_err(fault(transport, "LIST"))?;
        if let Some(found) = find_entry(entries, path, name) {
            return Ok(Some(found));
        }

        // Symbolic links are often listed as empty; look them up in the parent
        let entries = transport
            .list(remote_parent(path))
            .await
            .map_err(fault(transport, "LIST"))?;
        Ok(find_entry(entries, path, name))
    }

    pub(crate) async fn list_directory_with(
        transport: &mut T,
        path: &str,
    ) -> Result<Option<Vec<RemoteFile>>> {
        let mlst = transport
            .has_feature(features::MLST)
            .await
            .map_err(fault(transport, "FEAT"))?;
        let entries = if mlst {
            transport
                .machine_list_directory(path)
                .await
                .map_err(fault(transport, "MLSD"))?
        } else {
            transport
                .list(path)
                .await
                .map_err(fault(transport, "LIST"))?
        };

        let entries: Vec<RemoteFile> = entries
            .into_iter()
            .filter(|e| !e.is_pseudo_entry())
            .collect();
        tracing::debug!(path, entries = entries.len(), "listed directory");
        if entries.is_empty() {
            Ok(None)
        } else {
            Ok(Some(entries))
        }
    }

    pub(crate) async fn path_exists_with(transport: &mut T, path: &str, is_dir: bool) -> Result<bool> {
        if is_dir {
            Self::directory_exists(transport, path).await
        } else {
            Self::file_exists(transport, path).await
        }
    }

    async fn directory_exists(transport: &mut T, path: &str) -> Result<bool> {
        let original = transport
            .print_working_directory()
            .await
            .map_err(fault(transport, "PWD"))?
            .ok_or_else(|| {
                Error::protocol("cannot determine the working directory", transport.last_reply())
            })?;

        let probe = transport.change_working_directory(path).await;
        let restore = transport.change_working_directory(&original).await;

        let exists = probe.map_err(fault(transport, "CWD"))?;
        if !restore.map_err(fault(transport, "CWD"))? {
            tracing::warn!(directory = %original, "could not restore working directory");
        }
        Ok(exists)
    }

    async fn file_exists(transport: &mut T, path: &str) -> Result<bool> {
        let name = leaf_name(path);
        let entries = transport
            .list(path)
            .await
            .map_err(fault(transport, "LIST"))?;
        Ok(entries
            .iter()
            .skip_while(|e| e.is_pseudo_entry())
            .any(|e| !e.is_directory() && (e.name == name || e.name == path)))
    }

    pub(crate) async fn status_with(transport: &mut T, path: Option<&str>) -> Result<Option<String>> {
        transport
            .status(path)
            .await
            .map_err(fault(transport, "STAT"))
    }

    pub(crate) async fn size_with(transport: &mut T, path: &str) -> Result<Option<u64>> {
        transport.size(path).await.map_err(fault(transport, "SIZE"))
    }

    pub(crate) async fn modification_time_with(transport: &mut T, path: &str) -> Result<ModifiedTime> {
        let raw = transport
            .modification_time(path)
            .await
            .map_err(fault(transport, "MDTM"))?;
        Ok(raw
            .as_deref()
            .map_or(ModifiedTime::Unknown, ModifiedTime::from_time_val))
    }

    pub(crate) async fn path_stats_with(transport: &mut T, path: &str) -> Result<PathStats> {
        let status = Self::status_with(transport, Some(path)).await?;
        let size = Self::size_with(transport, path).await?;
        let modified = Self::modification_time_with(transport, path).await?;
        Ok(PathStats {
            status,
            size,
            modified,
        })
    }
}

fn find_entry(entries: Vec<RemoteFile>, path: &str, name: &str) -> Option<RemoteFile> {
    entries
        .into_iter()
        .filter(|e| !e.is_pseudo_entry())
        .find(|e| e.name == name || e.name == path)
}
