//! Change-detection sync of a single local file into the backup folder.

use crate::drive::{DriveClient, DriveFile};
use crate::error::{Result, SyncError};
use crate::hash::{md5_hex, EMPTY_MD5};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::info;

/// Well-known backup folder at the root of the Drive hierarchy.
pub const BACKUP_FOLDER: &str = "automatic_backups";

/// Which branch of the create/update/no-op decision ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created { id: String },
    Updated { id: String },
    Unchanged,
}

/// Sync `local_path` into the backup folder, creating or updating the
/// remote copy only when the content hash differs.
pub async fn sync_file(drive: &mut DriveClient, local_path: &Path) -> Result<SyncOutcome> {
    let file_name = local_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            SyncError::local_data("invalid file name", local_path.display().to_string())
        })?;

    info!("Checking for {} folder existence", BACKUP_FOLDER);
    let folder_id = match drive.find_folder(BACKUP_FOLDER).await? {
        Some(id) => id,
        None => drive.create_folder(BACKUP_FOLDER).await?,
    };

    let mut file = File::open(local_path)
        .map_err(|e| SyncError::io(e, local_path.display().to_string()))?;

    // Empty-input digest means a truncated database; never upload it.
    let local_hash = md5_hex(&mut file)?;
    if local_hash == EMPTY_MD5 {
        return Err(SyncError::local_data(
            "file is empty",
            local_path.display().to_string(),
        ));
    }

    // The hash pass consumed the stream; rewind before reading for upload.
    file.seek(SeekFrom::Start(0))
        .map_err(|e| SyncError::io(e, local_path.display().to_string()))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| SyncError::io(e, local_path.display().to_string()))?;
    drop(file);

    info!("Checking for {} existence on Drive", file_name);
    match drive.find_file(file_name, &folder_id).await? {
        None => {
            let created = drive.create_file(file_name, &folder_id, content).await?;
            info!("Successfully created {}, id: {}", file_name, created.id);
            Ok(SyncOutcome::Created { id: created.id })
        }
        Some(remote) if changed(&remote, &local_hash) => {
            let updated = drive.update_file(&remote.id, file_name, content).await?;
            info!("Successfully updated {}, id: {}", file_name, updated.id);
            Ok(SyncOutcome::Updated { id: updated.id })
        }
        Some(_) => {
            info!("{} has not been changed since last sync", file_name);
            Ok(SyncOutcome::Unchanged)
        }
    }
}

/// Exact string comparison of hex digests. A remote entry with no recorded
/// checksum counts as changed.
fn changed(remote: &DriveFile, local_hash: &str) -> bool {
    remote.md5_checksum.as_deref() != Some(local_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(checksum: Option<&str>) -> DriveFile {
        DriveFile {
            id: "file-1".to_string(),
            name: "vault.kdbx".to_string(),
            md5_checksum: checksum.map(str::to_string),
        }
    }

    #[test]
    fn equal_digests_are_unchanged() {
        let hash = "900150983cd24fb0d6963f7d28e17f72";
        assert!(!changed(&remote(Some(hash)), hash));
    }

    #[test]
    fn differing_digests_are_changed() {
        assert!(changed(
            &remote(Some("900150983cd24fb0d6963f7d28e17f72")),
            "d41d8cd98f00b204e9800998ecf8427e"
        ));
    }

    #[test]
    fn missing_remote_checksum_counts_as_changed() {
        assert!(changed(&remote(None), "900150983cd24fb0d6963f7d28e17f72"));
    }
}
