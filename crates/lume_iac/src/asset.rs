//! File assets: local directories shipped alongside a template.

use std::fs;
use std::path::{Path, PathBuf};

use fs_extra::dir::CopyOptions;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{IacError, IacResult};

/// A directory packaged as a zip and uploaded before deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAsset {
    /// Content hash; also the asset id.
    pub hash: String,
    pub source_path: PathBuf,
}

impl FileAsset {
    /// Fingerprint a directory. The hash covers relative paths and file
    /// contents, so it changes only when the code does.
    pub fn from_directory(path: impl AsRef<Path>) -> IacResult<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(IacError::AssetNotFound(path.to_path_buf()));
        }

        let mut hasher = Sha256::new();
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
            hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
            hasher.update([0u8]);
            hasher.update(fs::read(entry.path())?);
            hasher.update([0u8]);
        }

        let hash = hex::encode(hasher.finalize());
        debug!("Fingerprinted {:?} as {}", path, hash);

        Ok(Self {
            hash,
            source_path: path.to_path_buf(),
        })
    }

    /// Directory name inside the cloud assembly.
    pub fn staged_name(&self) -> String {
        format!("asset.{}", self.hash)
    }

    /// Object key in the asset bucket.
    pub fn object_key(&self) -> String {
        format!("{}.zip", self.hash)
    }

    /// Copy the directory into the assembly.
    ///
    /// An existing staged directory is reused only if its content still
    /// hashes to this asset. Copies go through a scratch sibling that is
    /// renamed into place once complete.
    pub fn stage(&self, assembly_dir: &Path) -> IacResult<PathBuf> {
        let target = assembly_dir.join(self.staged_name());
        if target.is_dir() {
            if Self::from_directory(&target)?.hash == self.hash {
                debug!("Asset {} already staged", self.hash);
                return Ok(target);
            }
            warn!("Staged asset {:?} does not match its hash, restaging", target);
            fs::remove_dir_all(&target)?;
        }

        let scratch = assembly_dir.join(format!(".{}.staging", self.staged_name()));
        if scratch.exists() {
            fs::remove_dir_all(&scratch)?;
        }
        fs::create_dir_all(&scratch)?;
        let options = CopyOptions::new().content_only(true).overwrite(true);
        if let Err(e) = fs_extra::dir::copy(&self.source_path, &scratch, &options) {
            let _ = fs::remove_dir_all(&scratch);
            return Err(e.into());
        }
        fs::rename(&scratch, &target)?;

        info!("Staged asset {:?} into {:?}", self.source_path, target);
        Ok(target)
    }
}
