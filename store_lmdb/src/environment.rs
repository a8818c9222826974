//! LMDB environment setup.

use std::path::{Path, PathBuf};

use heed::{Env, EnvOpenOptions};

use crate::LmdbError;

/// Default map size: 1 GiB of address space, grown lazily on disk.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// An open LMDB environment and the directory it lives in.
pub struct LmdbEnvironment {
    env: Env,
    path: PathBuf,
}

impl LmdbEnvironment {
    /// Open or create an environment in directory `path`.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the directory is owned by this process and the map is only
        // accessed through heed's transaction types.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs)
                .open(path)?
        };
        Ok(Self {
            env,
            path: path.to_path_buf(),
        })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
