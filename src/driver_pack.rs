//! Batch scanning of a driver folder tree.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::ParserSettings;
use crate::device_class::{ClassNameLookup, NullClassNames};
use crate::driver_record::DriverRecord;
use crate::err::{Error, Result};
use crate::hash;
use crate::inf_file::InfFile;
use crate::signing::{NullVerifier, SignatureVerifier, SigningInfo};

/// Aggregated outcome of scanning one driver folder tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub records: Vec<DriverRecord>,
    /// Order-independent content hash of the whole tree.
    pub root_hash: String,
    pub inf_count: usize,
}

/// Walks a folder of driver packages and resolves one [`DriverRecord`] per
/// `.inf` file found.
///
/// One driver's failure never aborts the batch: unreadable files yield a
/// skeleton record, collaborator errors degrade to an unsigned verdict.
pub struct DriverPack {
    root: PathBuf,
    settings: ParserSettings,
    verifier: Box<dyn SignatureVerifier>,
    class_lookup: Box<dyn ClassNameLookup>,
}

impl std::fmt::Debug for DriverPack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverPack")
            .field("root", &self.root)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl DriverPack {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let root = path.canonicalize().map_err(|source| Error::InvalidInputPath {
            source,
            path: path.to_path_buf(),
        })?;

        if !root.is_dir() {
            return Err(Error::InputNotADirectory { path: root });
        }

        Ok(DriverPack {
            root,
            settings: ParserSettings::default(),
            verifier: Box::new(NullVerifier),
            class_lookup: Box::new(NullClassNames),
        })
    }

    pub fn with_configuration(mut self, settings: ParserSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_verifier(mut self, verifier: impl SignatureVerifier + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    pub fn with_class_lookup(mut self, class_lookup: impl ClassNameLookup + 'static) -> Self {
        self.class_lookup = Box::new(class_lookup);
        self
    }

    /// The `.inf` files under the root, sorted for deterministic output.
    pub fn inf_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("inf"))
            })
            .map(|entry| entry.into_path())
            .collect();
        files.sort_unstable();
        files
    }

    pub fn scan(&self) -> Result<ScanReport> {
        let files = self.inf_files();
        if files.is_empty() {
            return Err(Error::NoInfFiles {
                path: self.root.clone(),
            });
        }

        info!(
            "found {} INF file(s) under {}",
            files.len(),
            self.root.display()
        );

        let records = self.scan_records(&files);

        let root_hash = hash::sha256_dir(&self.root).unwrap_or_else(|e| {
            warn!("failed to hash {}: {e}", self.root.display());
            String::new()
        });

        Ok(ScanReport {
            inf_count: records.len(),
            records,
            root_hash,
        })
    }

    fn scan_records(&self, files: &[PathBuf]) -> Vec<DriverRecord> {
        #[cfg(feature = "multithreading")]
        {
            use rayon::prelude::*;

            if self.settings.get_num_threads() != 1 {
                match rayon::ThreadPoolBuilder::new()
                    .num_threads(self.settings.get_num_threads())
                    .build()
                {
                    Ok(pool) => {
                        return pool
                            .install(|| files.par_iter().map(|path| self.scan_file(path)).collect());
                    }
                    Err(e) => warn!("failed to build thread pool, scanning serially: {e}"),
                }
            }
        }

        files.iter().map(|path| self.scan_file(path)).collect()
    }

    /// Resolves one record; every failure on the way degrades to defaults.
    fn scan_file(&self, path: &Path) -> DriverRecord {
        debug!("scanning {}", path.display());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let signing = self.verifier.verify(path).unwrap_or_else(|e| {
            warn!("signature check failed for {}: {e}", path.display());
            SigningInfo::default()
        });

        let mut record = match fs::read(path) {
            Ok(bytes) => {
                let inf = InfFile::from_bytes(&bytes, &self.settings);
                DriverRecord::resolve(
                    name,
                    &inf,
                    &signing,
                    self.class_lookup.as_ref(),
                    &self.settings,
                )
            }
            Err(e) => {
                warn!("failed to read {}: {e}", path.display());
                DriverRecord {
                    name,
                    ..Default::default()
                }
            }
        };

        if let Some(parent) = path.parent() {
            record.folder_hash = hash::sha256_dir(parent).unwrap_or_else(|e| {
                warn!("failed to hash {}: {e}", parent.display());
                String::new()
            });
        }

        record
    }
}
