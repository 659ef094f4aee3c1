//! Seeded per-folder file order randomization.

use std::path::{Component, Path};

use rand::Rng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Per-run randomizer. Shuffles are reproducible for a fixed run seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecRandomizer {
    seed_run: Option<u64>,
}

impl SpecRandomizer {
    /// Build from the shuffle flag and an optional user seed.
    ///
    /// With shuffling enabled and no seed, a fresh run seed is drawn so the
    /// run can still be reproduced from [`SpecRandomizer::seed`].
    pub fn new(if_shuffle: bool, seed: Option<u64>) -> Self {
        if !if_shuffle {
            return Self { seed_run: None };
        }
        let seed_run = seed.unwrap_or_else(|| rand::rng().random::<u64>());
        Self {
            seed_run: Some(seed_run),
        }
    }

    /// Randomizer returning every list unchanged.
    pub fn identity() -> Self {
        Self { seed_run: None }
    }

    /// Effective run seed; `None` when shuffling is disabled.
    pub fn seed(&self) -> Option<u64> {
        self.seed_run
    }

    /// Whether this randomizer reorders files.
    pub fn is_shuffle(&self) -> bool {
        self.seed_run.is_some()
    }

    /// Permute one folder's file list.
    pub fn randomize(&self, path_dir_rel: &Path, mut l_files: Vec<String>) -> Vec<String> {
        let Some(seed_run) = self.seed_run else {
            return l_files;
        };
        let mut rng = derive_folder_rng(seed_run, path_dir_rel);
        l_files.shuffle(&mut rng);
        l_files
    }
}

/// Derive an independent generator for one folder from the run seed.
///
/// The seed material is SHA-256 over the little-endian run seed and the
/// `/`-joined relative folder path, so it does not depend on platform path
/// separators or on the order folders are processed in.
pub fn derive_folder_rng(seed_run: u64, path_dir_rel: &Path) -> ChaCha8Rng {
    let mut hasher = Sha256::new();
    hasher.update(seed_run.to_le_bytes());
    hasher.update(derive_portable_key(path_dir_rel).as_bytes());
    let mut seed_folder = [0_u8; 32];
    seed_folder.copy_from_slice(&hasher.finalize());
    ChaCha8Rng::from_seed(seed_folder)
}

/// `/`-joined normal components of a relative path (`""` for the root).
pub(crate) fn derive_portable_key(path_dir_rel: &Path) -> String {
    path_dir_rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
