//! Case-insensitive file suffix filter.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::spec::SplitTreeError;

/// Compiled suffix filter. An empty filter accepts every file name.
#[derive(Debug, Clone)]
pub struct SpecExtensionFilter {
    l_suffixes: Vec<String>,
    glob_set: Option<GlobSet>,
}

impl SpecExtensionFilter {
    /// Filter accepting every file.
    pub fn accept_all() -> Self {
        Self {
            l_suffixes: Vec::new(),
            glob_set: None,
        }
    }

    /// Compile suffixes like `.png`, `JPG` or `.tar.gz`.
    ///
    /// Entries are trimmed, blank entries dropped, and a leading `.` added
    /// when missing. Duplicates (case-insensitive) are kept once.
    pub fn from_raw(extensions: Option<&[String]>) -> Result<Self, SplitTreeError> {
        let Some(extensions) = extensions else {
            return Ok(Self::accept_all());
        };

        let mut l_suffixes: Vec<String> = Vec::with_capacity(extensions.len());
        for ext in extensions {
            let ext = ext.trim();
            if ext.is_empty() {
                continue;
            }
            let suffix = if ext.starts_with('.') {
                ext.to_lowercase()
            } else {
                format!(".{}", ext.to_lowercase())
            };
            if suffix.contains(['/', '\\']) {
                return Err(SplitTreeError::InvalidExtension(format!(
                    "Extension must not contain a path separator: `{ext}`"
                )));
            }
            if !l_suffixes.contains(&suffix) {
                l_suffixes.push(suffix);
            }
        }
        if l_suffixes.is_empty() {
            return Ok(Self::accept_all());
        }

        let mut builder_glob_set = GlobSetBuilder::new();
        for suffix in &l_suffixes {
            let glob = GlobBuilder::new(&format!("*{}", globset::escape(suffix)))
                .case_insensitive(true)
                .literal_separator(false)
                .build()
                .map_err(|e| {
                    SplitTreeError::InvalidExtension(format!("Invalid extension `{suffix}`: {e}"))
                })?;
            builder_glob_set.add(glob);
        }
        let glob_set = builder_glob_set.build().map_err(|e| {
            SplitTreeError::InvalidExtension(format!("Invalid extension filter: {e}"))
        })?;

        Ok(Self {
            l_suffixes,
            glob_set: Some(glob_set),
        })
    }

    /// Normalized suffixes; empty when every file is accepted.
    pub fn suffixes(&self) -> &[String] {
        &self.l_suffixes
    }

    /// Whether the filter accepts every file.
    pub fn is_accept_all(&self) -> bool {
        self.glob_set.is_none()
    }

    /// Whether `name_file` ends with one of the accepted suffixes.
    pub fn is_match(&self, name_file: &str) -> bool {
        match &self.glob_set {
            None => true,
            Some(glob_set) => glob_set.is_match(name_file),
        }
    }

    /// Keep accepted names, preserving order.
    pub fn apply(&self, l_files: Vec<String>) -> Vec<String> {
        if self.is_accept_all() {
            return l_files;
        }
        l_files.into_iter().filter(|n| self.is_match(n)).collect()
    }
}

impl Default for SpecExtensionFilter {
    fn default() -> Self {
        Self::accept_all()
    }
}
