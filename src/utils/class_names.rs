//! Class label list, index-aligned with the detector's class scores

use crate::error::{ProxError, ProxResult};
use std::path::Path;

/// Newline-delimited class labels loaded once at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    /// Load labels from a newline-delimited file
    pub fn from_file(path: &Path) -> ProxResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ProxError::ClassListError(path.to_path_buf()))?;

        let names = Self::parse(&content);
        if names.is_empty() {
            return Err(ProxError::ClassListError(path.to_path_buf()));
        }

        Ok(Self { names })
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    fn parse(content: &str) -> Vec<String> {
        content
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Label for `class_id`, or `"unknown"` when out of range
    pub fn label(&self, class_id: usize) -> &str {
        self.names
            .get(class_id)
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}
