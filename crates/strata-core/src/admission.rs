use anyhow::{Context, Result};
use regex::Regex;

use crate::config::AdmissionConfig;
use crate::error::ExtractError;

const BINARY_PROBE_BYTES: usize = 1024;

/// Gate that keeps generated and table-like files out of entity extraction.
pub struct AdmissionFilter {
    config: AdmissionConfig,
    pragma: Regex,
    class_decl: Regex,
    deleted: Regex,
    hex_entry: Regex,
}

impl AdmissionFilter {
    pub fn new(config: &AdmissionConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            pragma: Regex::new(r"#\s*pragma\b").context("pragma regex")?,
            class_decl: Regex::new(r"\bclass\s+\w+").context("class declaration regex")?,
            deleted: Regex::new(r"\bdelete\b").context("delete regex")?,
            hex_entry: Regex::new(r#"\{\s*0x[0-9a-fA-F]+\s*,\s*["'][^"']+["']\s*\}"#)
                .context("hex table regex")?,
        })
    }

    /// A NUL byte near the start marks a binary file.
    pub fn is_binary(bytes: &[u8]) -> bool {
        bytes.iter().take(BINARY_PROBE_BYTES).any(|&b| b == 0)
    }

    /// Check raw bytes before decoding: size limit and binary probe.
    pub fn check_bytes(&self, bytes: &[u8]) -> Result<(), ExtractError> {
        if bytes.is_empty() {
            return Err(ExtractError::Empty);
        }
        if bytes.len() as u64 > self.config.max_file_bytes {
            return Err(ExtractError::Admission(format!(
                "file too large ({} bytes)",
                bytes.len()
            )));
        }
        if Self::is_binary(bytes) {
            return Err(ExtractError::Admission("binary file".to_string()));
        }
        Ok(())
    }

    /// Check decoded source against the generated-file heuristics.
    pub fn check(&self, content: &str) -> Result<(), ExtractError> {
        if content.trim().is_empty() {
            return Err(ExtractError::Empty);
        }

        if let Some(marker) = self
            .config
            .generated_markers
            .iter()
            .find(|m| content.contains(m.as_str()))
        {
            return Err(ExtractError::Admission(format!(
                "generated file (marker {marker:?})"
            )));
        }

        let pragmas = self.pragma.find_iter(content).count();
        let classes = self.class_decl.find_iter(content).count();
        let deleted = self.deleted.find_iter(content).count();
        let c = &self.config;
        if (pragmas > c.max_pragmas && classes > c.max_types_with_pragmas)
            || classes > c.max_types
            || deleted > c.max_deleted
        {
            return Err(ExtractError::Admission(format!(
                "declaration-heavy file ({pragmas} pragmas, {classes} classes, {deleted} deletes)"
            )));
        }

        let hex_entries = self.hex_entry.find_iter(content).count();
        if hex_entries > c.max_hex_entries {
            return Err(ExtractError::Admission(format!(
                "hex mapping table ({hex_entries} entries)"
            )));
        }

        Ok(())
    }
}
