// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Class label tables

use regex::Regex;
use std::path::Path;

use super::DetectionError;

/// Read a labels file, one class name per line
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Vec<String>, DetectionError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| DetectionError::Labels(format!("{}: {}", path.display(), e)))?;

    let labels: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if labels.is_empty() {
        return Err(DetectionError::Labels(format!(
            "{}: no class names",
            path.display()
        )));
    }

    Ok(labels)
}

/// Parse the `names` entry YOLOv5 writes into exported ONNX metadata
///
/// Format: `{0: 'optic_disc', 1: 'macula'}`
pub fn parse_metadata_names(raw: &str) -> Option<Vec<String>> {
    let re = Regex::new(r#"(['"])([-()\w '"]+?)(['"])"#).ok()?;
    let names: Vec<String> = re
        .captures_iter(raw)
        .map(|caps| caps[2].to_string())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

/// Label for `class_id`, or a numbered placeholder when the table is short
pub fn label_for(labels: &[String], class_id: usize) -> String {
    labels
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class{}", class_id))
}
