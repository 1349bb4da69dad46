//! Manifest parsing, structural validation, merging and serialization.
//!
//! Structural validation is all-or-nothing: a manifest is either accepted
//! wholly or rejected with the first violation found. Runtime value
//! validation, which accumulates violations, lives in
//! [`runtime`](super::runtime).

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;

use crate::error::{JanusError, Result};

use super::types::{ArgumentDef, Manifest, ModelDef};

/// Request names claimed by the engine itself. A manifest declaring one of
/// these is rejected.
pub const RESERVED_REQUEST_NAMES: &[&str] = &[
    "ping",
    "echo",
    "get_info",
    "validate",
    "slow_process",
    "manifest",
];

/// Upper bound on `extends` chain length. Chains deeper than this (which
/// includes any cycle) are rejected at structural validation.
pub const MAX_EXTENDS_DEPTH: usize = 16;

/// Supported manifest file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
}

impl ManifestFormat {
    /// Infer the format from a file extension (`.json`, `.yaml`, `.yml`).
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(ManifestFormat::Json),
            Some("yaml") | Some("yml") => Ok(ManifestFormat::Yaml),
            other => Err(JanusError::Manifest(format!(
                "unsupported manifest extension: {:?} ({})",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }
}

/// Parse manifest bytes in the given format.
///
/// Syntax errors surface as manifest errors with a format-specific prefix
/// so callers can tell a malformed file from a structurally invalid one.
pub fn parse(bytes: &[u8], format: ManifestFormat) -> Result<Manifest> {
    match format {
        ManifestFormat::Json => serde_json::from_slice(bytes)
            .map_err(|e| JanusError::Manifest(format!("Invalid JSON format: {e}"))),
        ManifestFormat::Yaml => serde_yaml::from_slice(bytes)
            .map_err(|e| JanusError::Manifest(format!("YAML parsing failed: {e}"))),
    }
}

/// Read and parse a manifest file, inferring the format from the path.
pub fn parse_file(path: &Path) -> Result<Manifest> {
    let format = ManifestFormat::from_path(path)?;
    let bytes = std::fs::read(path)?;
    let manifest = parse(&bytes, format)?;
    tracing::debug!(
        path = %path.display(),
        requests = manifest.requests.len(),
        models = manifest.models.len(),
        "manifest parsed"
    );
    Ok(manifest)
}

/// Validate the structure of a parsed manifest.
///
/// Checks the version, every request (name, description, arguments,
/// response shape) and every model (including `extends` resolution within
/// [`MAX_EXTENDS_DEPTH`]).
///
/// # Errors
///
/// Returns a manifest error naming the first violated constraint and the
/// path to the offending definition.
pub fn validate_structure(manifest: &Manifest) -> Result<()> {
    if manifest.version.trim().is_empty() {
        return Err(JanusError::Manifest(
            "manifest version must be non-empty".to_string(),
        ));
    }

    for (name, request) in &manifest.requests {
        if name.trim().is_empty() {
            return Err(JanusError::Manifest(
                "request name must be non-empty".to_string(),
            ));
        }
        if RESERVED_REQUEST_NAMES.contains(&name.as_str()) {
            return Err(JanusError::Manifest(format!(
                "request name '{name}' is reserved"
            )));
        }
        if request.description.trim().is_empty() {
            return Err(JanusError::Manifest(format!(
                "request '{name}' must have a description"
            )));
        }
        for (arg_name, arg) in &request.args {
            validate_argument(arg, &format!("{name}.args.{arg_name}"), manifest)?;
        }
        if let Some(response) = &request.response {
            validate_argument(response, &format!("{name}.response"), manifest)?;
        }
    }

    for (name, model) in &manifest.models {
        validate_model(name, model, manifest)?;
    }

    Ok(())
}

fn validate_argument(arg: &ArgumentDef, path: &str, manifest: &Manifest) -> Result<()> {
    if let Some(pattern) = &arg.pattern {
        Regex::new(pattern).map_err(|e| {
            JanusError::Manifest(format!("{path}: pattern does not compile: {e}"))
        })?;
    }

    if let (Some(min), Some(max)) = (arg.minimum, arg.maximum) {
        if min > max {
            return Err(JanusError::Manifest(format!(
                "{path}: minimum ({min}) exceeds maximum ({max})"
            )));
        }
    }

    if let (Some(min), Some(max)) = (arg.min_length, arg.max_length) {
        if min > max {
            return Err(JanusError::Manifest(format!(
                "{path}: minLength ({min}) exceeds maxLength ({max})"
            )));
        }
    }

    if let Some(model_ref) = &arg.model_ref {
        if !manifest.models.contains_key(model_ref) {
            return Err(JanusError::Manifest(format!(
                "{path}: modelRef '{model_ref}' does not resolve"
            )));
        }
    }

    if let Some(items) = &arg.items {
        validate_argument(items, &format!("{path}.items"), manifest)?;
    }
    for (prop_name, prop) in &arg.properties {
        validate_argument(prop, &format!("{path}.{prop_name}"), manifest)?;
    }

    Ok(())
}

fn validate_model(name: &str, model: &ModelDef, manifest: &Manifest) -> Result<()> {
    if name.trim().is_empty() {
        return Err(JanusError::Manifest(
            "model name must be non-empty".to_string(),
        ));
    }

    // Walk the extends chain; depth cap catches both runaway chains and
    // cycles.
    let mut current = model.extends.as_deref();
    let mut depth = 0;
    while let Some(parent) = current {
        depth += 1;
        if depth > MAX_EXTENDS_DEPTH {
            return Err(JanusError::Manifest(format!(
                "model '{name}': extends chain exceeds depth {MAX_EXTENDS_DEPTH}"
            )));
        }
        let Some(parent_model) = manifest.models.get(parent) else {
            return Err(JanusError::Manifest(format!(
                "model '{name}': extends '{parent}' which does not exist"
            )));
        };
        current = parent_model.extends.as_deref();
    }

    for (prop_name, prop) in &model.properties {
        validate_argument(prop, &format!("models.{name}.{prop_name}"), manifest)?;
    }
    if let Some(items) = &model.items {
        validate_argument(items, &format!("models.{name}.items"), manifest)?;
    }

    Ok(())
}

/// Parse several manifest files and merge them into one manifest.
///
/// Metadata (version, name, description) comes from the first file; request
/// and model maps are unioned. A request or model name appearing in more
/// than one file is a hard error naming the colliding key - never a silent
/// overwrite.
pub fn merge_files(paths: &[std::path::PathBuf]) -> Result<Manifest> {
    let mut iter = paths.iter();
    let Some(first) = iter.next() else {
        return Err(JanusError::Manifest(
            "no manifest files to merge".to_string(),
        ));
    };

    let mut merged = parse_file(first)?;

    for path in iter {
        let next = parse_file(path)?;
        merge_map(&mut merged.requests, next.requests, "request", path)?;
        merge_map(&mut merged.models, next.models, "model", path)?;
    }

    validate_structure(&merged)?;
    tracing::debug!(
        files = paths.len(),
        requests = merged.requests.len(),
        models = merged.models.len(),
        "manifests merged"
    );
    Ok(merged)
}

fn merge_map<V>(
    target: &mut BTreeMap<String, V>,
    source: BTreeMap<String, V>,
    kind: &str,
    path: &Path,
) -> Result<()> {
    for (key, value) in source {
        if target.contains_key(&key) {
            return Err(JanusError::Manifest(format!(
                "{kind} '{key}' defined in multiple manifests (second definition in {})",
                path.display()
            )));
        }
        target.insert(key, value);
    }
    Ok(())
}

/// Serialize a manifest back to text, re-validating first so an invalid
/// manifest can never round-trip through serialization.
///
/// `pretty` selects indented output for JSON; YAML output is always
/// block-style.
pub fn serialize(manifest: &Manifest, format: ManifestFormat, pretty: bool) -> Result<String> {
    validate_structure(manifest)?;
    match format {
        ManifestFormat::Json if pretty => Ok(serde_json::to_string_pretty(manifest)?),
        ManifestFormat::Json => Ok(serde_json::to_string(manifest)?),
        ManifestFormat::Yaml => Ok(serde_yaml::to_string(manifest)?),
    }
}
