//! Filesystem loading of rule sources.
//!
//! A policy path may name a plain rule file, a bundle directory, or a gzip
//! tar archive of a bundle. The loader detects the layout, collects rule
//! modules, static data documents, and the optional manifest, and computes
//! a content digest over everything it collected. Modules are ordered by
//! name so that identical sources always produce identical digests.

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use strum_macros::{Display, EnumString};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::PolicyError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const RULE_EXTENSION: &str = "rego";
const DATA_FILE: &str = "data.json";
const MANIFEST_FILE: &str = ".manifest";

/// Layout of a policy source on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SourceKind {
    File,
    Directory,
    Archive,
}

/// One rule module collected from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleModule {
    /// Source-relative name, used by the engine for error reporting.
    pub name: String,
    pub source: String,
}

/// Bundle manifest, read from `.manifest` at the bundle root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub roots: Option<Vec<String>>,
}

/// Everything collected from one policy path, ready for compilation.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    kind: SourceKind,
    modules: Vec<RuleModule>,
    data: Vec<Value>,
    manifest: Option<Manifest>,
    digest: String,
}

impl LoadedSource {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn modules(&self) -> &[RuleModule] {
        &self.modules
    }

    pub fn data(&self) -> &[Value] {
        &self.data
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// SHA-256 over the ordered module names and sources, data documents,
    /// and manifest revision.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Detect the layout of the source at `path`.
///
/// Directories are bundle directories; files starting with the gzip magic
/// bytes are bundle archives; everything else is a plain rule file.
pub fn detect_kind(path: &Path) -> Result<SourceKind, PolicyError> {
    let metadata = fs::metadata(path)
        .map_err(|_| PolicyError::SourceNotFound(path.display().to_string()))?;
    if metadata.is_dir() {
        return Ok(SourceKind::Directory);
    }

    let mut magic = [0u8; 2];
    let read = fs::File::open(path)
        .and_then(|mut file| file.read(&mut magic))
        .map_err(|e| PolicyError::SourceUnreadable {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;
    if read == magic.len() && magic == GZIP_MAGIC {
        Ok(SourceKind::Archive)
    } else {
        Ok(SourceKind::File)
    }
}

/// Read the source at `path` into compilation inputs.
pub fn load_source(path: &Path) -> Result<LoadedSource, PolicyError> {
    let kind = detect_kind(path)?;
    debug!(event = "Load", phase = "Detect", path = %path.display(), kind = %kind);

    let (modules, data, manifest) = match kind {
        SourceKind::File => load_file(path)?,
        SourceKind::Directory => load_directory(path)?,
        SourceKind::Archive => load_archive(path)?,
    };

    let modules: Vec<RuleModule> = modules
        .into_iter()
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .collect();
    if modules.is_empty() {
        return Err(PolicyError::CompileError(format!(
            "no rule modules found in {}",
            path.display()
        )));
    }

    let digest = compute_digest(&modules, &data, manifest.as_ref());
    debug!(
        event = "Load",
        phase = "Collected",
        modules = modules.len(),
        data_documents = data.len(),
        digest = %digest
    );

    Ok(LoadedSource {
        kind,
        modules,
        data,
        manifest,
        digest,
    })
}

fn unreadable(path: &Path, cause: impl ToString) -> PolicyError {
    PolicyError::SourceUnreadable {
        path: path.display().to_string(),
        cause: cause.to_string(),
    }
}

fn load_file(path: &Path) -> Result<(Vec<RuleModule>, Vec<Value>, Option<Manifest>), PolicyError> {
    let source = fs::read_to_string(path).map_err(|e| unreadable(path, e))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((vec![RuleModule { name, source }], Vec::new(), None))
}

fn load_directory(
    path: &Path,
) -> Result<(Vec<RuleModule>, Vec<Value>, Option<Manifest>), PolicyError> {
    let mut modules = Vec::new();
    let mut data = Vec::new();
    let mut manifest = None;

    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| unreadable(path, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .strip_prefix(path)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        let file_name = entry.file_name().to_string_lossy();

        if entry.path().extension().is_some_and(|ext| ext == RULE_EXTENSION) {
            let source = fs::read_to_string(entry.path()).map_err(|e| unreadable(entry.path(), e))?;
            modules.push(RuleModule { name, source });
        } else if file_name == DATA_FILE {
            let text = fs::read_to_string(entry.path()).map_err(|e| unreadable(entry.path(), e))?;
            data.push(parse_data_document(&name, &text)?);
        } else if file_name == MANIFEST_FILE && entry.depth() == 1 {
            let text = fs::read_to_string(entry.path()).map_err(|e| unreadable(entry.path(), e))?;
            manifest = Some(parse_manifest(&text)?);
        }
    }

    Ok((modules, data, manifest))
}

fn load_archive(
    path: &Path,
) -> Result<(Vec<RuleModule>, Vec<Value>, Option<Manifest>), PolicyError> {
    let file = fs::File::open(path).map_err(|e| unreadable(path, e))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    let mut modules = Vec::new();
    let mut data = Vec::new();
    let mut manifest = None;

    for entry in archive.entries().map_err(|e| unreadable(path, e))? {
        let mut entry = entry.map_err(|e| unreadable(path, e))?;
        let entry_path = entry.path().map_err(|e| unreadable(path, e))?.into_owned();
        let name = entry_path.to_string_lossy().trim_start_matches('/').to_string();
        let file_name = entry_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if entry_path.extension().is_some_and(|ext| ext == RULE_EXTENSION) {
            let mut source = String::new();
            entry
                .read_to_string(&mut source)
                .map_err(|e| unreadable(path, e))?;
            modules.push(RuleModule { name, source });
        } else if file_name == DATA_FILE {
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| unreadable(path, e))?;
            data.push(parse_data_document(&name, &text)?);
        } else if file_name == MANIFEST_FILE && manifest.is_none() {
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| unreadable(path, e))?;
            manifest = Some(parse_manifest(&text)?);
        }
    }

    Ok((modules, data, manifest))
}

fn parse_data_document(name: &str, text: &str) -> Result<Value, PolicyError> {
    serde_json::from_str(text)
        .map_err(|e| PolicyError::CompileError(format!("invalid data document {name}: {e}")))
}

fn parse_manifest(text: &str) -> Result<Manifest, PolicyError> {
    serde_json::from_str(text)
        .map_err(|e| PolicyError::CompileError(format!("invalid bundle manifest: {e}")))
}

fn compute_digest(modules: &[RuleModule], data: &[Value], manifest: Option<&Manifest>) -> String {
    let mut hasher = Sha256::new();
    for module in modules {
        hasher.update(module.name.as_bytes());
        hasher.update([0]);
        hasher.update(module.source.as_bytes());
        hasher.update([0]);
    }
    for document in data {
        hasher.update(document.to_string().as_bytes());
        hasher.update([0]);
    }
    if let Some(revision) = manifest.and_then(|m| m.revision.as_deref()) {
        hasher.update(revision.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
