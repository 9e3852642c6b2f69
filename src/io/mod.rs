//! Workflow persistence.
//!
//! Workflows round-trip through a YAML document with jobs listed in
//! execution order. A `.gz` suffix on the file name selects transparent
//! gzip compression in both directions.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::workflow::{JobDraft, Workflow};

#[derive(Debug, Serialize, Deserialize)]
struct WorkflowDoc {
    name: String,
    jobs: Vec<JobDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JobDoc {
    id: String,
    #[serde(default)]
    inputs: Vec<String>,
    #[serde(default)]
    outputs: Vec<String>,
    template: Option<String>,
    data: Option<serde_json::Map<String, serde_json::Value>>,
    created_at: i64,
}

/// Serialize a workflow to its YAML document, jobs in execution order.
pub fn to_yaml(workflow: &Workflow) -> Result<String> {
    let doc = WorkflowDoc {
        name: workflow.name().to_string(),
        jobs: workflow
            .sorted_jobs()
            .into_iter()
            .map(|job| JobDoc {
                id: job.id().to_string(),
                inputs: job.inputs().to_vec(),
                outputs: job.outputs().to_vec(),
                template: job.template().map(String::from),
                data: if job.data().is_empty() {
                    None
                } else {
                    Some(job.data().clone())
                },
                created_at: job.created_at(),
            })
            .collect(),
    };
    serde_yaml::to_string(&doc).map_err(|e| Error::Serialization(e.to_string()))
}

/// Rebuild a workflow from its YAML document.
///
/// The document goes through the same validation as live mutation; any
/// invariant violation surfaces as a serialization error.
pub fn from_yaml(document: &str) -> Result<Workflow> {
    if document.trim().is_empty() {
        return Err(Error::Serialization("empty workflow document".to_string()));
    }
    let doc: WorkflowDoc = serde_yaml::from_str(document).map_err(|e| {
        let message = e.to_string();
        match extract_missing_field(&message) {
            Some(field) => Error::Serialization(format!("missing field '{field}'")),
            None => Error::Serialization(format!("invalid document: {message}")),
        }
    })?;

    let mut workflow = Workflow::new(doc.name)
        .map_err(|e| Error::Serialization(format!("invalid workflow name: {e}")))?;
    for job in doc.jobs {
        workflow
            .insert_job(JobDraft {
                id: Some(job.id),
                template: job.template,
                data: job.data.unwrap_or_default(),
                inputs: job.inputs,
                outputs: job.outputs,
                created_at: Some(job.created_at),
            })
            .map_err(|e| Error::Serialization(format!("invalid job entry: {e}")))?;
    }
    Ok(workflow)
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let marker = "missing field `";
    let start = message.find(marker)? + marker.len();
    let rest = &message[start..];
    Some(&rest[..rest.find('`')?])
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

fn fs_error(path: &Path, source: std::io::Error) -> Error {
    Error::Filesystem {
        path: path.display().to_string(),
        source,
    }
}

/// Write a workflow document to `path`, gzipped when the name ends in
/// `.gz`.
pub fn save(workflow: &Workflow, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let document = to_yaml(workflow)?;
    let file = File::create(path).map_err(|e| fs_error(path, e))?;
    if is_gzip(path) {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder
            .write_all(document.as_bytes())
            .and_then(|_| encoder.finish().map(|_| ()))
            .map_err(|e| fs_error(path, e))?;
    } else {
        let mut file = file;
        file.write_all(document.as_bytes())
            .map_err(|e| fs_error(path, e))?;
    }
    debug!(workflow = workflow.name(), path = %path.display(), "workflow saved");
    Ok(())
}

/// Read a workflow document from `path`, gunzipping when the name ends
/// in `.gz`.
pub fn load(path: impl AsRef<Path>) -> Result<Workflow> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| fs_error(path, e))?;
    let mut document = String::new();
    if is_gzip(path) {
        GzDecoder::new(file)
            .read_to_string(&mut document)
            .map_err(|e| fs_error(path, e))?;
    } else {
        let mut file = file;
        file.read_to_string(&mut document)
            .map_err(|e| fs_error(path, e))?;
    }
    let workflow = from_yaml(&document)?;
    debug!(workflow = workflow.name(), path = %path.display(), "workflow loaded");
    Ok(workflow)
}
