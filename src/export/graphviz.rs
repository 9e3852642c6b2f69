//! Graphviz export and diagram drawing.
//!
//! `to_graphviz` renders the bipartite graph as DOT text; `draw` pipes
//! that text through an external layout program (`dot` by default) to
//! produce a picture in any format the program supports.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Error, Result};
use crate::workflow::{analyze, JobStatus, PathStatus, Workflow};

/// Options for `to_graphviz`.
#[derive(Debug, Clone)]
pub struct GraphvizOptions {
    /// Export only outdated jobs (default) or every job.
    pub outdated_only: bool,
    /// Fill nodes with status colors.
    pub decorated: bool,
}

impl Default for GraphvizOptions {
    fn default() -> Self {
        Self {
            outdated_only: true,
            decorated: true,
        }
    }
}

/// Options for `draw`.
#[derive(Debug, Clone)]
pub struct DrawOptions {
    pub outdated_only: bool,
    pub decorated: bool,
    /// Layout program to run.
    pub program: String,
    /// Output format; inferred from the file name when `None`.
    pub format: Option<String>,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            outdated_only: true,
            decorated: true,
            program: "dot".to_string(),
            format: None,
        }
    }
}

fn job_fill(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Current => "#00FF00",
        JobStatus::Outdated => "#FF4000",
    }
}

fn path_fill(status: PathStatus) -> &'static str {
    match status {
        PathStatus::Current => "#E5FFCC",
        PathStatus::Missing => "#FF8C8C",
        PathStatus::Outdated => "#FFDC00",
    }
}

fn quote(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render a workflow as DOT text.
pub fn to_graphviz(workflow: &Workflow, options: &GraphvizOptions) -> Result<String> {
    let report = analyze(workflow)?;

    let mut dot = format!("digraph \"{}\" {{\n", quote(workflow.name()));
    dot.push_str("  rankdir=LR;\n  overlap=scale;\n");
    dot.push_str("  node [style=\"rounded,filled\", fontname=\"Monospace\"];\n");

    let mut declared_paths: Vec<&str> = Vec::new();
    let mut edges = String::new();

    for job in workflow.sorted_jobs() {
        if options.outdated_only && !report.is_outdated(job.id()) {
            continue;
        }
        let job_node = format!("job:{}", job.id());
        let mut attrs = format!(
            "label=\"{}\", shape=box, fontsize=18, fontname=\"Helvetica\"",
            quote(job.id())
        );
        if options.decorated {
            attrs.push_str(&format!(", fillcolor=\"{}\"", job_fill(report.job(job.id()))));
        }
        dot.push_str(&format!("  \"{}\" [{attrs}];\n", quote(&job_node)));

        for (is_input, paths) in [(true, job.inputs()), (false, job.outputs())] {
            for path in paths {
                let path_node = format!("path:{path}");
                if !declared_paths.contains(&path.as_str()) {
                    declared_paths.push(path);
                    let mut attrs =
                        format!("label=\"{}\", shape=folder", quote(path));
                    if options.decorated {
                        attrs.push_str(&format!(
                            ", fillcolor=\"{}\"",
                            path_fill(report.path(path))
                        ));
                    }
                    dot.push_str(&format!("  \"{}\" [{attrs}];\n", quote(&path_node)));
                }
                if is_input {
                    edges.push_str(&format!(
                        "  \"{}\" -> \"{}\";\n",
                        quote(&path_node),
                        quote(&job_node)
                    ));
                } else {
                    edges.push_str(&format!(
                        "  \"{}\" -> \"{}\";\n",
                        quote(&job_node),
                        quote(&path_node)
                    ));
                }
            }
        }
    }

    dot.push_str(&edges);
    dot.push_str("}\n");
    Ok(dot)
}

/// Lay out the workflow diagram with an external program and write the
/// picture to `filename`.
pub fn draw(workflow: &Workflow, filename: impl AsRef<Path>, options: &DrawOptions) -> Result<()> {
    let filename = filename.as_ref();
    let format = match &options.format {
        Some(format) => format.to_lowercase(),
        None => filename
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .ok_or_else(|| {
                Error::Export(format!(
                    "cannot infer an output format from '{}'",
                    filename.display()
                ))
            })?,
    };

    let dot = to_graphviz(
        workflow,
        &GraphvizOptions {
            outdated_only: options.outdated_only,
            decorated: options.decorated,
        },
    )?;

    let mut child = Command::new(&options.program)
        .arg(format!("-T{format}"))
        .arg("-o")
        .arg(filename)
        .stdin(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Filesystem {
            path: options.program.clone(),
            source: e,
        })?;

    child
        .stdin
        .take()
        .expect("stdin was piped")
        .write_all(dot.as_bytes())
        .map_err(|e| Error::Filesystem {
            path: options.program.clone(),
            source: e,
        })?;

    let output = child.wait_with_output().map_err(|e| Error::Filesystem {
        path: options.program.clone(),
        source: e,
    })?;
    if !output.status.success() {
        return Err(Error::Export(format!(
            "'{}' failed: {}",
            options.program,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    debug!(program = %options.program, file = %filename.display(), "diagram drawn");
    Ok(())
}
