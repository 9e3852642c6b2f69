//! Makeflow exporter.
//!
//! Same rule structure as Make, without the phony target; bodies are
//! collapsed to one line since Makeflow commands cannot span lines.

use tracing::debug;

use super::flatten;
use crate::error::{Error, Result};
use crate::templates::RenderContext;
use crate::workflow::Workflow;

/// Options for `to_makeflow`.
#[derive(Debug, Clone, Default)]
pub struct MakeflowOptions {
    /// `NAME=value` lines declared before the rules.
    pub variables: Vec<(String, String)>,
}

/// Render a workflow as a Makeflow script.
pub fn to_makeflow(
    workflow: &Workflow,
    context: &RenderContext,
    options: &MakeflowOptions,
) -> Result<String> {
    let mut script = String::new();
    for (name, value) in &options.variables {
        script.push_str(&format!("{name}={value}\n"));
    }

    let jobs = workflow.sorted_jobs();
    for job in &jobs {
        if job.inputs().is_empty() {
            return Err(Error::Export(format!(
                "Makeflow requires at least one input per job ('{}' has none)",
                job.id()
            )));
        }
        if job.outputs().is_empty() {
            return Err(Error::Export(format!(
                "Makeflow requires at least one output per job ('{}' has none)",
                job.id()
            )));
        }
        let body = flatten(&context.render_job(workflow, job.id())?);
        script.push_str(&format!(
            "\n# {}\n{}: {}\n\t{body}\n",
            job.id(),
            job.outputs().join(" "),
            job.inputs().join(" ")
        ));
    }

    debug!(jobs = jobs.len(), "makeflow export complete");
    Ok(script)
}
