//! Drake exporter.
//!
//! One step per job: `outputs <- inputs [protocol]` followed by the
//! tab-indented body.

use tracing::debug;

use super::dedent;
use crate::error::Result;
use crate::templates::RenderContext;
use crate::workflow::Workflow;

/// Options for `to_drake`.
#[derive(Debug, Clone)]
pub struct DrakeOptions {
    /// Step protocol tag.
    pub protocol: String,
}

impl Default for DrakeOptions {
    fn default() -> Self {
        Self {
            protocol: "shell".to_string(),
        }
    }
}

/// Render a workflow as a Drake script.
pub fn to_drake(
    workflow: &Workflow,
    context: &RenderContext,
    options: &DrakeOptions,
) -> Result<String> {
    let mut script = String::new();
    let jobs = workflow.sorted_jobs();

    for job in &jobs {
        let body = dedent(&context.render_job(workflow, job.id())?, true);
        let recipe: Vec<String> = body.iter().map(|line| format!("\t{line}")).collect();
        script.push_str(&format!(
            "; {}\n{} <- {} [{}]\n{}\n\n",
            job.id(),
            job.outputs().join(", "),
            job.inputs().join(", "),
            options.protocol,
            recipe.join("\n")
        ));
    }

    debug!(jobs = jobs.len(), "drake export complete");
    Ok(script)
}
