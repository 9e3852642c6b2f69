//! SLURM sbatch exporter.
//!
//! Produces a driver script that submits one sbatch job per workflow
//! job, in execution order, capturing each returned job id so downstream
//! submissions can declare `--dependency=afterok:...` on their
//! predecessors.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::dedent;
use crate::error::Result;
use crate::templates::RenderContext;
use crate::workflow::Workflow;

/// Options for `to_slurm`.
#[derive(Debug, Clone)]
pub struct SlurmOptions {
    /// Export only outdated jobs (default) or every job.
    pub outdated_only: bool,
    /// Extra `#SBATCH --<flag> [value]` lines for the driver script.
    pub sbatch_options: Vec<(String, Option<String>)>,
}

impl Default for SlurmOptions {
    fn default() -> Self {
        Self {
            outdated_only: true,
            sbatch_options: Vec::new(),
        }
    }
}

/// Render a workflow as a SLURM submission driver.
pub fn to_slurm(
    workflow: &Workflow,
    context: &RenderContext,
    options: &SlurmOptions,
) -> Result<String> {
    let mut flags: BTreeMap<String, Option<String>> = options
        .sbatch_options
        .iter()
        .map(|(flag, value)| (flag.clone(), value.clone()))
        .collect();
    flags
        .entry("job-name".to_string())
        .or_insert_with(|| Some(workflow.name().to_string()));

    let mut script = String::from("#!/bin/bash\n");
    for (flag, value) in &flags {
        match value {
            Some(value) => script.push_str(&format!("#SBATCH --{flag} {value}\n")),
            None => script.push_str(&format!("#SBATCH --{flag}\n")),
        }
    }

    let jobs = workflow.list_jobs(options.outdated_only)?;
    let mut submitted: HashMap<&str, usize> = HashMap::new();

    for (index, id) in jobs.iter().enumerate() {
        let job_index = index + 1;
        let body = dedent(&context.render_job(workflow, id)?, false).join("\n");

        // only predecessors that are themselves part of this submission
        // can be waited on
        let dependencies: Vec<String> = workflow
            .job_predecessors(id)?
            .into_iter()
            .filter_map(|parent| submitted.get(parent))
            .map(|parent_index| format!(":${{JOB_{parent_index}_ID}}"))
            .collect();
        let dependency_arg = if dependencies.is_empty() {
            String::new()
        } else {
            format!(" --dependency=afterok{}", dependencies.join(""))
        };

        script.push_str(&format!(
            "\n# {id}\nJOB_{job_index}_ID=$(sbatch{dependency_arg} <<'EOB'\n#!/bin/bash\n{body}\nEOB\n); JOB_{job_index}_ID=${{JOB_{job_index}_ID##* }}\n"
        ));
        submitted.insert(id.as_str(), job_index);
    }

    debug!(jobs = jobs.len(), "slurm export complete");
    Ok(script)
}
