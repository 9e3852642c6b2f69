//! TORQUE/PBS array exporter.
//!
//! Produces a single self-contained array submission script: one array
//! slot per job, selected with `awk` on `PBS_ARRAYID`. TORQUE arrays
//! cannot express inter-job dependencies; the jobs keep their execution
//! order and the script says so explicitly.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::flatten;
use crate::error::Result;
use crate::templates::RenderContext;
use crate::workflow::Workflow;

/// Options for `to_torque_array`.
#[derive(Debug, Clone)]
pub struct TorqueOptions {
    /// Export only outdated jobs (default) or every job.
    pub outdated_only: bool,
    /// Extra `#PBS -<flag> [value]` lines.
    pub qsub_options: Vec<(String, Option<String>)>,
    /// Change to the submission directory before running each job.
    pub cwd: bool,
}

impl Default for TorqueOptions {
    fn default() -> Self {
        Self {
            outdated_only: true,
            qsub_options: Vec::new(),
            cwd: false,
        }
    }
}

/// Render a workflow as a TORQUE/PBS array submission script.
pub fn to_torque_array(
    workflow: &Workflow,
    context: &RenderContext,
    options: &TorqueOptions,
) -> Result<String> {
    let jobs = workflow.list_jobs(options.outdated_only)?;
    let mut commands = Vec::with_capacity(jobs.len());
    for id in &jobs {
        commands.push(flatten(&context.render_job(workflow, id)?));
    }

    let mut flags: BTreeMap<String, Option<String>> = options
        .qsub_options
        .iter()
        .map(|(flag, value)| (flag.clone(), value.clone()))
        .collect();
    // qsub truncates job names past 15 characters
    let name: String = workflow.name().chars().take(15).collect();
    flags.entry("N".to_string()).or_insert(Some(name));
    flags.insert("t".to_string(), Some(format!("1-{}", jobs.len())));

    let mut script = String::from("#!/bin/bash\n");
    for (flag, value) in &flags {
        match value {
            Some(value) => script.push_str(&format!("#PBS -{flag} {value}\n")),
            None => script.push_str(&format!("#PBS -{flag}\n")),
        }
    }

    if !jobs.is_empty() {
        warn!(
            jobs = jobs.len(),
            "TORQUE arrays cannot express job dependencies; slots may run concurrently"
        );
    }
    script.push_str(
        "\n# array slots keep the workflow execution order, but TORQUE\n\
         # cannot wire dependencies between them: slots may run concurrently\n",
    );

    // TORQUE has no 'cwd' flag as SGE does; emulate it
    if options.cwd {
        script.push_str("\ncd ${PBS_O_WORKDIR}\n");
    }

    script.push_str("\n_ALL_JOBS=$(cat <<'EOJ'\n");
    for command in &commands {
        script.push_str(command);
        script.push('\n');
    }
    script.push_str(
        "EOJ\n)\n\n_CURRENT_JOB=\"$(echo \"${_ALL_JOBS}\" | awk \"NR==${PBS_ARRAYID}\")\"\n\n\
         echo ${_CURRENT_JOB}\necho\n\neval ${_CURRENT_JOB}\n",
    );

    debug!(jobs = jobs.len(), "torque export complete");
    Ok(script)
}
