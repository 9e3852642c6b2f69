//! Makefile exporter.
//!
//! One rule per job with outputs as targets and inputs as prerequisites,
//! plus an `all` target naming every terminal output. Make tracks
//! freshness itself, so every job is exported.

use std::collections::HashSet;

use tracing::debug;

use super::dedent;
use crate::error::{Error, Result};
use crate::templates::RenderContext;
use crate::workflow::Workflow;

/// Options for `to_makefile`.
#[derive(Debug, Clone)]
pub struct MakefileOptions {
    /// Value of the `SHELL` variable; `None` omits it.
    pub shell: Option<String>,
    /// Extra `NAME = value` lines declared before the rules.
    pub variables: Vec<(String, String)>,
}

impl Default for MakefileOptions {
    fn default() -> Self {
        Self {
            shell: Some("/bin/bash".to_string()),
            variables: Vec::new(),
        }
    }
}

/// Render a workflow as a Makefile.
pub fn to_makefile(
    workflow: &Workflow,
    context: &RenderContext,
    options: &MakefileOptions,
) -> Result<String> {
    let mut header = String::new();
    if let Some(shell) = &options.shell {
        header.push_str(&format!("\nSHELL := {shell}\n"));
    }
    for (name, value) in &options.variables {
        header.push_str(&format!("{name} = {value}\n"));
    }

    let mut rules = String::new();
    let mut terminal_outputs: Vec<&str> = Vec::new();
    let mut all_paths: HashSet<&str> = HashSet::new();
    let jobs = workflow.sorted_jobs();

    for job in &jobs {
        if job.outputs().is_empty() {
            return Err(Error::Export(format!(
                "Make requires at least one output per job ('{}' has none)",
                job.id()
            )));
        }
        for path in job.inputs().iter().chain(job.outputs()) {
            if path.contains(' ') {
                return Err(Error::Export(format!(
                    "Make cannot handle spaces in path names: '{path}'"
                )));
            }
            all_paths.insert(path);
        }
        for output in job.outputs() {
            let (_, consumers) = workflow.path_jobs(output).expect("output is registered");
            if consumers.is_empty() {
                terminal_outputs.push(output);
            }
        }

        let body = dedent(&context.render_job(workflow, job.id())?, true);
        let recipe: Vec<String> = body.iter().map(|line| format!("\t@{line}")).collect();
        rules.push_str(&format!(
            "\n# {}\n{}: {}\n{}\n",
            job.id(),
            job.outputs().join(" "),
            job.inputs().join(" "),
            recipe.join("\n")
        ));
    }

    // pick a main target name that is not also a path
    let mut main_target = "all".to_string();
    let mut suffix = 0usize;
    while all_paths.contains(main_target.as_str()) {
        suffix += 1;
        main_target = format!("all_{suffix}");
    }

    debug!(jobs = jobs.len(), "makefile export complete");
    Ok(format!(
        "{header}\n{main_target}: {}\n{rules}",
        terminal_outputs.join(" ")
    ))
}
