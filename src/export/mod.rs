//! Exporters rendering a workflow for an external execution environment.
//!
//! Every exporter is a pure function from a workflow, a rendering
//! context, and target options to the text of the target script. The job
//! list always comes from the canonical execution order; targets that
//! track freshness themselves (the Make family) receive every job, the
//! others filter to the outdated set first. A template failure aborts
//! the whole export.

mod drake;
mod echo;
mod graphviz;
mod makefile;
mod makeflow;
mod shell;
mod slurm;
mod torque;

pub use drake::{to_drake, DrakeOptions};
pub use echo::{echo, EchoOptions};
pub use graphviz::{draw, to_graphviz, DrawOptions, GraphvizOptions};
pub use makefile::{to_makefile, MakefileOptions};
pub use makeflow::{to_makeflow, MakeflowOptions};
pub use shell::{to_shell_script, ShellOptions};
pub use slurm::{to_slurm, SlurmOptions};
pub use torque::{to_torque_array, TorqueOptions};

/// Split a rendered body into lines with the common leading whitespace
/// removed. Trailing whitespace is stripped per line; leading and
/// trailing blank lines are dropped, inner blank lines are kept unless
/// `ignore_empty_lines` is set.
pub(crate) fn dedent(text: &str, ignore_empty_lines: bool) -> Vec<String> {
    let mut lines: Vec<&str> = Vec::new();
    let mut margin = usize::MAX;

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if !ignore_empty_lines {
                lines.push(line);
            }
            continue;
        }
        margin = margin.min(line.len() - line.trim_start().len());
        lines.push(line);
    }

    while lines.first().is_some_and(|line| line.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    lines
        .into_iter()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                line[margin..].to_string()
            }
        })
        .collect()
}

/// Collapse a rendered body to a single line: non-empty trimmed lines
/// joined with `; `, for targets that only accept one-line commands.
pub(crate) fn flatten(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}
