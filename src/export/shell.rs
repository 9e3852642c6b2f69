//! Shell script exporter.
//!
//! Jobs run sequentially in execution order; the `set -e` prologue makes
//! the script stop at the first failing job.

use tracing::debug;

use super::dedent;
use crate::error::Result;
use crate::templates::RenderContext;
use crate::workflow::Workflow;

/// Options for `to_shell_script`.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Export only outdated jobs (default) or every job.
    pub outdated_only: bool,
    /// Interpreter for the shebang line.
    pub shell: String,
    /// Lines inserted between the shebang and the first job.
    pub shell_args: Vec<String>,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            outdated_only: true,
            shell: "/bin/bash".to_string(),
            shell_args: vec!["set -e".to_string()],
        }
    }
}

/// Render a workflow as a sequential shell script.
pub fn to_shell_script(
    workflow: &Workflow,
    context: &RenderContext,
    options: &ShellOptions,
) -> Result<String> {
    let mut script = format!("#!{}\n", options.shell.trim());

    if !options.shell_args.is_empty() {
        script.push('\n');
        for arg in &options.shell_args {
            script.push_str(arg.trim());
            script.push('\n');
        }
    }

    let jobs = workflow.list_jobs(options.outdated_only)?;
    for id in &jobs {
        let body = dedent(&context.render_job(workflow, id)?, false);
        script.push_str(&format!("\n# {id}\n{}\n", body.join("\n")));
    }

    debug!(jobs = jobs.len(), "shell export complete");
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::EngineKind;
    use crate::workflow::JobOptions;

    fn dummy_workflow() -> Workflow {
        let mut workflow = Workflow::new("dummy-workflow").unwrap();
        workflow
            .add_job_with(
                ["a", "b"],
                "c",
                JobOptions::new()
                    .id("dummy-job-id")
                    .template("cat $INPUT0 $INPUT1 > $OUTPUT"),
            )
            .unwrap();
        workflow
    }

    #[test]
    fn test_shell_script_layout() {
        let workflow = dummy_workflow();
        let ctx = RenderContext::with_engine(EngineKind::Simple);
        let script =
            to_shell_script(&workflow, &ctx, &ShellOptions { outdated_only: false, ..Default::default() })
                .unwrap();

        assert_eq!(
            script,
            "#!/bin/bash\n\nset -e\n\n# dummy-job-id\ncat a b > c\n"
        );
    }

    #[test]
    fn test_custom_shell_and_args() {
        let workflow = dummy_workflow();
        let ctx = RenderContext::with_engine(EngineKind::Simple);
        let options = ShellOptions {
            outdated_only: false,
            shell: "/bin/sh".to_string(),
            shell_args: vec![],
        };
        let script = to_shell_script(&workflow, &ctx, &options).unwrap();
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(!script.contains("set -e"));
    }

    #[test]
    fn test_multi_line_bodies_are_dedented() {
        let mut workflow = Workflow::new("w").unwrap();
        workflow
            .add_job_with(
                "A",
                ["B", "C"],
                JobOptions::new().id("x").template(
                    "\n        grep my_pattern $INPUT > $OUTPUT0\n        grep -v my_pattern $INPUT > $OUTPUT1\n    ",
                ),
            )
            .unwrap();
        let ctx = RenderContext::with_engine(EngineKind::Simple);
        let options = ShellOptions { outdated_only: false, ..Default::default() };
        let script = to_shell_script(&workflow, &ctx, &options).unwrap();
        assert!(script.contains("\n# x\ngrep my_pattern A > B\ngrep -v my_pattern A > C\n"));
    }

    #[test]
    fn test_template_failure_aborts_export() {
        let mut workflow = Workflow::new("w").unwrap();
        workflow
            .add_job_with("a", "b", JobOptions::new().id("x").template("$MISSING"))
            .unwrap();
        let ctx = RenderContext::with_engine(EngineKind::Simple);
        let options = ShellOptions { outdated_only: false, ..Default::default() };
        let err = to_shell_script(&workflow, &ctx, &options).unwrap_err();
        assert_eq!(err.kind(), "TEMPLATE_ERROR");
    }

    #[test]
    fn test_export_is_byte_reproducible() {
        let workflow = dummy_workflow();
        let ctx = RenderContext::with_engine(EngineKind::Simple);
        let options = ShellOptions { outdated_only: false, ..Default::default() };
        let first = to_shell_script(&workflow, &ctx, &options).unwrap();
        let second = to_shell_script(&workflow, &ctx, &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_construction_order_does_not_change_output() {
        // same final structure described in two different job orders,
        // with identical creation timestamps carried by the documents
        let doc_a = "\
name: w
jobs:
- id: x
  inputs: [A]
  outputs: [B]
  template: cp $INPUT $OUTPUT
  data: null
  created_at: 10
- id: y
  inputs: [B]
  outputs: [C]
  template: cp $INPUT $OUTPUT
  data: null
  created_at: 10
";
        let doc_b = "\
name: w
jobs:
- id: y
  inputs: [B]
  outputs: [C]
  template: cp $INPUT $OUTPUT
  data: null
  created_at: 10
- id: x
  inputs: [A]
  outputs: [B]
  template: cp $INPUT $OUTPUT
  data: null
  created_at: 10
";
        let ctx = RenderContext::with_engine(EngineKind::Simple);
        let options = ShellOptions { outdated_only: false, ..Default::default() };
        let a = to_shell_script(&crate::io::from_yaml(doc_a).unwrap(), &ctx, &options).unwrap();
        let b = to_shell_script(&crate::io::from_yaml(doc_b).unwrap(), &ctx, &options).unwrap();
        assert_eq!(a, b);
    }
}
