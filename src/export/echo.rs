//! Human-readable workflow listing.
//!
//! One stanza per job in execution order: inputs prefixed with `<`, the
//! identifier (with a status marker when decorated), outputs prefixed
//! with `>`, then a blank line; a total line closes the listing.

use nu_ansi_term::Color;

use crate::error::{Error, Result};
use crate::workflow::{analyze, JobStatus, PathStatus, StatusReport, Workflow};

/// Options for `echo`.
#[derive(Debug, Clone)]
pub struct EchoOptions {
    /// List only outdated jobs (default) or every job.
    pub outdated_only: bool,
    /// Append status markers: `*` outdated, `.` up to date.
    pub decorated: bool,
    /// Colorize the listing; requires `decorated`.
    pub colorized: bool,
}

impl Default for EchoOptions {
    fn default() -> Self {
        Self {
            outdated_only: true,
            decorated: true,
            colorized: false,
        }
    }
}

fn job_line(id: &str, status: JobStatus, options: &EchoOptions) -> String {
    let marker = match status {
        JobStatus::Outdated => " *",
        JobStatus::Current => " .",
    };
    let text = if options.decorated {
        format!("{id}{marker}")
    } else {
        id.to_string()
    };
    if !options.colorized {
        return text;
    }
    let style = match status {
        JobStatus::Outdated => Color::Yellow.bold(),
        JobStatus::Current => Color::Green.bold(),
    };
    style.paint(text).to_string()
}

fn path_line(path: &str, status: PathStatus, is_input: bool, options: &EchoOptions) -> String {
    let prefix = if is_input { '<' } else { '>' };
    let text = format!("{prefix} {path}");
    if !options.colorized {
        return text;
    }
    let style = match status {
        PathStatus::Current => Color::Green.dimmed(),
        PathStatus::Missing => Color::Red.dimmed(),
        PathStatus::Outdated => Color::Yellow.dimmed(),
    };
    style.paint(text).to_string()
}

/// Render the listing. `colorized` without `decorated` is rejected.
pub fn echo(workflow: &Workflow, options: &EchoOptions) -> Result<String> {
    if options.colorized && !options.decorated {
        return Err(Error::Export(
            "colorized output requires decorated output".to_string(),
        ));
    }

    let report: Option<StatusReport> = if options.outdated_only || options.decorated {
        Some(analyze(workflow)?)
    } else {
        None
    };
    let status_of = |id: &str| {
        report
            .as_ref()
            .map(|r| r.job(id))
            .unwrap_or(JobStatus::Current)
    };
    let path_status_of = |path: &str| {
        report
            .as_ref()
            .map(|r| r.path(path))
            .unwrap_or(PathStatus::Current)
    };

    let mut listing = String::new();
    let mut shown = 0usize;
    for job in workflow.sorted_jobs() {
        if options.outdated_only && status_of(job.id()) == JobStatus::Current {
            continue;
        }
        for input in job.inputs() {
            listing.push_str(&path_line(input, path_status_of(input), true, options));
            listing.push('\n');
        }
        listing.push_str(&job_line(job.id(), status_of(job.id()), options));
        listing.push('\n');
        for output in job.outputs() {
            listing.push_str(&path_line(output, path_status_of(output), false, options));
            listing.push('\n');
        }
        listing.push('\n');
        shown += 1;
    }

    let plural = if shown == 1 { "" } else { "s" };
    if options.outdated_only {
        listing.push_str(&format!(
            "total: {shown} outdated job{plural} (out of {})\n",
            workflow.number_of_jobs()
        ));
    } else {
        listing.push_str(&format!("total: {shown} job{plural}\n"));
    }
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::JobOptions;

    fn dummy_workflow() -> Workflow {
        let mut workflow = Workflow::new("dummy-workflow").unwrap();
        workflow
            .add_job_with(["a", "b"], "c", JobOptions::new().id("dummy-job-id"))
            .unwrap();
        workflow
    }

    #[test]
    fn test_plain_stanza_layout() {
        let options = EchoOptions {
            outdated_only: false,
            decorated: false,
            colorized: false,
        };
        let listing = echo(&dummy_workflow(), &options).unwrap();
        assert_eq!(listing, "< a\n< b\ndummy-job-id\n> c\n\ntotal: 1 job\n");
    }

    #[test]
    fn test_decorated_marks_outdated_jobs() {
        // paths don't exist, so the job is outdated
        let options = EchoOptions {
            outdated_only: true,
            decorated: true,
            colorized: false,
        };
        let listing = echo(&dummy_workflow(), &options).unwrap();
        assert!(listing.contains("dummy-job-id *"));
        assert!(listing.ends_with("total: 1 outdated job (out of 1)\n"));
    }

    #[test]
    fn test_up_to_date_jobs_are_skipped_when_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();
        let newer = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        std::fs::File::options()
            .write(true)
            .open(&b)
            .unwrap()
            .set_modified(newer)
            .unwrap();

        let mut workflow = Workflow::new("w").unwrap();
        workflow
            .add_job_with(
                a.to_str().unwrap(),
                b.to_str().unwrap(),
                JobOptions::new().id("x"),
            )
            .unwrap();

        let listing = echo(&workflow, &EchoOptions::default()).unwrap();
        assert!(!listing.contains("x *"));
        assert!(listing.ends_with("total: 0 outdated jobs (out of 1)\n"));
    }

    #[test]
    fn test_colorized_requires_decorated() {
        let options = EchoOptions {
            outdated_only: false,
            decorated: false,
            colorized: true,
        };
        let err = echo(&dummy_workflow(), &options).unwrap_err();
        assert_eq!(err.kind(), "EXPORT_ERROR");
    }

    #[test]
    fn test_colorized_listing_contains_ansi_sequences() {
        let options = EchoOptions {
            outdated_only: false,
            decorated: true,
            colorized: true,
        };
        let listing = echo(&dummy_workflow(), &options).unwrap();
        assert!(listing.contains("\u{1b}["));
    }
}
