//! Outdatedness analysis.
//!
//! Decides which jobs must run by comparing the modification times of
//! their input and output paths, then propagating staleness through the
//! job-level graph. The analyzer only ever stats the filesystem; it never
//! writes to it.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::graph::Workflow;
use super::types::{JobStatus, PathStatus};
use crate::error::{Error, Result};

/// Per-job and per-path freshness, computed in one pass.
#[derive(Debug, Clone)]
pub struct StatusReport {
    jobs: HashMap<String, JobStatus>,
    paths: HashMap<String, PathStatus>,
}

impl StatusReport {
    pub fn job(&self, id: &str) -> JobStatus {
        self.jobs.get(id).copied().unwrap_or(JobStatus::Current)
    }

    pub fn path(&self, path: &str) -> PathStatus {
        self.paths
            .get(path)
            .copied()
            .unwrap_or(PathStatus::Current)
    }

    pub fn is_outdated(&self, id: &str) -> bool {
        self.job(id) == JobStatus::Outdated
    }

    /// Number of outdated jobs.
    pub fn outdated_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|status| **status == JobStatus::Outdated)
            .count()
    }
}

/// Analyze a workflow against the filesystem.
///
/// A job is locally outdated when an output is absent, when an existing
/// input is newer than an existing output, or when it is a sink (inputs
/// only) with at least one input present. Staleness then propagates to
/// every job consuming an output of an outdated job, walking the graph in
/// execution order.
pub fn analyze(workflow: &Workflow) -> Result<StatusReport> {
    let mut mtimes: HashMap<&str, Option<SystemTime>> = HashMap::new();
    for path in workflow.list_paths() {
        mtimes.insert(path, path_mtime(Path::new(path))?);
    }

    let mut jobs = HashMap::new();
    let mut regenerated: HashSet<&str> = HashSet::new();

    for job in workflow.sorted_jobs() {
        let inputs = job.inputs();
        let outputs = job.outputs();

        let upstream_outdated = inputs.iter().any(|path| regenerated.contains(path.as_str()));
        let output_missing = outputs.iter().any(|path| mtimes[path.as_str()].is_none());

        let newest_input = inputs
            .iter()
            .filter_map(|path| mtimes[path.as_str()])
            .max();
        let oldest_output = outputs
            .iter()
            .filter_map(|path| mtimes[path.as_str()])
            .min();
        let input_newer = matches!(
            (newest_input, oldest_output),
            (Some(input), Some(output)) if output < input
        );

        // sink jobs have nothing to compare against and run whenever
        // any of their inputs exists
        let runnable_sink = outputs.is_empty() && newest_input.is_some();

        let outdated = upstream_outdated || output_missing || input_newer || runnable_sink;
        if outdated {
            for output in outputs {
                regenerated.insert(output.as_str());
            }
        }
        jobs.insert(
            job.id().to_string(),
            if outdated {
                JobStatus::Outdated
            } else {
                JobStatus::Current
            },
        );
    }

    let mut paths = HashMap::new();
    for path in workflow.list_paths() {
        let status = if mtimes[path].is_none() {
            PathStatus::Missing
        } else if regenerated.contains(path) {
            PathStatus::Outdated
        } else {
            PathStatus::Current
        };
        paths.insert(path.to_string(), status);
    }

    let report = StatusReport { jobs, paths };
    debug!(
        outdated = report.outdated_count(),
        total = workflow.number_of_jobs(),
        "outdatedness analysis complete"
    );
    Ok(report)
}

fn fs_error(path: &Path, source: std::io::Error) -> Error {
    Error::Filesystem {
        path: path.display().to_string(),
        source,
    }
}

/// Modification time of a path, `None` when absent.
///
/// For directories the newest contained file wins, searched recursively
/// with dotfiles and broken links skipped and symlink cycles guarded; an
/// empty directory stats as the epoch. Any stat failure other than
/// not-found aborts the analysis.
pub fn path_mtime(path: &Path) -> Result<Option<SystemTime>> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(fs_error(path, source)),
    };
    if metadata.is_dir() {
        directory_mtime(path).map(Some)
    } else {
        metadata.modified().map(Some).map_err(|e| fs_error(path, e))
    }
}

fn directory_mtime(root: &Path) -> Result<SystemTime> {
    let mut latest = UNIX_EPOCH;
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let canonical = match fs::canonicalize(&dir) {
            Ok(canonical) => canonical,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => continue,
            Err(source) => return Err(fs_error(&dir, source)),
        };
        if !visited.insert(canonical) {
            continue;
        }

        let entries = fs::read_dir(&dir).map_err(|e| fs_error(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| fs_error(&dir, e))?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let entry_path = entry.path();
            let metadata = match fs::metadata(&entry_path) {
                Ok(metadata) => metadata,
                // broken symbolic link
                Err(source) if source.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(fs_error(&entry_path, source)),
            };
            if metadata.is_dir() {
                pending.push(entry_path);
            } else if metadata.is_file() {
                let modified = metadata.modified().map_err(|e| fs_error(&entry_path, e))?;
                if modified > latest {
                    latest = modified;
                }
            }
        }
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::JobOptions;

    use std::fs::File;
    use std::io::Write as _;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(name.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_path_has_no_mtime() {
        let dir = tempfile::tempdir().unwrap();
        assert!(path_mtime(&dir.path().join("absent")).unwrap().is_none());
    }

    #[test]
    fn test_directory_mtime_tracks_newest_file() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        touch(dir.path(), "old");
        let newest = touch(&sub, "new");

        let dir_mtime = path_mtime(dir.path()).unwrap().unwrap();
        let newest_mtime = path_mtime(&newest).unwrap().unwrap();
        assert_eq!(dir_mtime, newest_mtime);
    }

    #[test]
    fn test_empty_directory_counts_as_epoch() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(path_mtime(dir.path()).unwrap().unwrap(), UNIX_EPOCH);
    }

    #[test]
    fn test_missing_output_flags_job_and_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "A");
        let b = dir.path().join("B");
        let c = dir.path().join("C");

        let mut workflow = Workflow::new("w").unwrap();
        workflow
            .add_job_with(
                a.to_str().unwrap(),
                b.to_str().unwrap(),
                JobOptions::new().id("x"),
            )
            .unwrap();
        workflow
            .add_job_with(
                b.to_str().unwrap(),
                c.to_str().unwrap(),
                JobOptions::new().id("y"),
            )
            .unwrap();

        let report = analyze(&workflow).unwrap();
        assert!(report.is_outdated("x"), "output B is absent");
        assert!(report.is_outdated("y"), "upstream x is outdated");
        assert_eq!(report.path(b.to_str().unwrap()), PathStatus::Missing);
        assert_eq!(report.outdated_count(), 2);
    }

    #[test]
    fn test_current_job_stays_current() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "A");
        let b = touch(dir.path(), "B");

        // make sure the output is strictly newer than the input
        let newer = SystemTime::now() + std::time::Duration::from_secs(5);
        set_file_mtime(&b, newer);

        let mut workflow = Workflow::new("w").unwrap();
        workflow
            .add_job_with(
                a.to_str().unwrap(),
                b.to_str().unwrap(),
                JobOptions::new().id("x"),
            )
            .unwrap();

        let report = analyze(&workflow).unwrap();
        assert!(!report.is_outdated("x"));
        assert_eq!(report.path(b.to_str().unwrap()), PathStatus::Current);
    }

    #[test]
    fn test_newer_input_flips_job_to_outdated() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "A");
        let b = touch(dir.path(), "B");

        let newer = SystemTime::now() + std::time::Duration::from_secs(5);
        set_file_mtime(&a, newer);

        let mut workflow = Workflow::new("w").unwrap();
        workflow
            .add_job_with(
                a.to_str().unwrap(),
                b.to_str().unwrap(),
                JobOptions::new().id("x"),
            )
            .unwrap();

        let report = analyze(&workflow).unwrap();
        assert!(report.is_outdated("x"));
        assert_eq!(report.path(b.to_str().unwrap()), PathStatus::Outdated);
    }

    #[test]
    fn test_sink_job_runs_when_input_exists() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "A");

        let mut workflow = Workflow::new("w").unwrap();
        workflow
            .add_job_with(
                a.to_str().unwrap(),
                crate::workflow::types::PathList::none(),
                JobOptions::new().id("sink"),
            )
            .unwrap();

        let report = analyze(&workflow).unwrap();
        assert!(report.is_outdated("sink"));
    }

    #[test]
    fn test_propagation_scenario() {
        // A exists (oldest input newer than C), B newer than A, C older, D absent:
        // x (A -> B, C) is outdated because C is older than A;
        // y (A, C -> D) is outdated because D is absent and x is outdated.
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "A");
        let b = touch(dir.path(), "B");
        let c = touch(dir.path(), "C");
        let d = dir.path().join("D");

        let base = SystemTime::now();
        set_file_mtime(&a, base + std::time::Duration::from_secs(100));
        set_file_mtime(&b, base + std::time::Duration::from_secs(200));
        set_file_mtime(&c, base + std::time::Duration::from_secs(50));

        let mut workflow = Workflow::new("example-1").unwrap();
        workflow
            .add_job_with(
                a.to_str().unwrap(),
                vec![b.to_str().unwrap(), c.to_str().unwrap()],
                JobOptions::new().id("x"),
            )
            .unwrap();
        workflow
            .add_job_with(
                vec![a.to_str().unwrap(), c.to_str().unwrap()],
                d.to_str().unwrap(),
                JobOptions::new().id("y"),
            )
            .unwrap();

        let report = analyze(&workflow).unwrap();
        assert!(report.is_outdated("x"));
        assert!(report.is_outdated("y"));
        assert_eq!(workflow.list_jobs(true).unwrap(), vec!["x", "y"]);
    }

    fn set_file_mtime(path: &Path, to: SystemTime) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(to).unwrap();
    }
}
