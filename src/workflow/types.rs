//! Workflow type definitions.

use serde_json::Value;

/// A job: the unit of work connecting input paths to output paths.
///
/// A job without a template is *abstract* — it shapes the graph but has
/// nothing to render. The `data` payload is carried verbatim through
/// serialization; the graph and the outdatedness analysis never read it,
/// only the template environment does.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    id: String,
    template: Option<String>,
    data: serde_json::Map<String, Value>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    created_at: i64,
}

impl Job {
    pub(crate) fn new(
        id: String,
        template: Option<String>,
        data: serde_json::Map<String, Value>,
        inputs: Vec<String>,
        outputs: Vec<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            template,
            data,
            inputs,
            outputs,
            created_at,
        }
    }

    /// Unique identifier of this job within its workflow.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The job template, if any. `None` marks an abstract job.
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// User payload attached to this job.
    pub fn data(&self) -> &serde_json::Map<String, Value> {
        &self.data
    }

    /// Input paths, in declaration order.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Output paths, in declaration order.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Instant the job was added, in milliseconds since the epoch.
    /// Used as a tiebreaker inside topological layers.
    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}

/// Optional parts of a job declaration.
///
/// ```
/// use spate::JobOptions;
///
/// let options = JobOptions::new()
///     .id("merge")
///     .template("cat $INPUT0 $INPUT1 > $OUTPUT");
/// ```
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    pub(crate) id: Option<String>,
    pub(crate) template: Option<String>,
    pub(crate) data: serde_json::Map<String, Value>,
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit identifier; a fresh `job_<k>` is generated when omitted.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Template to render for this job's body.
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Attach one data value, available to the job's template.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// A single path or an ordered sequence of paths, accepted anywhere a
/// job declares inputs or outputs.
#[derive(Debug, Clone)]
pub enum PathList {
    Single(String),
    Many(Vec<String>),
}

impl PathList {
    /// Empty path list.
    pub fn none() -> Self {
        PathList::Many(Vec::new())
    }

    pub(crate) fn into_vec(self) -> Vec<String> {
        match self {
            PathList::Single(path) => vec![path],
            PathList::Many(paths) => paths,
        }
    }
}

impl From<&str> for PathList {
    fn from(path: &str) -> Self {
        PathList::Single(path.to_string())
    }
}

impl From<String> for PathList {
    fn from(path: String) -> Self {
        PathList::Single(path)
    }
}

impl From<Vec<String>> for PathList {
    fn from(paths: Vec<String>) -> Self {
        PathList::Many(paths)
    }
}

impl From<Vec<&str>> for PathList {
    fn from(paths: Vec<&str>) -> Self {
        PathList::Many(paths.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PathList {
    fn from(paths: [&str; N]) -> Self {
        PathList::Many(paths.into_iter().map(String::from).collect())
    }
}

impl From<&[String]> for PathList {
    fn from(paths: &[String]) -> Self {
        PathList::Many(paths.to_vec())
    }
}

/// Whether a job would run if the workflow were executed now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Up to date; the job won't run.
    Current,
    /// Flagged for (re-)execution.
    Outdated,
}

/// Freshness of a path on the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    /// Present and newer than everything it depends on.
    Current,
    /// Absent from the filesystem.
    Missing,
    /// Will be (re-)generated by an outdated job.
    Outdated,
}
