//! Template engines rendering job bodies.
//!
//! A template plus a per-job variable environment produces the command
//! body a job contributes to an export. Two engines are built in: the
//! shell-style `$NAME` engine and a Mustache subset with list sections.
//! Rendering is pure: the same template and variables always produce
//! byte-identical output.

mod mustache;
mod simple;

use std::str::FromStr;
use std::sync::RwLock;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::workflow::{Job, Workflow};

/// The built-in substitution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    /// `$NAME` / `${NAME}` shell-style substitution.
    #[default]
    Simple,
    /// `{{NAME}}` scalars, `{{#LIST}}…{{.}}…{{/LIST}}` iteration and
    /// `{{^LIST}}…{{/LIST}}` inverted sections.
    Mustache,
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(EngineKind::Simple),
            "mustache" => Ok(EngineKind::Mustache),
            other => Err(Error::Template(format!("unknown engine '{other}'"))),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Simple => write!(f, "simple"),
            EngineKind::Mustache => write!(f, "mustache"),
        }
    }
}

static DEFAULT_ENGINE: RwLock<EngineKind> = RwLock::new(EngineKind::Simple);

/// Set the process-wide default engine used by `RenderContext::default()`.
pub fn set_default_engine(engine: EngineKind) {
    *DEFAULT_ENGINE.write().expect("default engine lock") = engine;
}

/// The process-wide default engine.
pub fn default_engine() -> EngineKind {
    *DEFAULT_ENGINE.read().expect("default engine lock")
}

/// Rendering configuration carried through exports: the engine to use and
/// variables shared by every job template.
///
/// Job data values override the globals; the derived `INPUT*`/`OUTPUT*`
/// variables override both.
#[derive(Debug, Clone)]
pub struct RenderContext {
    engine: EngineKind,
    globals: Map<String, Value>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext {
    /// Context using the process-wide default engine.
    pub fn new() -> Self {
        Self {
            engine: default_engine(),
            globals: Map::new(),
        }
    }

    /// Context with an explicit engine.
    pub fn with_engine(engine: EngineKind) -> Self {
        Self {
            engine,
            globals: Map::new(),
        }
    }

    /// Add a variable visible to every job template.
    pub fn global(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(key.into(), value.into());
        self
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    /// Render a template against an explicit variable set.
    pub fn render(&self, template: &str, variables: &Map<String, Value>) -> Result<String> {
        match self.engine {
            EngineKind::Simple => simple::render(template, variables),
            EngineKind::Mustache => mustache::render(template, variables),
        }
    }

    /// Render the body of one job. Abstract jobs render to the empty
    /// string.
    pub fn render_job(&self, workflow: &Workflow, id: &str) -> Result<String> {
        let job = workflow.get_job(id)?;
        let Some(template) = job.template() else {
            return Ok(String::new());
        };
        let variables = job_environment(job, &self.globals);
        self.render(template, &variables)
    }
}

/// Build the variable environment for one job: context globals, then the
/// job's data payload, then the derived path variables.
pub fn job_environment(job: &Job, globals: &Map<String, Value>) -> Map<String, Value> {
    let mut env = globals.clone();
    for (key, value) in job.data() {
        env.insert(key.clone(), value.clone());
    }

    for (prefix, paths) in [("INPUT", job.inputs()), ("OUTPUT", job.outputs())] {
        env.insert(
            format!("{prefix}S"),
            Value::Array(paths.iter().map(|p| Value::String(p.clone())).collect()),
        );
        env.insert(format!("{prefix}N"), Value::from(paths.len()));
        env.insert(
            prefix.to_string(),
            Value::String(paths.first().cloned().unwrap_or_default()),
        );
        for (n, path) in paths.iter().enumerate() {
            env.insert(format!("{prefix}{n}"), Value::String(path.clone()));
        }
    }
    env
}

/// Textual form of a variable value: strings verbatim, numbers and
/// booleans via display, null as the empty string, arrays space-joined.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(_) => value.to_string(),
    }
}
