//! spate - lightweight workflow composition and generation engine
//!
//! spate models file-based data-processing workflows as a graph of jobs
//! and paths, works out which jobs are outdated from filesystem
//! modification times, and emits an equivalent script for an external
//! execution environment (shell, Make, Makeflow, Drake, SLURM, TORQUE).
//! It never runs jobs itself.
//!
//! ## Example
//!
//! ```
//! use spate::{JobOptions, RenderContext, ShellOptions, Workflow};
//!
//! let mut workflow = Workflow::new("example")?;
//! workflow.add_job_with(
//!     "A",
//!     ["B", "C"],
//!     JobOptions::new()
//!         .id("split")
//!         .template("grep p $INPUT > $OUTPUT0\ngrep -v p $INPUT > $OUTPUT1"),
//! )?;
//! workflow.add_job_with(
//!     ["A", "C"],
//!     "D",
//!     JobOptions::new().id("merge").template("cat $INPUT0 $INPUT1 > $OUTPUT"),
//! )?;
//!
//! let script = spate::to_shell_script(
//!     &workflow,
//!     &RenderContext::new(),
//!     &ShellOptions { outdated_only: false, ..Default::default() },
//! )?;
//! assert!(script.contains("# merge"));
//! # Ok::<(), spate::Error>(())
//! ```

pub mod error;
pub mod export;
pub mod io;
pub mod templates;
pub mod workflow;

pub use error::{Error, Result};
pub use export::{
    draw, echo, to_drake, to_graphviz, to_makefile, to_makeflow, to_shell_script, to_slurm,
    to_torque_array, DrakeOptions, DrawOptions, EchoOptions, GraphvizOptions, MakefileOptions,
    MakeflowOptions, ShellOptions, SlurmOptions, TorqueOptions,
};
pub use io::{from_yaml, load, save, to_yaml};
pub use templates::{default_engine, set_default_engine, EngineKind, RenderContext};
pub use workflow::{
    analyze, Job, JobOptions, JobStatus, PathList, PathStatus, StatusReport, Workflow,
};
