use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use spate::{
    DrakeOptions, DrawOptions, EchoOptions, EngineKind, MakefileOptions, MakeflowOptions,
    RenderContext, ShellOptions, SlurmOptions, TorqueOptions, Workflow,
};

#[derive(Parser)]
#[command(name = "spate")]
#[command(about = "Lightweight workflow composition and generation engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the jobs of a workflow with their status
    Echo {
        /// Path to a saved workflow (.yaml or .yaml.gz)
        file: String,
        /// List every job, not only outdated ones
        #[arg(long)]
        all: bool,
        /// Skip status markers
        #[arg(long)]
        plain: bool,
        /// Colorize the listing
        #[arg(long)]
        color: bool,
    },
    /// Show workflow name and cardinalities
    Show {
        /// Path to a saved workflow
        file: String,
    },
    /// Export a workflow for an execution environment
    Export {
        /// Path to a saved workflow
        file: String,
        /// Target format
        #[arg(short, long, value_parser = ["shell", "makefile", "makeflow", "drake", "slurm", "torque"])]
        target: String,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
        /// Export every job, not only outdated ones
        #[arg(long)]
        all: bool,
        /// Template engine
        #[arg(long, default_value = "simple")]
        engine: String,
        /// Shebang interpreter for the shell target
        #[arg(long, default_value = "/bin/bash")]
        shell: String,
    },
    /// Draw the workflow diagram through an external layout program
    Draw {
        /// Path to a saved workflow
        file: String,
        /// Output picture, with extension (e.g. diagram.png)
        #[arg(short, long)]
        output: String,
        /// Draw every job, not only outdated ones
        #[arg(long)]
        all: bool,
        /// Layout program to run
        #[arg(long, default_value = "dot")]
        program: String,
    },
    /// Merge a workflow into another and save the result
    Merge {
        /// Workflow receiving the jobs
        base: String,
        /// Workflow whose jobs are merged in
        other: String,
        /// Output file
        #[arg(short, long)]
        output: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SPATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(Cli::parse()) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> spate::Result<()> {
    match cli.command {
        Commands::Echo {
            file,
            all,
            plain,
            color,
        } => {
            let workflow = spate::load(&file)?;
            let listing = spate::echo(
                &workflow,
                &EchoOptions {
                    outdated_only: !all,
                    decorated: !plain,
                    colorized: color,
                },
            )?;
            print!("{listing}");
        }
        Commands::Show { file } => {
            let workflow = spate::load(&file)?;
            println!("name: {}", workflow.name());
            println!("jobs: {}", workflow.number_of_jobs());
            println!("paths: {}", workflow.number_of_paths());
        }
        Commands::Export {
            file,
            target,
            output,
            all,
            engine,
            shell,
        } => {
            let workflow = spate::load(&file)?;
            let context = RenderContext::with_engine(engine.parse::<EngineKind>()?);
            let outdated_only = !all;
            let text = match target.as_str() {
                "shell" => spate::to_shell_script(
                    &workflow,
                    &context,
                    &ShellOptions {
                        outdated_only,
                        shell,
                        ..Default::default()
                    },
                )?,
                "makefile" => spate::to_makefile(
                    &workflow,
                    &context,
                    &MakefileOptions {
                        shell: Some(shell),
                        ..Default::default()
                    },
                )?,
                "makeflow" => {
                    spate::to_makeflow(&workflow, &context, &MakeflowOptions::default())?
                }
                "drake" => spate::to_drake(&workflow, &context, &DrakeOptions::default())?,
                "slurm" => spate::to_slurm(
                    &workflow,
                    &context,
                    &SlurmOptions {
                        outdated_only,
                        ..Default::default()
                    },
                )?,
                "torque" => spate::to_torque_array(
                    &workflow,
                    &context,
                    &TorqueOptions {
                        outdated_only,
                        ..Default::default()
                    },
                )?,
                other => unreachable!("clap validated the target: {other}"),
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, text).map_err(|e| spate::Error::Filesystem {
                        path,
                        source: e,
                    })?
                }
                None => print!("{text}"),
            }
        }
        Commands::Draw {
            file,
            output,
            all,
            program,
        } => {
            let workflow = spate::load(&file)?;
            spate::draw(
                &workflow,
                &output,
                &DrawOptions {
                    outdated_only: !all,
                    program,
                    ..Default::default()
                },
            )?;
        }
        Commands::Merge {
            base,
            other,
            output,
        } => {
            let mut workflow: Workflow = spate::load(&base)?;
            let other = spate::load(&other)?;
            workflow.merge(&other)?;
            spate::save(&workflow, &output)?;
            println!(
                "merged: {} jobs, {} paths -> {output}",
                workflow.number_of_jobs(),
                workflow.number_of_paths()
            );
        }
    }
    Ok(())
}
