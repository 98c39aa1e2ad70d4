///
/// This module implements the CLI interface for simpack: command parsing, argument
/// handling and user-visible output.
///
/// All packaging logic (layout, manifests, tools, archives) lives in the [`simpack-core`] crate.
/// This module is strictly CLI glue.
///
/// ## How To Use
/// - For command-line users: run the `simpack` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`simpack-core`]: ../../simpack-core/
use crate::load_config::{load_config, LoadedConfig};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use simpack_core::contract::DependencyResolver;
use simpack_core::package::{clean, package, PackageReport};
use std::path::PathBuf;

/// CLI for simpack: package a project and its pinned dependencies into a zip.
#[derive(Parser)]
#[clap(
    name = "simpack",
    version,
    about = "Package src/, inputs/ and sim_test/ plus pinned Python dependencies into a distributable zip"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Where to find the project and its configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Path to the YAML config file (defaults to simpack.yaml in the project root, if present)
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Project root containing src/, inputs/ and sim_test/ (defaults to the current directory)
    #[clap(long)]
    pub project_root: Option<PathBuf>,
}

impl ProjectArgs {
    fn load(&self) -> Result<LoadedConfig> {
        load_config(self.config.as_deref(), self.project_root.as_deref())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the build directory, install dependencies and write the archive
    Build {
        #[clap(flatten)]
        project: ProjectArgs,

        /// Print the package report as JSON instead of a summary
        #[clap(long)]
        json: bool,
    },
    /// Resolve dependencies and print the pinned manifest without building
    Freeze {
        #[clap(flatten)]
        project: ProjectArgs,
    },
    /// Remove the build directory and the archive
    Clean {
        #[clap(flatten)]
        project: ProjectArgs,
    },
}

fn print_summary(report: &PackageReport) {
    println!("Package complete.");
    println!("  archive:  {}", report.archive_path.display());
    println!("  sha256:   {}", report.archive_sha256);
    println!("  size:     {} bytes, {} entries", report.archive_bytes, report.archive_entries);
    for tree in &report.trees {
        println!("  {:<9} {} files", format!("{}:", tree.name), tree.files);
    }
    println!("  packages: {}", report.requirements.len());
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Build { project, json } => {
            let config = project.load()?;
            tracing::info!(command = "build", "Starting packaging");
            if !json {
                println!("Package starting...");
            }
            let report = package(&config.package, &config.resolver, &config.installer)
                .await
                .map_err(|e| {
                    tracing::error!(command = "build", error = %e, "Packaging failed");
                    e
                })
                .context("Packaging failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_summary(&report);
            }
            Ok(())
        }
        Commands::Freeze { project } => {
            let config = project.load()?;
            tracing::info!(command = "freeze", "Resolving dependencies");
            let manifest = config
                .resolver
                .resolve()
                .await
                .context("Dependency resolution failed")?;
            print!("{}", manifest.render());
            Ok(())
        }
        Commands::Clean { project } => {
            let config = project.load()?;
            tracing::info!(command = "clean", "Removing build output");
            let removed = clean(&config.package).context("Clean failed")?;
            if removed.is_empty() {
                println!("Nothing to clean.");
            }
            for path in removed {
                println!("Removed {}", path.display());
            }
            Ok(())
        }
    }
}
