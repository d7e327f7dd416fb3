/// gdeploy
use clap::{Parser, Subcommand};
use log::{error, info};
use thiserror::Error;

mod cluster;
mod config;
mod deploy;
mod docker;
mod poll;
mod process;
mod template;

use process::SystemRunner;

/// Deploy your packaged application to App Engine or Kubernetes Engine.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Root of the project tree.
    #[arg(default_value = ".")]
    source_directory: String,

    /// Path to the gdeploy configuration file.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Deploy the application to the configured platform.
    Deploy,
    /// Generate the Dockerfile and deployment manifest from their base
    /// templates without deploying anything.
    Render,
}

#[derive(Error, Debug)]
enum Error {
    #[error("configuration file: {0}")]
    ConfigParse(#[from] config::file::Error),

    #[error("configuration: {0}")]
    Config(#[from] config::runtime::Error),

    #[error("deploy: {0}")]
    Deploy(#[from] deploy::Error),

    #[error("docker: {0}")]
    Docker(#[from] docker::Error),

    #[error("template: {0}")]
    Template(#[from] template::Error),
}

/// Read the configuration file from disk, falling back to the built-in
/// [default config](../default.toml).
///
/// If a configuration file name is not set explicitly, this function
/// will detect whether a config file with the default file name exists
/// in the source directory. If it does, it is used implicitly.
fn read_config(args: &Cli) -> Result<config::file::File, Error> {
    const DEFAULT_CONFIG_FILE: &str = "gdeploy.toml";

    // Typically found in project root, e.g. ./gdeploy.toml
    let config_path = format!("{}/{}", args.source_directory, DEFAULT_CONFIG_FILE);

    let config_file = match &args.config {
        None => {
            if std::fs::metadata(&config_path)
                .map(|metadata| metadata.is_file())
                .unwrap_or(false)
            {
                Some(config_path)
            } else {
                None
            }
        }
        Some(c) => Some(c.clone()),
    };

    Ok(if let Some(config_file) = config_file {
        config::file::File::parse_file(&config_file)?
    } else {
        config::file::File::default()
    })
}

fn main() {
    match run() {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            error!("fatal: {}", err);
            std::process::exit(1)
        }
    }
}

fn run() -> Result<(), Error> {
    env_logger::init();

    let args = Cli::parse();
    let cfg_file = read_config(&args)?;
    let cfg = config::runtime::Config::new(&cfg_file)?;

    info!("Project: {}", cfg.project_id);
    info!("Application: {}", cfg.app);

    match args.command {
        Commands::Deploy => {
            let runner = SystemRunner;
            deploy::deploy(&cfg, &runner, || {
                let stdin = std::io::stdin();
                cluster::prompt_descriptor(&mut stdin.lock(), &mut std::io::stdout())
            })?;
            Ok(())
        }
        Commands::Render => {
            let build = deploy::build_config(&cfg);
            let credentials_file = docker::prepare_context(&build)?;
            let image = build.image();
            deploy::render_manifest(&cfg, &image, &credentials_file)?;
            info!("Image location: {}", image);
            Ok(())
        }
    }
}
