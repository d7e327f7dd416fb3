use crate::cluster::{self, ClusterDescriptor};
use crate::config::runtime::{Config, Platform};
use crate::docker::{self, BuildConfig, ImageReference};
use crate::poll::{self, Poller, TimeoutError};
use crate::process::Runner;
use crate::template;
use log::info;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("gcloud app deploy exited with code {0}")]
    ManagedDeploy(i32),

    #[error("workload submission failed with exit code {0}")]
    Submit(i32),

    #[error("read cluster coordinates: {0}")]
    Prompt(std::io::Error),

    #[error("docker: {0}")]
    Docker(#[from] docker::Error),

    #[error("cluster: {0}")]
    Cluster(#[from] cluster::Error),

    #[error("template: {0}")]
    Template(#[from] template::Error),

    #[error(transparent)]
    Process(#[from] crate::process::Error),

    #[error("deployment never became ready: {0}")]
    Ready(#[from] TimeoutError),
}

/// Run one deployment to the configured platform. `cluster_input` is
/// only consulted on the cluster path, right before provisioning.
pub fn deploy<R, P>(cfg: &Config, runner: &R, cluster_input: P) -> Result<(), Error>
where
    R: Runner,
    P: FnOnce() -> std::io::Result<ClusterDescriptor>,
{
    match cfg.platform {
        Platform::Gae => deploy_gae(cfg, runner),
        Platform::Gke => deploy_gke(cfg, runner, cluster_input),
    }
}

/// App Engine needs no image plumbing; one deploy command does it all.
fn deploy_gae<R: Runner>(cfg: &Config, runner: &R) -> Result<(), Error> {
    info!("Deploying {} to App Engine", cfg.app);
    let app_yaml = format!("{}/app.yaml", cfg.server_path);
    let out = runner.run(
        "gcloud",
        &[
            "app",
            "deploy",
            &app_yaml,
            "--project",
            &cfg.project_id,
            "--quiet",
        ],
    )?;
    if !out.success() {
        return Err(Error::ManagedDeploy(out.status));
    }
    info!("Deployment complete");
    Ok(())
}

fn deploy_gke<R, P>(cfg: &Config, runner: &R, cluster_input: P) -> Result<(), Error>
where
    R: Runner,
    P: FnOnce() -> std::io::Result<ClusterDescriptor>,
{
    let build = build_config(cfg);
    docker::with_built_image(runner, &build, |image, credentials_file| {
        docker::with_pushed_image(runner, image, |image| {
            render_manifest(cfg, image, credentials_file)?;
            let cluster = cluster_input().map_err(Error::Prompt)?;
            cluster::ensure_cluster(runner, &cluster, &cfg.project_id)?;
            submit_workload(runner, cfg)?;
            wait_for_ready(runner, cfg, image)?;
            info!("Deployment complete");
            Ok(())
        })
    })
}

pub fn build_config(cfg: &Config) -> BuildConfig {
    BuildConfig {
        context_dir: cfg.server_path.clone(),
        name: cfg.app.clone(),
        project: cfg.project_id.clone(),
        registry: cfg.registry.clone(),
        credentials_path: cfg.credentials_path.clone(),
    }
}

/// Render the workload manifest from deployment.yaml.base. A manifest
/// already present in the server directory wins over the template.
/// `credentials_file` is the key file staged into the image, which the
/// proxy sidecar authenticates with.
pub fn render_manifest(
    cfg: &Config,
    image: &ImageReference,
    credentials_file: &str,
) -> Result<(), template::Error> {
    template::render(
        &format!("{}/deployment.yaml.base", cfg.server_path),
        &format!("{}/deployment.yaml", cfg.server_path),
        &manifest_substitutions(cfg, image, credentials_file),
    )
}

fn manifest_substitutions(
    cfg: &Config,
    image: &ImageReference,
    credentials_file: &str,
) -> HashMap<&'static str, String> {
    HashMap::from([
        ("image_location", image.location()),
        ("image_name", image.name.clone()),
        ("sql_proxy_command", sql_proxy_command(cfg, credentials_file)),
    ])
}

fn sql_proxy_command(cfg: &Config, credentials_file: &str) -> String {
    format!(
        "/cloud_sql_proxy -dir=/cloudsql -instances={}=tcp:5432 -credential_file={}",
        cfg.sql_instances, credentials_file
    )
}

fn submit_workload<R: Runner>(runner: &R, cfg: &Config) -> Result<(), Error> {
    info!("Submitting workload to the cluster");
    let manifest = format!("{}/deployment.yaml", cfg.server_path);
    let out = runner.run("kubectl", &["apply", "-f", &manifest])?;
    if !out.success() {
        return Err(Error::Submit(out.status));
    }
    Ok(())
}

/// Poll the pod listing until the first pod named after the image
/// reports Running. A failed listing counts as not-ready and is retried
/// until the deadline.
fn wait_for_ready<R: Runner>(runner: &R, cfg: &Config, image: &ImageReference) -> Result<(), Error> {
    info!("Waiting for {} to report Running", image.name);
    let poller = Poller::new(Duration::from_secs(cfg.ready_timeout));
    poller.wait_until(|| {
        let out = runner.run("kubectl", &["get", "pods"])?;
        if !out.success() {
            return Ok(false);
        }
        let pods = poll::parse_pods(&out.stdout);
        Ok(poll::first_matching(&pods, &image.name).is_some_and(|pod| pod.status == "Running"))
    })
}
