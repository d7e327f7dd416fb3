use crate::process::Runner;
use crate::template;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("service account credentials path is not configured")]
    CredentialsUnset,

    #[error("service account credentials not readable at {path}: {err}")]
    CredentialsMissing { err: std::io::Error, path: String },

    #[error("docker build failed with exit code {status}: {stderr}")]
    Build { status: i32, stderr: String },

    #[error("docker push failed with exit code {status}: {stderr}")]
    Push { status: i32, stderr: String },

    #[error(transparent)]
    Template(#[from] template::Error),

    #[error(transparent)]
    Process(#[from] crate::process::Error),
}

/// Registry-qualified name of the image built for this deployment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub project: String,
    pub name: String,
}

impl ImageReference {
    pub fn location(&self) -> String {
        format!("{}/{}/{}", self.registry, self.project, self.name)
    }
}

impl Display for ImageReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.location())
    }
}

/// Parameters for building the application image out of the server directory.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub context_dir: String,
    pub name: String,
    pub project: String,
    pub registry: String,
    pub credentials_path: Option<String>,
}

impl BuildConfig {
    pub fn image(&self) -> ImageReference {
        ImageReference {
            registry: self.registry.clone(),
            project: self.project.clone(),
            name: self.name.clone(),
        }
    }
}

/// Copy the service-account key into the build context and make sure a
/// Dockerfile exists there, rendering one from Dockerfile.base if not.
/// Returns the file name of the copied key.
pub fn prepare_context(build: &BuildConfig) -> Result<String, Error> {
    let credentials_path = build
        .credentials_path
        .as_deref()
        .ok_or(Error::CredentialsUnset)?;

    let source = Path::new(credentials_path);
    let file_name = source
        .file_name()
        .and_then(|f| f.to_str())
        .ok_or_else(|| Error::CredentialsMissing {
            err: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
            path: credentials_path.to_string(),
        })?
        .to_string();

    std::fs::copy(source, format!("{}/{}", build.context_dir, file_name)).map_err(|err| {
        Error::CredentialsMissing {
            err,
            path: credentials_path.to_string(),
        }
    })?;
    debug!("copied credentials {file_name} into {}", build.context_dir);

    template::render(
        &format!("{}/Dockerfile.base", build.context_dir),
        &format!("{}/Dockerfile", build.context_dir),
        &HashMap::from([("credentials_file", file_name.clone())]),
    )?;

    Ok(file_name)
}

/// Build the image and hand its reference to `f`, together with the
/// file name of the credentials key staged into the context. Whatever
/// happens once the build command has been issued, the local image is
/// removed before returning; a failed removal is logged and never
/// replaces the primary result.
pub fn with_built_image<T, E, R, F>(runner: &R, build: &BuildConfig, f: F) -> Result<T, E>
where
    R: Runner,
    E: From<Error>,
    F: FnOnce(&ImageReference, &str) -> Result<T, E>,
{
    let image = build.image();

    let credentials_file = prepare_context(build).map_err(E::from)?;

    info!("Building image {image}");
    let location = image.location();
    let result = match runner.run("docker", &["build", "-t", &location, &build.context_dir]) {
        Ok(out) if out.success() => f(&image, &credentials_file),
        Ok(out) => Err(E::from(Error::Build {
            status: out.status,
            stderr: out.stderr.trim().to_string(),
        })),
        Err(err) => Err(E::from(Error::from(err))),
    };

    remove_local_image(runner, &image);
    result
}

/// Push the image and hand its reference to `f`. The registry entry is
/// deleted before returning, on every exit path; a failed deletion is
/// logged and never replaces the primary result.
pub fn with_pushed_image<T, E, R, F>(runner: &R, image: &ImageReference, f: F) -> Result<T, E>
where
    R: Runner,
    E: From<Error>,
    F: FnOnce(&ImageReference) -> Result<T, E>,
{
    info!("Pushing image {image}");
    let location = image.location();
    let result = match runner.run("gcloud", &["docker", "--", "push", &location]) {
        Ok(out) if out.success() => f(image),
        Ok(out) => Err(E::from(Error::Push {
            status: out.status,
            stderr: out.stderr.trim().to_string(),
        })),
        Err(err) => Err(E::from(Error::from(err))),
    };

    remove_remote_image(runner, image);
    result
}

fn remove_local_image<R: Runner>(runner: &R, image: &ImageReference) {
    match runner.run("docker", &["rmi", &image.location()]) {
        Ok(out) if out.success() => debug!("removed local image {image}"),
        Ok(out) => warn!(
            "failed to remove local image {image}: exit code {}",
            out.status
        ),
        Err(err) => warn!("failed to remove local image {image}: {err}"),
    }
}

fn remove_remote_image<R: Runner>(runner: &R, image: &ImageReference) {
    let location = image.location();
    match runner.run(
        "gcloud",
        &["container", "images", "delete", &location, "--quiet"],
    ) {
        Ok(out) if out.success() => debug!("deleted registry entry {image}"),
        Ok(out) => warn!(
            "failed to delete registry entry {image}: exit code {}",
            out.status
        ),
        Err(err) => warn!("failed to delete registry entry {image}: {err}"),
    }
}
