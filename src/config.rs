pub mod file {
    use serde::Deserialize;
    use serde_inline_default::serde_inline_default;
    use thiserror::Error;

    const DEFAULT_CONFIG: &str = include_str!("../default.toml");

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("read {path}: {err}")]
        ReadFile { err: std::io::Error, path: String },

        #[error("parse: {0}")]
        Parse(#[from] toml::de::Error),
    }

    #[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Platform {
        /// App Engine: a single deploy command submits the server directory.
        Gae,
        /// Kubernetes Engine: image build, push, cluster provisioning,
        /// workload submission and readiness polling.
        Gke,
    }

    /// A gdeploy.toml file.
    #[serde_inline_default]
    #[derive(Deserialize, Debug)]
    pub struct File {
        pub description: Option<String>,

        #[serde_inline_default(Platform::Gke)]
        pub platform: Platform,

        #[serde_inline_default(String::new())]
        pub project_id: String,

        #[serde_inline_default(String::new())]
        pub app: String,

        #[serde_inline_default("gcr.io".to_string())]
        pub registry: String,

        #[serde_inline_default(String::new())]
        pub sql_instances: String,

        #[serde_inline_default(".".to_string())]
        pub server_path: String,

        #[serde_inline_default(300)]
        pub ready_timeout: u64,

        /// Path to a service-account key file. Falls back to the
        /// GOOGLE_APPLICATION_CREDENTIALS environment variable.
        pub credentials_path: Option<String>,
    }

    impl Default for File {
        fn default() -> Self {
            // The default config is compiled into the program, so
            // make sure to test default() to catch panics compile-time.
            toml::from_str(DEFAULT_CONFIG).unwrap()
        }
    }

    impl File {
        pub fn parse_file(path: &str) -> Result<Self, Error> {
            let raw = std::fs::read_to_string(path).map_err(|err| Error::ReadFile {
                err,
                path: path.to_string(),
            })?;
            Ok(toml::from_str(&raw)?)
        }
    }
}

pub mod runtime {
    use super::file;
    pub use super::file::Platform;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("project_id is not set")]
        MissingProjectId,

        #[error("app is not set")]
        MissingApp,
    }

    /// Validated configuration for a single deployment run.
    /// Immutable once constructed; the orchestrator takes it by reference.
    #[derive(Debug, Clone)]
    pub struct Config {
        pub platform: Platform,
        pub project_id: String,
        pub app: String,
        pub registry: String,
        pub sql_instances: String,
        pub server_path: String,
        pub ready_timeout: u64,
        pub credentials_path: Option<String>,
    }

    impl Config {
        pub fn new(file: &file::File) -> Result<Self, Error> {
            if file.project_id.is_empty() {
                return Err(Error::MissingProjectId);
            }
            if file.app.is_empty() {
                return Err(Error::MissingApp);
            }

            let credentials_path = file
                .credentials_path
                .clone()
                .or_else(|| std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok());

            Ok(Config {
                platform: file.platform,
                project_id: file.project_id.clone(),
                app: file.app.clone(),
                registry: file.registry.clone(),
                sql_instances: file.sql_instances.clone(),
                server_path: file.server_path.clone(),
                ready_timeout: file.ready_timeout,
                credentials_path,
            })
        }
    }
}
