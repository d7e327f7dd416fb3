use crate::process::Runner;
use log::{debug, info};
use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cluster listing failed with exit code {0}")]
    List(i32),

    #[error("cluster creation failed with exit code {0}")]
    Create(i32),

    #[error("fetching cluster credentials failed with exit code {0}")]
    Credentials(i32),

    #[error(transparent)]
    Process(#[from] crate::process::Error),
}

/// Coordinates of the target cluster, as entered by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescriptor {
    pub name: String,
    pub zone: String,
}

/// Parse the tabular `gcloud container clusters list` output into
/// (name, zone) pairs. The first line is the column header.
pub fn parse_clusters(stdout: &str) -> Vec<ClusterDescriptor> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            Some(ClusterDescriptor {
                name: columns.next()?.to_string(),
                zone: columns.next()?.to_string(),
            })
        })
        .collect()
}

/// Create the cluster unless one already exists at the same name and
/// zone, then fetch its credentials. The credentials fetch always runs,
/// also for a pre-existing cluster, so kubectl talks to the right one.
pub fn ensure_cluster<R: Runner>(
    runner: &R,
    cluster: &ClusterDescriptor,
    project_id: &str,
) -> Result<(), Error> {
    let listing = runner.run(
        "gcloud",
        &["container", "clusters", "list", "--project", project_id],
    )?;
    if !listing.success() {
        return Err(Error::List(listing.status));
    }

    let exists = parse_clusters(&listing.stdout).contains(cluster);
    if exists {
        info!("Cluster {} in {} already exists", cluster.name, cluster.zone);
    } else {
        info!("Creating cluster {} in {}", cluster.name, cluster.zone);
        let created = runner.run(
            "gcloud",
            &[
                "container",
                "clusters",
                "create",
                &cluster.name,
                "--zone",
                &cluster.zone,
                "--project",
                project_id,
            ],
        )?;
        if !created.success() {
            return Err(Error::Create(created.status));
        }
    }

    debug!("fetching credentials for cluster {}", cluster.name);
    let fetched = runner.run(
        "gcloud",
        &[
            "container",
            "clusters",
            "get-credentials",
            &cluster.name,
            "--zone",
            &cluster.zone,
            "--project",
            project_id,
        ],
    )?;
    if !fetched.success() {
        return Err(Error::Credentials(fetched.status));
    }

    Ok(())
}

/// Ask the operator for the cluster name and zone, one line each.
/// Input is taken as-is; empty answers are not rejected.
pub fn prompt_descriptor<I: BufRead, O: Write>(
    input: &mut I,
    output: &mut O,
) -> std::io::Result<ClusterDescriptor> {
    fn read_line<I: BufRead, O: Write>(
        prompt: &str,
        input: &mut I,
        output: &mut O,
    ) -> std::io::Result<String> {
        write!(output, "{prompt}")?;
        output.flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    let name = read_line("Cluster name: ", input, output)?;
    let zone = read_line("Cluster zone: ", input, output)?;
    Ok(ClusterDescriptor { name, zone })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::{failed, ok, FakeRunner};

    const LISTING: &str = "\
NAME  LOCATION       MASTER_VERSION  MASTER_IP    NUM_NODES  STATUS
demo  us-central1-a  1.30.3-gke.1    1.2.3.4      3          RUNNING
prod  europe-west1-b 1.30.3-gke.1    5.6.7.8      3          RUNNING
";

    fn demo() -> ClusterDescriptor {
        ClusterDescriptor {
            name: "demo".to_string(),
            zone: "us-central1-a".to_string(),
        }
    }

    #[test]
    fn parses_name_and_zone_columns() {
        let clusters = parse_clusters(LISTING);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0], demo());
        assert_eq!(clusters[1].name, "prod");
        assert_eq!(clusters[1].zone, "europe-west1-b");
    }

    #[test]
    fn existing_cluster_is_not_created_again() {
        let runner = FakeRunner::new();
        runner.stub("gcloud container clusters list", ok(LISTING));

        ensure_cluster(&runner, &demo(), "demo-project").unwrap();

        assert_eq!(runner.count("gcloud container clusters create"), 0);
        assert_eq!(runner.count("gcloud container clusters get-credentials"), 1);
    }

    #[test]
    fn absent_cluster_is_created_before_credentials_fetch() {
        let runner = FakeRunner::new();
        runner.stub("gcloud container clusters list", ok("NAME LOCATION\n"));

        ensure_cluster(&runner, &demo(), "demo-project").unwrap();

        let calls = runner.calls.borrow();
        let create = calls
            .iter()
            .position(|c| c.starts_with("gcloud container clusters create"))
            .unwrap();
        let credentials = calls
            .iter()
            .position(|c| c.starts_with("gcloud container clusters get-credentials"))
            .unwrap();
        assert!(create < credentials);
        assert_eq!(runner.count("gcloud container clusters create"), 1);
    }

    #[test]
    fn zone_must_match_exactly() {
        let runner = FakeRunner::new();
        runner.stub("gcloud container clusters list", ok(LISTING));
        let elsewhere = ClusterDescriptor {
            name: "demo".to_string(),
            zone: "europe-west1-b".to_string(),
        };

        ensure_cluster(&runner, &elsewhere, "demo-project").unwrap();

        assert_eq!(runner.count("gcloud container clusters create"), 1);
    }

    #[test]
    fn failed_creation_prevents_credentials_fetch() {
        let runner = FakeRunner::new();
        runner.stub("gcloud container clusters list", ok("NAME LOCATION\n"));
        runner.stub("gcloud container clusters create", failed(1));

        let err = ensure_cluster(&runner, &demo(), "demo-project").unwrap_err();

        assert!(matches!(err, Error::Create(1)));
        assert_eq!(runner.count("gcloud container clusters get-credentials"), 0);
    }

    #[test]
    fn prompt_reads_name_and_zone_lines() {
        let mut input = std::io::Cursor::new("demo\nus-central1-a\n");
        let mut output = Vec::new();

        let cluster = prompt_descriptor(&mut input, &mut output).unwrap();

        assert_eq!(cluster, demo());
        let prompts = String::from_utf8(output).unwrap();
        assert_eq!(prompts, "Cluster name: Cluster zone: ");
    }
}
