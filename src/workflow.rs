//! The analysis pipeline on top of a [`Client`]: upload and submit the
//! script, wait for the run, bring back the summary.

use crate::{
    api::{client::Client, error::RemoteError, id::ClusterId, run::RunStatus},
    experiment::ExperimentConfig,
    RunId,
};
use std::{fs, io, path::Path, path::PathBuf, thread, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_CLUSTER: &str = "1003-151000-grebe23";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("there is no result at dbfs:{0} yet; has the analysis finished?")]
    NotReady(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("could not write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Uploads `script` to the experiment's working path and runs it on `cluster`.
pub fn submit_script(client: &mut dyn Client, experiment: &ExperimentConfig, script: &[u8], cluster: &ClusterId) -> Result<RunId, RemoteError> {
    let remote_path = experiment.remote_script_path();
    client.upload(script, &remote_path)?;
    info!(path = %remote_path, "uploaded analysis script");
    let run = client.submit_job(
        &experiment.run_name(),
        cluster,
        &remote_path,
        &experiment.script_parameters(),
    )?;
    info!(%run, cluster = cluster.as_ref(), "submitted run");
    Ok(run)
}

/// Polls `run` every `interval` until it reaches a terminal state.
///
/// There is no upper bound on the wait; `on_poll` sees every status fetched.
pub fn wait_for_completion(client: &mut dyn Client, run: RunId, interval: Duration, mut on_poll: impl FnMut(&RunStatus)) -> Result<RunStatus, RemoteError> {
    loop {
        let status = client.get_run_status(run)?;
        debug!(%run, state = ?status.lifecycle_state(), "polled run");
        on_poll(&status);
        if status.is_terminal() {
            return Ok(status);
        }
        thread::sleep(interval);
    }
}

/// Downloads the experiment's summary to `destination`, replacing any
/// existing file. Returns the number of bytes written.
pub fn fetch_summary(client: &mut dyn Client, experiment: &ExperimentConfig, destination: &Path) -> Result<usize, FetchError> {
    let remote_path = experiment.remote_summary_path();
    if !client.exists(&remote_path)? {
        return Err(FetchError::NotReady(remote_path));
    }
    let summary = client.read(&remote_path)?;
    fs::write(destination, &summary).map_err(|source| FetchError::Io {
        path: destination.to_path_buf(),
        source,
    })?;
    info!(path = %destination.display(), bytes = summary.len(), "fetched summary");
    Ok(summary.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::run::{LifecycleState, ResultState},
        testing::{status, MemoryClient},
    };

    fn experiment() -> ExperimentConfig {
        ExperimentConfig {
            id: "abc".to_string(),
            slug: "My Slug".to_string(),
            branches: vec!["control".to_string()],
        }
    }

    #[test]
    fn submit_uploads_then_runs_script() {
        let mut client = MemoryClient::default();
        let cluster = ClusterId::from(DEFAULT_CLUSTER);
        let run = submit_script(&mut client, &experiment(), b"print(1)", &cluster).unwrap();
        assert_eq!(run, RunId::from(1));

        let script_path = "/mozreport/my_slug-abc/mozreport_etl_script.py";
        assert_eq!(client.files[script_path], b"print(1)");
        let (name, used_cluster, path, parameters) = &client.submitted[0];
        assert_eq!(name, "mozreport: My Slug");
        assert_eq!(used_cluster, &cluster);
        assert_eq!(path, script_path);
        assert_eq!(parameters, &experiment().script_parameters());
    }

    #[test]
    fn waits_until_terminal() {
        let mut client = MemoryClient::default();
        client.statuses.extend(vec![
            status(LifecycleState::Pending, None),
            status(LifecycleState::Running, None),
            status(LifecycleState::Terminated, Some(ResultState::Success)),
            status(LifecycleState::Running, None),
        ]);
        let mut seen = Vec::new();
        let last = wait_for_completion(&mut client, RunId::from(1), Duration::from_millis(0), |status| {
            seen.push(status.lifecycle_state().clone())
        })
        .unwrap();

        assert_eq!(client.polls, 3);
        assert_eq!(seen.len(), 3);
        assert_eq!(last.result_state(), Some(&ResultState::Success));
    }

    #[test]
    fn wait_surfaces_errors() {
        let mut client = MemoryClient::default();
        client.statuses.push_back(status(LifecycleState::Pending, None));
        let error = wait_for_completion(&mut client, RunId::from(1), Duration::from_millis(0), |_| {}).unwrap_err();
        assert!(matches!(error, RemoteError::Transport(_)));
    }

    #[test]
    fn fetch_writes_summary() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("summary.sqlite3");
        fs::write(&destination, b"stale").unwrap();

        let mut client = MemoryClient::default();
        client.files.insert(experiment().remote_summary_path(), b"SQLite format 3".to_vec());
        let written = fetch_summary(&mut client, &experiment(), &destination).unwrap();
        assert_eq!(written, 15);
        assert_eq!(fs::read(&destination).unwrap(), b"SQLite format 3");
    }

    #[test]
    fn fetch_before_results_exist() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("summary.sqlite3");
        let mut client = MemoryClient::default();
        let error = fetch_summary(&mut client, &experiment(), &destination).unwrap_err();
        assert!(matches!(error, FetchError::NotReady(path) if path == experiment().remote_summary_path()));
        assert!(!destination.exists());
    }
}
