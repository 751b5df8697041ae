//! In-memory stand-ins for the remote platform.

use crate::api::{
    client::Client,
    error::{ErrorCode, RemoteError},
    id::{ClusterId, RunId},
    run::{LifecycleState, ResultState, RunState, RunStatus},
};
use std::collections::{HashMap, VecDeque};

/// Files and run statuses served from memory. Statuses are handed out in
/// order, one per `get_run_status` call.
#[derive(Default)]
pub struct MemoryClient {
    pub files: HashMap<String, Vec<u8>>,
    pub statuses: VecDeque<RunStatus>,
    pub submitted: Vec<(String, ClusterId, String, Vec<String>)>,
    pub polls: usize,
    pub reads: usize,
}

fn not_found(path: &str) -> RemoteError {
    RemoteError::Response {
        status: 404,
        code: Some(ErrorCode::ResourceDoesNotExist),
        body: format!("no file at {}", path),
    }
}

impl Client for MemoryClient {
    fn upload(&mut self, contents: &[u8], remote_path: &str) -> Result<(), RemoteError> {
        self.files.insert(remote_path.to_string(), contents.to_vec());
        Ok(())
    }

    fn exists(&mut self, remote_path: &str) -> Result<bool, RemoteError> {
        Ok(self.files.contains_key(remote_path))
    }

    fn read(&mut self, remote_path: &str) -> Result<Vec<u8>, RemoteError> {
        self.reads += 1;
        self.files.get(remote_path).cloned().ok_or_else(|| not_found(remote_path))
    }

    fn delete(&mut self, remote_path: &str, _recursive: bool) -> Result<(), RemoteError> {
        self.files.remove(remote_path).map(|_| ()).ok_or_else(|| not_found(remote_path))
    }

    fn submit_job(&mut self, run_name: &str, cluster: &ClusterId, remote_script_path: &str, parameters: &[String]) -> Result<RunId, RemoteError> {
        self.submitted.push((
            run_name.to_string(),
            cluster.clone(),
            remote_script_path.to_string(),
            parameters.to_vec(),
        ));
        Ok(RunId::from(self.submitted.len() as i64))
    }

    fn get_run_status(&mut self, _run: RunId) -> Result<RunStatus, RemoteError> {
        self.polls += 1;
        self.statuses
            .pop_front()
            .ok_or_else(|| RemoteError::Transport(anyhow::anyhow!("no status left")))
    }
}

pub fn status(state: LifecycleState, result: Option<ResultState>) -> RunStatus {
    RunStatus {
        run_id: RunId::from(1),
        state: RunState {
            life_cycle_state: state,
            result_state: result,
            state_message: None,
        },
        run_page_url: "https://example.com/#job/1/run/1".to_string(),
    }
}
