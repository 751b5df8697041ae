use crate::api::{error::RemoteError, id::*, run::RunStatus};

/// Size of one chunk requested from remote storage while reading a file.
pub const READ_CHUNK_SIZE: i64 = 1 << 20;

/// Remote file storage and job execution.
///
/// Every method is a blocking round trip. Implementations keep no state
/// between calls beyond their configuration, so run status is never cached.
#[rustfmt::skip]
pub trait Client {
    fn upload(&mut self, contents: &[u8], remote_path: &str) -> Result<(), RemoteError>;
    fn exists(&mut self, remote_path: &str) -> Result<bool, RemoteError>;
    fn read(&mut self, remote_path: &str) -> Result<Vec<u8>, RemoteError>;
    fn delete(&mut self, remote_path: &str, recursive: bool) -> Result<(), RemoteError>;

    fn submit_job(&mut self, run_name: &str, cluster: &ClusterId, remote_script_path: &str, parameters: &[String]) -> Result<RunId, RemoteError>;
    fn get_run_status(&mut self, run: RunId) -> Result<RunStatus, RemoteError>;
}
