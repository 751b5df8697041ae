use crate::{
    api::{
        client::{Client, READ_CHUNK_SIZE},
        error::{ErrorCode, RemoteError},
        id::{ClusterId, RunId},
        run::RunStatus,
    },
    backend::transport::{HttpRequest, HttpResponse, Method, Transport, UreqTransport},
    config::RemoteConfig,
};
use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// Largest payload sent in a single upload request, before base64 encoding.
pub const UPLOAD_BLOCK_SIZE: usize = 512 * 1024;

#[derive(Deserialize)]
struct ErrorResponse {
    error_code: ErrorCode,
}

fn parse_error(response: HttpResponse) -> RemoteError {
    let code = serde_json::from_str::<ErrorResponse>(&response.body)
        .ok()
        .map(|response| response.error_code);
    RemoteError::Response {
        status: response.status,
        code,
        body: response.body,
    }
}

/// A Databricks workspace, reached over its REST API.
pub struct Server<T = UreqTransport> {
    api_url: String,
    token: String,
    transport: T,
}

impl Server {
    pub fn new(config: &RemoteConfig) -> Self {
        Server::with_transport(config, UreqTransport)
    }
}

impl<T: Transport> Server<T> {
    pub fn with_transport(config: &RemoteConfig, transport: T) -> Self {
        Server {
            api_url: format!("{}/api", config.host.trim_end_matches('/')),
            token: config.token.clone(),
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn execute<Ep>(&mut self, request: &Ep) -> Result<Ep::Value, RemoteError>
    where
        Ep: Endpoint + Serialize,
    {
        let url = format!("{}/{}", self.api_url, Ep::PATH);
        let http_request = match Ep::METHOD {
            Method::Get => {
                let query = serde_qs::to_string(request).context("serializing query failed")?;
                HttpRequest {
                    method: Method::Get,
                    url: format!("{}?{}", url, query),
                    bearer_token: self.token.clone(),
                    body: None,
                }
            }
            Method::Post => {
                let body = serde_json::to_string(request).context("serializing request failed")?;
                HttpRequest {
                    method: Method::Post,
                    url,
                    bearer_token: self.token.clone(),
                    body: Some(body),
                }
            }
        };
        debug!(method = ?Ep::METHOD, path = Ep::PATH, "sending request");
        let http_response = self.transport.send(http_request)?;
        if !http_response.is_success() {
            debug!(status = http_response.status, path = Ep::PATH, "request failed");
            return Err(parse_error(http_response));
        }
        let response = serde_json::from_str::<Ep::Response>(&http_response.body)
            .with_context(|| format!("deserializing response failed:\n{}", &http_response.body))?;
        Ok(Ep::extract(response))
    }
}

impl<T: Transport> Client for Server<T> {
    fn upload(&mut self, contents: &[u8], remote_path: &str) -> Result<(), RemoteError> {
        if contents.len() <= UPLOAD_BLOCK_SIZE {
            let request = Put {
                path: remote_path,
                contents: base64::encode(contents),
                overwrite: true,
            };
            return self.execute(&request);
        }

        let handle = self.execute(&Create { path: remote_path, overwrite: true })?;
        for block in contents.chunks(UPLOAD_BLOCK_SIZE) {
            let request = AddBlock {
                handle,
                data: base64::encode(block),
            };
            self.execute(&request)?;
        }
        self.execute(&Close { handle })
    }

    fn exists(&mut self, remote_path: &str) -> Result<bool, RemoteError> {
        match self.execute(&GetStatus { path: remote_path }) {
            Ok(()) => Ok(true),
            Err(RemoteError::Response {
                code: Some(ErrorCode::ResourceDoesNotExist),
                ..
            }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn read(&mut self, remote_path: &str) -> Result<Vec<u8>, RemoteError> {
        let mut contents = Vec::new();
        let mut offset = 0;
        loop {
            let request = Read {
                path: remote_path,
                offset,
                length: READ_CHUNK_SIZE,
            };
            let chunk = self.execute(&request)?;
            let data = base64::decode(&chunk.data)
                .with_context(|| format!("decoding chunk at offset {} failed", offset))?;
            contents.extend_from_slice(&data);
            offset += chunk.bytes_read;
            // a short chunk, possibly empty, marks the end of the file
            if chunk.bytes_read < READ_CHUNK_SIZE {
                break;
            }
        }
        debug!(path = remote_path, bytes = contents.len(), "read file");
        Ok(contents)
    }

    fn delete(&mut self, remote_path: &str, recursive: bool) -> Result<(), RemoteError> {
        self.execute(&Delete { path: remote_path, recursive })
    }

    fn submit_job(&mut self, run_name: &str, cluster: &ClusterId, remote_script_path: &str, parameters: &[String]) -> Result<RunId, RemoteError> {
        let request = SubmitRun {
            run_name,
            existing_cluster_id: cluster,
            spark_python_task: SparkPythonTask {
                python_file: format!("dbfs:{}", remote_script_path),
                parameters,
            },
        };
        self.execute(&request)
    }

    fn get_run_status(&mut self, run: RunId) -> Result<RunStatus, RemoteError> {
        self.execute(&GetRun { run_id: run })
    }
}

trait Endpoint {
    const PATH: &'static str;
    const METHOD: Method;

    type Response: DeserializeOwned;
    type Value;

    fn extract(response: Self::Response) -> Self::Value;
}
trait VoidEndpoint {
    const PATH: &'static str;
    const METHOD: Method;
}
impl<E> Endpoint for E
where
    E: VoidEndpoint,
{
    const PATH: &'static str = <E as VoidEndpoint>::PATH;
    const METHOD: Method = <E as VoidEndpoint>::METHOD;

    type Response = VoidResponse;
    type Value = ();

    fn extract(_response: Self::Response) -> Self::Value {}
}

#[derive(Deserialize)]
struct VoidResponse {}

#[derive(Debug, Clone, Serialize)]
struct Put<'a> {
    pub path: &'a str,
    pub contents: String,
    pub overwrite: bool,
}
impl VoidEndpoint for Put<'_> {
    const PATH: &'static str = "2.0/dbfs/put";
    const METHOD: Method = Method::Post;
}

#[derive(Debug, Clone, Copy, Serialize)]
struct Create<'a> {
    pub path: &'a str,
    pub overwrite: bool,
}
#[derive(Deserialize)]
struct CreateResponse {
    handle: i64,
}
impl Endpoint for Create<'_> {
    const PATH: &'static str = "2.0/dbfs/create";
    const METHOD: Method = Method::Post;
    type Response = CreateResponse;
    type Value = i64;

    fn extract(response: Self::Response) -> Self::Value {
        response.handle
    }
}

#[derive(Debug, Clone, Serialize)]
struct AddBlock {
    pub handle: i64,
    pub data: String,
}
impl VoidEndpoint for AddBlock {
    const PATH: &'static str = "2.0/dbfs/add-block";
    const METHOD: Method = Method::Post;
}

#[derive(Debug, Clone, Copy, Serialize)]
struct Close {
    pub handle: i64,
}
impl VoidEndpoint for Close {
    const PATH: &'static str = "2.0/dbfs/close";
    const METHOD: Method = Method::Post;
}

#[derive(Debug, Clone, Copy, Serialize)]
struct GetStatus<'a> {
    pub path: &'a str,
}
impl VoidEndpoint for GetStatus<'_> {
    const PATH: &'static str = "2.0/dbfs/get-status";
    const METHOD: Method = Method::Get;
}

#[derive(Debug, Clone, Copy, Serialize)]
struct Read<'a> {
    pub path: &'a str,
    pub offset: i64,
    pub length: i64,
}
#[derive(Deserialize)]
struct ReadResponse {
    bytes_read: i64,
    #[serde(default)]
    data: String,
}
impl Endpoint for Read<'_> {
    const PATH: &'static str = "2.0/dbfs/read";
    const METHOD: Method = Method::Get;
    type Response = ReadResponse;
    type Value = ReadResponse;

    fn extract(response: Self::Response) -> Self::Value {
        response
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct Delete<'a> {
    pub path: &'a str,
    pub recursive: bool,
}
impl VoidEndpoint for Delete<'_> {
    const PATH: &'static str = "2.0/dbfs/delete";
    const METHOD: Method = Method::Post;
}

#[derive(Debug, Clone, Serialize)]
struct SparkPythonTask<'a> {
    pub python_file: String,
    pub parameters: &'a [String],
}
#[derive(Debug, Clone, Serialize)]
struct SubmitRun<'a> {
    pub run_name: &'a str,
    pub existing_cluster_id: &'a ClusterId,
    pub spark_python_task: SparkPythonTask<'a>,
}
#[derive(Deserialize)]
struct SubmitRunResponse {
    run_id: RunId,
}
impl Endpoint for SubmitRun<'_> {
    const PATH: &'static str = "2.0/jobs/runs/submit";
    const METHOD: Method = Method::Post;
    type Response = SubmitRunResponse;
    type Value = RunId;

    fn extract(response: Self::Response) -> Self::Value {
        response.run_id
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct GetRun {
    pub run_id: RunId,
}
impl Endpoint for GetRun {
    const PATH: &'static str = "2.0/jobs/runs/get";
    const METHOD: Method = Method::Get;
    type Response = RunStatus;
    type Value = RunStatus;

    fn extract(response: Self::Response) -> Self::Value {
        response
    }
}
