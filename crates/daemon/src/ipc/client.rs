//! IPC client used by the CLI subcommands.

use std::io;
use std::path::Path;
use std::time::Duration;

use protocol::{ChannelId, UserId};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::messages::{IpcRequest, IpcResponse};
use super::server::IpcError;

/// Default timeout for client operations in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// A request-response client for the daemon socket.
pub struct IpcClient {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
    timeout: Duration,
}

impl IpcClient {
    /// Connects to the daemon socket. Fails when the daemon is not running.
    pub async fn connect(path: &Path) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self::from_stream(stream, Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
    }

    /// Connects with a deadline that also becomes the per-request timeout.
    pub async fn connect_with_timeout(path: &Path, timeout: Duration) -> Result<Self, IpcError> {
        let stream = tokio::time::timeout(timeout, UnixStream::connect(path))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connection timed out"))??;
        Ok(Self::from_stream(stream, timeout))
    }

    fn from_stream(stream: UnixStream, timeout: Duration) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout,
        }
    }

    /// Sets the per-request timeout.
    ///
    /// `turn-on` and `create-button` wait on the network inside the daemon,
    /// so callers raise this above the daemon's own timeouts.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Sends one request and waits for its response.
    pub async fn send(&mut self, request: IpcRequest) -> Result<IpcResponse, IpcError> {
        tokio::time::timeout(self.timeout, self.send_internal(request))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "operation timed out"))?
    }

    async fn send_internal(&mut self, request: IpcRequest) -> Result<IpcResponse, IpcError> {
        let mut json = serde_json::to_string(&request)?;
        json.push('\n');
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(IpcError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "daemon closed connection",
            )));
        }

        Ok(serde_json::from_str(line.trim())?)
    }

    /// Returns `true` if the daemon answered with `Pong`.
    pub async fn ping(&mut self) -> Result<bool, IpcError> {
        let response = self.send(IpcRequest::Ping).await?;
        Ok(matches!(response, IpcResponse::Pong))
    }

    pub async fn status(&mut self) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::Status).await
    }

    pub async fn stop(&mut self) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::Stop).await
    }

    pub async fn initialize(
        &mut self,
        caller: UserId,
        mac_address: String,
        ip_address: String,
        password: String,
    ) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::Initialize {
            caller,
            mac_address,
            ip_address,
            password,
        })
        .await
    }

    pub async fn add_user(&mut self, caller: UserId, user: UserId) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::AddUser { caller, user }).await
    }

    pub async fn remove_user(
        &mut self,
        caller: UserId,
        user: UserId,
    ) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::RemoveUser { caller, user }).await
    }

    pub async fn create_button(
        &mut self,
        caller: UserId,
        channel: ChannelId,
    ) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::CreateButton { caller, channel }).await
    }

    pub async fn turn_on(&mut self, caller: UserId, password: String) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::TurnOn { caller, password }).await
    }

    pub async fn info(&mut self, caller: UserId) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::Info { caller }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::server::IpcServer;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_client_connect_fails_when_daemon_not_running() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("nonexistent.sock");

        assert!(IpcClient::connect(&socket_path).await.is_err());
    }

    #[tokio::test]
    async fn test_client_ping() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let server = IpcServer::bind(&socket_path).await.unwrap();

        let server_handle = tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            let request = conn.read_request().await.unwrap().unwrap();
            assert_eq!(request, IpcRequest::Ping);
            conn.send_response(&IpcResponse::Pong).await.unwrap();
        });

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        assert!(client.ping().await.unwrap());

        server_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_turn_on_error() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let server = IpcServer::bind(&socket_path).await.unwrap();

        let server_handle = tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            match conn.read_request().await.unwrap().unwrap() {
                IpcRequest::TurnOn { caller, password } => {
                    assert_eq!(caller, UserId(5));
                    assert_eq!(password, "wrong1");
                }
                other => panic!("Expected TurnOn request, got {:?}", other),
            }
            conn.send_response(&IpcResponse::error("invalid_credential", "invalid password"))
                .await
                .unwrap();
        });

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        let response = client.turn_on(UserId(5), "wrong1".to_string()).await.unwrap();
        assert_eq!(
            response,
            IpcResponse::Error {
                kind: "invalid_credential".to_string(),
                message: "invalid password".to_string(),
            }
        );

        server_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_multiple_requests_on_one_connection() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let server = IpcServer::bind(&socket_path).await.unwrap();

        let server_handle = tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            while let Some(request) = conn.read_request().await.unwrap() {
                let response = match request {
                    IpcRequest::Ping => IpcResponse::Pong,
                    IpcRequest::Stop => IpcResponse::Stopping,
                    _ => IpcResponse::error("bad_request", "unexpected"),
                };
                conn.send_response(&response).await.unwrap();
            }
        });

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        assert!(client.ping().await.unwrap());
        assert_eq!(client.stop().await.unwrap(), IpcResponse::Stopping);
        drop(client);

        server_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_timeout() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        let server = IpcServer::bind(&socket_path).await.unwrap();

        // Accepts but never answers.
        let _server_handle = tokio::spawn(async move {
            let mut conn = server.accept().await.unwrap();
            let _ = conn.read_request().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let mut client =
            IpcClient::connect_with_timeout(&socket_path, Duration::from_millis(100))
                .await
                .unwrap();
        let result = client.ping().await;
        assert!(matches!(result, Err(IpcError::Io(e)) if e.kind() == io::ErrorKind::TimedOut));
    }
}
