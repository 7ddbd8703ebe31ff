//! Maps IPC requests onto [`WakeService`] calls and serves connections.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::{IpcRequest, IpcResponse};
use super::server::{IpcConnection, IpcError, IpcServer};
use crate::access;
use crate::service::WakeService;

/// Answers requests arriving on the daemon socket.
#[derive(Clone)]
pub struct RequestHandler {
    service: Arc<WakeService>,
    started_at: Instant,
    shutdown: CancellationToken,
}

impl RequestHandler {
    /// `shutdown` is cancelled when a client sends `Stop`.
    pub fn new(service: Arc<WakeService>, shutdown: CancellationToken) -> Self {
        Self {
            service,
            started_at: Instant::now(),
            shutdown,
        }
    }

    /// Produces the response for one request.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        debug!(request = request.name(), "Handling IPC request");

        match request {
            IpcRequest::Ping => IpcResponse::Pong,

            IpcRequest::Status => {
                let initialized = match self.service.store().load().await {
                    Ok(record) => access::is_initialized(&record),
                    Err(e) => {
                        warn!("Failed to read device record for status: {}", e);
                        false
                    }
                };
                IpcResponse::Status {
                    running: !self.shutdown.is_cancelled(),
                    uptime_secs: self.started_at.elapsed().as_secs(),
                    initialized,
                    host_status: self.service.host_status(),
                }
            }

            IpcRequest::Stop => {
                info!("Shutdown requested over IPC");
                self.shutdown.cancel();
                IpcResponse::Stopping
            }

            IpcRequest::Initialize {
                caller,
                mac_address,
                ip_address,
                password,
            } => match self
                .service
                .initialize(caller, &mac_address, &ip_address, &password)
                .await
            {
                Ok(()) => IpcResponse::done(
                    "PC has been initialized. Run `create-button` to post the status display.",
                ),
                Err(e) => e.into(),
            },

            IpcRequest::AddUser { caller, user } => {
                match self.service.add_user(caller, user).await {
                    Ok(()) => IpcResponse::done(format!("User {} has been added.", user)),
                    Err(e) => e.into(),
                }
            }

            IpcRequest::RemoveUser { caller, user } => {
                match self.service.remove_user(caller, user).await {
                    Ok(()) => IpcResponse::done(format!("User {} has been removed.", user)),
                    Err(e) => e.into(),
                }
            }

            IpcRequest::CreateButton { caller, channel } => {
                match self.service.recreate_display(caller, channel).await {
                    Ok(binding) => IpcResponse::ButtonCreated { binding },
                    Err(e) => e.into(),
                }
            }

            IpcRequest::TurnOn { caller, password } => {
                match self.service.authenticate(caller, &password).await {
                    Ok(ack) => IpcResponse::done(ack.message),
                    Err(e) => e.into(),
                }
            }

            IpcRequest::Info { caller } => match self.service.get_info(caller).await {
                Ok(info) => IpcResponse::Info { info },
                Err(e) => e.into(),
            },
        }
    }

    /// Serves one connection until the client hangs up.
    ///
    /// A line that is not a valid request gets a `bad_request` error and
    /// ends the connection.
    pub async fn serve_connection(&self, mut conn: IpcConnection) -> Result<(), IpcError> {
        loop {
            let request = match conn.read_request().await {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(()),
                Err(IpcError::Json(e)) => {
                    conn.send_response(&IpcResponse::error("bad_request", e.to_string()))
                        .await?;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            let response = self.handle(request).await;
            conn.send_response(&response).await?;
        }
    }

    /// Accepts connections until shutdown, one task per connection.
    pub async fn serve(self, server: IpcServer) {
        info!("IPC server listening on {:?}", server.path());

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = server.accept() => match accepted {
                    Ok(conn) => {
                        let handler = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handler.serve_connection(conn).await {
                                debug!("IPC connection ended with error: {}", e);
                            }
                        });
                    }
                    Err(e) => warn!("Failed to accept IPC connection: {}", e),
                },
            }
        }

        info!("IPC server stopped");
    }
}
