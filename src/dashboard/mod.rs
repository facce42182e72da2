//! Web dashboard: state view and a remote toggle.
//!
//! The dashboard never touches the appliance or the balance itself. A toggle
//! is queued on the session exactly like a button press.

mod error;
mod routes;

use std::future::IntoFuture;
use std::net::SocketAddr;

use tokio::net::TcpListener;

pub use error::DashboardError;
pub use routes::{build_router, DashboardState, HealthStatus, ToggleResponse};

use crate::shutdown::ShutdownHandle;

pub struct DashboardServer {
    addr: SocketAddr,
    /// Bound in [`DashboardServer::bind`] so the port is known before `run`.
    listener: TcpListener,
    state: DashboardState,
}

impl DashboardServer {
    pub async fn bind(bind_addr: &str, state: DashboardState) -> Result<Self, DashboardError> {
        let addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| DashboardError::InvalidAddress {
                addr: bind_addr.to_string(),
                reason: e.to_string(),
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| DashboardError::Bind {
                addr: bind_addr.to_string(),
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| DashboardError::Bind {
            addr: bind_addr.to_string(),
            source,
        })?;

        tracing::info!("Dashboard bound to {}", addr);
        Ok(Self {
            addr,
            listener,
            state,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until shutdown is signalled, then drain in-flight requests.
    pub async fn run(self, shutdown: ShutdownHandle) -> Result<(), DashboardError> {
        tracing::info!("Starting dashboard on {}", self.addr);

        let app = build_router(self.state);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .into_future()
            .await
            .map_err(DashboardError::Serve)?;

        tracing::info!("Dashboard closed");
        Ok(())
    }
}
