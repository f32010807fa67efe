use crate::{
    config::Config,
    inference_service::InferenceService,
    model_service::{FixedLabelModel, GestureModel},
};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::{net::TcpListener, signal, sync::broadcast};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct PredictionServer<M: GestureModel> {
    listener: TcpListener,
    inference_service: InferenceService<M>,
}

impl<M: GestureModel> PredictionServer<M> {
    pub async fn bind(addr: &str, model_service: M, max_frame_bytes: usize) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        Ok(Self {
            listener,
            inference_service: InferenceService::new(model_service, max_frame_bytes),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts clients until `shutdown_rx` fires. Each client gets its own task.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), ServerError> {
        tracing::info!("Prediction server listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
                    }
                    let service = self.inference_service.clone();
                    tokio::spawn(async move {
                        if let Err(e) = service.serve_connection(stream, peer).await {
                            tracing::error!("Client connection error with {}: {}", peer, e);
                        }
                    });
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Prediction server received shutdown signal");
                    break;
                }
            }
        }

        Ok(())
    }
}

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let model_service = FixedLabelModel::new(config.model.fixed_label.clone());
    let addr = config.server.get_address();
    let server = PredictionServer::bind(&addr, model_service, config.server.max_frame_bytes).await?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let server_handle = tokio::spawn(server.run(shutdown_rx));

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
