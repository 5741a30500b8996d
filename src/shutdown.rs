//! Coordinated shutdown of the long running services.
//!
//! Every service runs as a tokio task with its own stop token. The
//! [`Supervisor`] keeps the handles and, once the shutdown signal fires,
//! stops them one by one, each with a bounded drain.
//!
//! [`Supervisor`]: struct.Supervisor.html
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// HTTP endpoint that fires the shutdown signal on `GET /shutdown`.
#[derive(Debug)]
pub struct ShutdownListener {
    listener: TcpListener,
    signal: CancellationToken,
}

impl ShutdownListener {
    pub async fn bind(addr: SocketAddr, signal: CancellationToken) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Shutdown listener on {}", listener.local_addr()?);
        Ok(ShutdownListener { listener, signal })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn serve(self, stop: CancellationToken) -> Result<()> {
        let app = Router::new()
            .route("/shutdown", get(shutdown))
            .with_state(self.signal);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await?;
        debug!("Shutdown listener stopped");
        Ok(())
    }
}

async fn shutdown(State(signal): State<CancellationToken>) -> StatusCode {
    info!("Received shutdown request");
    signal.cancel();
    StatusCode::OK
}

/// Resolves on the shutdown signal or once `interrupt` fires. If `interrupt`
/// fails, only the signal is left to wait for.
async fn wait_for_shutdown<F>(signal: &CancellationToken, interrupt: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    let interrupted = tokio::select! {
        _ = signal.cancelled() => None,
        res = interrupt => Some(res),
    };
    match interrupted {
        None => {}
        Some(Ok(())) => info!("Interrupted"),
        Some(Err(e)) => {
            warn!("Can't listen for Ctrl-C: {}", e);
            signal.cancelled().await;
        }
    }
}

struct Service {
    name: String,
    stop: CancellationToken,
    task: JoinHandle<Result<()>>,
}

/// Owner of the running services.
pub struct Supervisor {
    handle: Handle,
    signal: CancellationToken,
    services: Vec<Service>,
}

impl Supervisor {
    /// Services are spawned on the runtime behind `handle`, which also works
    /// from threads outside the runtime.
    pub fn new(handle: Handle) -> Self {
        Supervisor {
            handle,
            signal: CancellationToken::new(),
            services: vec![],
        }
    }

    /// The shutdown signal. Cancelling it ends [`run_until_shutdown`].
    ///
    /// [`run_until_shutdown`]: struct.Supervisor.html#method.run_until_shutdown
    pub fn signal(&self) -> CancellationToken {
        self.signal.clone()
    }

    /// Start a service. `f` gets the token that asks it to stop.
    pub fn spawn<F, Fut>(&mut self, name: &str, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let stop = CancellationToken::new();
        let task = self.handle.spawn(f(stop.clone()));
        debug!("Started {}", name);
        self.services.push(Service {
            name: name.to_string(),
            stop,
            task,
        });
    }

    /// Names of the services not yet stopped.
    pub fn services(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    /// Wait for the shutdown signal (or Ctrl-C), then stop every service.
    pub async fn run_until_shutdown(&mut self, drain: Duration) {
        wait_for_shutdown(&self.signal, tokio::signal::ctrl_c()).await;
        self.stop_all(drain).await;
    }

    /// Stop every service independently. Each gets `drain` to finish after
    /// its stop token is cancelled and is aborted after that.
    pub async fn stop_all(&mut self, drain: Duration) {
        for Service {
            name,
            stop,
            mut task,
        } in self.services.drain(..)
        {
            stop.cancel();
            match tokio::time::timeout(drain, &mut task).await {
                Ok(Ok(Ok(()))) => info!("Stopped {}", name),
                Ok(Ok(Err(e))) => error!("{} failed: {}", name, e),
                Ok(Err(e)) => error!("{} panicked or was cancelled: {}", name, e),
                Err(_) => {
                    warn!("{} did not stop within {:?}, aborting", name, drain);
                    task.abort();
                }
            }
        }
    }
}
