//! HTTPS server presenting the issued certificate.
//!
//! Once a certificate is downloaded, it is served on a TLS listener so the
//! result can be checked with any TLS client. Every request gets an empty
//! `200 OK`.
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Empty;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use rustls::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use crate::cert::Certificate;
use crate::tls::server_config;
use crate::Result;

#[derive(Debug)]
pub struct CertificateServer {
    listener: TcpListener,
    config: Arc<ServerConfig>,
}

impl CertificateServer {
    /// Bind `addr` with the chain and key of `cert`. Fails if they don't
    /// make a usable TLS identity.
    pub async fn bind(addr: SocketAddr, cert: &Certificate) -> Result<Self> {
        let config = server_config(cert.certificate(), cert.private_key())?;
        let listener = TcpListener::bind(addr).await?;
        info!("Presenting certificate on {}", listener.local_addr()?);
        Ok(CertificateServer { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `stop` is cancelled. Open connections are
    /// asked to finish their current request.
    pub async fn serve(self, stop: CancellationToken) -> Result<()> {
        let acceptor = TlsAcceptor::from(self.config);
        loop {
            let (tcp, peer) = tokio::select! {
                _ = stop.cancelled() => break,
                res = self.listener.accept() => match res {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                        continue;
                    }
                },
            };
            tokio::spawn(connection(acceptor.clone(), tcp, peer, stop.clone()));
        }
        debug!("Certificate server stopped");
        Ok(())
    }
}

async fn connection(
    acceptor: TlsAcceptor,
    tcp: TcpStream,
    peer: SocketAddr,
    stop: CancellationToken,
) {
    let tls = match acceptor.accept(tcp).await {
        Ok(tls) => tls,
        Err(e) => {
            debug!("TLS handshake with {} failed: {}", peer, e);
            return;
        }
    };

    let service = service_fn(|_req: Request<hyper::body::Incoming>| async {
        Ok::<_, Infallible>(Response::new(Empty::<Bytes>::new()))
    });
    let conn = http1::Builder::new().serve_connection(TokioIo::new(tls), service);
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        _ = stop.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = res {
        debug!("Connection with {} ended: {}", peer, e);
    }
}
