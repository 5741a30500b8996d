//
use std::net::SocketAddr;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::{ingest, TokenInbox, TokenSet};
use crate::Result;

/// HTTP server for http-01 validation.
///
/// `GET /.well-known/acme-challenge/<token>` answers with the key
/// authorization published for `<token>`, everything else is a 404.
#[derive(Debug)]
pub struct HttpResponder {
    listener: TcpListener,
    tokens: TokenSet,
}

impl HttpResponder {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("HTTP responder listening on {}", listener.local_addr()?);
        Ok(HttpResponder {
            listener,
            tokens: TokenSet::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    /// Serve until `stop` is cancelled, then drain open connections.
    pub async fn serve(self, inbox: TokenInbox, stop: CancellationToken) -> Result<()> {
        tokio::spawn(ingest(inbox, self.tokens.clone(), stop.clone()));

        let app = Router::new()
            .route("/.well-known/acme-challenge/:id", get(challenge))
            .with_state(self.tokens);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await?;
        debug!("HTTP responder stopped");
        Ok(())
    }
}

async fn challenge(State(tokens): State<TokenSet>, Path(id): Path<String>) -> Response {
    match tokens.find_by_id(&id) {
        Some(key_auth) => {
            debug!("Serve http-01 proof for {}", id);
            (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], key_auth).into_response()
        }
        None => {
            debug!("No http-01 proof for {}", id);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
