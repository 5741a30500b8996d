//! Challenge responders.
//!
//! The orchestrator hands every proof to a responder over a bounded channel
//! ([`token_channel`]). The responder keeps them in a [`TokenSet`] and serves
//! them to the validating server, the DNS one as `TXT` records and the HTTP
//! one under `/.well-known/acme-challenge/`.
//!
//! Tokens are never evicted. A responder serves everything it was ever
//! given until it is stopped.
//!
//! [`token_channel`]: fn.token_channel.html
//! [`TokenSet`]: struct.TokenSet.html
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

mod dns;
mod http;

pub use self::dns::DnsResponder;
pub use self::http::HttpResponder;

/// Capacity of the channel between orchestrator and responder.
const TOKEN_CHANNEL_CAPACITY: usize = 16;

/// The values a responder serves, in the order they were published.
#[derive(Clone, Debug, Default)]
pub struct TokenSet {
    tokens: Arc<RwLock<Vec<String>>>,
}

impl TokenSet {
    pub fn new() -> Self {
        TokenSet::default()
    }

    pub fn push(&self, token: String) {
        self.tokens.write().push(token);
    }

    /// Copy of the current values.
    pub fn snapshot(&self) -> Vec<String> {
        self.tokens.read().clone()
    }

    /// First value whose part before the first `.` is `id`.
    ///
    /// For http-01 the value is a key authorization, `<token>.<thumbprint>`,
    /// and `id` is the token from the request path.
    pub fn find_by_id(&self, id: &str) -> Option<String> {
        self.tokens
            .read()
            .iter()
            .find(|t| t.split('.').next() == Some(id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }
}

/// The orchestrator end of the token channel.
#[derive(Clone, Debug)]
pub struct TokenSender {
    tx: mpsc::Sender<String>,
}

impl TokenSender {
    /// Hand a proof to the responder.
    ///
    /// Blocks only while the channel is full. Must not be called from within
    /// the async runtime. Fails once the responder end is gone.
    pub fn publish(&self, token: String) -> Result<()> {
        debug!("Publish challenge proof {}", token);
        self.tx
            .blocking_send(token)
            .map_err(|_| Error::Other("Challenge responder is gone".into()))
    }
}

/// The responder end of the token channel.
#[derive(Debug)]
pub struct TokenInbox {
    rx: mpsc::Receiver<String>,
}

impl TokenInbox {
    /// Next token, `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// A token if one is waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

/// Create the bounded channel between the orchestrator and a responder.
pub fn token_channel() -> (TokenSender, TokenInbox) {
    let (tx, rx) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);
    (TokenSender { tx }, TokenInbox { rx })
}

/// Move tokens from `inbox` into `tokens` until the inbox closes or `stop`
/// is cancelled.
pub(crate) async fn ingest(mut inbox: TokenInbox, tokens: TokenSet, stop: CancellationToken) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            token = inbox.recv() => match token {
                Some(token) => {
                    debug!("Token added: {}", token);
                    tokens.push(token);
                }
                None => break,
            },
        }
    }
    trace!("Token ingestion ended");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_find_by_id() {
        let tokens = TokenSet::new();
        assert!(tokens.is_empty());
        tokens.push("tok1.thumb".into());
        tokens.push("tok2.thumb".into());
        assert_eq!(tokens.find_by_id("tok2"), Some("tok2.thumb".to_string()));
        assert_eq!(tokens.find_by_id("tok"), None);
        assert_eq!(tokens.find_by_id("thumb"), None);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_publish_after_inbox_dropped() {
        let (tx, inbox) = token_channel();
        drop(inbox);
        assert!(tx.publish("abc".into()).is_err());
    }

    #[test]
    fn test_publish_and_try_recv() -> Result<()> {
        let (tx, mut inbox) = token_channel();
        tx.publish("abc".into())?;
        assert_eq!(inbox.try_recv(), Some("abc".to_string()));
        assert_eq!(inbox.try_recv(), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_ingest_until_closed() {
        let (tx, inbox) = token_channel();
        let tokens = TokenSet::new();
        let task = tokio::spawn(ingest(inbox, tokens.clone(), CancellationToken::new()));

        // publish blocks the thread, keep it off the runtime
        tokio::task::spawn_blocking(move || {
            tx.publish("a".into()).unwrap();
            tx.publish("b".into()).unwrap();
        })
        .await
        .unwrap();

        task.await.unwrap();
        assert_eq!(tokens.snapshot(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_ingest_stops_on_cancel() {
        let (_tx, inbox) = token_channel();
        let stop = CancellationToken::new();
        let task = tokio::spawn(ingest(inbox, TokenSet::new(), stop.clone()));
        stop.cancel();
        task.await.unwrap();
    }
}
