//! Run configuration.
//!
//! Everything has a default so a `Config` only needs the directory URL and
//! the domains filled in.
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::dir::DirectoryUrl;
use crate::order::ChallengeType;

/// What to do when a challenge still isn't `valid` after the last poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Exhaustion {
    /// Give up with [`Error::ValidationNotConfirmed`].
    ///
    /// [`Error::ValidationNotConfirmed`]: ../enum.Error.html#variant.ValidationNotConfirmed
    #[default]
    Fail,
    /// Log a warning and carry on with the order. The server has the final
    /// word when the order is finalized.
    Continue,
}

/// Polling of a single challenge after it has been triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengePolling {
    /// Pause between triggering the challenge and the first poll.
    pub settle: Duration,
    /// Pause between polls.
    pub interval: Duration,
    /// Number of polls.
    pub attempts: usize,
    pub on_exhausted: Exhaustion,
}

impl Default for ChallengePolling {
    fn default() -> Self {
        ChallengePolling {
            settle: Duration::from_secs(1),
            interval: Duration::from_secs(5),
            attempts: 5,
            on_exhausted: Exhaustion::Fail,
        }
    }
}

/// Polling of the order once it has been finalized.
///
/// The delay starts at `initial` and doubles up to `max` between polls.
/// Past `deadline` the poll gives up with [`Error::Timeout`].
///
/// [`Error::Timeout`]: ../enum.Error.html#variant.Timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPolling {
    pub initial: Duration,
    pub max: Duration,
    pub deadline: Duration,
}

impl Default for OrderPolling {
    fn default() -> Self {
        OrderPolling {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(5),
            deadline: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub directory_url: String,
    pub challenge: ChallengeType,
    /// Domains of the certificate. The first one is the `CN`.
    pub domains: Vec<String>,
    /// Account contact URLs, e.g. `mailto:admin@example.com`.
    pub contact: Vec<String>,
    /// Address the DNS responder answers `A` queries with.
    pub record: Ipv4Addr,
    /// Revoke the certificate right after download.
    pub revoke: bool,
    /// PEM file with the roots the API client trusts.
    pub trust_anchors: Option<PathBuf>,
    /// Save the certificate and key here, if set.
    pub save_dir: Option<PathBuf>,
    pub dns_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub tls_addr: SocketAddr,
    pub shutdown_addr: SocketAddr,
    pub challenge_polling: ChallengePolling,
    pub order_polling: OrderPolling,
    /// How long each service gets to stop before it is aborted.
    pub drain_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            directory_url: DirectoryUrl::Pebble.to_url().to_string(),
            challenge: ChallengeType::Dns01,
            domains: vec![],
            contact: vec![],
            record: Ipv4Addr::LOCALHOST,
            revoke: false,
            trust_anchors: None,
            save_dir: None,
            dns_addr: SocketAddr::from(([0, 0, 0, 0], 10053)),
            http_addr: SocketAddr::from(([0, 0, 0, 0], 5002)),
            tls_addr: SocketAddr::from(([0, 0, 0, 0], 5001)),
            shutdown_addr: SocketAddr::from(([0, 0, 0, 0], 5003)),
            challenge_polling: ChallengePolling::default(),
            order_polling: OrderPolling::default(),
            drain_timeout: Duration::from_secs(5),
        }
    }
}
