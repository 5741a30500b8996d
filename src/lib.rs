#![warn(clippy::all)]
//! acme-challenger is an ACME (Automatic Certificate Management Environment) client that
//! answers its own domain validation challenges.
//!
//! It talks ACME v2 ([RFC 8555]) to a CA such as [Let's Encrypt](https://letsencrypt.org/)
//! or a local [pebble], and runs the servers the CA validates against: a DNS server for
//! `dns-01` and an HTTP server for `http-01`. Once issued, the certificate is presented on
//! a TLS listener, and the whole thing stops on `GET /shutdown`.
//!
//! [RFC 8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [pebble]: https://github.com/letsencrypt/pebble
//!
//! # Quick start
//!
//! Without the bundled responders, the library is driven step by step:
//!
//! ```no_run
//! use acme_challenger::{ChallengePolling, Directory, DirectoryUrl, Error, OrderPolling};
//! use acme_challenger::{ChallengeType, KeyPair, TrustAnchors};
//!
//! fn request_cert() -> Result<(), Error> {
//!
//! // Use DirectoryUrl::LetsEncryptStaging for dev/testing.
//! let url = DirectoryUrl::LetsEncrypt;
//!
//! // Fetch the directory. An empty set of trust anchors means the
//! // default web roots.
//! let dir = Directory::from_url(url, TrustAnchors::default())?;
//!
//! // Register an account under a fresh key.
//! let acc = dir.account_with_contact(vec!["mailto:foo@bar.com".into()])?;
//!
//! // Create a new order to get a TLS certificate for a domain.
//! let ord_new = acc.new_order(&["myfancydomain.com"])?;
//!
//! // One authorization per domain. The ACME API provider might
//! // remember a previous proof, then there is nothing to do.
//! for auth in ord_new.authorizations()? {
//!     if !auth.need_challenge() {
//!         continue;
//!     }
//!     let chall = auth.challenge(ChallengeType::Http01).ok_or("no http-01")?;
//!
//!     // The proof must be served under
//!     // http://myfancydomain.com/.well-known/acme-challenge/<token>
//!     let _token = chall.token();
//!     let _proof = chall.proof()?;
//!     // update_my_web_server(_token, &_proof);
//!
//!     // Tell the API to check and poll until it has.
//!     chall.validate(&ChallengePolling::default())?;
//! }
//!
//! // Submit a CSR for a fresh key and wait for the order to be valid.
//! let ord_csr = ord_new.into_csr_order();
//! let ord_cert = ord_csr.finalize(KeyPair::generate()?, &OrderPolling::default())?;
//!
//! let cert = ord_cert.download_cert()?;
//! println!("{} days left", cert.valid_days_left()?);
//!
//! Ok(())
//! }
//! ```
//!
//! [`Issuer`] does the same in one go, handing the proofs to a [`DnsResponder`] or
//! [`HttpResponder`] over a [`token_channel`].
//!
//! [`Issuer`]: struct.Issuer.html
//! [`DnsResponder`]: responder/struct.DnsResponder.html
//! [`HttpResponder`]: responder/struct.HttpResponder.html
//! [`token_channel`]: responder/fn.token_channel.html
//!
//! ## Domain ownership
//!
//! For `http-01` the CA fetches the key authorization, `<token>.<account key thumbprint>`,
//! over plain HTTP. For `dns-01` it looks up the base64url SHA-256 of the key authorization
//! as a `TXT` record under `_acme-challenge.<domain>`. See [`Challenge::proof`].
//!
//! [`Challenge::proof`]: order/struct.Challenge.html#method.proof
//!
//! ## Polling
//!
//! Challenges are polled a fixed number of times ([`ChallengePolling`]), orders with
//! exponential backoff up to a deadline ([`OrderPolling`]). Let's Encrypt has
//! [rate limits], so don't make them too eager, and use the staging environment
//! for development.
//!
//! [`ChallengePolling`]: struct.ChallengePolling.html
//! [`OrderPolling`]: struct.OrderPolling.html
//! [rate limits]: https://letsencrypt.org/docs/rate-limits/
//!
//! ## Implementation details
//!
//! The ACME side is synchronous and blocking ([ureq]). The responders, the certificate
//! server and the shutdown listener are tokio tasks. Keys, signatures and CSRs come from
//! the [openssl](https://docs.rs/openssl/) crate.
//!
//! [ureq]: https://docs.rs/ureq/
#[macro_use]
extern crate log;

mod acc;
mod cert;
mod dir;
mod error;
mod issue;
mod req;
mod session;
mod trans;
mod util;

pub mod api;
pub mod config;
pub mod crypto;
pub mod jws;
pub mod order;
pub mod persist;
pub mod present;
pub mod responder;
pub mod shutdown;
pub mod tls;

#[cfg(test)]
mod test;

pub use crate::acc::Account;
pub use crate::cert::Certificate;
pub use crate::config::{ChallengePolling, Config, Exhaustion, OrderPolling};
pub use crate::crypto::KeyPair;
pub use crate::dir::{Directory, DirectoryUrl};
pub use crate::error::{Error, Result};
pub use crate::issue::{ChallengeSinks, Issuer};
pub use crate::order::ChallengeType;
pub use crate::session::SessionState;
pub use crate::tls::TrustAnchors;
