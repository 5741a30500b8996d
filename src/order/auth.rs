//
use std::fmt;
use std::sync::Arc;
use std::thread;

use crate::acc::AccountInner;
use crate::api::{ApiAuth, ApiChallenge, ApiEmptyObject};
use crate::config::{ChallengePolling, Exhaustion};
use crate::jws::{dns_txt_value, key_authorization};
use crate::util::read_json;
use crate::{Error, Result};

/// The challenge types this client can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ChallengeType {
    /// A `TXT` record under `_acme-challenge.<domain>`.
    #[value(name = "dns01")]
    Dns01,
    /// A file under `http://<domain>/.well-known/acme-challenge/<token>`.
    #[value(name = "http01")]
    Http01,
}

impl ChallengeType {
    /// The name used by the ACME API.
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeType::Dns01 => "dns-01",
            ChallengeType::Http01 => "http-01",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An authorization ([ownership proof]) for a domain name.
///
/// Each authorization for an order much be progressed to a valid state before the ACME API
/// will issue a certificate.
///
/// Authorizations may or may not be required depending on previous orders against the same
/// ACME account. The ACME API decides if the authorization is needed.
///
/// [ownership proof]: ../index.html#domain-ownership
#[derive(Debug)]
pub struct Auth {
    inner: Arc<AccountInner>,
    api_auth: ApiAuth,
    auth_url: String,
}

impl Auth {
    pub(crate) fn new(inner: &Arc<AccountInner>, api_auth: ApiAuth, auth_url: &str) -> Self {
        Auth {
            inner: inner.clone(),
            api_auth,
            auth_url: auth_url.into(),
        }
    }

    /// Domain name for this authorization.
    pub fn domain_name(&self) -> &str {
        &self.api_auth.identifier.value
    }

    /// Whether we actually need to do the authorization. This might not be needed if we have
    /// proven ownership of the domain recently in a previous order.
    pub fn need_challenge(&self) -> bool {
        !self.api_auth.is_status_valid()
    }

    /// The challenge of the given type, if the server offers one.
    pub fn challenge(&self, challenge_type: ChallengeType) -> Option<Challenge> {
        self.api_auth
            .challenge(challenge_type.as_str())
            .map(|c| Challenge::new(&self.inner, c.clone(), challenge_type))
    }

    /// The URL this authorization was fetched from.
    pub fn url(&self) -> &str {
        &self.auth_url
    }

    /// Access the underlying JSON object for debugging. We don't
    /// refresh the authorization when the corresponding challenge is validated,
    /// so there will be no changes to see here.
    pub fn api_auth(&self) -> &ApiAuth {
        &self.api_auth
    }
}

/// A DNS or HTTP challenge as obtained from the [`Auth`].
///
/// [`Auth`]: struct.Auth.html
#[derive(Debug)]
pub struct Challenge {
    inner: Arc<AccountInner>,
    api_challenge: ApiChallenge,
    challenge_type: ChallengeType,
}

impl Challenge {
    fn new(
        inner: &Arc<AccountInner>,
        api_challenge: ApiChallenge,
        challenge_type: ChallengeType,
    ) -> Self {
        Challenge {
            inner: inner.clone(),
            api_challenge,
            challenge_type,
        }
    }

    pub fn challenge_type(&self) -> ChallengeType {
        self.challenge_type
    }

    /// The `token` is a unique identifier of the challenge. For http it is
    /// the file name under `/.well-known/acme-challenge/`.
    pub fn token(&self) -> &str {
        &self.api_challenge.token
    }

    /// `<token>.<account key thumbprint>`.
    pub fn key_authorization(&self) -> Result<String> {
        key_authorization(&self.api_challenge.token, self.inner.transport.session().key())
    }

    /// The value to publish.
    ///
    /// For http it is the key authorization itself, served as the content
    /// of the token file. For dns it is its base64url SHA-256, placed under:
    ///
    /// ```text
    /// _acme-challenge.<domain-to-be-proven>.  TXT  <proof>
    /// ```
    pub fn proof(&self) -> Result<String> {
        let key_auth = self.key_authorization()?;
        Ok(match self.challenge_type {
            ChallengeType::Dns01 => dns_txt_value(&key_auth),
            ChallengeType::Http01 => key_auth,
        })
    }

    /// Check whether this challlenge really need validation. It might already been
    /// done in a previous order for the same account.
    pub fn need_validate(&self) -> bool {
        self.api_challenge.is_status_pending()
    }

    /// Tell the ACME API to attempt validating the proof of this challenge.
    ///
    /// The proof must be published first. After the trigger we wait
    /// `polling.settle` and then poll up to `polling.attempts` times, stopping
    /// once the challenge is `valid`. If it never gets there (or is reported
    /// `invalid`) `polling.on_exhausted` decides between an error and a
    /// warning.
    pub fn validate(self, polling: &ChallengePolling) -> Result<()> {
        let url_chall = &self.api_challenge.url;
        let res = self.inner.transport.call(url_chall, &ApiEmptyObject)?;
        let _: ApiChallenge = read_json(res)?;

        thread::sleep(polling.settle);

        let chall = wait_for_challenge_status(&self.inner, url_chall, polling)?;

        if chall.is_status_valid() {
            debug!("Challenge {} is valid", url_chall);
            return Ok(());
        }

        let reason = chall
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no error given".into());

        match polling.on_exhausted {
            Exhaustion::Fail => Err(Error::ValidationNotConfirmed {
                url: url_chall.to_string(),
                status: chall.status,
            }),
            Exhaustion::Continue => {
                warn!(
                    "Challenge {} not confirmed (status: {}, {}), continuing",
                    url_chall, chall.status, reason
                );
                Ok(())
            }
        }
    }

    /// Access the underlying JSON object for debugging.
    pub fn api_challenge(&self) -> &ApiChallenge {
        &self.api_challenge
    }
}

/// Poll (POST-as-GET) until `valid` or `invalid`, at most `attempts` times.
/// Returns the last seen state.
fn wait_for_challenge_status(
    inner: &Arc<AccountInner>,
    url: &str,
    polling: &ChallengePolling,
) -> Result<ApiChallenge> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let res = inner.transport.call_empty(url)?;
        let chall: ApiChallenge = read_json(res)?;
        debug!(
            "Challenge status {} ({}/{})",
            chall.status, attempt, polling.attempts
        );
        if chall.is_status_valid() || chall.is_status_invalid() || attempt >= polling.attempts {
            return Ok(chall);
        }
        thread::sleep(polling.interval);
    }
}
