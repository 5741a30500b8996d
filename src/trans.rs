use serde::Serialize;

use crate::jws::SignedEnvelope;
use crate::req::{req_post, Reply};
use crate::session::SessionState;
use crate::Result;

/// Number of times a request rejected for a stale nonce is re-signed and sent again.
const BAD_NONCE_RETRIES: usize = 3;

/// JWS payload and nonce handling for requests to the API.
///
/// Setup is:
///
/// 1. `Transport::new()` with a session seeded from `newNonce`.
/// 2. `call_jwk()` against newAccount url
/// 3. `set_key_id` on the session from the returned `Location` header.
/// 4. `call()`/`call_empty()` for all calls after that.
///
/// Every response rotates the session nonce. A successful response without
/// a `Replay-Nonce` is a protocol error: the session can't sign anything
/// after it.
#[derive(Debug)]
pub(crate) struct Transport {
    agent: ureq::Agent,
    session: SessionState,
}

impl Transport {
    pub fn new(agent: ureq::Agent, session: SessionState) -> Self {
        Transport { agent, session }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Make call using the full jwk. Only for the first newAccount request.
    pub fn call_jwk<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Reply> {
        let payload = serde_json::to_vec(body)?;
        self.do_call(url, &payload, false)
    }

    /// Make call using the key id
    pub fn call<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Reply> {
        let payload = serde_json::to_vec(body)?;
        self.do_call(url, &payload, true)
    }

    /// POST-as-GET, i.e. a key id signed call with an empty payload.
    pub fn call_empty(&self, url: &str) -> Result<Reply> {
        self.do_call(url, b"", true)
    }

    fn do_call(&self, url: &str, payload: &[u8], with_kid: bool) -> Result<Reply> {
        let mut retries = 0;
        // The ACME API may at any point invalidate all nonces. If we detect such an
        // error, we retry with the nonce of the error response.
        loop {
            let nonce = self.session.current_token();
            let kid = if with_kid {
                Some(self.session.key_id()?)
            } else {
                None
            };

            let envelope = SignedEnvelope::new(&nonce, url, self.session.key(), payload, kid)?;

            debug!("Call endpoint {}", url);
            let response = req_post(&self.agent, url, &envelope.to_json()?)?;

            // Regardless of the request being a success or not, there might be
            // a nonce in the response.
            let has_nonce = response.has_nonce();
            if has_nonce {
                self.session.set_token(response.nonce()?)?;
            }

            match response.handle_errors() {
                Ok(res) => {
                    if !has_nonce {
                        // the nonce is required on success
                        res.nonce()?;
                    }
                    return Ok(res);
                }
                Err(problem) => {
                    if problem.is_bad_nonce() && has_nonce && retries < BAD_NONCE_RETRIES {
                        retries += 1;
                        debug!("Retrying on bad nonce ({}/{})", retries, BAD_NONCE_RETRIES);
                        continue;
                    }
                    return Err(problem.into());
                }
            }
        }
    }
}
