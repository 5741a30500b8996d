use std::io::Read;
use std::time::Duration;

use crate::api::ApiProblem;
use crate::tls::TrustAnchors;
use crate::{Error, Result};

pub(crate) type ReqResult<T> = std::result::Result<T, ApiProblem>;

const TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("acme-challenger/", env!("CARGO_PKG_VERSION"));

/// HTTP agent for the API, trusting `anchors` when there are any.
pub(crate) fn new_agent(anchors: &TrustAnchors) -> Result<ureq::Agent> {
    let mut builder = ureq::AgentBuilder::new()
        .timeout_connect(TIMEOUT)
        .timeout_read(TIMEOUT)
        .timeout_write(TIMEOUT)
        .user_agent(USER_AGENT);
    if let Some(config) = anchors.client_config()? {
        builder = builder.tls_config(config);
    }
    Ok(builder.build())
}

/// A fully read response. Error statuses are kept as data until
/// [`handle_errors`] is called.
///
/// [`handle_errors`]: struct.Reply.html#method.handle_errors
#[derive(Debug)]
pub(crate) struct Reply {
    status: u16,
    status_text: String,
    content_type: String,
    nonce: Option<String>,
    location: Option<String>,
    body: String,
}

impl Reply {
    fn from_response(res: ureq::Response) -> Self {
        let status = res.status();
        let status_text = res.status_text().to_string();
        let content_type = res.content_type().to_string();
        let nonce = res.header("replay-nonce").map(|s| s.to_string());
        let location = res.header("location").map(|s| s.to_string());

        let mut body = String::new();
        // letsencrypt sometimes closes the TLS abruptly causing io error
        // even though we did capture the body.
        res.into_reader().read_to_string(&mut body).ok();

        Reply {
            status,
            status_text,
            content_type,
            nonce,
            location,
            body,
        }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `Replay-Nonce` header, required on every API response.
    pub fn nonce(&self) -> Result<&str> {
        req_expect_header(&self.nonce, "replay-nonce")
    }

    /// The `Location` header, required on account and order creation.
    pub fn location(&self) -> Result<&str> {
        req_expect_header(&self.location, "location")
    }

    pub(crate) fn has_nonce(&self) -> bool {
        self.nonce.as_deref().map(|n| !n.is_empty()).unwrap_or(false)
    }

    pub fn into_body(self) -> String {
        self.body
    }

    /// Turn any non 2xx response into an [`ApiProblem`].
    ///
    /// [`ApiProblem`]: ../api/struct.ApiProblem.html
    pub fn handle_errors(self) -> ReqResult<Self> {
        // ok responses pass through
        if self.is_ok() {
            return Ok(self);
        }

        let problem = if self.content_type == "application/problem+json" {
            // if we were sent a problem+json, deserialize it
            serde_json::from_str(&self.body).unwrap_or_else(|e| ApiProblem {
                _type: "problemJsonFail".into(),
                detail: Some(format!(
                    "Failed to deserialize application/problem+json ({}) body: {}",
                    e, self.body
                )),
                subproblems: None,
            })
        } else {
            // some other problem
            let status = format!("{} {}", self.status, self.status_text);
            let detail = format!("{} body: {}", status, self.body);
            ApiProblem {
                _type: "httpReqError".into(),
                detail: Some(detail),
                subproblems: None,
            }
        };

        Err(problem)
    }
}

fn req_expect_header<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::Protocol(format!("Missing header: {}", name))),
    }
}

/// Turn a ureq outcome into a [`Reply`], keeping error statuses as data.
fn req_reply(rt: std::result::Result<ureq::Response, ureq::Error>) -> Result<Reply> {
    match rt {
        Ok(res) => Ok(Reply::from_response(res)),
        Err(ureq::Error::Status(_, res)) => Ok(Reply::from_response(res)),
        Err(ureq::Error::Transport(t)) => Err(Error::Transport(t.to_string())),
    }
}

pub(crate) fn req_get(agent: &ureq::Agent, url: &str) -> Result<Reply> {
    trace!("GET {}", url);
    let res = req_reply(agent.get(url).call())?;
    trace!("{} {:?}", url, res);
    Ok(res)
}

pub(crate) fn req_post(agent: &ureq::Agent, url: &str, body: &str) -> Result<Reply> {
    trace!("POST {} {}", url, body);
    let res = req_reply(
        agent
            .post(url)
            .set("content-type", "application/jose+json")
            .send_string(body),
    )?;
    trace!("{} {:?}", url, res);
    Ok(res)
}
