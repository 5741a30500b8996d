//
use std::fmt;
use std::io;

use crate::api::ApiProblem;

/// acme-challenger result.
pub type Result<T> = ::std::result::Result<T, Error>;

/// acme-challenger errors.
#[derive(Debug)]
pub enum Error {
    /// The ACME API answered with a problem document.
    Api(ApiProblem),
    /// The server could not be reached, or the connection broke mid exchange.
    Transport(String),
    /// The server broke the protocol contract, e.g. a required header is missing.
    Protocol(String),
    /// Base64 decoding failed.
    Base64Decode(base64::DecodeError),
    /// JSON serialization/deserialization error.
    Json(serde_json::Error),
    /// std::io error.
    Io(io::Error),
    /// Key generation, signing or certificate handling failed in openssl.
    Crypto(openssl::error::ErrorStack),
    /// TLS configuration error.
    Tls(rustls::Error),
    /// DNS message could not be parsed or encoded.
    Dns(hickory_proto::error::ProtoError),
    /// Attempt to store an empty anti-replay token.
    EmptyToken,
    /// The challenge never reached `valid` within the polling budget.
    ValidationNotConfirmed {
        /// The challenge url.
        url: String,
        /// Last status reported by the server.
        status: String,
    },
    /// A polling deadline passed without reaching the wanted status.
    Timeout(String),
    /// Some other error. Notice that `Error` is
    /// `From<String>` and `From<&str>` and it becomes `Other`.
    Other(String),
}
impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Api(p) => write!(f, "{}", p),
            Error::Transport(s) => write!(f, "transport: {}", s),
            Error::Protocol(s) => write!(f, "protocol: {}", s),
            Error::Base64Decode(e) => write!(f, "{}", e),
            Error::Json(e) => write!(f, "{}", e),
            Error::Io(e) => write!(f, "{}", e),
            Error::Crypto(e) => write!(f, "{}", e),
            Error::Tls(e) => write!(f, "{}", e),
            Error::Dns(e) => write!(f, "dns: {}", e),
            Error::EmptyToken => write!(f, "trying to set an empty anti-replay token"),
            Error::ValidationNotConfirmed { url, status } => {
                write!(f, "validation not confirmed for {} (status: {})", url, status)
            }
            Error::Timeout(s) => write!(f, "timeout: {}", s),
            Error::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<ApiProblem> for Error {
    fn from(p: ApiProblem) -> Self {
        Error::Api(p)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Base64Decode(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Error::Crypto(e)
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Error::Tls(e)
    }
}

impl From<hickory_proto::error::ProtoError> for Error {
    fn from(e: hickory_proto::error::ProtoError) -> Self {
        Error::Dns(e)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
