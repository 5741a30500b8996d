use openssl::sha::sha256;
use serde::{Deserialize, Serialize};

use crate::crypto::{sign, KeyPair};
use crate::util::base64url;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Default)]
pub(crate) struct JwsProtected {
    alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
    nonce: String,
    url: String,
}

impl JwsProtected {
    fn new_jwk(jwk: Jwk, url: &str, nonce: &str) -> Self {
        JwsProtected {
            alg: "ES256".into(),
            url: url.into(),
            nonce: nonce.into(),
            jwk: Some(jwk),
            ..Default::default()
        }
    }
    fn new_kid(kid: &str, url: &str, nonce: &str) -> Self {
        JwsProtected {
            alg: "ES256".into(),
            url: url.into(),
            nonce: nonce.into(),
            kid: Some(kid.into()),
            ..Default::default()
        }
    }
}

/// Public key descriptor of the account key.
///
/// LEXICAL ORDER OF FIELDS MATTER! The same struct serializes both the
/// `jwk` header member and the thumbprint input, which must be the
/// canonical (sorted member) JSON form.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub(crate) struct Jwk {
    pub crv: String,
    pub kty: String,
    pub x: String,
    pub y: String,
}

impl Jwk {
    pub fn of(key: &KeyPair) -> Result<Self> {
        let (x, y) = key.coordinates()?;
        Ok(Jwk {
            crv: "P-256".into(),
            kty: "EC".into(),
            x: base64url(&x),
            y: base64url(&y),
        })
    }
}

/// The signed message envelope posted to every authenticated endpoint.
///
/// All three members are unpadded base64url. Once built it is never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    protected: String,
    payload: String,
    signature: String,
}

impl SignedEnvelope {
    /// Build and sign an envelope.
    ///
    /// Without a `kid` the header carries the public key (only for the
    /// account creation call). An empty `payload` encodes to `""`, which is
    /// how the API spells a POST-as-GET.
    pub fn new(
        nonce: &str,
        url: &str,
        key: &KeyPair,
        payload: &[u8],
        kid: Option<&str>,
    ) -> Result<SignedEnvelope> {
        let protected = match kid {
            Some(kid) => JwsProtected::new_kid(kid, url, nonce),
            None => JwsProtected::new_jwk(Jwk::of(key)?, url, nonce),
        };
        let protected = {
            let pro_json = serde_json::to_string(&protected)?;
            base64url(pro_json.as_bytes())
        };
        let payload = base64url(payload);

        let to_sign = format!("{}.{}", protected, payload);
        let signature = sign(key, to_sign.as_bytes())?;

        Ok(SignedEnvelope {
            protected,
            payload,
            signature,
        })
    }

    pub fn protected(&self) -> &str {
        &self.protected
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The bytes that were signed.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.protected, self.payload)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// base64url SHA-256 of the canonical JWK of the key.
pub fn thumbprint(key: &KeyPair) -> Result<String> {
    let jwk_json = serde_json::to_string(&Jwk::of(key)?)?;
    Ok(base64url(&sha256(jwk_json.as_bytes())))
}

/// `<token>.<thumbprint>`, the value an http-01 responder serves.
pub fn key_authorization(token: &str, key: &KeyPair) -> Result<String> {
    Ok(format!("{}.{}", token, thumbprint(key)?))
}

/// The TXT record value for a dns-01 challenge.
pub fn dns_txt_value(key_authorization: &str) -> String {
    base64url(&sha256(key_authorization.as_bytes()))
}
