//
use crate::acc::Account;
use crate::api::{ApiAccount, ApiDirectory};
use crate::crypto::KeyPair;
use crate::req::{new_agent, req_get};
use crate::session::SessionState;
use crate::tls::TrustAnchors;
use crate::trans::Transport;
use crate::util::read_json;
use crate::Result;

const LETSENCRYPT: &str = "https://acme-v02.api.letsencrypt.org/directory";
const LETSENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";
const PEBBLE: &str = "https://localhost:14000/dir";

/// Enumeration of known ACME API directories.
#[derive(Debug, Clone)]
pub enum DirectoryUrl<'a> {
    /// The main Let's Encrypt directory. Not appropriate for testing and dev.
    LetsEncrypt,
    /// The staging Let's Encrypt directory. Use for testing and dev. Doesn't issue
    /// "valid" certificates. The root signing certificate is not supposed
    /// to be in any trust chains.
    LetsEncryptStaging,
    /// A local [pebble] test server on its default port. Needs the pebble
    /// root as trust anchor.
    ///
    /// [pebble]: https://github.com/letsencrypt/pebble
    Pebble,
    /// Provide an arbitrary director URL to connect to.
    Other(&'a str),
}

impl<'a> DirectoryUrl<'a> {
    pub fn to_url(&self) -> &str {
        match self {
            DirectoryUrl::LetsEncrypt => LETSENCRYPT,
            DirectoryUrl::LetsEncryptStaging => LETSENCRYPT_STAGING,
            DirectoryUrl::Pebble => PEBBLE,
            DirectoryUrl::Other(s) => s,
        }
    }
}

/// Entry point for accessing an ACME API.
#[derive(Clone, Debug)]
pub struct Directory {
    agent: ureq::Agent,
    trust_anchors: TrustAnchors,
    api_directory: ApiDirectory,
}

impl Directory {
    /// Fetch the directory document. Any failure here is fatal, there is
    /// nothing to talk to without it.
    pub fn from_url(url: DirectoryUrl, trust_anchors: TrustAnchors) -> Result<Directory> {
        let agent = new_agent(&trust_anchors)?;
        let dir_url = url.to_url();
        debug!("Fetch directory {}", dir_url);
        let res = req_get(&agent, dir_url)?.handle_errors()?;
        let api_directory: ApiDirectory = read_json(res)?;
        Ok(Directory {
            agent,
            trust_anchors,
            api_directory,
        })
    }

    /// Get a fresh nonce from `newNonce`, used to seed a session.
    pub fn new_nonce(&self) -> Result<String> {
        debug!("Request new nonce");
        let res = req_get(&self.agent, &self.api_directory.newNonce)?.handle_errors()?;
        Ok(res.nonce()?.to_string())
    }

    /// Register a new account under a freshly generated key, without contacts.
    ///
    /// This is the same as calling `account_with_contact(vec![])`.
    pub fn account(&self) -> Result<Account> {
        self.account_with_contact(vec![])
    }

    /// Register a new account with contact URLs such as `mailto:admin@example.com`.
    pub fn account_with_contact(&self, contact: Vec<String>) -> Result<Account> {
        debug!("Create new acme account key");
        let key = KeyPair::generate()?;
        self.account_with_key(key, contact)
    }

    /// Access an account using an existing key.
    ///
    /// The `newAccount` API endpoint is called either way. For an existing
    /// key the server answers with the account it already has, and the
    /// `Location` header is the key id (kid) all the same.
    pub fn account_with_key(&self, key: KeyPair, contact: Vec<String>) -> Result<Account> {
        let nonce = self.new_nonce()?;
        let session = SessionState::new(&nonce, key, self.trust_anchors.clone())?;
        let transport = Transport::new(self.agent.clone(), session);

        let acc = ApiAccount {
            contact,
            termsOfServiceAgreed: Some(true),
            ..Default::default()
        };

        let res = transport.call_jwk(&self.api_directory.newAccount, &acc)?;
        let kid = res.location()?.to_string();
        debug!("Key id is: {}", kid);
        // fill in the server returned key id
        transport.session().set_key_id(&kid)?;

        let api_account: ApiAccount = read_json(res)?;

        Ok(Account::new(
            transport,
            api_account,
            self.api_directory.clone(),
        ))
    }

    /// Access the underlying JSON object for debugging.
    pub fn api_directory(&self) -> &ApiDirectory {
        &self.api_directory
    }
}
