//
use std::sync::Arc;

use crate::api::{ApiAccount, ApiDirectory, ApiIdentifier, ApiNewOrder, ApiOrder, ApiRevocation};
use crate::cert::Certificate;
use crate::jws::{key_authorization, thumbprint};
use crate::order::{NewOrder, Order};
use crate::trans::Transport;
use crate::util::{base64url, read_json};
use crate::Result;

#[derive(Debug)]
pub(crate) struct AccountInner {
    pub transport: Transport,
    pub api_account: ApiAccount,
    pub api_directory: ApiDirectory,
}

/// Account with an ACME provider.
///
/// Accounts are created using [`Directory::account`] and consist of a P-256
/// private key for signing requests to the ACME API, plus the key id
/// (account URL) the server assigned to it.
///
/// The account key has nothing to do with the key of the issued
/// certificate, which is generated fresh for every order.
///
/// [`Directory::account`]: struct.Directory.html#method.account
#[derive(Clone, Debug)]
pub struct Account {
    inner: Arc<AccountInner>,
}

impl Account {
    pub(crate) fn new(
        transport: Transport,
        api_account: ApiAccount,
        api_directory: ApiDirectory,
    ) -> Self {
        Account {
            inner: Arc::new(AccountInner {
                transport,
                api_account,
                api_directory,
            }),
        }
    }

    /// Private key for this account, as PKCS#8 PEM.
    pub fn acme_private_key_pem(&self) -> Result<String> {
        self.inner.transport.session().key().to_pem()
    }

    /// The account URL, used as `kid` in every signed request.
    pub fn key_id(&self) -> Result<&str> {
        self.inner.transport.session().key_id()
    }

    /// JWK thumbprint of the account key.
    pub fn thumbprint(&self) -> Result<String> {
        thumbprint(self.inner.transport.session().key())
    }

    /// The key authorization for a challenge `token`.
    pub fn key_authorization(&self, token: &str) -> Result<String> {
        key_authorization(token, self.inner.transport.session().key())
    }

    /// Create a new order to issue a certificate for this account.
    ///
    /// The first domain will be set as the certificate's `CN`, and every
    /// domain ends up among the alt names.
    ///
    /// Every call creates a new order with the ACME API provider, even when the domain
    /// names supplied are exactly the same.
    pub fn new_order(&self, domains: &[&str]) -> Result<NewOrder> {
        if domains.is_empty() {
            return Err("An order needs at least one domain".into());
        }
        let order = ApiNewOrder {
            identifiers: domains.iter().map(|d| ApiIdentifier::dns(d)).collect(),
        };

        let new_order_url = &self.inner.api_directory.newOrder;

        let res = self.inner.transport.call(new_order_url, &order)?;
        let order_url = res.location()?.to_string();
        debug!("Order url is: {}", order_url);
        let api_order: ApiOrder = read_json(res)?;

        let domains = domains.iter().map(|d| d.to_string()).collect();
        let order = Order::new(&self.inner, api_order, order_url, domains);
        Ok(NewOrder { order })
    }

    /// Revoke a previously issued certificate, optionally with a RFC 5280
    /// reason code.
    pub fn revoke_certificate(&self, cert: &Certificate, reason: Option<usize>) -> Result<()> {
        let revoc = ApiRevocation {
            certificate: base64url(&cert.certificate_der()?),
            reason,
        };
        let url = &self.inner.api_directory.revokeCert;
        self.inner.transport.call(url, &revoc)?;
        Ok(())
    }

    /// Access the underlying JSON object for debugging.
    pub fn api_account(&self) -> &ApiAccount {
        &self.inner.api_account
    }
}
