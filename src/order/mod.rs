//! Order life cycle.
//!
//! An order goes through a life cycle of different states that require various actions by
//! the user. To ensure the user only use appropriate actions, this library have simple façade
//! structs that wraps the actual [`ApiOrder`].
//!
//! 1. First prove ownership:
//!    * [`NewOrder`] -> [`Auth`]* -> [`Challenge`]
//! 2. Then submit CSR and download the cert.
//!    * [`NewOrder`] -> [`CsrOrder`] -> [`CertOrder`]
//!
//! \* Possibly multiple auths.
//!
//! [`ApiOrder`]: ../api/struct.ApiOrder.html
//! [`NewOrder`]: struct.NewOrder.html
//! [`Auth`]: struct.Auth.html
//! [`Challenge`]: struct.Challenge.html
//! [`CsrOrder`]: struct.CsrOrder.html
//! [`CertOrder`]: struct.CertOrder.html
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::acc::AccountInner;
use crate::api::{ApiAuth, ApiFinalize, ApiOrder};
use crate::cert::{create_csr, Certificate};
use crate::config::OrderPolling;
use crate::crypto::KeyPair;
use crate::util::{base64url, read_json};
use crate::{Error, Result};

mod auth;

pub use self::auth::{Auth, Challenge, ChallengeType};

/// The order wrapped with an outer façade.
#[derive(Debug)]
pub(crate) struct Order {
    inner: Arc<AccountInner>,
    api_order: ApiOrder,
    url: String,
    /// The domains as requested, in order. The CSR is made from these, not
    /// from whatever identifiers the server echoes back.
    domains: Vec<String>,
}

impl Order {
    pub(crate) fn new(
        inner: &Arc<AccountInner>,
        api_order: ApiOrder,
        url: String,
        domains: Vec<String>,
    ) -> Self {
        Order {
            inner: inner.clone(),
            api_order,
            url,
            domains,
        }
    }

    /// Refresh the order status (POST-as-GET).
    fn refresh(&self) -> Result<Order> {
        let res = self.inner.transport.call_empty(&self.url)?;
        let api_order: ApiOrder = read_json(res)?;
        Ok(Order {
            inner: self.inner.clone(),
            api_order,
            url: self.url.clone(),
            domains: self.domains.clone(),
        })
    }
}

/// A new order created by [`Account::new_order`].
///
/// All domains in the order must have authorizations ([confirmed ownership])
/// before the order can progress to submitting a [CSR].
///
/// The ACME API provider might "remember" for a time that you already own a domain, which
/// means you might not need to prove the ownership every time. See [`Auth::need_challenge`].
///
/// [`Account::new_order`]: ../struct.Account.html#method.new_order
/// [confirmed ownership]: ../index.html#domain-ownership
/// [CSR]: https://en.wikipedia.org/wiki/Certificate_signing_request
/// [`Auth::need_challenge`]: struct.Auth.html#method.need_challenge
#[derive(Debug)]
pub struct NewOrder {
    pub(crate) order: Order,
}

impl NewOrder {
    /// Tell if the domains in this order have been authorized.
    ///
    /// This doesn't do any calls against the API. You must manually call [`refresh`].
    ///
    /// In ACME API terms, the order can either be `ready` or `valid`, which both would
    /// mean we have passed the authorization stage.
    ///
    /// [`refresh`]: struct.NewOrder.html#method.refresh
    pub fn is_validated(&self) -> bool {
        self.order.api_order.is_status_ready() || self.order.api_order.is_status_valid()
    }

    /// Refresh the order state against the ACME API.
    ///
    /// The specification calls this a "POST-as-GET" against the order URL.
    pub fn refresh(&mut self) -> Result<()> {
        self.order = self.order.refresh()?;
        Ok(())
    }

    /// Provide the authorizations, one per domain of the order. Each is
    /// fetched with a POST-as-GET.
    ///
    /// If the order includes new domain names that have not been authorized before, this
    /// list might contain a mix of already valid and not yet valid auths.
    pub fn authorizations(&self) -> Result<Vec<Auth>> {
        let mut result = vec![];
        for auth_url in &self.order.api_order.authorizations {
            let res = self.order.inner.transport.call_empty(auth_url)?;
            let api_auth: ApiAuth = read_json(res)?;
            result.push(Auth::new(&self.order.inner, api_auth, auth_url));
        }
        Ok(result)
    }

    /// Move on to CSR submission once the challenges have been answered.
    ///
    /// No status check is made here. If some authorization is still
    /// outstanding, the API rejects the [`finalize`] call.
    ///
    /// [`finalize`]: struct.CsrOrder.html#method.finalize
    pub fn into_csr_order(self) -> CsrOrder {
        CsrOrder { order: self.order }
    }

    /// The domains this order was created for, first one being the `CN`.
    pub fn domains(&self) -> &[String] {
        &self.order.domains
    }

    /// The order URL from the `Location` header of the order creation.
    pub fn url(&self) -> &str {
        &self.order.url
    }

    /// Access the underlying JSON object for debugging.
    pub fn api_order(&self) -> &ApiOrder {
        &self.order.api_order
    }
}

/// An order that is ready for a [CSR] submission.
///
/// To submit the CSR is called "finalizing" the order.
///
/// [CSR]: https://en.wikipedia.org/wiki/Certificate_signing_request
#[derive(Debug)]
pub struct CsrOrder {
    pub(crate) order: Order,
}

impl CsrOrder {
    /// Finalize the order with a CSR signed by `cert_key`, the key of the
    /// certificate to be.
    ///
    /// Once the CSR has been submitted, the order goes into a `processing` status,
    /// where we poll according to `polling` until it is `valid`.
    pub fn finalize(self, cert_key: KeyPair, polling: &OrderPolling) -> Result<CertOrder> {
        //
        // the domains as requested, first one is the CN.
        let domains: Vec<&str> = self.order.domains.iter().map(|d| d.as_str()).collect();

        // csr from private key and requested domains.
        let csr = create_csr(&cert_key, &domains)?;

        // this is not the same as PEM.
        let csr_der = csr.to_der()?;
        let finalize = ApiFinalize {
            csr: base64url(&csr_der),
        };

        // if the CSR is invalid, we will get a 4xx code back that
        // bombs out from this call.
        let finalize_url = &self.order.api_order.finalize;
        self.order.inner.transport.call(finalize_url, &finalize)?;

        let order = wait_for_order_valid(&self.order, polling)?;

        Ok(CertOrder {
            private_key: cert_key,
            order,
        })
    }

    /// Access the underlying JSON object for debugging.
    pub fn api_order(&self) -> &ApiOrder {
        &self.order.api_order
    }
}

/// Poll until `valid`, backing off exponentially.
///
/// `invalid` is a hard error with the problem the server attached to the
/// order. Running out of time is an `Error::Timeout`. A deadline too far
/// out to be represented means no deadline.
fn wait_for_order_valid(order: &Order, polling: &OrderPolling) -> Result<Order> {
    let url = &order.url;
    let deadline = Instant::now().checked_add(polling.deadline);
    let mut delay = polling.initial;
    loop {
        let current = order.refresh()?;
        let api_order = &current.api_order;

        if api_order.is_status_valid() {
            return Ok(current);
        }
        if api_order.is_status_invalid() {
            return Err(match &api_order.error {
                Some(problem) => Error::Api(problem.clone()),
                None => format!("Order is invalid: {}", url).into(),
            });
        }

        let now = Instant::now();
        let sleep = match deadline {
            Some(deadline) if now >= deadline => {
                return Err(Error::Timeout(format!(
                    "order {} still in status {:?} after {:?}",
                    url, api_order.status, polling.deadline
                )));
            }
            Some(deadline) => delay.min(deadline - now),
            None => delay,
        };
        debug!("Order status {:?}, poll again in {:?}", api_order.status, sleep);
        thread::sleep(sleep);
        delay = delay.saturating_mul(2).min(polling.max);
    }
}

/// Order for an issued certificate that is ready to download.
#[derive(Debug)]
pub struct CertOrder {
    private_key: KeyPair,
    order: Order,
}

impl CertOrder {
    /// Request download of the issued certificate.
    ///
    /// The chain is returned exactly as the server sent it, together with
    /// the private key used for the CSR.
    pub fn download_cert(self) -> Result<Certificate> {
        let url = self
            .order
            .api_order
            .certificate
            .as_deref()
            .ok_or_else(|| Error::Protocol("Valid order without certificate url".into()))?;

        let res = self.order.inner.transport.call_empty(url)?;
        let cert = res.into_body();
        let pkey_pem = self.private_key.to_pem()?;

        Ok(Certificate::new(pkey_pem, cert))
    }

    /// Access the underlying JSON object for debugging.
    pub fn api_order(&self) -> &ApiOrder {
        &self.order.api_order
    }
}
