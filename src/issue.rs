//! One complete certificate issuance.
use crate::cert::Certificate;
use crate::config::Config;
use crate::crypto::KeyPair;
use crate::dir::{Directory, DirectoryUrl};
use crate::order::ChallengeType;
use crate::persist::FilePersist;
use crate::responder::TokenSender;
use crate::tls::TrustAnchors;
use crate::{Error, Result};

/// Where the proofs for each challenge type go.
#[derive(Clone, Debug, Default)]
pub struct ChallengeSinks {
    pub dns: Option<TokenSender>,
    pub http: Option<TokenSender>,
}

impl ChallengeSinks {
    fn sender(&self, challenge_type: ChallengeType) -> Option<&TokenSender> {
        match challenge_type {
            ChallengeType::Dns01 => self.dns.as_ref(),
            ChallengeType::Http01 => self.http.as_ref(),
        }
    }
}

/// Drives an order from directory lookup to downloaded certificate.
///
/// Runs on the calling thread and blocks for every exchange with the API,
/// so it must not be run from within the async runtime. The responders it
/// hands proofs to run on that runtime.
#[derive(Debug)]
pub struct Issuer {
    config: Config,
    trust_anchors: TrustAnchors,
    sinks: ChallengeSinks,
    account_key: Option<KeyPair>,
}

impl Issuer {
    pub fn new(config: Config, trust_anchors: TrustAnchors, sinks: ChallengeSinks) -> Self {
        Issuer {
            config,
            trust_anchors,
            sinks,
            account_key: None,
        }
    }

    /// Use an existing account key instead of a fresh one.
    pub fn with_account_key(mut self, key: KeyPair) -> Self {
        self.account_key = Some(key);
        self
    }

    pub fn run(self) -> Result<Certificate> {
        let config = &self.config;
        if config.domains.is_empty() {
            return Err("No domain to issue a certificate for".into());
        }
        let sink = self.sinks.sender(config.challenge).ok_or_else(|| {
            Error::Other(format!("No responder for {} challenges", config.challenge))
        })?;

        let url = DirectoryUrl::Other(&config.directory_url);
        info!("Using directory {}", url.to_url());
        let dir = Directory::from_url(url, self.trust_anchors.clone())?;

        let acc = match self.account_key.clone() {
            Some(key) => dir.account_with_key(key, config.contact.clone())?,
            None => dir.account_with_contact(config.contact.clone())?,
        };
        info!("Account {}", acc.key_id()?);

        let domains: Vec<&str> = config.domains.iter().map(|d| d.as_str()).collect();
        let ord_new = acc.new_order(&domains)?;
        info!("Order {} for {:?}", ord_new.url(), domains);

        for auth in ord_new.authorizations()? {
            if !auth.need_challenge() {
                debug!("{} is already authorized", auth.domain_name());
                continue;
            }
            let chall = match auth.challenge(config.challenge) {
                Some(chall) => chall,
                None => {
                    warn!(
                        "No {} challenge offered for {}, skipping",
                        config.challenge,
                        auth.domain_name()
                    );
                    continue;
                }
            };
            sink.publish(chall.proof()?)?;
            info!("Validate {} for {}", config.challenge, auth.domain_name());
            chall.validate(&config.challenge_polling)?;
        }

        let ord_csr = ord_new.into_csr_order();
        let ord_cert = ord_csr.finalize(KeyPair::generate()?, &config.order_polling)?;
        info!("Order is valid, downloading certificate");
        let cert = ord_cert.download_cert()?;

        if config.revoke {
            acc.revoke_certificate(&cert, None)?;
            info!("Certificate revoked");
        }

        if let Some(dir) = &config.save_dir {
            cert.save(&FilePersist::new(dir), domains[0])?;
            info!("Certificate saved to {}", dir.display());
        }

        Ok(cert)
    }
}
