use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::stack::Stack;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509Req, X509ReqBuilder, X509};

use crate::crypto::KeyPair;
use crate::persist::{Persist, PersistKey, PersistKind};
use crate::Result;

/// PKCS#10 request for `domains`, the first one being the `CN`. All of them,
/// the first included, go into the subject alternative names.
pub(crate) fn create_csr(key: &KeyPair, domains: &[&str]) -> Result<X509Req> {
    let primary = domains.first().ok_or("CSR needs at least one domain")?;
    let pkey = key.to_pkey()?;

    //
    // the csr builder
    let mut req_bld = X509ReqBuilder::new()?;

    // set private/public key in builder
    req_bld.set_pubkey(&pkey)?;

    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_nid(Nid::COMMONNAME, primary)?;
    req_bld.set_subject_name(&name.build())?;

    // set all domains as alt names
    let mut stack = Stack::new()?;
    let ctx = req_bld.x509v3_context(None);
    let mut an = SubjectAlternativeName::new();
    for domain in domains {
        an.dns(domain);
    }
    let ext = an.build(&ctx)?;
    stack.push(ext)?;
    req_bld.add_extensions(&stack)?;

    // sign it
    req_bld.sign(&pkey, MessageDigest::sha256())?;

    // the csr
    Ok(req_bld.build())
}

/// Encapsulated certificate and private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    private_key: String,
    certificate: String,
}

impl Certificate {
    /// Create Certificate from `String/&str` key and certificate
    /// useful when reading files manually from disk.
    ///
    /// NOTE: keys and certs should be PEM encoded
    pub fn new(private_key: impl Into<String>, certificate: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            certificate: certificate.into(),
        }
    }

    /// The PEM encoded private key.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// The private key as DER.
    pub fn private_key_der(&self) -> Result<Vec<u8>> {
        let pkey = PKey::private_key_from_pem(self.private_key.as_bytes())?;
        Ok(pkey.private_key_to_der()?)
    }

    /// The PEM encoded certificate chain, exactly as downloaded.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    /// The leaf certificate (first block of the chain) as DER.
    pub fn certificate_der(&self) -> Result<Vec<u8>> {
        let x509 = X509::from_pem(self.certificate.as_bytes())?;
        Ok(x509.to_der()?)
    }

    /// Inspect the certificate to count the number of (whole) valid days left.
    ///
    /// It's up to the ACME API provider to decide how long an issued certificate is valid.
    /// Let's Encrypt sets the validity to 90 days. This function reports 89 days for newly
    /// issued cert, since it counts _whole_ days.
    ///
    /// It is possible to get negative days for an expired certificate.
    pub fn valid_days_left(&self) -> Result<i64> {
        let x509 = X509::from_pem(self.certificate.as_bytes())?;
        let now = Asn1Time::days_from_now(0)?;
        let diff = now.diff(x509.not_after())?;
        Ok(diff.days as i64)
    }

    /// Write `<primary_name>.crt` and `<primary_name>.key`.
    pub fn save<P: Persist>(&self, persist: &P, primary_name: &str) -> Result<()> {
        let pk_key = PersistKey::new(PersistKind::PrivateKey, primary_name);
        debug!("Save private key: {}", pk_key);
        persist.put(&pk_key, self.private_key.as_bytes())?;

        let pk_crt = PersistKey::new(PersistKind::Certificate, primary_name);
        debug!("Save certificate: {}", pk_crt);
        persist.put(&pk_crt, self.certificate.as_bytes())?;
        Ok(())
    }

    /// Read a certificate saved by [`save`].
    ///
    /// [`save`]: struct.Certificate.html#method.save
    pub fn load<P: Persist>(persist: &P, primary_name: &str) -> Result<Option<Certificate>> {
        let pk_key = PersistKey::new(PersistKind::PrivateKey, primary_name);
        let private_key = persist
            .get(&pk_key)?
            .and_then(|s| String::from_utf8(s).ok());

        let pk_crt = PersistKey::new(PersistKind::Certificate, primary_name);
        let certificate = persist
            .get(&pk_crt)?
            .and_then(|s| String::from_utf8(s).ok());

        Ok(match (private_key, certificate) {
            (Some(k), Some(c)) => Some(Certificate::new(k, c)),
            _ => None,
        })
    }
}
