//! P-256 keys and ES256 signatures.
//!
//! ACME verifiers expect the raw JWS signature layout: the two 32 byte
//! big-endian scalars `r` and `s`, zero padded and concatenated. That is
//! what [`sign`] produces, not the ASN.1 structure openssl emits by default.
use lazy_static::lazy_static;
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{Asn1Flag, EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::nid::Nid;
use openssl::pkey::{self, PKey};
use openssl::sha::sha256;

use crate::util::{base64url, base64url_decode};
use crate::Result;

/// Byte length of a P-256 scalar/coordinate.
const P256_LEN: i32 = 32;

lazy_static! {
    pub(crate) static ref EC_GROUP_P256: EcGroup = ec_group(Nid::X9_62_PRIME256V1);
}

fn ec_group(nid: Nid) -> EcGroup {
    let mut g = EcGroup::from_curve_name(nid).expect("EcGroup");
    // this is required for openssl 1.0.x (but not 1.1.x)
    g.set_asn1_flag(Asn1Flag::NAMED_CURVE);
    g
}

/// A P-256 private key (from which the public key is derived).
///
/// Used both for the ACME account and for the issued certificate.
#[derive(Clone, Debug)]
pub struct KeyPair {
    key: EcKey<pkey::Private>,
}

impl KeyPair {
    /// Draw a fresh key. Failure means the entropy source or openssl is broken.
    pub fn generate() -> Result<KeyPair> {
        let key = EcKey::generate(&EC_GROUP_P256)?;
        Ok(KeyPair { key })
    }

    /// Read a PEM encoded EC private key (PKCS#8 or SEC1).
    pub fn from_pem(pem: &[u8]) -> Result<KeyPair> {
        let pkey = PKey::private_key_from_pem(pem)?;
        let key = pkey.ec_key()?;
        if key.group().curve_name() != Some(Nid::X9_62_PRIME256V1) {
            return Err("Not a P-256 key".into());
        }
        Ok(KeyPair { key })
    }

    /// The private key as PKCS#8 PEM.
    pub fn to_pem(&self) -> Result<String> {
        let pem = self.to_pkey()?.private_key_to_pem_pkcs8()?;
        Ok(String::from_utf8_lossy(&pem).into_owned())
    }

    /// The public half of the key.
    pub fn public_key(&self) -> Result<PublicKey> {
        let key = EcKey::from_public_key(&EC_GROUP_P256, self.key.public_key())?;
        Ok(PublicKey { key })
    }

    /// Affine `(x, y)` coordinates of the public key, each padded to 32 bytes.
    pub fn coordinates(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut ctx = BigNumContext::new()?;
        let mut x = BigNum::new()?;
        let mut y = BigNum::new()?;
        self.key
            .public_key()
            .affine_coordinates_gfp(&EC_GROUP_P256, &mut x, &mut y, &mut ctx)?;
        Ok((x.to_vec_padded(P256_LEN)?, y.to_vec_padded(P256_LEN)?))
    }

    pub(crate) fn to_pkey(&self) -> Result<PKey<pkey::Private>> {
        Ok(PKey::from_ec_key(self.key.clone())?)
    }
}

/// Public P-256 key, used to check signatures.
#[derive(Clone, Debug)]
pub struct PublicKey {
    key: EcKey<pkey::Public>,
}

impl PublicKey {
    /// Rebuild a public key from raw affine coordinates, as found in a JWK.
    pub fn from_coordinates(x: &[u8], y: &[u8]) -> Result<PublicKey> {
        let x = BigNum::from_slice(x)?;
        let y = BigNum::from_slice(y)?;
        let key = EcKey::from_public_key_affine_coordinates(&EC_GROUP_P256, &x, &y)?;
        key.check_key()?;
        Ok(PublicKey { key })
    }
}

/// Sign `message` with ES256, returning the base64url (unpadded) raw signature.
pub fn sign(key: &KeyPair, message: &[u8]) -> Result<String> {
    let digest = sha256(message);
    let sig = EcdsaSig::sign(&digest, &key.key)?;
    let r = sig.r().to_vec_padded(P256_LEN)?;
    let s = sig.s().to_vec_padded(P256_LEN)?;

    let mut v = Vec::with_capacity(r.len() + s.len());
    v.extend_from_slice(&r);
    v.extend_from_slice(&s);
    Ok(base64url(&v))
}

/// Check an ES256 signature as produced by [`sign`].
///
/// A signature that is not valid base64url, or not exactly 64 bytes, is
/// reported as `false` rather than an error.
pub fn verify(key: &PublicKey, message: &[u8], signature: &str) -> Result<bool> {
    let raw = match base64url_decode(signature) {
        Ok(raw) => raw,
        Err(_) => return Ok(false),
    };
    if raw.len() != 2 * P256_LEN as usize {
        return Ok(false);
    }
    let (r, s) = raw.split_at(P256_LEN as usize);
    let sig = EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?;
    let digest = sha256(message);
    Ok(sig.verify(&digest, &key.key)?)
}
