//! Provider request signatures
//!
//! GrooveTech signs each callback with HMAC-SHA256 over the request's
//! parameter VALUES concatenated in key order. Two quirks of the canonical
//! form:
//!
//! - `nogsgameid` sorts as if it were named `gameid`
//! - the `request` discriminator is only signed for operations whose entry in
//!   the include-request-key table is set
//!
//! Verification recomputes the digest and compares it in constant time
//! against the received lowercase hex string. Anything else fails closed.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the provider signature
pub const SIGNATURE_HEADER: &str = "X-Groove-Signature";

/// Discriminator parameter name
pub const REQUEST_KEY: &str = "request";

const NOGS_GAME_ID: &str = "nogsgameid";
const GAME_ID: &str = "gameid";

/// Computes and verifies provider signatures with a shared secret
#[derive(Clone)]
pub struct SignatureCodec {
    secret: Vec<u8>,
}

impl fmt::Debug for SignatureCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureCodec")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl SignatureCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Concatenated values in canonical key order
    pub fn canonical_payload<'a, I>(params: I, include_request_key: bool) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut entries: Vec<(&str, &str, &str)> = params
            .into_iter()
            .filter(|(key, _)| include_request_key || *key != REQUEST_KEY)
            .map(|(key, value)| {
                let sort_key = if key == NOGS_GAME_ID { GAME_ID } else { key };
                (sort_key, key, value)
            })
            .collect();

        // Ties on the sort key (gameid + nogsgameid) fall back to the real key
        entries.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(b.1)));

        entries.into_iter().map(|(_, _, value)| value).collect()
    }

    /// Lowercase hex HMAC-SHA256 of the canonical payload
    pub fn sign<'a, I>(&self, params: I, include_request_key: bool) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let payload = Self::canonical_payload(params, include_request_key);
        hex::encode(self.digest(payload.as_bytes()))
    }

    /// Constant-time check of `signature` against the expected digest
    pub fn verify<'a, I>(&self, signature: &str, params: I, include_request_key: bool) -> bool
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let expected = self.sign(params, include_request_key);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }

    fn digest(&self, payload: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length, so construction cannot fail
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}
