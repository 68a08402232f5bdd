use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Opaque per-user key derived from the client's network address.
///
/// Only ever used to look up that user's records.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 of the address, hex encoded. An empty address still hashes to a
/// valid identity that every address-less client shares.
pub fn identity(remote_address: &str) -> UserId {
    UserId(sha256_hex(remote_address.as_bytes()))
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_stable_sha256() {
        let a = identity("127.0.0.1");
        assert_eq!(a, identity("127.0.0.1"));
        assert_eq!(
            a.as_str(),
            "12ca17b49af2289436f303e0166030a21e525d266e209267433801a8fd4071a0"
        );
        assert_ne!(a, identity("127.0.0.2"));
    }

    #[test]
    fn empty_address_still_yields_identity() {
        let id = identity("");
        assert_eq!(
            id.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
