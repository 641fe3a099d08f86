/// Service-to-service API key
///
/// The task service authenticates its calls to the auth service with a
/// shared secret sent in the `X-Service-Key` header. The expected key is
/// never compared byte-by-byte: both sides are run through HMAC-SHA256 and
/// checked with `verify_slice`, which is constant-time.
///
/// # Example
///
/// ```
/// use taskdesk_shared::auth::service_key::ServiceKey;
///
/// let key = ServiceKey::new("0123456789abcdef0123456789abcdef");
/// assert!(key.matches("0123456789abcdef0123456789abcdef"));
/// assert!(!key.matches("guess"));
/// ```

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the service key
pub const SERVICE_KEY_HEADER: &str = "x-service-key";

type HmacSha256 = Hmac<Sha256>;

// Fixed HMAC key; only the equality check matters here
const MAC_KEY: &[u8] = b"taskdesk-service-key";

/// Expected service key
#[derive(Clone)]
pub struct ServiceKey {
    tag: Vec<u8>,
}

impl ServiceKey {
    pub fn new(expected: &str) -> Self {
        Self {
            tag: tag(expected.as_bytes()),
        }
    }

    /// Constant-time check of a presented key
    pub fn matches(&self, presented: &str) -> bool {
        let Some(mut mac) = new_mac() else {
            return false;
        };
        mac.update(presented.as_bytes());
        mac.verify_slice(&self.tag).is_ok()
    }

    /// Short, non-reversible fingerprint for logs
    pub fn fingerprint(&self) -> String {
        hex::encode(self.tag.get(..4).unwrap_or_default())
    }
}

impl std::fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ServiceKey({})", self.fingerprint())
    }
}

fn new_mac() -> Option<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(MAC_KEY).ok()
}

// An empty tag never verifies, so a MAC failure rejects every key
fn tag(bytes: &[u8]) -> Vec<u8> {
    match new_mac() {
        Some(mut mac) => {
            mac.update(bytes);
            mac.finalize().into_bytes().to_vec()
        }
        None => Vec::new(),
    }
}
