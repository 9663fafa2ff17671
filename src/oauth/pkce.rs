//! Usage: PKCE verifier/challenge generation and OAuth `state` nonces.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// 64 random bytes encode to 86 characters of the RFC 7636 unreserved set.
const VERIFIER_ENTROPY_BYTES: usize = 64;
const STATE_ENTROPY_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct PkcePair {
    pub code_verifier: String,
    pub code_challenge: String,
}

pub fn generate_pkce_pair() -> PkcePair {
    let mut random = [0u8; VERIFIER_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut random);

    let code_verifier = URL_SAFE_NO_PAD.encode(random);
    let code_challenge = derive_code_challenge(&code_verifier);

    PkcePair {
        code_verifier,
        code_challenge,
    }
}

/// S256 transform: `BASE64URL-NOPAD(SHA256(verifier))`.
pub fn derive_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

pub(crate) fn generate_state() -> String {
    let mut bytes = [0u8; STATE_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_unreserved(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.' | '_' | '~')
    }

    #[test]
    fn generated_pair_has_valid_lengths_and_consistent_challenge() {
        let pair = generate_pkce_pair();
        assert!(pair.code_verifier.len() >= 43);
        assert!(pair.code_verifier.len() <= 128);
        assert!(pair.code_verifier.chars().all(is_unreserved));
        assert_eq!(pair.code_challenge, derive_code_challenge(&pair.code_verifier));
    }

    #[test]
    fn challenge_matches_rfc7636_appendix_b() {
        assert_eq!(
            derive_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn challenge_is_deterministic_url_safe_and_unpadded() {
        for _ in 0..16 {
            let verifier = generate_pkce_pair().code_verifier;
            let first = derive_code_challenge(&verifier);
            assert_eq!(first, derive_code_challenge(&verifier));
            assert!(!first.contains('='));
            assert!(!first.contains('+'));
            assert!(!first.contains('/'));
            assert_eq!(first.len(), 43);
        }
    }

    #[test]
    fn pairs_and_states_are_unique() {
        assert_ne!(generate_pkce_pair().code_verifier, generate_pkce_pair().code_verifier);
        let state = generate_state();
        assert_eq!(state.len(), 64);
        assert_ne!(state, generate_state());
    }
}
