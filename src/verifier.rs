// 9.3 verifier.rs: signature checks for intents happen off the engine's books.
// MockVerifier accepts exactly the signature produced by MockVerifier::sign.

use crate::intent::Intent;
use crate::types::AccountId;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifierError {
    #[error("signature does not match intent")]
    InvalidSignature,
    #[error("signer {0} has been revoked")]
    RevokedSigner(AccountId),
}

pub trait Verifier {
    fn verify_intent(&self, intent: &Intent, signature: &[u8]) -> Result<(), VerifierError>;
}

/// In-memory verifier. Clones share the revocation list.
#[derive(Debug, Clone, Default)]
pub struct MockVerifier {
    revoked: Rc<RefCell<HashSet<AccountId>>>,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign(intent: &Intent) -> Vec<u8> {
        let mut signature = format!("sig:{}:", intent.common.signer.0).into_bytes();
        signature.extend(intent.digest());
        signature
    }

    pub fn revoke(&self, signer: AccountId) {
        self.revoked.borrow_mut().insert(signer);
    }
}

impl Verifier for MockVerifier {
    fn verify_intent(&self, intent: &Intent, signature: &[u8]) -> Result<(), VerifierError> {
        if self.revoked.borrow().contains(&intent.common.signer) {
            return Err(VerifierError::RevokedSigner(intent.common.signer));
        }
        if signature != Self::sign(intent).as_slice() {
            return Err(VerifierError::InvalidSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Intent, IntentCommon};
    use crate::types::Timestamp;
    use rust_decimal_macros::dec;

    fn intent() -> Intent {
        Intent {
            amount: dec!(1),
            price: dec!(10),
            fee: dec!(0),
            originator: None,
            solver: None,
            collateralization: dec!(0),
            common: IntentCommon {
                account: AccountId(1),
                signer: AccountId(1),
                nonce: 1,
                group: 0,
                expiry: Timestamp(0),
            },
        }
    }

    #[test]
    fn accepts_matching_signature_only() {
        let verifier = MockVerifier::new();
        let intent = intent();
        assert!(verifier.verify_intent(&intent, &MockVerifier::sign(&intent)).is_ok());

        let mut tampered = intent.clone();
        tampered.amount = dec!(2);
        assert_eq!(
            verifier.verify_intent(&tampered, &MockVerifier::sign(&intent)),
            Err(VerifierError::InvalidSignature)
        );
    }

    #[test]
    fn revoked_signer_rejected() {
        let verifier = MockVerifier::new();
        let intent = intent();
        verifier.revoke(AccountId(1));
        assert_eq!(
            verifier.verify_intent(&intent, &MockVerifier::sign(&intent)),
            Err(VerifierError::RevokedSigner(AccountId(1)))
        );
    }
}
