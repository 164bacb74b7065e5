//! In-memory identity provider.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use rolegate_auth::{IdentityError, IdentityProvider, Principal};

#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    current: RwLock<Option<Principal>>,
    reject_sign_out: AtomicBool,
    sign_outs: AtomicUsize,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(principal: Principal) -> Self {
        let provider = Self::new();
        provider.sign_in(principal);
        provider
    }

    pub fn sign_in(&self, principal: Principal) {
        if let Ok(mut current) = self.current.write() {
            *current = Some(principal);
        }
    }

    /// Make subsequent sign-outs fail (the principal is still forgotten).
    pub fn reject_sign_out(&self, reject: bool) {
        self.reject_sign_out.store(reject, Ordering::SeqCst);
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    fn current_principal(&self) -> Option<Principal> {
        self.current.read().ok()?.clone()
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut current) = self.current.write() {
            *current = None;
        }

        if self.reject_sign_out.load(Ordering::SeqCst) {
            return Err(IdentityError::Rejected("sign-out refused".to_string()));
        }
        Ok(())
    }
}
