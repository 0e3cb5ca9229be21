// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared-secret GSS mechanism: HMAC-SHA256 MICs, AES-256-GCM sealing.
//!
//! Both peers are provisioned with the same 32-byte secret; negotiation
//! is a fixed number of token exchanges in which each side proves
//! possession of the secret by returning the HMAC of the token it
//! received. Kerberos-class mechanisms plug in through the same
//! [`GssContext`](super::GssContext) trait.

use super::context::{GssContext, GssMechanism};
use super::GssError;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

/// Mechanism configuration: the shared secret and the number of token
/// exchanges negotiation takes (1 = Init completes immediately, 2 =
/// one ContinueNeeded round, ...).
pub struct HmacSealMechanism {
    secret: [u8; 32],
    rounds: usize,
}

impl HmacSealMechanism {
    pub fn new(secret: [u8; 32]) -> Self {
        Self { secret, rounds: 1 }
    }

    /// Require `rounds` token exchanges before the context establishes.
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds.max(1);
        self
    }

    pub fn shared(secret: [u8; 32]) -> Arc<Self> {
        Arc::new(Self::new(secret))
    }
}

impl GssMechanism for HmacSealMechanism {
    fn new_context(&self) -> Box<dyn GssContext> {
        Box::new(HmacSealContext {
            mac_key: hmac::Key::new(hmac::HMAC_SHA256, &self.secret),
            seal_secret: self.secret,
            rounds_left: self.rounds,
            disposed: false,
        })
    }
}

/// One context instance. The two sides are symmetric: either may accept
/// tokens, produce MICs, and seal/unseal once established.
pub struct HmacSealContext {
    mac_key: hmac::Key,
    seal_secret: [u8; 32],
    rounds_left: usize,
    disposed: bool,
}

impl HmacSealContext {
    fn check_usable(&self) -> Result<(), GssError> {
        if self.disposed {
            return Err(GssError::WrongState);
        }
        Ok(())
    }

    fn seal_key(&self) -> Result<LessSafeKey, GssError> {
        let key = UnboundKey::new(&AES_256_GCM, &self.seal_secret)
            .map_err(|_| GssError::SealFailure("bad key length".to_string()))?;
        Ok(LessSafeKey::new(key))
    }
}

impl GssContext for HmacSealContext {
    fn accept_token(&mut self, token: &[u8]) -> Result<Vec<u8>, GssError> {
        self.check_usable()?;
        if self.rounds_left == 0 {
            return Err(GssError::Mechanism("negotiation already complete".to_string()));
        }
        self.rounds_left -= 1;
        // Prove possession of the secret by MACing the peer's token.
        Ok(hmac::sign(&self.mac_key, token).as_ref().to_vec())
    }

    fn is_established(&self) -> bool {
        !self.disposed && self.rounds_left == 0
    }

    fn mic(&self, data: &[u8]) -> Result<Vec<u8>, GssError> {
        self.check_usable()?;
        Ok(hmac::sign(&self.mac_key, data).as_ref().to_vec())
    }

    fn verify_mic(&self, data: &[u8], mic: &[u8]) -> Result<(), GssError> {
        self.check_usable()?;
        hmac::verify(&self.mac_key, data, mic).map_err(|_| GssError::MicMismatch)
    }

    fn wrap(&self, data: &[u8]) -> Result<Vec<u8>, GssError> {
        self.check_usable()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| GssError::SealFailure("nonce generation failed".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = data.to_vec();
        self.seal_key()?
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| GssError::SealFailure("seal failed".to_string()))?;

        // Wire form: nonce | ciphertext | tag.
        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(out)
    }

    fn unwrap(&self, sealed: &[u8]) -> Result<Vec<u8>, GssError> {
        self.check_usable()?;
        if sealed.len() < NONCE_LEN {
            return Err(GssError::SealFailure("sealed body too short".to_string()));
        }
        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(&sealed[..NONCE_LEN]);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = sealed[NONCE_LEN..].to_vec();
        let plain = self
            .seal_key()?
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| GssError::SealFailure("unseal failed".to_string()))?;
        Ok(plain.to_vec())
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }
}
