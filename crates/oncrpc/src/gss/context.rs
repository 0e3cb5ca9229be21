// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GSS contexts and the server's session table.
//!
//! A session is keyed by the opaque context handle the server mints at
//! Init. Lifecycle: `Created -> Established -> removed on Destroy`;
//! operations against a missing handle or a session in the wrong state
//! fail with a context problem.

use super::GssError;
use dashmap::DashMap;
use parking_lot::Mutex;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

/// One negotiated security context, as exposed by a GSS mechanism.
///
/// The engine drives negotiation through `accept_token` and applies the
/// per-message transforms; everything mechanism-specific (key material,
/// token formats) lives behind this trait.
pub trait GssContext: Send + Sync {
    /// Consume a peer token and produce the token to send back.
    fn accept_token(&mut self, token: &[u8]) -> Result<Vec<u8>, GssError>;

    /// True once negotiation has completed.
    fn is_established(&self) -> bool;

    /// Compute a message integrity checksum over `data`.
    fn mic(&self, data: &[u8]) -> Result<Vec<u8>, GssError>;

    /// Verify a MIC produced by the peer.
    fn verify_mic(&self, data: &[u8], mic: &[u8]) -> Result<(), GssError>;

    /// Seal `data` for the Privacy service level.
    fn wrap(&self, data: &[u8]) -> Result<Vec<u8>, GssError>;

    /// Unseal a Privacy-level body.
    fn unwrap(&self, sealed: &[u8]) -> Result<Vec<u8>, GssError>;

    /// Release mechanism resources. The context is unusable afterwards.
    fn dispose(&mut self);
}

/// Factory for fresh contexts; one per configured mechanism.
pub trait GssMechanism: Send + Sync {
    fn new_context(&self) -> Box<dyn GssContext>;
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Negotiation in progress.
    Created,
    /// Negotiation complete; Data/Destroy procedures allowed.
    Established,
}

/// One server-side session: state, context, and the server-chosen
/// sequence window.
pub struct GssSession {
    pub state: SessionState,
    pub context: Box<dyn GssContext>,
    pub seq_window: u32,
}

/// Handle-keyed session map for one engine instance.
pub struct GssSessionTable {
    sessions: DashMap<Vec<u8>, Arc<Mutex<GssSession>>>,
}

impl GssSessionTable {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Mint a fresh handle and store a `Created` session around the
    /// given context.
    pub fn create(&self, context: Box<dyn GssContext>) -> Vec<u8> {
        let mut handle = vec![0u8; 16];
        if SystemRandom::new().fill(&mut handle).is_err() {
            // Degenerate fallback; handles only need per-instance
            // uniqueness.
            let n = self.sessions.len() as u64 + 1;
            handle[..8].copy_from_slice(&n.to_be_bytes());
        }
        self.sessions.insert(
            handle.clone(),
            Arc::new(Mutex::new(GssSession {
                state: SessionState::Created,
                context,
                seq_window: 0,
            })),
        );
        log::debug!("created GSS session, {} active", self.sessions.len());
        handle
    }

    /// Look up a session expected to be in `state`.
    pub fn get_in_state(
        &self,
        handle: &[u8],
        state: SessionState,
    ) -> Result<Arc<Mutex<GssSession>>, GssError> {
        let session = self
            .sessions
            .get(handle)
            .map(|e| Arc::clone(e.value()))
            .ok_or(GssError::NoContext)?;
        if session.lock().state != state {
            return Err(GssError::WrongState);
        }
        Ok(session)
    }

    /// Remove a session (Destroy procedure).
    pub fn remove(&self, handle: &[u8]) -> Result<Arc<Mutex<GssSession>>, GssError> {
        let (_, session) = self.sessions.remove(handle).ok_or(GssError::NoContext)?;
        log::debug!("destroyed GSS session, {} active", self.sessions.len());
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for GssSessionTable {
    fn default() -> Self {
        Self::new()
    }
}
