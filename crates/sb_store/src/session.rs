//! Session: the runtime cipher unlocked by the master password.
//!
//! The session holds the `SecretCipher` in memory only while the store is
//! unlocked. Locking (explicitly, on drop, or when the idle timer fires)
//! drops the cipher, which zeroizes the key.
//!
//! This is an explicit handle, not process-global state: every `SecretStore`
//! owns its own, and the repository receives a clone.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sb_crypto::SecretCipher;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StoreError;

pub(crate) struct SessionInner {
    cipher: SecretCipher,
    last_activity: Instant,
}

impl SessionInner {
    fn new(cipher: SecretCipher) -> Self {
        Self {
            cipher,
            last_activity: Instant::now(),
        }
    }
}

/// Thread-safe session handle.  Clone to share between store components.
#[derive(Clone)]
pub struct Session {
    inner: Arc<RwLock<Option<SessionInner>>>,
    /// Zero disables auto-lock.
    idle_lock: Duration,
}

impl Session {
    pub fn new(idle_lock: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            idle_lock,
        }
    }

    /// Bind a verified cipher, replacing any previous one.
    pub async fn bind(&self, cipher: SecretCipher) {
        let mut guard = self.inner.write().await;
        *guard = Some(SessionInner::new(cipher));
    }

    /// Lock the session; the key is zeroized as the cipher drops.
    pub async fn lock(&self) {
        let mut guard = self.inner.write().await;
        *guard = None;
    }

    pub async fn is_active(&self) -> bool {
        let mut guard = self.inner.write().await;
        self.expire_if_idle(&mut guard);
        guard.is_some()
    }

    /// Borrow the bound cipher. Counts as activity.
    ///
    /// The returned guard holds the session shared: rotation cannot swap the
    /// key until it drops, so a caller that encrypts or decrypts and then
    /// touches the database must keep it alive across both.
    /// `Unauthenticated` if the session is locked or has idled out.
    pub async fn cipher(&self) -> Result<RwLockReadGuard<'_, SecretCipher>, StoreError> {
        let mut guard = self.inner.write().await;
        self.expire_if_idle(&mut guard);
        match guard.as_mut() {
            Some(inner) => inner.last_activity = Instant::now(),
            None => return Err(StoreError::Unauthenticated),
        }
        RwLockReadGuard::try_map(guard.downgrade(), |slot| {
            slot.as_ref().map(|inner| &inner.cipher)
        })
        .map_err(|_| StoreError::Unauthenticated)
    }

    /// Seconds until auto-lock, `None` when locked.
    pub async fn time_until_lock(&self) -> Option<u64> {
        let guard = self.inner.read().await;
        guard.as_ref().map(|inner| {
            if self.idle_lock.is_zero() {
                return u64::MAX;
            }
            self.idle_lock
                .saturating_sub(inner.last_activity.elapsed())
                .as_secs()
        })
    }

    /// Hold the session exclusively; every cipher user waits until the guard drops.
    pub(crate) async fn exclusive(&self) -> RwLockWriteGuard<'_, Option<SessionInner>> {
        self.inner.write().await
    }

    /// Swap in `cipher` under an exclusive guard, only if a live session was bound.
    pub(crate) fn rebind_if_active(
        &self,
        guard: &mut RwLockWriteGuard<'_, Option<SessionInner>>,
        cipher: SecretCipher,
    ) -> bool {
        self.expire_if_idle(guard);
        if guard.is_some() {
            **guard = Some(SessionInner::new(cipher));
            true
        } else {
            false
        }
    }

    fn expire_if_idle(&self, slot: &mut Option<SessionInner>) {
        if self.idle_lock.is_zero() {
            return;
        }
        let expired = slot
            .as_ref()
            .is_some_and(|inner| inner.last_activity.elapsed() > self.idle_lock);
        if expired {
            tracing::info!("[session] idle timeout reached, locking");
            *slot = None;
        }
    }
}
