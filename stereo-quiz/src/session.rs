//! Server-side quiz sessions
//!
//! The browser only holds an opaque UUID in the `stereo_session` cookie;
//! participant details and quiz progress stay in process memory.
//!
//! Sessions idle for longer than the store's TTL are treated as abandoned:
//! lookups ignore them and [`SessionStore::prune_expired`] drops them.
//! Region saves for one session are serialised through a per-session lock,
//! so a page can only ever be committed once.

use axum::http::{header, HeaderMap};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stereo_common::QuizState;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "stereo_session";

/// Idle time after which a session counts as abandoned
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

struct SessionEntry {
    state: QuizState,
    save_lock: Arc<Mutex<()>>,
    touched: Instant,
}

impl SessionEntry {
    fn new(state: QuizState) -> Self {
        Self {
            state,
            save_lock: Arc::new(Mutex::new(())),
            touched: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.touched.elapsed() > ttl
    }
}

/// Why a region save could not begin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveRejected {
    /// Unknown or expired session
    Missing,
    /// Another save for this session is still running
    Busy,
}

/// Exclusive right to save the current region of one session
///
/// Holds the session's save lock until dropped, including when the request
/// future is cancelled mid-save.
pub struct SaveSlot {
    state: QuizState,
    _guard: OwnedMutexGuard<()>,
}

impl SaveSlot {
    /// Session state as of acquiring the slot
    pub fn state(&self) -> &QuizState {
        &self.state
    }
}

/// Shared map of session id to quiz state
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register a new session and return its id
    ///
    /// Abandoned sessions are swept at the same time.
    pub async fn create(&self, state: QuizState) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, entry| !entry.is_expired(self.ttl));
        sessions.insert(id, SessionEntry::new(state));
        id
    }

    /// Snapshot of a live session's state; refreshes its idle timer
    pub async fn get(&self, id: Uuid) -> Option<QuizState> {
        let mut sessions = self.sessions.write().await;
        if Self::drop_if_expired(&mut sessions, id, self.ttl) {
            return None;
        }
        let entry = sessions.get_mut(&id)?;
        entry.touched = Instant::now();
        Some(entry.state.clone())
    }

    /// Remove `id` when it has been idle too long; true if it is now gone
    fn drop_if_expired(sessions: &mut HashMap<Uuid, SessionEntry>, id: Uuid, ttl: Duration) -> bool {
        match sessions.get(&id).map(|entry| entry.is_expired(ttl)) {
            Some(true) => {
                sessions.remove(&id);
                true
            }
            Some(false) => false,
            None => true,
        }
    }

    pub async fn remove(&self, id: Uuid) -> Option<QuizState> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|entry| entry.state)
    }

    /// Take the session's save lock without waiting
    ///
    /// The returned slot carries the state to save against. While it is
    /// alive every other `begin_save` for the same session gets
    /// [`SaveRejected::Busy`].
    pub async fn begin_save(&self, id: Uuid) -> Result<SaveSlot, SaveRejected> {
        let mut sessions = self.sessions.write().await;
        if Self::drop_if_expired(&mut sessions, id, self.ttl) {
            return Err(SaveRejected::Missing);
        }
        let entry = sessions.get_mut(&id).ok_or(SaveRejected::Missing)?;

        let guard = entry
            .save_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| SaveRejected::Busy)?;
        entry.touched = Instant::now();

        Ok(SaveSlot {
            state: entry.state.clone(),
            _guard: guard,
        })
    }

    /// Store `next` only if the session is still in progress at `saved_index`
    ///
    /// Returns false when the session moved on or was cleared; the stored
    /// state is then left alone.
    pub async fn advance_if(&self, id: Uuid, saved_index: usize, next: QuizState) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(entry)
                if !entry.state.is_complete()
                    && entry.state.current_target().is_some()
                    && entry.state.progress() == saved_index
                    && next.progress() == saved_index + 1 =>
            {
                entry.state = next;
                entry.touched = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// Drop every session idle for longer than the TTL
    pub async fn prune_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(self.ttl));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Session id from the request's `Cookie` headers, if well formed
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// `Set-Cookie` value binding the browser to a session
pub fn session_cookie(id: Uuid) -> String {
    format!("{SESSION_COOKIE}={id}; HttpOnly; SameSite=Lax; Path=/")
}

/// `Set-Cookie` value that deletes the session cookie
pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}
