use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cqms_types::models::{Screen, Section, User, View};

use crate::error::{ApiResult, AuthError};

/// Per-user identity and navigation state. Never persisted.
///
/// Build with [`Session::default`]. [`Session::login`] replaces the whole
/// value so no flag survives a change of identity; logging out discards the
/// session from the [`SessionStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    logged_in: bool,
    user: Option<User>,
    selected_query_id: Option<i64>,
    add_query_mode: bool,
    show_registration: bool,
    section: Section,
}

impl Session {
    pub fn login(&mut self, user: User) {
        *self = Session {
            logged_in: true,
            user: Some(user),
            ..Session::default()
        };
    }

    /// The authenticated user. Absent whenever the session is logged out,
    /// whatever was stored before.
    pub fn user(&self) -> Option<&User> {
        if self.logged_in { self.user.as_ref() } else { None }
    }

    pub fn require_user(&self) -> ApiResult<&User> {
        self.user().ok_or_else(|| AuthError::Unauthenticated.into())
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn set_section(&mut self, section: Section) {
        self.section = section;
    }

    pub fn show_registration(&mut self) {
        self.show_registration = true;
    }

    pub fn hide_registration(&mut self) {
        self.show_registration = false;
    }

    /// Lifecycle position. Add mode wins over a stale selection.
    pub fn view(&self) -> View {
        if self.add_query_mode {
            View::Creating
        } else if let Some(id) = self.selected_query_id {
            View::Detail(id)
        } else {
            View::Listing
        }
    }

    pub fn screen(&self) -> Screen {
        if self.user().is_none() {
            return if self.show_registration {
                Screen::Registration
            } else {
                Screen::Login
            };
        }

        match (self.section, self.view()) {
            (Section::Dashboard, _) => Screen::Dashboard,
            (Section::Queries, View::Creating) => Screen::AddQuery,
            (Section::Queries, View::Detail(id)) => Screen::QueryDetail(id),
            (Section::Queries, View::Listing) => Screen::QueryList,
        }
    }

    pub(crate) fn select_query(&mut self, id: i64) {
        self.selected_query_id = Some(id);
    }

    pub(crate) fn enter_add_mode(&mut self) {
        self.add_query_mode = true;
    }

    /// Back to the list from either the detail or the add form.
    pub(crate) fn return_to_listing(&mut self) {
        self.selected_query_id = None;
        self.add_query_mode = false;
    }
}

/// Live sessions keyed by the `sid` claim of their bearer token.
///
/// Each entry expires with its token. Expired entries are dropped whenever
/// they are looked up and swept on every [`SessionStore::create`].
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, StoredSession>>,
}

#[derive(Debug)]
struct StoredSession {
    session: Session,
    expires_at: DateTime<Utc>,
}

impl StoredSession {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, StoredSession>> {
        // Entries are replaced whole, so a poisoned map is still consistent.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Locks the map with the entry for `sid` removed if it has expired.
    fn lock_live(&self, sid: Uuid) -> MutexGuard<'_, HashMap<Uuid, StoredSession>> {
        let mut sessions = self.lock();
        let now = Utc::now();
        if sessions.get(&sid).is_some_and(|s| !s.is_live(now)) {
            sessions.remove(&sid);
        }
        sessions
    }

    pub fn create(&self, session: Session, expires_at: DateTime<Utc>) -> Uuid {
        let sid = Uuid::new_v4();
        let mut sessions = self.lock();
        let now = Utc::now();
        sessions.retain(|_, s| s.is_live(now));
        sessions.insert(
            sid,
            StoredSession {
                session,
                expires_at,
            },
        );
        sid
    }

    pub fn get(&self, sid: Uuid) -> Option<Session> {
        self.lock_live(sid).get(&sid).map(|s| s.session.clone())
    }

    /// Writes back a session taken with [`SessionStore::get`]. Ignored if the
    /// session was removed or expired in the meantime, so a concurrent logout
    /// wins.
    pub fn replace(&self, sid: Uuid, session: Session) -> bool {
        match self.lock_live(sid).get_mut(&sid) {
            Some(slot) => {
                slot.session = session;
                true
            }
            None => false,
        }
    }

    pub fn update<F, T>(&self, sid: Uuid, f: F) -> Option<T>
    where
        F: FnOnce(&mut Session) -> T,
    {
        self.lock_live(sid).get_mut(&sid).map(|s| f(&mut s.session))
    }

    pub fn remove(&self, sid: Uuid) -> Option<Session> {
        self.lock().remove(&sid).map(|s| s.session)
    }

    /// Sweeps expired sessions and returns how many remain.
    pub fn live_count(&self) -> usize {
        let mut sessions = self.lock();
        let now = Utc::now();
        sessions.retain(|_, s| s.is_live(now));
        sessions.len()
    }
}
