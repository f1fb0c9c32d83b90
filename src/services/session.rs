use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::ports::spotify::TokenGrant;
use crate::spotify_rs::auth::generate_random_string;

/// Credentials are treated as expired this long before Spotify's expiry so a
/// token never lapses in the middle of a sync.
const EXPIRY_SKEW_SECS: i64 = 60;

const SESSION_ID_LENGTH: usize = 32;

/// Upper bound on stored sessions.
const MAX_SESSIONS: usize = 10_000;

/// Delegated authority to act on the user's Spotify account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential from a fresh grant. Spotify may omit the refresh
    /// token on refresh, in which case the previous one stays valid.
    pub fn from_grant(
        grant: TokenGrant,
        issued_at: DateTime<Utc>,
        previous_refresh_token: Option<String>,
    ) -> Self {
        let expires_at = i64::try_from(grant.expires_in_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|expires_in| issued_at.checked_add_signed(expires_in))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or(previous_refresh_token),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Authorization lifecycle of one session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// A code exchange or refresh is in flight.
    Exchanging,
    Authenticated(Credential),
    /// Spotify rejected the credential; the next lookup refreshes it.
    Expired(Credential),
}

/// Everything one user session owns. Never shared between sessions.
#[derive(Debug)]
pub struct SessionContext {
    id: String,
    pub(crate) state: AuthState,
    /// CSRF state issued with the most recent authorization url
    pub(crate) pending_csrf_state: Option<String>,
    last_used_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            id: generate_random_string(SESSION_ID_LENGTH),
            state: AuthState::Unauthenticated,
            pending_csrf_state: None,
            last_used_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn last_used_at(&self) -> DateTime<Utc> {
        self.last_used_at
    }

    fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }

    /// Whether there is anything worth keeping: a login in progress or a credential.
    pub fn has_state(&self) -> bool {
        self.pending_csrf_state.is_some() || self.state != AuthState::Unauthenticated
    }

    /// The cached credential, whether or not it is still valid.
    pub fn credential(&self) -> Option<&Credential> {
        match &self.state {
            AuthState::Authenticated(credential) | AuthState::Expired(credential) => {
                Some(credential)
            }
            AuthState::Unauthenticated | AuthState::Exchanging => None,
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedSession = Arc<Mutex<SessionContext>>;

/// A resumed or freshly started session together with its id.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    pub context: SharedSession,
    /// Not in the store yet; see [`SessionStore::commit`].
    pub is_new: bool,
}

/// In-memory sessions keyed by an unguessable id. Nothing is persisted.
///
/// Sessions only enter the store once they hold state, and the store never
/// grows past its capacity: the least recently used session makes room.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedSession>>,
    capacity: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Resume the session for `id`. A missing or unknown id gets a transient
    /// session that is only stored by a later [`SessionStore::commit`].
    pub async fn resume(&self, id: Option<&str>) -> SessionHandle {
        if let Some(id) = id {
            if let Some(context) = self.get(id).await {
                context.lock().await.touch();
                return SessionHandle {
                    id: id.to_string(),
                    context,
                    is_new: false,
                };
            }
        }

        let session = SessionContext::new();
        SessionHandle {
            id: session.id().to_string(),
            context: Arc::new(Mutex::new(session)),
            is_new: true,
        }
    }

    /// Store a transient session once it holds state. Returns true when the
    /// session was inserted by this call, i.e. its id has to reach the client.
    pub async fn commit(&self, handle: &SessionHandle) -> bool {
        if !handle.is_new || !handle.context.lock().await.has_state() {
            return false;
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&handle.id) {
            return false;
        }
        if sessions.len() >= self.capacity {
            evict_least_recently_used(&mut sessions);
        }
        sessions.insert(handle.id.clone(), handle.context.clone());
        tracing::debug!(session_id = %handle.id, "Stored session");
        true
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions unused for more than `max_idle`. Sessions that are busy
    /// (locked by an in-flight request) are kept until the next sweep.
    pub async fn remove_idle_longer_than(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, context| match context.try_lock() {
            Ok(session) => session.last_used_at() > cutoff,
            Err(_) => true,
        });
        before - sessions.len()
    }
}

fn evict_least_recently_used(sessions: &mut HashMap<String, SharedSession>) {
    let oldest = sessions
        .iter()
        .filter_map(|(id, context)| {
            context
                .try_lock()
                .ok()
                .map(|session| (session.last_used_at(), id.clone()))
        })
        .min();

    if let Some((_, id)) = oldest {
        sessions.remove(&id);
        tracing::info!(session_id = %id, "Session store full, evicted least recently used session");
    }
}
