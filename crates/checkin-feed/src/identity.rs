//! Identity Resolver — who is looking at the blog, and the persisted
//! anonymous session token.
//!
//! Resolution is fail-open towards `Anonymous`: a network blip or a
//! missing profile row hides owner-only affordances but never blocks
//! rendering. Authorization stays fail-closed because owner status is
//! only ever granted on a successful profile read.

use std::{
  fs,
  path::{Path, PathBuf},
  sync::Arc,
};

use chrono::Utc;
use rand_core::{OsRng, RngCore};
use tokio::sync::mpsc;

use checkin_core::{
  identity::Identity,
  store::{AuthSessions, BlogStore},
};

/// Prefix of every anonymous session token.
const TOKEN_PREFIX: &str = "anon";
/// Length of the random token suffix.
const TOKEN_SUFFIX_LEN: usize = 9;

// ─── Resolver ────────────────────────────────────────────────────────────────

pub struct IdentityResolver<A, S> {
  auth:         Arc<A>,
  store:        Arc<S>,
  session_file: PathBuf,
}

impl<A, S> Clone for IdentityResolver<A, S> {
  fn clone(&self) -> Self {
    Self {
      auth:         self.auth.clone(),
      store:        self.store.clone(),
      session_file: self.session_file.clone(),
    }
  }
}

impl<A, S> IdentityResolver<A, S>
where
  A: AuthSessions,
  S: BlogStore,
{
  pub fn new(auth: Arc<A>, store: Arc<S>, session_file: PathBuf) -> Self {
    Self { auth, store, session_file }
  }

  /// Where the anonymous token lives by default:
  /// `<local-data-dir>/checkin/session`.
  pub fn default_session_file() -> PathBuf {
    dirs::data_local_dir()
      .unwrap_or_else(|| PathBuf::from("."))
      .join("checkin")
      .join("session")
  }

  /// Resolve the current actor. Never fails: every lookup error
  /// degrades to an anonymous visitor.
  pub async fn current_identity(&self) -> Identity {
    let user = match self.auth.current_user().await {
      Ok(user) => user,
      Err(e) => {
        tracing::warn!(error = %e, "auth lookup failed, treating as anonymous");
        None
      }
    };

    let Some(user) = user else {
      return Identity::Anonymous(self.anonymous_token());
    };

    // Owner status requires a successful profile read; anything less
    // is a plain visitor.
    match self.store.fetch_profile(user.id).await {
      Ok(Some(profile)) if profile.is_blog_owner => Identity::Owner(user),
      Ok(_) => Identity::Visitor(user),
      Err(e) => {
        tracing::warn!(error = %e, "profile lookup failed, treating as visitor");
        Identity::Visitor(user)
      }
    }
  }

  /// The stable anonymous session token, created lazily on first use
  /// and persisted for the lifetime of the state file.
  pub fn anonymous_token(&self) -> String {
    match read_token(&self.session_file) {
      Some(token) => token,
      None => {
        let token = generate_token();
        if let Err(e) = persist_token(&self.session_file, &token) {
          // An unwritable state dir costs persistence, not liking.
          tracing::warn!(error = %e, "could not persist anonymous session token");
        }
        token
      }
    }
  }

  /// Follow auth changes as a stream of freshly resolved identities.
  /// Dropping the returned stream stops the forwarding task.
  pub fn subscribe(&self) -> IdentityStream
  where
    A: 'static,
    S: 'static,
  {
    let (tx, rx) = mpsc::channel(8);
    let resolver = self.clone();
    let mut changes = self.auth.changes();

    let task = tokio::spawn(async move {
      while changes.recv().await.is_ok() {
        let identity = resolver.current_identity().await;
        if tx.send(identity).await.is_err() {
          break;
        }
      }
    });

    IdentityStream { rx, task }
  }
}

// ─── Identity stream ─────────────────────────────────────────────────────────

/// Live identity updates; unsubscribes (aborts the forwarding task) on
/// drop so no callback outlives its view.
pub struct IdentityStream {
  rx:   mpsc::Receiver<Identity>,
  task: tokio::task::JoinHandle<()>,
}

impl IdentityStream {
  pub async fn recv(&mut self) -> Option<Identity> {
    self.rx.recv().await
  }

  pub fn try_recv(&mut self) -> Option<Identity> {
    self.rx.try_recv().ok()
  }
}

impl Drop for IdentityStream {
  fn drop(&mut self) {
    self.task.abort();
  }
}

// ─── Token persistence ───────────────────────────────────────────────────────

fn read_token(path: &Path) -> Option<String> {
  let raw = fs::read_to_string(path).ok()?;
  let token = raw.trim();
  (!token.is_empty()).then(|| token.to_string())
}

fn persist_token(path: &Path, token: &str) -> std::io::Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(path, token)
}

/// `anon_<unix-millis>_<9 base-36 chars>` — a pseudo-device identity,
/// unique enough to scope likes, meaningless everywhere else.
fn generate_token() -> String {
  const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
  let mut bytes = [0u8; TOKEN_SUFFIX_LEN];
  OsRng.fill_bytes(&mut bytes);
  let suffix: String = bytes
    .iter()
    .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
    .collect();
  format!("{TOKEN_PREFIX}_{}_{suffix}", Utc::now().timestamp_millis())
}
