//! Email/password sessions against the hosted auth service.
//!
//! Sign-in stores the access token in the shared [`RestClient`] so
//! every table/storage request carries it; the backend's row policies
//! are the real authorization boundary, the client-side owner gate is
//! UX only.

use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use checkin_core::{
  identity::AuthUser,
  store::{AuthChange, AuthSessions},
};

use crate::{
  client::RestClient,
  error::{Error, Result},
};

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireUser {
  id:    Uuid,
  #[serde(default)]
  email: Option<String>,
}

impl From<WireUser> for AuthUser {
  fn from(wire: WireUser) -> Self {
    AuthUser { id: wire.id, email: wire.email.unwrap_or_default() }
  }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: String,
  user:         WireUser,
}

#[derive(Debug, serde::Serialize)]
struct Credentials<'a> {
  email:    &'a str,
  password: &'a str,
}

// ─── Auth client ─────────────────────────────────────────────────────────────

/// The hosted auth service's session, plus a sign-in/sign-out event
/// stream for identity subscribers.
#[derive(Clone)]
pub struct RestAuth {
  client:  RestClient,
  changes: broadcast::Sender<AuthChange>,
}

impl RestAuth {
  pub fn new(client: RestClient) -> Self {
    let (changes, _) = broadcast::channel(16);
    Self { client, changes }
  }

  /// Register a new account. The service may require an email
  /// confirmation round-trip before sign-in works.
  pub async fn sign_up(&self, email: &str, password: &str) -> Result<()> {
    let url = self.client.auth_url("signup");
    let response = self
      .client
      .post(&url)
      .json(&Credentials { email, password })
      .send()
      .await?;
    self.client.expect_success(response).await
  }

  /// Exchange credentials for a session and start sending the bearer
  /// token with every request.
  pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
    let url = self.client.auth_url("token?grant_type=password");
    let response = self
      .client
      .post(&url)
      .json(&Credentials { email, password })
      .send()
      .await?;
    let token: TokenResponse = self.client.handle(response).await?;

    self.client.set_bearer(token.access_token);
    let user: AuthUser = token.user.into();
    let _ = self.changes.send(AuthChange::SignedIn(user.clone()));
    tracing::info!(user = %user.id, "signed in");
    Ok(user)
  }

  /// Drop the session locally and tell the service.
  pub async fn sign_out(&self) -> Result<()> {
    let url = self.client.auth_url("logout");
    let response = self.client.post(&url).send().await;
    self.client.clear_bearer();
    let _ = self.changes.send(AuthChange::SignedOut);

    // The local session is gone either way; only report unexpected
    // service failures.
    match response {
      Ok(r) if r.status().is_success() || r.status() == StatusCode::UNAUTHORIZED => {
        Ok(())
      }
      Ok(r) => Err(Error::Server {
        status:  r.status().as_u16(),
        message: r.text().await.unwrap_or_default(),
      }),
      Err(e) => Err(e.into()),
    }
  }
}

impl AuthSessions for RestAuth {
  type Error = Error;

  async fn current_user(&self) -> Result<Option<AuthUser>> {
    if self.client.bearer().is_none() {
      return Ok(None);
    }
    let url = self.client.auth_url("user");
    let response = self.client.get(&url).send().await?;
    // An expired or revoked token is "no session", not an error.
    if response.status() == StatusCode::UNAUTHORIZED {
      self.client.clear_bearer();
      return Ok(None);
    }
    let wire: WireUser = self.client.handle(response).await?;
    Ok(Some(wire.into()))
  }

  fn changes(&self) -> broadcast::Receiver<AuthChange> {
    self.changes.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wire_users_without_email_get_an_empty_one() {
    let wire: WireUser =
      serde_json::from_value(serde_json::json!({ "id": Uuid::new_v4() }))
        .unwrap();
    let user: AuthUser = wire.into();
    assert_eq!(user.email, "");
  }

  #[tokio::test]
  async fn current_user_without_a_token_is_none() {
    let client = RestClient::new(crate::RestConfig::new(
      "https://blog.example.co",
      "anon",
    ))
    .unwrap();
    let auth = RestAuth::new(client);
    // No bearer set: resolves locally without touching the network.
    assert!(auth.current_user().await.unwrap().is_none());
  }
}
