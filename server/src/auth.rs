//! Identity boundary. The game core never parses credentials itself; it
//! consumes the verified `{uid, name, team}` triple a [`TokenVerifier`]
//! produces from the bearer token in the handshake.

/// A verified account identity. `uid` is stable across reconnects; `team` is
/// the account's declared team name and may be empty or stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub name: String,
    pub team: String,
}

/// Seam to the external identity provider.
pub trait TokenVerifier: Send + Sync {
    /// Returns the identity a valid token proves, or `None` for a token the
    /// provider does not recognize.
    fn verify(&self, token: &str) -> Option<Identity>;
}

/// Development stand-in for the real provider: accepts self-describing
/// tokens of the form `uid:name:team`.
pub struct DevTokenVerifier;

impl TokenVerifier for DevTokenVerifier {
    fn verify(&self, token: &str) -> Option<Identity> {
        let mut parts = token.splitn(3, ':');
        let uid = parts.next()?.trim();
        let name = parts.next()?.trim();
        let team = parts.next().unwrap_or("").trim();

        if uid.is_empty() || name.is_empty() {
            return None;
        }

        Some(Identity {
            uid: uid.to_string(),
            name: name.to_string(),
            team: team.to_string(),
        })
    }
}
