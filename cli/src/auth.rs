use async_trait::async_trait;
use sonet::{Authenticator, SessionInfo, SonetError};

/// Development stand-in for the real session store: the credential line is
/// `<user_id> <display_name>`. Anything the production deployment would
/// resolve against its token store arrives here instead.
pub struct DevAuthenticator;

#[async_trait]
impl Authenticator for DevAuthenticator {
  async fn authenticate(&self, credential: &str) -> Result<SessionInfo, SonetError> {
    let (id, name) = credential
      .split_once(' ')
      .ok_or_else(|| SonetError::AuthenticationFailure("credential must be `<user_id> <name>`".into()))?;
    let id = id
      .parse::<u64>()
      .map_err(|_| SonetError::AuthenticationFailure("user id is not numeric".into()))?;
    if name.is_empty() {
      return Err(SonetError::AuthenticationFailure("display name must not be empty".into()));
    }
    Ok(SessionInfo::new(id, name))
  }
}
