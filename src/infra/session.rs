//! Account identity resolved from configuration.

use uuid::Uuid;

use crate::{application::adapters::SessionProvider, config::RemoteSettings};

/// Fixed identity for the lifetime of the process. Editing anonymously is
/// allowed; commits then stay in the local slot.
#[derive(Debug, Clone)]
pub struct ConfiguredSession {
    account: Option<Uuid>,
}

impl ConfiguredSession {
    pub fn new(account: Option<Uuid>) -> Self {
        Self { account }
    }

    /// An account id only counts as signed in when a token accompanies it;
    /// without credentials the server would reject every write anyway.
    pub fn from_settings(remote: &RemoteSettings) -> Self {
        let account = remote.account_id.filter(|_| remote.api_token.is_some());
        Self { account }
    }
}

impl SessionProvider for ConfiguredSession {
    fn current_account(&self) -> Option<Uuid> {
        self.account
    }
}
