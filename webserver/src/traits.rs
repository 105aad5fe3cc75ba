//! Service trait definitions for dependency injection
//!
//! External I/O of the HTTP host is abstracted through these traits for testability

use async_trait::async_trait;

use crate::error::WebServerResult;
use crate::types::UserAccount;

/// Account store tracking plans and usage per email
#[mockall::automock]
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Look up the account registered for `email`
    async fn find_account(&self, email: &str) -> WebServerResult<Option<UserAccount>>;

    /// Count one more successful optimization for the account
    async fn record_usage(&self, account: &UserAccount) -> WebServerResult<()>;
}
