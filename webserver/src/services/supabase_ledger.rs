//! Usage ledger backed by the Supabase PostgREST `users` table

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use shared::{process_debug, ProcessId};
use std::time::Duration;

use crate::config::SupabaseConfig;
use crate::error::{WebServerError, WebServerResult};
use crate::traits::UsageLedger;
use crate::types::UserAccount;

const LEDGER_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SupabaseLedger {
    users_url: String,
    service_key: String,
    client: Client,
}

impl SupabaseLedger {
    pub fn new(config: &SupabaseConfig) -> WebServerResult<Self> {
        let client = Client::builder().timeout(LEDGER_TIMEOUT).build()?;
        Ok(Self {
            users_url: format!("{}/rest/v1/users", config.url.trim_end_matches('/')),
            service_key: config.service_key.clone(),
            client,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

async fn ensure_success(response: Response, operation: &str) -> WebServerResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(WebServerError::Ledger {
        message: format!("{operation} failed: {} {}", status.as_u16(), body),
    })
}

#[async_trait]
impl UsageLedger for SupabaseLedger {
    async fn find_account(&self, email: &str) -> WebServerResult<Option<UserAccount>> {
        let filter = format!("eq.{email}");
        let request = self
            .client
            .get(&self.users_url)
            .query(&[("email", filter.as_str()), ("select", "*")]);

        let response = ensure_success(self.authorized(request).send().await?, "account lookup").await?;
        let rows: Vec<UserAccount> = response.json().await?;

        process_debug!(ProcessId::current(), "Ledger lookup for {} returned {} row(s)", email, rows.len());
        Ok(rows.into_iter().next())
    }

    async fn record_usage(&self, account: &UserAccount) -> WebServerResult<()> {
        let filter = format!("eq.{}", account.email);
        let request = self
            .client
            .patch(&self.users_url)
            .query(&[("email", filter.as_str())])
            .json(&json!({
                "usage_count": account.usage_count + 1,
                "last_used_at": Utc::now(),
            }));

        ensure_success(self.authorized(request).send().await?, "usage update").await?;
        Ok(())
    }
}
