//! Contact lookup seam used by the name resolver
//!
//! The resolver only needs keyword search; keeping it behind a trait lets the
//! rendering pipeline run against the live gateway or an in-memory directory.

use std::future::Future;

use crate::errors::AppResult;
use crate::gateway::Gateway;
use crate::models::Contact;

/// Source of contact search results
pub trait ContactDirectory: Send + Sync {
    /// Search contacts by keyword, best match first
    fn search_contacts(&self, keyword: &str)
    -> impl Future<Output = AppResult<Vec<Contact>>> + Send;
}

impl ContactDirectory for Gateway {
    async fn search_contacts(&self, keyword: &str) -> AppResult<Vec<Contact>> {
        Gateway::search_contacts(self, keyword).await
    }
}
