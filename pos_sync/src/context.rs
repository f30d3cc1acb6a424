//! Shared handles every engine operation needs.

use std::sync::Arc;

use diesel::SqliteConnection;
use pos_client::PosProvider;

use crate::{
    config::SyncConfig,
    error::{SyncError, SyncResult},
    models::Retailer,
    providers::{HttpProviderFactory, ProviderFactory},
    repo::retailers::{self, CredentialStore, SqliteCredentialStore},
};

/// Configuration plus the seams engines reach providers and credentials through.
#[derive(Clone)]
pub struct SyncContext {
    pub config: SyncConfig,
    pub factory: Arc<dyn ProviderFactory>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl SyncContext {
    pub fn new(
        config: SyncConfig,
        factory: Arc<dyn ProviderFactory>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            factory,
            credentials,
        }
    }

    /// REST providers and SQLite-stored credentials.
    pub fn http(config: SyncConfig) -> Self {
        let factory = Arc::new(HttpProviderFactory::new(config.clone()));
        Self::new(config, factory, Arc::new(SqliteCredentialStore))
    }

    /// Load a retailer and a provider client acting for it.
    pub fn connect(
        &self,
        conn: &mut SqliteConnection,
        retailer_id: i32,
    ) -> SyncResult<(Retailer, Arc<dyn PosProvider>)> {
        let retailer = retailers::get_retailer(conn, retailer_id)?;
        let credentials = self.credentials.get(conn, retailer_id)?.ok_or_else(|| {
            SyncError::Validation(format!("retailer {retailer_id} is not connected"))
        })?;
        let provider = self.factory.provider(&retailer, &credentials)?;
        Ok((retailer, provider))
    }
}
