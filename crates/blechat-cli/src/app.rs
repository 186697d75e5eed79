//! Application wiring: transport selection, history storage and the session

use std::sync::Arc;

use tracing::info;

use blechat_ble::BleTransport;
use blechat_core::session::global;
use blechat_core::{
    HistoryStore, SessionManager, SimulatedTransport, Transport, TransportKind,
};

use crate::config::AppConfig;
use crate::error::Result;
use crate::history::FileHistoryStore;

/// Core BLE chat application
pub struct BlechatApp {
    config: AppConfig,
    store: Arc<FileHistoryStore>,
    session: SessionManager,
}

impl BlechatApp {
    /// Build the transport chosen by the configuration and a session on top
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = Arc::new(FileHistoryStore::new(config.history_dir()?));
        let transport = build_transport(&config);
        info!(
            "Using {} transport, history in {}",
            transport.kind(),
            store.dir().display()
        );

        let session = SessionManager::builder(transport)
            .history_store(store.clone())
            .build();

        Ok(Self {
            config,
            store,
            session,
        })
    }

    /// Publish the session as the process-wide instance
    pub fn install_global(&self) -> Result<&'static SessionManager> {
        Ok(global::init(self.session.clone())?)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn history(&self) -> Arc<dyn HistoryStore> {
        self.store.clone()
    }
}

/// Construct the transport selected at start-up
pub fn build_transport(config: &AppConfig) -> Arc<dyn Transport> {
    match config.transport.kind {
        TransportKind::Ble => Arc::new(BleTransport::new(config.ble.clone())),
        TransportKind::Simulated => Arc::new(SimulatedTransport::new(config.simulator.clone())),
    }
}
