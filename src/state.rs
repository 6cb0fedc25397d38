use std::sync::Arc;

use crate::{
    config::AppConfig, invoice::InvoiceRenderer, notify::Notifier, payment::MpesaClient,
    store::Store,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<MpesaClient>,
    pub invoices: Arc<dyn InvoiceRenderer>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        gateway: MpesaClient,
        invoices: Arc<dyn InvoiceRenderer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            gateway: Arc::new(gateway),
            invoices,
            notifier,
            config: Arc::new(config),
        }
    }
}
