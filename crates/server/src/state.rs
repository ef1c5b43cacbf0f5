use std::sync::Arc;

use qline_core::{audit::AuditStore, BroadcastHub, Config, TicketService, TicketStore};

/// Shared application state
pub struct AppState {
    config: Config,
    service: TicketService,
    tickets: Arc<dyn TicketStore>,
    hub: Arc<BroadcastHub>,
    audit_store: Arc<dyn AuditStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        service: TicketService,
        tickets: Arc<dyn TicketStore>,
        hub: Arc<BroadcastHub>,
        audit_store: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            config,
            service,
            tickets,
            hub,
            audit_store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> &TicketService {
        &self.service
    }

    pub fn tickets(&self) -> &dyn TicketStore {
        self.tickets.as_ref()
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }
}
