// Service directory - the fixed set of services the admin component watches
use std::sync::Arc;

use crate::config::ServicesConfig;
use crate::models::{ServiceDescriptor, ServiceKind};

#[derive(Debug, Clone)]
pub struct ServiceDirectory {
    entries: Arc<[ServiceDescriptor]>,
}

impl ServiceDirectory {
    pub fn new(entries: Vec<ServiceDescriptor>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn from_config(services: &ServicesConfig) -> Self {
        Self::new(vec![
            ServiceDescriptor::new(
                "authentication_service",
                &services.authentication_service,
                ServiceKind::Microservice,
            ),
            ServiceDescriptor::new(
                "catalog_service",
                &services.catalog_service,
                ServiceKind::Microservice,
            ),
            ServiceDescriptor::new(
                "streaming_service",
                &services.streaming_service,
                ServiceKind::Microservice,
            ),
            ServiceDescriptor::new(
                "video_processor",
                &services.video_processor,
                ServiceKind::Processor,
            ),
            ServiceDescriptor::new(
                "queue_service",
                &services.queue_service,
                ServiceKind::Messaging,
            ),
            ServiceDescriptor::new(
                "ualflix_db_primary",
                &services.ualflix_db_primary,
                ServiceKind::DataStoreNode,
            ),
            ServiceDescriptor::new(
                "ualflix_db_secondary",
                &services.ualflix_db_secondary,
                ServiceKind::DataStoreNode,
            ),
        ])
    }

    pub fn list(&self) -> &[ServiceDescriptor] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.entries.iter().find(|d| d.name == name)
    }
}
