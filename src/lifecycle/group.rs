//! Ordered composite of services.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::lifecycle::service::{Service, ServiceError};

/// An ordered collection of services started and stopped as one unit.
///
/// Insertion order is start order. The first start failure aborts the
/// sequence; members started before it are stopped again so nothing is
/// left listening, and the failure is returned unchanged. Stop visits every
/// member regardless of individual failures.
pub struct ServiceGroup {
    name: String,
    services: Vec<Arc<dyn Service>>,
}

impl ServiceGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: Vec::new(),
        }
    }

    /// Append a member (builder style).
    pub fn with<S: Service + 'static>(mut self, service: S) -> Self {
        self.push(Arc::new(service));
        self
    }

    /// Append a shared member.
    pub fn push(&mut self, service: Arc<dyn Service>) {
        self.services.push(service);
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Members in start order.
    pub fn services(&self) -> impl Iterator<Item = &Arc<dyn Service>> {
        self.services.iter()
    }

    /// Every member failure currently observable, in member order.
    pub fn failures(&self) -> Vec<Arc<ServiceError>> {
        self.services
            .iter()
            .filter_map(|service| service.last_error())
            .collect()
    }

    /// Stop `members` in order and return the failures they raised while
    /// stopping. Failures recorded before the stop are not reported again.
    async fn stop_members(&self, members: &[Arc<dyn Service>]) -> Vec<Arc<ServiceError>> {
        let mut raised = Vec::new();
        for service in members {
            let started = Instant::now();
            let before = service.last_error();
            service.stop().await;

            match service.last_error() {
                Some(err) if !before.as_ref().is_some_and(|prev| Arc::ptr_eq(prev, &err)) => {
                    tracing::warn!(
                        group = %self.name,
                        service = %service.name(),
                        error = %err,
                        "Service reported a failure while stopping"
                    );
                    raised.push(err);
                }
                _ => tracing::debug!(
                    group = %self.name,
                    service = %service.name(),
                    elapsed = ?started.elapsed(),
                    "Service stopped"
                ),
            }
        }
        raised
    }
}

#[async_trait]
impl Service for ServiceGroup {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), ServiceError> {
        for (index, service) in self.services.iter().enumerate() {
            tracing::debug!(group = %self.name, service = %service.name(), "Starting service");

            if let Err(err) = service.start().await {
                tracing::error!(
                    group = %self.name,
                    service = %service.name(),
                    error = %err,
                    "Service failed to start, stopping the ones already started"
                );
                self.stop_members(&self.services[..index]).await;
                return Err(err);
            }
        }

        tracing::info!(group = %self.name, services = self.services.len(), "Service group started");
        Ok(())
    }

    async fn stop(&self) {
        let raised = self.stop_members(&self.services).await;
        tracing::info!(
            group = %self.name,
            services = self.services.len(),
            failures = raised.len(),
            "Service group stopped"
        );
    }

    fn last_error(&self) -> Option<Arc<ServiceError>> {
        self.services
            .iter()
            .rev()
            .find_map(|service| service.last_error())
    }
}
