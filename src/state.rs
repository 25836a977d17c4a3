//! Application state trait for dependency injection
//!
//! Handlers and middleware are generic over `HasServices`, so the same
//! router runs against the production `AppState` and against the in-memory
//! state used by the HTTP tests.

use crate::config::Config;
use crate::credential::CredentialService;
use crate::events::EventBus;
use crate::mediator::Mediator;
use crate::tenancy::TenantResolver;
use crate::transactor::Transactor;
use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;

#[async_trait]
pub trait HasServices: Clone + Send + Sync + 'static {
    fn config(&self) -> &Config;

    /// Sealed dispatcher every endpoint sends its request through
    fn mediator(&self) -> &Mediator;

    fn credentials(&self) -> &CredentialService;

    fn tenant_resolver(&self) -> &TenantResolver;

    fn event_bus(&self) -> &EventBus;

    fn transactor(&self) -> &Transactor;

    /// Prometheus handle when metrics are enabled
    fn prometheus_handle(&self) -> Option<&PrometheusHandle> {
        None
    }

    /// Whether backing stores answer; drives `/ready`.
    async fn check_ready(&self) -> bool;
}
