//! Component health and readiness for the risk engine
//!
//! The service reports these on `/healthz` and `/readyz`. A missing model
//! only degrades the engine: the rule-based path keeps serving.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Working with reduced capability
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }

    fn worse(self, other: Self) -> Self {
        use ComponentStatus::*;
        match (self, other) {
            (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
            (Degraded, _) | (_, Degraded) => Degraded,
            _ => Healthy,
        }
    }
}

/// Parts of the engine that report health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// Ensemble / rule-based prediction path
    Predictor,
    /// Trained model artifact
    Model,
    /// Metrics data source
    Source,
    Trainer,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::Predictor => "predictor",
            Component::Model => "model",
            Component::Source => "source",
            Component::Trainer => "trainer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn at_now(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::at_now(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::at_now(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::at_now(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<Component, ComponentHealth>,
}

impl HealthResponse {
    fn from_components(components: BTreeMap<Component, ComponentHealth>) -> Self {
        let status = components
            .values()
            .map(|h| h.status)
            .fold(ComponentStatus::Healthy, ComponentStatus::worse);
        Self { status, components }
    }

    /// First unhealthy component in declaration order
    pub fn first_unhealthy(&self) -> Option<Component> {
        self.components
            .iter()
            .find(|(_, h)| !h.status.is_operational())
            .map(|(c, _)| *c)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReadinessResponse {
    fn not_ready(reason: String) -> Self {
        Self {
            ready: false,
            reason: Some(reason),
        }
    }
}

/// Shared component table plus the startup-complete flag
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<Component, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, component: Component) {
        self.update(component, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, component: Component, health: ComponentHealth) {
        self.components.write().await.insert(component, health);
    }

    pub async fn set_healthy(&self, component: Component) {
        self.update(component, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, component: Component, message: impl Into<String>) {
        self.update(component, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, component: Component, message: impl Into<String>) {
        self.update(component, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn status_of(&self, component: Component) -> Option<ComponentStatus> {
        self.components.read().await.get(&component).map(|h| h.status)
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        HealthResponse::from_components(self.components.read().await.clone())
    }

    /// Ready once startup finished and no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        if !*self.ready.read().await {
            return ReadinessResponse::not_ready("Engine not yet initialized".to_string());
        }
        match self.health().await.first_unhealthy() {
            Some(component) => {
                ReadinessResponse::not_ready(format!("Component {} unhealthy", component))
            }
            None => ReadinessResponse {
                ready: true,
                reason: None,
            },
        }
    }
}
