use std::any::Any;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::TriggerEvent;

/// Contract every trigger adapter implements, regardless of what kind of
/// external event it surfaces.
#[async_trait]
pub trait TriggerAdapter: Send + Sync {
    fn trigger_id(&self) -> &str;

    /// Start the adapter's own polling loop (or, for webhook triggers, simply
    /// mark itself ready to receive `inject`ed events). Events are pushed
    /// onto `emit` as they qualify.
    async fn start(&self, emit: mpsc::UnboundedSender<TriggerEvent>);

    /// Stop the adapter's loop. Idempotent.
    async fn stop(&self);

    /// Lets the registry recover the concrete adapter type for the one
    /// operation (synchronous webhook injection) that isn't uniform across
    /// adapter kinds.
    fn as_any(&self) -> &dyn Any;
}
