//! Domain models for forecast-engine.

mod invoice;
mod line_item;
mod subscription;

pub use invoice::InvoiceEvent;
pub use line_item::{LineItem, LineItemRecord};
pub use subscription::{AnchorValue, Subscription, SubscriptionRecord};
