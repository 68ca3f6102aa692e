//! Remote blob transfers
//!
//! Provides:
//! - Locator parsing and resource-key normalization
//! - The generic HTTP transport and its failure classification
//! - Deduplicated, retrying transfers with object-store fallback
//! - Delivery of completions onto the UI-affine context

mod coordinator;
mod dispatch;
mod http;
mod locator;

pub use coordinator::{TransferCoordinator, TransferState, Transport};
pub use dispatch::{ChannelDispatcher, InlineDispatcher, UiDispatcher, UiQueue, UiTask};
pub use http::{HttpTransport, ReqwestTransport};
pub use locator::{Locator, ResourceKey};
