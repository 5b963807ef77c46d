pub mod core;
pub mod pipeline;
pub mod scraping;
pub mod webhook;

// --- Primary core exports ---
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::AppState;

// --- Component shortcuts ---
pub use crate::scraping::browser_manager;
pub use crate::scraping::extractor::StaticExtractor;
pub use crate::scraping::resolver::SocialResolver;
pub use crate::webhook::{DispatchSink, WebhookSink};
