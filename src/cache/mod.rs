//! Fragment cache.
//!
//! Rendered catalog fragments are cached per section, widget uid, request
//! parameters and configuration. Each entry carries invalidation tags and an
//! expiry; catalog changes are published as events and consumed into tag
//! invalidations.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 500
//! tag_all = true
//! ```

mod config;
mod consumer;
mod events;
mod gate;
mod keys;
mod lock;
mod planner;
mod registry;
mod store;
mod tags;
mod trigger;

pub use config::CacheConfig;
pub use consumer::InvalidationConsumer;
pub use events::{CacheEvent, Epoch, EventKind, EventQueue};
pub use gate::{CacheGate, Fragment, GateOutcome, Rendered};
pub use keys::{FragmentKey, Section, UnknownSection, fingerprint};
pub use planner::InvalidationPlan;
pub use registry::TagRegistry;
pub use store::{CacheEntry, FragmentStore, MemoryFragmentStore, StoreError};
pub use tags::{Annotation, Linked, Tag, TagAnnotator, TagMode, Taggable};
pub use trigger::CacheTrigger;
