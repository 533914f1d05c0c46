pub mod availability;
pub mod cache;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod parser;
pub mod service;
pub mod store;
pub mod web;

pub use cache::{AvailabilityCache, InMemoryCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BufferConfig, BusinessHoursConfig, CandidateWindow, EngineConfig, ServerConfig};
pub use error::{AvailabilityError, Result, StoreError};
pub use service::{AvailabilityEvent, AvailabilityResponse, AvailabilityService, QueryMetadata};
pub use store::{AvailabilityStore, InMemoryStore};
