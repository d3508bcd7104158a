// Redemption Tracker - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod models;
pub mod period;     // Period ids and ordering per frequency
pub mod engine;     // Period reset + year rollover
pub mod summary;    // Current-year and archived totals
pub mod store;      // Persistence gateway (JSON file / memory)
pub mod repository; // Guarded ledger + CRUD
pub mod clock;
pub mod config;
pub mod error;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod scheduler;

// Re-export commonly used types
pub use models::{Card, Frequency, Ledger, NewCard, NewRedemption, Redemption};
pub use period::{is_later_period, period_id, year_of};
pub use engine::{reset_and_rollover, set_checked, ResetOutcome};
pub use summary::{
    current_year_reimbursement_total, current_year_total, refresh_current_year_totals,
    yearly_summary,
};
pub use store::{CardStore, JsonFileStore, MemoryStore};
pub use repository::CardRepository;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ServerConfig};
pub use error::{ApiError, StoreError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
