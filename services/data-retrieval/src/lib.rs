//! Market data collaborators for the strategy engine
//!
//! Historical prices and token metadata from CoinGecko, next-price
//! predictions from the prediction service, and the caller-owned cache and
//! fallback policy those clients are configured with.

pub mod types;
pub mod sources {
    pub mod coingecko;
    pub mod prediction;
}
pub mod normalizers;
pub mod cache;
pub mod fallback;

pub use types::*;
pub use sources::coingecko::CoinGeckoClient;
pub use sources::prediction::PredictionClient;
pub use cache::TtlCache;
pub use fallback::{Resolved, TokenFallback};
