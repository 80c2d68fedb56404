//! # vt-market
//!
//! Market data for the Venezuelan market page: official exchange rates,
//! bank quotes, border currencies, crypto P2P prices and stock quotes.
//!
//! The upstream API is loosely typed. Every payload goes through
//! [`normalize`], which accepts only the known shapes and produces one
//! predictable [`MarketSnapshot`].
//!
//! ```text
//! ┌──────────────────┐   ┌─────────────┐   ┌────────────────┐
//! │  MarketSource    │──▶│  normalize  │──▶│ MarketSnapshot │
//! │ (HTTP / static)  │   │ (typed sum) │   │ (sorted lists) │
//! └──────────────────┘   └─────────────┘   └────────────────┘
//! ```

pub mod error;
pub mod model;
pub mod normalize;
pub mod source;

pub use error::{MarketError, Result};
pub use model::{BankQuote, MarketSnapshot, Quote};
pub use normalize::{UpstreamPayload, normalize};
pub use source::{HttpMarketSource, MarketSource, StaticMarketSource};
