//! Upstream HTTP clients
//!
//! Each client method is a fetch function for the read-through cache: it
//! returns normalized domain types or a classified `FetchError`.

pub mod client;
pub mod coingecko;
pub mod cryptocompare;

pub use client::HttpClient;
pub use coingecko::CoinGeckoClient;
pub use cryptocompare::{CryptoCompareClient, HistoEndpoint};
