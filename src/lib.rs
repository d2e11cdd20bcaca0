//! marketfeed: resilient read-through cache for crypto market data
//!
//! The [`cache`] module is the core: a dual-tier (fresh/stale) store behind a
//! single-flight gate and a failure-classifying retry executor. [`apis`]
//! supplies fetch functions for CoinGecko and CryptoCompare, and
//! [`marketdata`] binds every logical operation to a key and TTL policy.

pub mod apis;
pub mod cache;
pub mod config;
pub mod errors;
pub mod logger;
pub mod marketdata;
