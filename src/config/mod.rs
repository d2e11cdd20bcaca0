//! Configuration system
//!
//! Sections are declared with [`config_struct!`](crate::config_struct) and
//! loaded from TOML. Missing keys fall back to their inline defaults.

mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{CacheConfig, CoinGeckoConfig, Config, CryptoCompareConfig, RetryConfig};
pub use utils::{
    get_config_clone, load_config, load_config_from_path, read_config_file,
    reload_config_from_path, with_config, CONFIG, CONFIG_FILE_PATH,
};
