//! Statically known exchanges

/// Exchanges present in the warehouse, in display order
pub static EXCHANGES: [&str; 4] = ["Binance", "ByBit", "dYdX-v3", "dYdX-v4"];

pub fn exchange_names() -> Vec<String> {
    EXCHANGES.iter().map(|name| name.to_string()).collect()
}
