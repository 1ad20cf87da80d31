//! Seed a local warehouse with synthetic hourly candles
//!
//! Usage:
//!   cargo run --bin seed_warehouse -- <db_path> [hours]
//!
//! Creates the schema, then writes a random-walk candle per hour for every
//! (exchange, market) pair, ending at the current hour.

use chrono::{DurationRound, TimeDelta, Utc};
use dashboards::service::EXCHANGES;
use dashboards::storage::run_schema_migrations;
use log::info;
use rand::Rng;
use rusqlite::{params, Connection};
use std::env;

const SCHEMA_DIR: &str = "sql/schema";
const DEFAULT_HOURS: i64 = 24 * 30;

/// Market and its starting close price
const MARKETS: [(&str, f64); 3] = [("BTCUSD", 42_000.0), ("ETHUSD", 2_300.0), ("SOLUSD", 100.0)];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    dashboards::logging::init(false);

    let args: Vec<String> = env::args().collect();
    let db_path = args
        .get(1)
        .ok_or("usage: seed_warehouse <db_path> [hours]")?;
    let hours: i64 = match args.get(2) {
        Some(raw) => raw.parse()?,
        None => DEFAULT_HOURS,
    };

    let mut conn = Connection::open(db_path)?;
    run_schema_migrations(&mut conn, SCHEMA_DIR)?;

    let end = Utc::now().duration_trunc(TimeDelta::hours(1))?;
    let start = end - TimeDelta::hours(hours);
    let mut rng = rand::thread_rng();

    info!("🌱 Seeding {} hours into {}", hours, db_path);

    let tx = conn.transaction()?;
    let mut inserted = 0usize;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO ohlcv_hourly
             (timestamp, exchange, market, open, high, low, close, volume_token)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;

        for exchange in EXCHANGES.iter() {
            for (market, initial_price) in MARKETS.iter() {
                let mut close = *initial_price;

                for hour in 0..hours {
                    let open = close;
                    close = open * (1.0 + rng.gen_range(-0.02..0.02));
                    let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
                    let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
                    let volume: f64 = rng.gen_range(10.0..1_000.0);
                    let timestamp = (start + TimeDelta::hours(hour)).timestamp();

                    stmt.execute(params![timestamp, exchange, market, open, high, low, close, volume])?;
                    inserted += 1;
                }
            }
        }
    }
    tx.commit()?;

    info!("✅ Inserted {} candles", inserted);
    Ok(())
}
