pub mod time;

/// Tick size used for display formatting (1 tick = $0.01).
pub const DISPLAY_TICK_SIZE: f64 = 0.01;

/// Render a tick price as dollars for log output.
pub fn format_price(price_ticks: u64) -> String {
    format!("${:.2}", price_ticks as f64 * DISPLAY_TICK_SIZE)
}

/// Convert a human price to ticks.
pub fn price_to_ticks(price: f64) -> u64 {
    (price / DISPLAY_TICK_SIZE).round() as u64
}

/// Deterministically scatter a sequence number across a range of values.
/// Used by the benchmarks and the demo server to spread order prices.
pub fn price_hash(seed: u64) -> u64 {
    seed.wrapping_mul(0x9E3779B97F4A7C15)
}
