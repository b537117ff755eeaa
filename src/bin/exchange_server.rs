//! Exchange Demo Server
//!
//! A demonstration server that feeds the order book engine with simulated
//! order flow and showcases the event stream, metrics and monitoring.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use orderbook_exchange_engine::exchange::{ChannelSink, Exchange, ExchangeEvent, OrderId, Side};
use orderbook_exchange_engine::metrics::{EngineMetrics, MetricsReporter};
use orderbook_exchange_engine::utils::time::Clock;
use orderbook_exchange_engine::utils::{format_price, price_hash};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Starting exchange demo server...");

    let symbols = vec!["AAPL", "GOOGL", "MSFT", "TSLA", "AMZN"];
    let symbol_set: HashSet<String> = symbols.iter().map(|s| s.to_string()).collect();

    let (sink, receiver) = ChannelSink::unbounded();
    let exchange = Exchange::new(symbol_set, Box::new(sink));
    let metrics = Arc::new(EngineMetrics::new());

    if let Err(e) = install_metrics_recorder() {
        error!("Failed to start metrics exporter: {}", e);
    }

    // Periodic metrics log line
    let reporter_metrics = Arc::clone(&metrics);
    tokio::spawn(async move {
        MetricsReporter::new(reporter_metrics, Duration::from_secs(5))
            .run()
            .await;
    });

    // Event consumer: drains the sink's channel, logs events and feeds the
    // metrics counters.
    let consumer_metrics = Arc::clone(&metrics);
    let _consumer = std::thread::spawn(move || {
        for event in receiver.iter() {
            match &event {
                ExchangeEvent::OrderInserted { status, .. } => {
                    if status.is_ok() {
                        consumer_metrics.increment_orders_inserted();
                    } else {
                        consumer_metrics.increment_inserts_rejected();
                    }
                }
                ExchangeEvent::OrderDeleted { status, .. } => {
                    if status.is_ok() {
                        consumer_metrics.increment_orders_deleted();
                    } else {
                        consumer_metrics.increment_deletes_rejected();
                    }
                }
                ExchangeEvent::BestPriceChanged {
                    symbol,
                    best_bid_price,
                    best_bid_volume,
                    best_ask_price,
                    best_ask_volume,
                } => {
                    consumer_metrics.increment_best_price_updates();
                    consumer_metrics.set_best_bid(*best_bid_price);
                    consumer_metrics.set_best_ask(*best_ask_price);
                    debug!(
                        "{} top of book: bid {} x{} / ask {} x{}",
                        symbol,
                        format_price(*best_bid_price),
                        best_bid_volume,
                        format_price(*best_ask_price),
                        best_ask_volume
                    );
                }
            }
            if let Ok(line) = serde_json::to_string(&event) {
                debug!("event: {}", line);
            }
        }
    });

    // The engine is single-writer: one thread owns it and generates flow.
    let writer_metrics = Arc::clone(&metrics);
    let writer_symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
    let _writer = std::thread::spawn(move || {
        simulate_order_flow(exchange, writer_symbols, writer_metrics);
    });

    info!("Demo server is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down exchange demo server...");

    Ok(())
}

/// Generate a steady mix of inserts and deletes against the engine.
fn simulate_order_flow(mut exchange: Exchange, symbols: Vec<String>, metrics: Arc<EngineMetrics>) {
    let seed = Clock::nanos();
    // Ids are allocated sequentially starting at 1, and this generator only
    // submits valid orders, so it can mirror the allocator for later deletes.
    let mut next_order_id: OrderId = 1;
    let mut live_orders: VecDeque<OrderId> = VecDeque::new();
    let mut tick: u64 = 0;

    info!("Simulated order flow starting (seed {})", seed);

    loop {
        std::thread::sleep(Duration::from_millis(10));
        tick += 1;

        let symbol = &symbols[(price_hash(seed.wrapping_add(tick)) % symbols.len() as u64) as usize];
        let side = if tick % 2 == 0 { Side::Buy } else { Side::Sell };
        let base_price: u64 = 10_000;
        let offset = price_hash(seed ^ tick) % 50;
        let price = match side {
            Side::Buy => base_price - offset,
            Side::Sell => base_price + offset,
        };
        let volume = 10 + price_hash(tick) % 190;

        match tick % 10 {
            // Deletions (30% of activity) once the book has some depth
            0 | 1 | 2 if live_orders.len() > 100 => {
                if let Some(order_id) = live_orders.pop_front() {
                    metrics.time_delete_order(|| exchange.delete_order(order_id));
                }
            }
            _ => {
                metrics
                    .time_insert_order(|| exchange.insert_order(symbol, side, price, volume, tick));
                live_orders.push_back(next_order_id);
                next_order_id += 1;
            }
        }

        // Periodic book statistics
        if tick % 500 == 0 {
            let mut bid_levels = 0u64;
            let mut ask_levels = 0u64;
            for symbol in &symbols {
                if let Some(stats) = exchange.book_stats(symbol) {
                    bid_levels += stats.bid_levels as u64;
                    ask_levels += stats.ask_levels as u64;
                    info!(
                        "{} | {} orders | {}/{} levels | top bid {} x{} / ask {} x{}",
                        stats.symbol,
                        stats.resting_orders,
                        stats.bid_levels,
                        stats.ask_levels,
                        format_price(stats.top.best_bid_price),
                        stats.top.best_bid_volume,
                        format_price(stats.top.best_ask_price),
                        stats.top.best_ask_volume
                    );
                }
            }
            metrics.set_resting_orders(exchange.resting_orders() as u64);
            metrics.set_bid_levels(bid_levels);
            metrics.set_ask_levels(ask_levels);
        }
    }
}

/// Install the Prometheus recorder with an HTTP scrape endpoint.
fn install_metrics_recorder() -> Result<(), Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], 9090))
        .install()?;

    info!("Prometheus metrics available at http://0.0.0.0:9090/metrics");
    Ok(())
}
