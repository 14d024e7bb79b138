use fraudwatch_live::{LiveConnection, LiveConnectionOptions, LiveFeed};
use std::time::Duration;

/// Drive the dashboard model from a live backend and print what it would render
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("🦀 Testing dashboard feed\n");

    let origin = std::env::var("FRAUDWATCH_URL").expect("FRAUDWATCH_URL must be set in .env");
    let connection = LiveConnection::for_page(&origin, LiveConnectionOptions::from_env())?;
    let (feed, listeners) = LiveFeed::attach(&connection);

    connection.connect().await;

    for _ in 0..6 {
        tokio::time::sleep(Duration::from_secs(5)).await;

        let mut feed = feed.lock().map_err(|_| "feed lock poisoned")?;
        println!(
            "[{}] transactions={} alerts={}",
            feed.badge().label(),
            feed.transaction_count(),
            feed.alert_count()
        );
        for (component, health) in feed.component_health() {
            println!("   {}: {}", component, health.label());
        }
        for notice in feed.take_notices() {
            println!("   📢 {:?}: {}", notice.level, notice.message);
        }
    }

    LiveFeed::detach(&connection, listeners);
    connection.disconnect().await;
    println!("\n🎉 Done");

    Ok(())
}
