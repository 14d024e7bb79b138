use fraudwatch_live::{LiveConnection, LiveConnectionOptions};
use std::time::Duration;

/// Watch heartbeats go out on a short interval
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("🦀 Testing heartbeat\n");

    let origin = std::env::var("FRAUDWATCH_URL").expect("FRAUDWATCH_URL must be set in .env");
    let connection = LiveConnection::for_page(
        &origin,
        LiveConnectionOptions {
            heartbeat_interval: Some(2_000),
            ..LiveConnectionOptions::from_env()
        },
    )?;

    connection.connect().await;
    if !connection.is_connected() {
        return Err("Could not connect".into());
    }

    println!("⏳ Waiting 7 seconds for heartbeats...\n");
    tokio::time::sleep(Duration::from_secs(7)).await;

    let snapshot = connection.snapshot();
    println!("💓 Heartbeats sent: {}", snapshot.heartbeats_sent);
    println!("💓 Last sent: {:?}", snapshot.last_heartbeat_sent);
    println!("💓 Last acknowledged: {:?}", snapshot.last_heartbeat_ack);

    connection.disconnect().await;

    if snapshot.heartbeats_sent >= 3 {
        println!("\n🎉 Heartbeat test passed!");
        Ok(())
    } else {
        Err(format!("expected 3 heartbeats, saw {}", snapshot.heartbeats_sent).into())
    }
}
