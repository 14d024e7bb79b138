use fraudwatch_live::{EventEnvelope, LiveConnection, LiveConnectionOptions};
use serde_json::json;
use std::time::Duration;

/// Send application messages and check the guard on a closed connection
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("🦀 Testing send\n");

    let origin = std::env::var("FRAUDWATCH_URL").expect("FRAUDWATCH_URL must be set in .env");
    let connection = LiveConnection::for_page(&origin, LiveConnectionOptions::from_env())?;

    // Not connected yet: dropped with a warning
    let sent = connection.send_event("subscribe", json!({"channels": ["alerts"]}));
    assert!(!sent, "send must fail while disconnected");
    println!("✅ Send before connect was dropped\n");

    connection.connect().await;
    if !connection.is_connected() {
        return Err("Could not connect".into());
    }

    let sent = connection.send(
        EventEnvelope::new("subscribe").with_data(json!({"channels": ["alerts", "transactions"]})),
    );
    println!("📤 subscribe sent: {}", sent);

    connection.on("message", |event| println!("📥 {}", event.payload()));
    tokio::time::sleep(Duration::from_secs(5)).await;

    connection.disconnect().await;
    assert!(!connection.send_event("ping", json!({})));
    println!("\n🎉 Send test passed!");

    Ok(())
}
