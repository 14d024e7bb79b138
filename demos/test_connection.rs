use fraudwatch_live::{LiveConnection, LiveConnectionOptions, LiveEvent};
use std::time::Duration;

/// Connect to a running fraud detection backend and print the lifecycle
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing to see logs
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraudwatch_live=debug".into()),
        )
        .init();

    println!("🦀 Testing connection to the fraud monitor\n");

    let origin = std::env::var("FRAUDWATCH_URL").expect("FRAUDWATCH_URL must be set in .env");
    let connection = LiveConnection::for_page(&origin, LiveConnectionOptions::from_env())?;
    println!("📡 Endpoint: {}\n", connection.endpoint());

    connection.on("open", |_| println!("✅ open"));
    connection.on("close", |event| {
        if let LiveEvent::Close(info) = event {
            println!(
                "❌ close code={} clean={} will_reconnect={}",
                info.code, info.clean, info.will_reconnect
            );
        }
    });
    connection.on("error", |event| {
        if let LiveEvent::Error(message) = event {
            println!("⚠️  error: {}", message);
        }
    });

    connection.connect().await;
    if !connection.is_connected() {
        return Err("Could not connect, is the backend running?".into());
    }
    println!("✅ Connected!\n");

    tokio::time::sleep(Duration::from_secs(3)).await;
    println!("📊 {:#?}\n", connection.snapshot());

    connection.disconnect().await;
    println!("🎉 Connection test passed!");

    Ok(())
}
