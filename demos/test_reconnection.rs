use fraudwatch_live::{ConnectionState, LiveConnection, LiveConnectionOptions, LiveEvent};
use std::time::Duration;

/// Test reconnection behavior against a real backend
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing to see logs
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("🦀 Testing reconnection\n");

    let origin = std::env::var("FRAUDWATCH_URL").expect("FRAUDWATCH_URL must be set in .env");
    let connection = LiveConnection::for_page(&origin, LiveConnectionOptions::from_env())?;
    println!("📡 Connecting to: {}\n", connection.endpoint());

    connection.on("close", |event| {
        if let LiveEvent::Close(info) = event {
            if info.terminal {
                println!("🛑 Gave up reconnecting");
            } else if info.will_reconnect {
                println!("🔄 Closed with {}, reconnect scheduled", info.code);
            }
        }
    });

    // Test 1: Connect and verify
    println!("✅ Test 1: Initial connection...");
    connection.connect().await;
    assert!(connection.is_connected(), "Should be connected");
    println!("✅ Connected successfully!\n");

    tokio::time::sleep(Duration::from_secs(2)).await;

    // Test 2: Manual disconnect should NOT trigger reconnection
    println!("✅ Test 2: Manual disconnect (should NOT auto-reconnect)...");
    connection.disconnect().await;
    assert!(!connection.is_connected(), "Should be disconnected");

    println!("⏳ Waiting 5 seconds to verify no auto-reconnect...");
    tokio::time::sleep(Duration::from_secs(5)).await;
    if connection.is_connected() {
        return Err("Should NOT reconnect after manual disconnect".into());
    }
    println!("✅ Correctly stayed disconnected after manual disconnect!\n");

    // Test 3: Manual reconnect
    println!("✅ Test 3: reconnect()...");
    connection.reconnect().await;
    assert!(connection.is_connected(), "Should be connected again");
    println!("✅ Reconnected successfully\n");

    // Test 4: Automatic reconnection
    println!("💡 Stop the backend (or your network) now, then bring it back.");
    println!("⏳ Watching the connection for 60 seconds...\n");

    let mut changes = connection.state_changes();
    let watch = async {
        while changes.changed().await.is_ok() {
            let state = *changes.borrow_and_update();
            let attempts = connection.snapshot().reconnect_attempts;
            println!("   state={} attempts={}", state.as_str(), attempts);
        }
    };
    let _ = tokio::time::timeout(Duration::from_secs(60), watch).await;

    let snapshot = connection.snapshot();
    println!("\n📊 Final: {:#?}", snapshot);
    connection.disconnect().await;

    if snapshot.state == ConnectionState::Connected {
        println!("🎉 Reconnection test passed!");
    }
    Ok(())
}
