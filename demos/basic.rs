use fraudwatch_live::{LiveConnection, LiveConnectionOptions, LiveEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Create connection for the dashboard served at this origin
    let connection =
        LiveConnection::for_page("http://localhost:8000", LiveConnectionOptions::default())?;

    connection.on("alert", |event| {
        if let LiveEvent::Alert(alert) = event {
            println!("🚨 {} alert for {}", alert.severity_level().as_str(), alert.transaction_id);
        }
    });

    // Connect
    println!("Connecting to {}...", connection.endpoint());
    connection.connect().await;
    println!("State: {}", connection.state().as_str());

    // Keep connection alive
    tokio::signal::ctrl_c().await?;

    // Disconnect
    println!("Disconnecting...");
    connection.disconnect().await;
    println!("Disconnected!");

    Ok(())
}
