use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use mockbank::config::SimulationSettings;
use mockbank::handlers::BankClient;
use mockbank::models::envelope::ResponseEnvelope;
use mockbank::storage::{KeyValueStore, MemoryStore};
use mockbank::utils::seeder::seed_data;

/// Scripted demo session: seeds a profile, boots the worker context, runs a
/// handful of calls, and dumps the envelopes plus the network transcript.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = SimulationSettings::from_env()?;
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    seed_data(store.as_ref())?;

    let client = BankClient::with_network(store, settings).await;

    let login = client.login("john.doe", "user123").await;
    print_envelope("login", &login)?;
    let user_id = login
        .data
        .as_ref()
        .and_then(|data| data["user"]["userId"].as_str())
        .map(str::to_string)
        .unwrap_or_default();

    print_envelope("balance", &client.balance(&user_id).await)?;
    print_envelope(
        "transfer",
        &client
            .transfer(&user_id, "9876543210", 250.0, "Rent split")
            .await,
    )?;
    print_envelope("history", &client.transactions(&user_id, Some(5)).await)?;
    print_envelope("logout", &client.logout().await)?;

    // The same call after logout is rejected at the boundary.
    print_envelope("balance after logout", &client.balance(&user_id).await)?;

    if let Some(log) = client.network_log() {
        println!("\nnetwork transcript ({} requests):", log.len());
        for entry in log.entries() {
            println!("  {:6} {:40} -> {}", entry.method, entry.path, entry.status);
        }
    }

    Ok(())
}

fn print_envelope(label: &str, envelope: &ResponseEnvelope) -> Result<()> {
    println!("\n== {} ==\n{}", label, serde_json::to_string_pretty(envelope)?);
    Ok(())
}
