//! # Direct Chat Demo
//!
//! Two clients sharing one directory exchange a direct message, and a third
//! user fails to read it.
//!
//! ## Run
//!
//! ```bash
//! RUST_LOG=hush_core=debug cargo run --example direct_chat_demo
//! ```

use std::sync::Arc;

use hush_core::{CoreConfig, Envelope, HushCore, KeyDirectory, MemoryDirectory, MemoryKeyStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hush_core=info".into()),
        )
        .init();

    println!("=== Hush Core: Direct Chat Demo ===\n");

    // Step 1: Three clients, one directory
    println!("Step 1: Signing up Alice, Bob and Eve...");

    let directory: Arc<dyn KeyDirectory> = Arc::new(MemoryDirectory::new());
    let client = || {
        HushCore::new(
            CoreConfig::default(),
            directory.clone(),
            Arc::new(MemoryKeyStore::new()),
        )
    };
    let alice = client();
    let bob = client();
    let eve = client();

    for (core, id, password) in [(&alice, "alice", "a"), (&bob, "bob", "b"), (&eve, "eve", "e")] {
        let public = core
            .account()
            .sign_up(id, password)
            .await
            .expect("Failed to sign up");
        println!("  {:<5} fingerprint {}", id, &public.fingerprint()[..16]);
    }
    println!();

    // Step 2: Alice seals a message for Bob
    println!("Step 2: Alice seals a message for Bob...");

    let envelope = alice
        .conversations()
        .seal_direct("bob", "Meet at noon?")
        .await
        .expect("Failed to seal");
    let wire = envelope.encode().expect("Failed to encode");

    println!("  Wire form: {}...", &wire[..wire.len().min(48)]);
    println!("  Wire length: {} characters", wire.len());
    println!();

    // Step 3: Bob and Eve both try to open it
    println!("Step 3: Opening on each client...");

    let received = Envelope::decode(&wire).expect("Failed to decode");
    for (core, id) in [(&bob, "bob"), (&eve, "eve")] {
        let opened = core
            .conversations()
            .open(&received, "alice", id, None)
            .await;
        println!("  {:<5} sees: {}", id, opened.display_text());
    }
    println!();

    println!("=== Demo Complete ===");
}
