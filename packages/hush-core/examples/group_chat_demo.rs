//! # Group Chat Demo
//!
//! A group creator distributes one conversation key to three members, then
//! sends a group message everyone can open.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example group_chat_demo
//! ```

use std::sync::Arc;

use hush_core::crypto::generate_symmetric_key;
use hush_core::{CoreConfig, HushCore, KeyDirectory, MemoryDirectory, MemoryKeyStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hush_core=info".into()),
        )
        .init();

    println!("=== Hush Core: Group Chat Demo ===\n");

    let directory: Arc<dyn KeyDirectory> = Arc::new(MemoryDirectory::new());
    let names = ["alice", "bob", "carol", "dave"];

    let mut clients = Vec::new();
    for name in names {
        let core = HushCore::new(
            CoreConfig::default(),
            directory.clone(),
            Arc::new(MemoryKeyStore::new()),
        );
        core.account()
            .sign_up(name, "correct horse")
            .await
            .expect("Failed to sign up");
        clients.push((name, core));
    }

    // Step 1: Alice creates the group key and boxes it for every member
    println!("Step 1: Alice distributes a new group key...");

    let (_, alice) = &clients[0];
    let members: Vec<String> = names[1..].iter().map(|s| s.to_string()).collect();
    let group_key = generate_symmetric_key();
    let wrapped = alice
        .conversations()
        .distribute_group_key(&group_key, &members)
        .await
        .expect("Failed to distribute group key");

    for (member, envelope) in &wrapped {
        println!("  {:<6} {}", member, envelope.to_compact());
    }
    println!();

    // Step 2: Alice posts to the group
    println!("Step 2: Alice posts a group message...");

    let message = alice
        .conversations()
        .seal_group("Welcome to the group!", &group_key)
        .expect("Failed to seal");
    println!("  Frame: {}", message.encode().expect("Failed to encode"));
    println!();

    // Step 3: Every member recovers the key and reads the message
    println!("Step 3: Members open the message...");

    for (name, core) in &clients[1..] {
        let conversations = core.conversations();
        let key = conversations
            .accept_group_key(&wrapped[*name], "alice")
            .await
            .expect("Failed to accept group key");
        let opened = conversations.open(&message, "alice", name, Some(&key)).await;
        println!("  {:<6} sees: {}", name, opened.display_text());
    }
    println!();

    println!("=== Demo Complete ===");
}
