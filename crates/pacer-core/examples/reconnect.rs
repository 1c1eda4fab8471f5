//! Example: Driving a reconnect loop with `ExponentialBackoff`
//!
//! This example demonstrates:
//! 1. Async retry loop inside a reset guard
//! 2. Blocking iteration with a tighter budget
//! 3. Jitter impact (run multiple times to see variance)
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run -p pacer-core --example reconnect
//! ```

use pacer_core::prelude::*;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// A simulated server that refuses the first few connections
struct FlakyServer {
    attempts: Arc<AtomicU32>,
    fail_count: u32,
}

impl FlakyServer {
    fn new(fail_count: u32) -> Self {
        Self {
            attempts: Arc::new(AtomicU32::new(0)),
            fail_count,
        }
    }

    fn connect(&self) -> std::result::Result<&'static str, std::io::Error> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_count {
            println!("  Attempt {}: connection refused", attempt + 1);
            Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
        } else {
            println!("  Attempt {}: connected", attempt + 1);
            Ok("session-1")
        }
    }

    fn total_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Example 1: async reconnect loop, counter reset once the loop is left
async fn example_async_reconnect(backoff: &mut ExponentialBackoff) -> Result<()> {
    println!("\n=== Example 1: Async Reconnect ===\n");

    let server = FlakyServer::new(2);
    let start = Instant::now();

    let session = backoff
        .scoped_async(async |b: &mut ExponentialBackoff| -> Result<&'static str> {
            loop {
                if let Ok(session) = server.connect() {
                    return Ok(session);
                }
                b.step_suspending().await?;
            }
        })
        .await?;

    println!("\nSession: {}", session);
    println!("Total attempts: {}", server.total_attempts());
    println!("Total time: {:?}", start.elapsed());
    println!("Retries after scope: {}", backoff.retries());

    Ok(())
}

/// Example 2: blocking iteration that gives up
fn example_blocking_give_up() -> Result<()> {
    println!("\n=== Example 2: Blocking Iteration Until Exhausted ===\n");

    let mut backoff = ExponentialBackoff::builder()
        .base_delay(Duration::from_millis(10))
        .max_retries(3)
        .log("example.blocking")
        .build()?;

    let server = FlakyServer::new(10);
    if server.connect().is_err() {
        for step in backoff.iter() {
            println!("  waited {:?} (retry {})", step.delay, step.attempt);
            if server.connect().is_ok() {
                break;
            }
        }
    }

    let err = backoff.step_blocking().unwrap_err();
    println!("Gave up: {}", err);

    Ok(())
}

/// Example 3: Jitter demonstration
fn example_jitter() -> Result<()> {
    println!("\n=== Example 3: Jitter Impact ===\n");

    let plain = BackoffConfig {
        base_delay: 0.1,
        ..BackoffConfig::default()
    };
    let jittered = BackoffConfig {
        jitter: true,
        ..plain.clone()
    };

    let plain = ExponentialBackoff::from_config(&plain)?;
    let jittered = ExponentialBackoff::from_config(&jittered)?;

    for run in 1..=5 {
        println!(
            "  Run {}: without jitter {:?}, with jitter {:?}",
            run,
            plain.current_delay(),
            jittered.current_delay()
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut backoff = ExponentialBackoff::builder()
        .base_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(2))
        .max_retries(5)
        .log("example.reconnect")
        .build()?;

    example_async_reconnect(&mut backoff).await?;
    example_blocking_give_up()?;
    example_jitter()?;

    Ok(())
}
