//! # Meridian Register Entry Point
//!
//! The actual setup is in lib.rs.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    meridian_register::run().await
}
