/*
 * Responsibility
 * - tokio runtime entry point
 * - delegates to app::run() (no logic here)
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    policy_gate::app::run().await
}
