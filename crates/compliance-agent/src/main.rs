//! compliance-agent - scheduled OpenSCAP scans delivered to a collector.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    compliance_agent::run().await
}
