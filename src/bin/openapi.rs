//! Print the OpenAPI document as JSON, for client generation.
use anyhow::Result;

fn main() -> Result<()> {
    let doc = duststicks::duststicks::openapi();
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
