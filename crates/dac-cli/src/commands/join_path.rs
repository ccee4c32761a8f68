//! `dac join-path` command implementation.

use anyhow::Result;
use dac_core::DacConfig;
use dac_joinpath::JoinPath;

use super::{OutputFormat, SourceArgs, Target};

pub async fn run(
    config: &DacConfig,
    source: &SourceArgs,
    tables: &[String],
    format: OutputFormat,
) -> Result<()> {
    let target = Target::open(config, source)?;
    let path = target
        .engine
        .find_join_path(&target.database_id, tables)
        .await?;
    println!("{}", render(&path, format)?);
    Ok(())
}

fn render(path: &JoinPath, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => path.to_sql(),
        OutputFormat::Json => serde_json::to_string_pretty(path)?,
    })
}
