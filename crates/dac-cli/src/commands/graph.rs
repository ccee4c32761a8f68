//! `dac graph` command implementation.

use anyhow::Result;
use dac_core::DacConfig;
use dac_joinpath::CachedGraph;
use serde::Serialize;

use super::{OutputFormat, SourceArgs, Target};

#[derive(Debug, Serialize)]
struct GraphSummary<'a> {
    database: &'a str,
    fingerprint: &'a str,
    tables: usize,
    foreign_keys: usize,
    self_references: Vec<String>,
    isolated_tables: Vec<&'a str>,
}

impl<'a> GraphSummary<'a> {
    fn from_entry(entry: &'a CachedGraph) -> Self {
        let graph = &entry.graph;
        Self {
            database: &entry.database_id,
            fingerprint: entry.fingerprint.as_str(),
            tables: graph.node_count(),
            foreign_keys: graph.edge_count(),
            self_references: graph
                .self_references()
                .map(|fk| format!("{}({})", fk.from_table, fk.from_columns.join(", ")))
                .collect(),
            isolated_tables: (0..graph.node_count())
                .filter(|&node| graph.neighbors(node).is_empty())
                .map(|node| graph.node_name(node))
                .collect(),
        }
    }
}

pub async fn run(config: &DacConfig, source: &SourceArgs, format: OutputFormat) -> Result<()> {
    let target = Target::open(config, source)?;
    target.engine.graph(&target.database_id).await?;

    let entry = target
        .engine
        .cache()
        .get(&target.database_id)?
        .ok_or_else(|| anyhow::anyhow!("graph for '{}' was not cached", target.database_id))?;

    println!("{}", render(&GraphSummary::from_entry(&entry), format)?);
    Ok(())
}

fn render(summary: &GraphSummary<'_>, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(summary)?);
    }

    let mut out = format!(
        "Database:      {}\nFingerprint:   {}\nTables:        {}\nForeign keys:  {}",
        summary.database, summary.fingerprint, summary.tables, summary.foreign_keys
    );
    if !summary.self_references.is_empty() {
        out.push_str(&format!(
            "\nSelf references: {}",
            summary.self_references.join(", ")
        ));
    }
    if !summary.isolated_tables.is_empty() {
        out.push_str(&format!(
            "\nUnjoinable tables: {}",
            summary.isolated_tables.join(", ")
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::snapshot_file;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_summary_counts_and_self_references() {
        let file = snapshot_file();
        let source = SourceArgs {
            database: None,
            snapshot: Some(file.path().to_path_buf()),
        };
        let target = Target::open(&DacConfig::default(), &source).unwrap();
        target.engine.graph(&target.database_id).await.unwrap();
        let entry = target
            .engine
            .cache()
            .get(&target.database_id)
            .unwrap()
            .unwrap();

        let summary = GraphSummary::from_entry(&entry);
        assert_eq!(summary.tables, 5);
        assert_eq!(summary.foreign_keys, 4);
        assert_eq!(summary.self_references, vec!["employees(manager_id)"]);
        assert_eq!(summary.isolated_tables, vec!["employees"]);
        assert_eq!(summary.fingerprint.len(), 64);

        let text = render(&summary, OutputFormat::Text).unwrap();
        assert!(text.contains("Unjoinable tables: employees"));
    }
}
