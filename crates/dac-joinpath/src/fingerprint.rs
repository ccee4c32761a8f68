//! Schema fingerprints.
//!
//! A fingerprint is a domain-separated SHA-256 digest over the canonical form
//! of a schema's table names and foreign keys. Input order does not matter;
//! any change to a table name, a constraint's tables, columns, or name does.

use std::fmt;

use dac_core::{ForeignKeyEdge, Table};
use sha2::{Digest, Sha256};

const DOMAIN: &[u8] = b"dac.fk-graph.v1";

/// Opaque digest of the foreign-key shape of one database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaFingerprint(String);

impl SchemaFingerprint {
    /// Fingerprint a table set and its foreign keys.
    pub fn compute(tables: &[Table], foreign_keys: &[ForeignKeyEdge]) -> Self {
        let mut names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();

        let mut fks: Vec<&ForeignKeyEdge> = foreign_keys.iter().collect();
        fks.sort_by(|a, b| {
            (&a.from_table, &a.to_table, &a.from_columns, &a.to_columns, &a.name).cmp(&(
                &b.from_table,
                &b.to_table,
                &b.from_columns,
                &b.to_columns,
                &b.name,
            ))
        });
        fks.dedup();

        let mut h = Sha256::new();
        h.update(DOMAIN);
        h.update((names.len() as u64).to_le_bytes());
        for name in names {
            write_str(&mut h, name);
        }
        h.update((fks.len() as u64).to_le_bytes());
        for fk in fks {
            write_str(&mut h, fk.name.as_deref().unwrap_or(""));
            h.update([u8::from(fk.name.is_some())]);
            write_str(&mut h, &fk.from_table);
            write_list(&mut h, &fk.from_columns);
            write_str(&mut h, &fk.to_table);
            write_list(&mut h, &fk.to_columns);
        }

        Self(hex::encode(h.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Length prefixes keep ("ab", "c") and ("a", "bc") apart.
fn write_str(h: &mut Sha256, value: &str) {
    h.update((value.len() as u64).to_le_bytes());
    h.update(value.as_bytes());
}

fn write_list(h: &mut Sha256, values: &[String]) {
    h.update((values.len() as u64).to_le_bytes());
    for value in values {
        write_str(h, value);
    }
}
