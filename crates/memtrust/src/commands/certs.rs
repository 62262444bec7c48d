//! `memtrust certs`: inspect and prune the override keystore.

use chrono::{DateTime, Utc};
use memtrust_crypto::{identity, pinning};
use memtrust_store::{OverrideStore, StoreError, StoredCertificate};
use serde::Serialize;

use crate::cli::{CertsSubcommand, Cli};

#[derive(Debug, Serialize)]
struct CertSummary<'a> {
    alias: &'a str,
    issuer: &'a str,
    fingerprint: &'a str,
    added_at: String,
}

impl<'a> From<&'a StoredCertificate> for CertSummary<'a> {
    fn from(entry: &'a StoredCertificate) -> Self {
        Self {
            alias: &entry.alias,
            issuer: &entry.issuer,
            fingerprint: &entry.fingerprint,
            added_at: entry.added_at.to_rfc3339(),
        }
    }
}

pub fn run(command: &CertsSubcommand, cli: &Cli) -> anyhow::Result<()> {
    let store = OverrideStore::load(super::config(cli).keystore_path());
    match command {
        CertsSubcommand::List => list(&store, cli.json),
        CertsSubcommand::Delete { alias } => delete(&store, alias, cli.json),
    }
}

fn list(store: &OverrideStore, json: bool) -> anyhow::Result<()> {
    let entries = store.list_entries();
    if json {
        let summaries: Vec<CertSummary<'_>> = entries.iter().map(CertSummary::from).collect();
        super::print_json(&serde_json::json!({
            "keystore": store.path(),
            "certificates": summaries,
        }));
        return Ok(());
    }

    if entries.is_empty() {
        println!("No remembered certificates ({})", store.path().display());
        return Ok(());
    }
    for entry in &entries {
        println!("{}", entry.alias);
        println!("  Issuer:      {}", entry.issuer);
        println!("  SHA-256:     {}", pinning::fingerprint_display(&entry.der));
        if let Ok(id) = identity::identify(&entry.der) {
            println!("  Serial:      {}", id.serial);
            if let Some(expires) = DateTime::<Utc>::from_timestamp(id.not_after, 0) {
                println!("  Expires:     {}", expires.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        println!("  Remembered:  {}", entry.added_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

fn delete(store: &OverrideStore, target: &str, json: bool) -> anyhow::Result<()> {
    let alias = resolve_alias(&store.list_entries(), target)
        .ok_or_else(|| StoreError::AliasNotFound(target.to_string()))?;
    let removed = store.delete(&alias)?;
    if json {
        super::print_json(&serde_json::json!({ "deleted": CertSummary::from(&removed) }));
    } else {
        println!("Forgot {} (issued by {})", removed.alias, removed.issuer);
    }
    Ok(())
}

/// An exact alias, or the alias of the entry with this SHA-256
/// fingerprint (plain or colon-separated hex, any case).
fn resolve_alias(entries: &[StoredCertificate], target: &str) -> Option<String> {
    if let Some(entry) = entries.iter().find(|e| e.alias == target) {
        return Some(entry.alias.clone());
    }
    let wanted: String = target
        .chars()
        .filter(|c| *c != ':')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    entries
        .iter()
        .find(|e| pinning::fingerprints_match(&e.fingerprint, &wanted))
        .map(|e| e.alias.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(alias: &str, fingerprint: &str) -> StoredCertificate {
        StoredCertificate {
            alias: alias.to_string(),
            issuer: "CN=rootA".to_string(),
            fingerprint: fingerprint.to_string(),
            added_at: Utc::now(),
            der: Vec::new(),
        }
    }

    #[test]
    fn resolves_alias_or_fingerprint() {
        let entries = vec![entry("CN=leafA", "0aff"), entry("CN=rootA", "bb01")];
        assert_eq!(resolve_alias(&entries, "CN=rootA").as_deref(), Some("CN=rootA"));
        assert_eq!(resolve_alias(&entries, "0A:FF").as_deref(), Some("CN=leafA"));
        assert_eq!(resolve_alias(&entries, "CN=nobody"), None);
    }
}
