//! Memtrust Store: the persisted override keystore.
//!
//! Holds the certificates a user chose to "always trust". The store is
//! loaded once at construction and every mutation is flushed back to disk
//! before the mutating call returns. Flushes after an addition are
//! best-effort: failures are logged and the in-memory view keeps the
//! change. A failed flush after a deletion is reported to the caller.

pub mod entry;
pub mod error;
mod keystore;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use memtrust_crypto::{identity, pinning};

pub use entry::StoredCertificate;
pub use error::StoreError;
pub use keystore::KEYSTORE_PASSPHRASE;

type Entries = BTreeMap<String, StoredCertificate>;

pub struct OverrideStore {
    path: PathBuf,
    entries: Mutex<Entries>,
    generation: AtomicU64,
}

impl OverrideStore {
    /// Load the keystore at `path`.
    ///
    /// A missing file is the normal first-run state. A corrupt or
    /// unreadable file is logged and replaced by an empty store; the next
    /// mutation overwrites it.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match keystore::read(&path) {
            Ok(Some(list)) => {
                tracing::debug!(path = %path.display(), count = list.len(), "Override keystore loaded");
                list.into_iter().map(|e| (e.alias.clone(), e)).collect()
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "Override keystore does not exist yet");
                Entries::new()
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Override keystore unreadable; starting empty");
                Entries::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
            generation: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bumped on every successful mutation. Readers cache derived state
    /// (trust anchors) against it.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Insert every certificate of `chain`, keyed by subject, then flush.
    ///
    /// All certificates are parsed before anything is inserted, so one bad
    /// certificate leaves the store untouched. Returns the number stored.
    pub fn add_chain<C: AsRef<[u8]>>(&self, chain: &[C]) -> Result<usize, StoreError> {
        let mut parsed = Vec::with_capacity(chain.len());
        for cert in chain {
            let der = cert.as_ref();
            let id = identity::identify(der)
                .map_err(|e| StoreError::InvalidCertificate(e.to_string()))?;
            parsed.push(StoredCertificate::new(der.to_vec(), id));
        }

        let mut entries = self.lock();
        for entry in parsed {
            if entries.contains_key(&entry.alias) {
                tracing::debug!(alias = %entry.alias, "Replacing stored certificate with same subject");
            }
            tracing::info!(alias = %entry.alias, fingerprint = %entry.fingerprint, "Certificate added to override store");
            entries.insert(entry.alias.clone(), entry);
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.flush(&entries);
        Ok(chain.len())
    }

    /// All stored entries, ordered by alias.
    pub fn list_entries(&self) -> Vec<StoredCertificate> {
        self.lock().values().cloned().collect()
    }

    pub fn aliases(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.lock().contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether this exact certificate (byte for byte) was approved.
    pub fn contains_certificate(&self, der: &[u8]) -> bool {
        let fingerprint = pinning::fingerprint_sha256(der);
        self.lock()
            .values()
            .any(|e| pinning::fingerprints_match(&e.fingerprint, &fingerprint))
    }

    /// DER of every stored certificate.
    pub fn certificates(&self) -> Vec<Vec<u8>> {
        self.lock().values().map(|e| e.der.clone()).collect()
    }

    /// Remove `alias` and flush.
    ///
    /// Unlike [`add_chain`](Self::add_chain), a failed flush is reported.
    /// The entry stays removed in memory either way.
    pub fn delete(&self, alias: &str) -> Result<StoredCertificate, StoreError> {
        let mut entries = self.lock();
        let removed = entries
            .remove(alias)
            .ok_or_else(|| StoreError::AliasNotFound(alias.to_string()))?;
        self.generation.fetch_add(1, Ordering::AcqRel);

        let snapshot: Vec<&StoredCertificate> = entries.values().collect();
        keystore::write(&self.path, &snapshot)?;
        tracing::info!(alias, path = %self.path.display(), "Certificate deleted from override store");
        Ok(removed)
    }

    fn flush(&self, entries: &Entries) {
        let snapshot: Vec<&StoredCertificate> = entries.values().collect();
        match keystore::write(&self.path, &snapshot) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), count = snapshot.len(), "Override keystore saved")
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to save override keystore")
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for OverrideStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideStore")
            .field("path", &self.path)
            .field("entries", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memtrust_common::test::unique_temp_dir;
    use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};

    fn chain(leaf_cn: &str, root_cn: &str) -> Vec<Vec<u8>> {
        let root_key = KeyPair::generate().unwrap();
        let mut root_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        root_params.distinguished_name.push(DnType::CommonName, root_cn);
        root_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let root = root_params.self_signed(&root_key).unwrap();

        let leaf_key = KeyPair::generate().unwrap();
        let mut leaf_params = CertificateParams::new(vec!["tofu.test".to_string()]).unwrap();
        leaf_params.distinguished_name.push(DnType::CommonName, leaf_cn);
        let leaf = leaf_params.signed_by(&leaf_key, &root, &root_key).unwrap();

        vec![leaf.der().to_vec(), root.der().to_vec()]
    }

    fn store_path(prefix: &str) -> PathBuf {
        unique_temp_dir(prefix).join("keystore").join("overrides.mks")
    }

    #[test]
    fn missing_file_gives_empty_usable_store() {
        let path = store_path("store-missing");
        let store = OverrideStore::load(&path);
        assert!(store.is_empty());
        assert!(!path.exists());

        store.add_chain(&chain("leafA", "rootA")).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn add_chain_keys_by_subject_and_persists() {
        let path = store_path("store-add");
        let store = OverrideStore::load(&path);
        let g0 = store.generation();

        assert_eq!(store.add_chain(&chain("leafA", "rootA")).unwrap(), 2);
        assert_eq!(store.aliases(), vec!["CN=leafA", "CN=rootA"]);
        assert!(store.generation() > g0);

        let reloaded = OverrideStore::load(&path);
        assert_eq!(reloaded.list_entries(), store.list_entries());
    }

    #[test]
    fn invalid_certificate_aborts_whole_add() {
        let path = store_path("store-partial");
        let store = OverrideStore::load(&path);
        let mut certs = chain("leafA", "rootA");
        certs.push(b"garbage".to_vec());

        let err = store.add_chain(&certs).unwrap_err();
        assert!(matches!(err, StoreError::InvalidCertificate(_)));
        assert!(store.is_empty());
        assert_eq!(store.generation(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn same_subject_shares_a_slot() {
        let store = OverrideStore::load(store_path("store-collide"));
        let first = chain("leaf", "rootA");
        let second = chain("leaf", "rootB");
        store.add_chain(&first).unwrap();
        store.add_chain(&second).unwrap();

        let leaf = store
            .list_entries()
            .into_iter()
            .find(|e| e.alias == "CN=leaf")
            .unwrap();
        assert_eq!(leaf.der, second[0]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn contains_certificate_matches_exact_der() {
        let store = OverrideStore::load(store_path("store-exact"));
        let approved = chain("leaf", "rootA");
        let lookalike = chain("leaf", "rootA");
        store.add_chain(&approved).unwrap();

        assert!(store.contains_certificate(&approved[0]));
        assert!(store.contains_certificate(&approved[1]));
        // Same subject, different key: not the approved certificate.
        assert!(!store.contains_certificate(&lookalike[0]));

        store.delete("CN=leaf").unwrap();
        assert!(!store.contains_certificate(&approved[0]));
    }

    #[test]
    fn delete_removes_and_persists() {
        let path = store_path("store-delete");
        let store = OverrideStore::load(&path);
        store.add_chain(&chain("leafA", "rootA")).unwrap();

        let removed = store.delete("CN=leafA").unwrap();
        assert_eq!(removed.alias, "CN=leafA");
        assert!(!store.contains("CN=leafA"));

        let reloaded = OverrideStore::load(&path);
        assert_eq!(reloaded.aliases(), vec!["CN=rootA"]);
    }

    #[test]
    fn delete_unknown_alias_fails() {
        let store = OverrideStore::load(store_path("store-delete-missing"));
        let err = store.delete("CN=nobody").unwrap_err();
        assert!(matches!(err, StoreError::AliasNotFound(ref a) if a == "CN=nobody"));
    }

    #[test]
    fn corrupt_file_gives_empty_store() {
        let path = store_path("store-corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not a keystore").unwrap();

        let store = OverrideStore::load(&path);
        assert!(store.is_empty());

        store.add_chain(&chain("leafA", "rootA")).unwrap();
        assert_eq!(OverrideStore::load(&path).len(), 2);
    }

    #[test]
    fn write_failure_keeps_in_memory_addition() {
        let dir = unique_temp_dir("store-readonly");
        // A directory where the keystore file should be makes every flush fail.
        let path = dir.join("overrides.mks");
        std::fs::create_dir_all(&path).unwrap();

        let store = OverrideStore::load(&path);
        store.add_chain(&chain("leafA", "rootA")).unwrap();
        assert_eq!(store.len(), 2);
    }
}
