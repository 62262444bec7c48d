//! rcgen-built PKI fixtures shared by the unit tests.

use std::sync::Arc;

use memtrust_common::test::unique_temp_dir;
use memtrust_store::OverrideStore;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName};

use crate::chain::CertificateChain;

pub(crate) const HOST: &str = "tofu.test";

/// A root CA that can issue leaves.
pub(crate) struct Pki {
    root: rcgen::Certificate,
    key: KeyPair,
}

impl Pki {
    pub(crate) fn new(cn: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let root = params.self_signed(&key).unwrap();
        Self { root, key }
    }

    pub(crate) fn root(&self) -> CertificateDer<'static> {
        self.root.der().clone()
    }

    pub(crate) fn leaf(&self, cn: &str) -> CertificateDer<'static> {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![HOST.to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        params.signed_by(&key, &self.root, &self.key).unwrap().der().clone()
    }

    /// `[leaf, root]`, the way a server usually presents it.
    pub(crate) fn chain(&self, leaf_cn: &str) -> CertificateChain {
        CertificateChain::new(vec![self.leaf(leaf_cn), self.root()])
    }
}

/// What makes a self-signed certificate fail plain path validation.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Quirk {
    OtherName,
    Expired,
    CaFlag,
}

/// A lone self-signed certificate, the way ad-hoc servers present one.
pub(crate) fn self_signed(cn: &str, quirk: Quirk) -> CertificateChain {
    let key = KeyPair::generate().unwrap();
    let san = match quirk {
        Quirk::OtherName => "elsewhere.test",
        _ => HOST,
    };
    let mut params = CertificateParams::new(vec![san.to_string()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, cn);
    match quirk {
        Quirk::Expired => {
            params.not_before = rcgen::date_time_ymd(2001, 1, 1);
            params.not_after = rcgen::date_time_ymd(2002, 1, 1);
        }
        Quirk::CaFlag => params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained),
        Quirk::OtherName => {}
    }
    let cert = params.self_signed(&key).unwrap();
    CertificateChain::new(vec![cert.der().clone()])
}

pub(crate) fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

pub(crate) fn host() -> ServerName<'static> {
    ServerName::try_from(HOST).unwrap()
}

pub(crate) fn temp_store(prefix: &str) -> Arc<OverrideStore> {
    Arc::new(OverrideStore::load(
        unique_temp_dir(prefix).join("keystore").join("overrides.mks"),
    ))
}
