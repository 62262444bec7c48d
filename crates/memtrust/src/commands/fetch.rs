//! `memtrust fetch`: one HTTPS GET through the memorizing verifier.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use anyhow::Context;
use memtrust_core::Builder;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};
use serde::Serialize;
use url::Url;

use super::UsageError;
use crate::cli::{Cli, FetchArgs};
use crate::prompt;

/// Prompts that may queue while the terminal is busy with another.
/// Further ones are rejected and reported by [`prompt::TerminalNotifier`].
const PROMPT_QUEUE: usize = 8;

#[derive(Debug, Serialize)]
struct FetchResult {
    url: String,
    status: Option<u16>,
    status_line: String,
    bytes: usize,
}

pub async fn run(args: &FetchArgs, cli: &Cli) -> anyhow::Result<()> {
    let target = Target::parse(&args.url)?;

    let (verifier, rx) = Builder::new()
        .config(super::config(cli))
        .notifier(Arc::new(prompt::TerminalNotifier))
        .build_with_channel(PROMPT_QUEUE)?;
    let verifier = Arc::new(verifier);
    let registry = Arc::clone(verifier.registry());
    let tls = Arc::new(Arc::clone(&verifier).client_config()?);

    let prompter = tokio::spawn(prompt::serve(rx, args.answer));

    let request = target.request();
    let mut fetch = tokio::task::spawn_blocking(move || get(tls, &target, &request));
    let response = tokio::select! {
        joined = &mut fetch => joined?,
        _ = tokio::signal::ctrl_c() => {
            let interrupted = registry.interrupt_all();
            tracing::info!(interrupted, "Interrupted; rejecting open trust prompts");
            fetch.await?
        }
    };
    prompter.abort();
    let response = response?;

    let status_line = response
        .split(|&b| b == b'\n')
        .next()
        .map(|line| String::from_utf8_lossy(line).trim_end().to_string())
        .unwrap_or_default();
    let result = FetchResult {
        url: args.url.clone(),
        status: status_code(&status_line),
        status_line,
        bytes: response.len(),
    };

    if cli.json {
        super::print_json(&result);
    } else {
        println!("{}", result.status_line);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    path: String,
}

impl Target {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        let url = Url::parse(raw)?;
        if url.scheme() != "https" {
            return Err(UsageError(format!("only https URLs are supported, got {:?}", url.scheme())).into());
        }
        let host = url
            .host_str()
            .ok_or_else(|| UsageError(format!("URL has no host: {raw}")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url.port_or_known_default().unwrap_or(443);
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(Self { host, port, path })
    }

    fn request(&self) -> String {
        format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: memtrust/{}\r\nAccept: */*\r\nConnection: close\r\n\r\n",
            self.path,
            self.host,
            env!("CARGO_PKG_VERSION")
        )
    }
}

/// Blocking request/response over TLS. Certificate decisions happen
/// inside the handshake, on this thread.
fn get(config: Arc<ClientConfig>, target: &Target, request: &str) -> anyhow::Result<Vec<u8>> {
    let server_name = ServerName::try_from(target.host.clone())
        .map_err(|e| UsageError(format!("invalid host {:?}: {e}", target.host)))?;
    let tcp = TcpStream::connect((target.host.as_str(), target.port))
        .with_context(|| format!("Failed to connect to {}:{}", target.host, target.port))?;
    tracing::debug!(host = %target.host, port = target.port, "Connected");

    let conn = ClientConnection::new(config, server_name)?;
    let mut stream = StreamOwned::new(conn, tcp);
    stream
        .write_all(request.as_bytes())
        .map_err(|e| tls_error(e, &target.host))?;

    let mut response = Vec::new();
    match stream.read_to_end(&mut response) {
        Ok(_) => {}
        // Servers that close without close_notify.
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && !response.is_empty() => {}
        Err(e) => return Err(tls_error(e, &target.host)),
    }
    Ok(response)
}

/// Surface the rustls cause behind an I/O error, if there is one.
fn tls_error(e: std::io::Error, host: &str) -> anyhow::Error {
    let cause = e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
        .cloned();
    match cause {
        Some(cause) => anyhow::Error::new(cause).context(format!("TLS handshake with {host} failed")),
        None => anyhow::Error::new(e).context(format!("Connection to {host} failed")),
    }
}

fn status_code(status_line: &str) -> Option<u16> {
    status_line.split_whitespace().nth(1)?.parse().ok()
}
