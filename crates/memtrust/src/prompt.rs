//! Terminal surface for trust prompts.
//!
//! Runs on the async side of the CLI while the TLS connection blocks on
//! a worker thread. Each ticket is shown on stderr and answered from a
//! stdin line; end of input or an unreadable line rejects.

use std::io::Write;

use memtrust_core::{Notifier, PromptRequest, PromptTicket, TrustDecision};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

/// Answer tickets until every sender is gone.
///
/// With `preset`, every prompt gets that answer without reading stdin.
pub async fn serve(mut rx: mpsc::Receiver<PromptTicket>, preset: Option<TrustDecision>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(ticket) = rx.recv().await {
        let decision = match preset {
            Some(decision) => {
                tracing::info!(id = ticket.request.id, %decision, "Answering trust prompt from --answer");
                decision
            }
            None => match ask(&ticket.request, &mut lines).await {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::warn!(error = %e, "Could not read answer; rejecting");
                    TrustDecision::Abort
                }
            },
        };
        ticket.reply.send(decision);
    }
}

async fn ask(request: &PromptRequest, lines: &mut Lines<BufReader<Stdin>>) -> std::io::Result<TrustDecision> {
    eprintln!();
    eprintln!("The server's certificate is not trusted:");
    eprintln!("{}", request.message);
    eprintln!();
    eprint!("Trust it? [a]lways / [o]nce / [r]eject (default: reject): ");
    std::io::stderr().flush()?;

    let line = lines.next_line().await?;
    Ok(parse_answer(line.as_deref().unwrap_or_default()))
}

/// Tells the terminal about prompts that were rejected without being
/// shown, such as when more handshakes wait than the prompt queue holds.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, request: &PromptRequest) {
        tracing::warn!(id = request.id, "Trust prompt could not be shown; rejected");
        eprintln!("{}", unshown_notice(request));
    }
}

fn unshown_notice(request: &PromptRequest) -> String {
    format!(
        "Rejected an untrusted certificate without asking (prompt {} could not be shown):\n{}",
        request.id, request.message
    )
}

/// Interpret a typed answer. Anything unrecognised rejects.
pub(crate) fn parse_answer(input: &str) -> TrustDecision {
    match input.trim().to_ascii_lowercase().as_str() {
        "a" | "always" => TrustDecision::Always,
        "o" | "once" => TrustDecision::Once,
        _ => TrustDecision::Abort,
    }
}
