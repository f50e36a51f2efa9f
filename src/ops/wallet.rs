//! Payment capability: given a transfer request, produce a transaction
//! signature.  Signing itself happens in an external wallet — this module
//! talks to a local signer bridge over HTTP and maps its responses onto the
//! editor's error taxonomy (user cancellation vs transaction failure).

use serde_json::{Value, json};
use std::time::Duration;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).round() as u64
}

#[derive(Debug)]
pub enum WalletError {
    /// The user rejected the transaction in their wallet.
    Cancelled,
    Transaction(String),
}

impl std::fmt::Display for WalletError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletError::Cancelled => write!(f, "transaction cancelled by user"),
            WalletError::Transaction(e) => write!(f, "transaction failed: {e}"),
        }
    }
}

/// The wallet interface the editor depends on.  Implementations are expected
/// to block; they run on worker threads.
pub trait WalletProvider: Send + Sync {
    /// The connected wallet's address, if any.
    fn address(&self) -> Option<String>;

    fn is_connected(&self) -> bool {
        self.address().is_some()
    }

    /// Request a signed transfer of `lamports` to `recipient`, returning the
    /// transaction signature.
    fn transfer(&self, lamports: u64, recipient: &str) -> Result<String, WalletError>;
}

/// Wallet provider backed by a local signer-bridge daemon.
pub struct SignerBridge {
    agent: ureq::Agent,
    url: String,
    address: Option<String>,
}

impl SignerBridge {
    /// Connect to the bridge and query the active wallet address.  A bridge
    /// that is not running simply yields a disconnected wallet.
    pub fn connect(url: String) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(90))
            .build();
        let address = agent
            .get(&format!("{url}/address"))
            .call()
            .ok()
            .and_then(|r| r.into_json::<Value>().ok())
            .and_then(|v| v["address"].as_str().map(str::to_string));
        Self { agent, url, address }
    }
}

impl WalletProvider for SignerBridge {
    fn address(&self) -> Option<String> {
        self.address.clone()
    }

    fn transfer(&self, lamports: u64, recipient: &str) -> Result<String, WalletError> {
        let response = self
            .agent
            .post(&format!("{}/transfer", self.url))
            .send_json(json!({ "lamports": lamports, "recipient": recipient }))
            .map_err(|e| WalletError::Transaction(e.to_string()))?;
        let value: Value = response
            .into_json()
            .map_err(|e| WalletError::Transaction(e.to_string()))?;
        parse_transfer_response(&value)
    }
}

/// Map a signer-bridge reply onto the error taxonomy.
pub fn parse_transfer_response(value: &Value) -> Result<String, WalletError> {
    if let Some(signature) = value["signature"].as_str() {
        return Ok(signature.to_string());
    }
    if value["cancelled"].as_bool() == Some(true) {
        return Err(WalletError::Cancelled);
    }
    let detail = value["error"].as_str().unwrap_or("malformed signer response");
    Err(WalletError::Transaction(detail.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_response_is_ok() {
        let v = json!({ "signature": "5KtP...sig" });
        assert_eq!(parse_transfer_response(&v).unwrap(), "5KtP...sig");
    }

    #[test]
    fn cancellation_maps_to_cancelled() {
        let v = json!({ "cancelled": true });
        assert!(matches!(parse_transfer_response(&v), Err(WalletError::Cancelled)));
    }

    #[test]
    fn errors_and_garbage_map_to_transaction() {
        let v = json!({ "error": "insufficient funds" });
        match parse_transfer_response(&v) {
            Err(WalletError::Transaction(detail)) => assert_eq!(detail, "insufficient funds"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            parse_transfer_response(&json!({})),
            Err(WalletError::Transaction(_))
        ));
    }

    #[test]
    fn sol_conversion_rounds() {
        assert_eq!(sol_to_lamports(0.0001), 100_000);
        assert_eq!(sol_to_lamports(1.0), LAMPORTS_PER_SOL);
    }
}
