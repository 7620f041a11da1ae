//! Transfer signing through the chain daemon's file keyring.
//!
//! The signer key never leaves the keyring directory: each transfer shells
//! out to `<binary> tx bank send`, feeding the keyring passphrase on stdin.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::api::TransferSubmitter;
use crate::config::ConfigOption;
use crate::constants::KEYRING_PASSWORD_ENV;
use crate::errors::{DropError, DropResult};
use crate::types::{Address, Coin};

const KEYRING_BACKEND: &str = "file";
const GAS_ADJUSTMENT: &str = "1.5";

#[derive(Debug, Deserialize)]
struct BroadcastOutput {
    #[serde(default)]
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
}

/// Extract the transaction hash from `--output json` broadcast output.
///
/// Some daemon versions print a gas estimate line ahead of the JSON body.
fn parse_broadcast_output(stdout: &str) -> DropResult<String> {
    let body = stdout
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with('{'))
        .ok_or_else(|| DropError::UnexpectedResponse(format!("no broadcast result in {:?}", stdout)))?;
    let output: BroadcastOutput = serde_json::from_str(body)?;

    if output.code != 0 {
        return Err(DropError::broadcast(Some(output.code), output.raw_log));
    }
    if output.txhash.is_empty() {
        return Err(DropError::UnexpectedResponse("broadcast returned no txhash".to_string()));
    }
    Ok(output.txhash)
}

fn format_coins(coins: &[Coin]) -> String {
    coins.iter().map(Coin::to_string).collect::<Vec<_>>().join(",")
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Invocation details shared by every daemon call.
struct KeyringCli {
    binary: String,
    keyring_dir: PathBuf,
    passphrase: String,
    timeout: Duration,
}

impl KeyringCli {
    fn keyring_args(&self) -> Vec<String> {
        vec![
            "--keyring-backend".to_string(),
            KEYRING_BACKEND.to_string(),
            "--keyring-dir".to_string(),
            self.keyring_dir.display().to_string(),
        ]
    }

    /// Run the daemon with `args`, answering passphrase prompts on stdin.
    ///
    /// The child is killed if it outlives the configured timeout. Exit status
    /// is left to the caller.
    async fn run(&self, args: &[String]) -> DropResult<Output> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .args(self.keyring_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DropError::wallet(format!("failed to run {}: {}", self.binary, e)))?;

        let answer = format!("{0}\n{0}\n", self.passphrase);
        let interaction = async move {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(answer.as_bytes()).await {
                    tracing::debug!(error = %e, "Daemon closed stdin before reading passphrase");
                }
            }
            child.wait_with_output().await
        };

        match tokio::time::timeout(self.timeout, interaction).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(DropError::CommandTimeout {
                command: self.describe(args),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    fn describe(&self, args: &[String]) -> String {
        let mut command = self.binary.clone();
        for arg in args.iter().take(2) {
            command.push(' ');
            command.push_str(arg);
        }
        command
    }

    async fn show_address(&self, account: &str) -> DropResult<Address> {
        let args = vec!["keys".to_string(), "show".to_string(), account.to_string(), "-a".to_string()];
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(DropError::wallet(format!(
                "keys show {} failed: {}",
                account,
                stderr_of(&output)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let address = stdout.trim();
        address
            .parse()
            .map_err(|e| DropError::wallet(format!("keyring returned bad address {:?}: {}", address, e)))
    }
}

/// [`TransferSubmitter`] that signs with a file keyring via the chain CLI.
pub struct KeyringCliWallet {
    cli: KeyringCli,
    account: String,
    node: String,
    chain_id: Option<String>,
    gas_price: String,
    signer: Address,
}

impl KeyringCliWallet {
    /// Open the keyring and resolve the signer address of `account`.
    pub async fn connect(option: &ConfigOption) -> DropResult<Self> {
        let passphrase = std::env::var(KEYRING_PASSWORD_ENV)
            .map_err(|_| DropError::wallet(format!("keyring passphrase not set in {}", KEYRING_PASSWORD_ENV)))?;

        let cli = KeyringCli {
            binary: option.binary.clone(),
            keyring_dir: option.keystore_path.clone(),
            passphrase,
            timeout: option.command_timeout(),
        };
        let signer = cli.show_address(&option.account).await?;
        tracing::info!(account = %option.account, address = %signer, "Keyring opened");

        Ok(Self {
            cli,
            account: option.account.clone(),
            node: option.node().to_string(),
            chain_id: option.chain_id.clone(),
            gas_price: option.gas_price.clone(),
            signer,
        })
    }
}

#[async_trait]
impl TransferSubmitter for KeyringCliWallet {
    fn signer_address(&self) -> &Address {
        &self.signer
    }

    async fn submit_transfer(&self, recipient: &Address, coins: &[Coin]) -> DropResult<String> {
        let mut args = vec![
            "tx".to_string(),
            "bank".to_string(),
            "send".to_string(),
            self.account.clone(),
            recipient.to_string(),
            format_coins(coins),
            "--node".to_string(),
            self.node.clone(),
            "--gas".to_string(),
            "auto".to_string(),
            "--gas-adjustment".to_string(),
            GAS_ADJUSTMENT.to_string(),
            "--broadcast-mode".to_string(),
            "sync".to_string(),
            "--output".to_string(),
            "json".to_string(),
            "--yes".to_string(),
        ];
        if !self.gas_price.is_empty() {
            args.push("--gas-prices".to_string());
            args.push(self.gas_price.clone());
        }
        if let Some(chain_id) = &self.chain_id {
            args.push("--chain-id".to_string());
            args.push(chain_id.clone());
        }

        tracing::debug!(recipient = %recipient, coins = %format_coins(coins), "Broadcasting transfer");
        let output = self.cli.run(&args).await?;
        if !output.status.success() {
            return Err(DropError::broadcast(None, stderr_of(&output)));
        }
        parse_broadcast_output(&String::from_utf8_lossy(&output.stdout))
    }
}
