//! # CLI Interface
//!
//! Defines the command-line argument structure for `accord-node` using
//! `clap` derive. Every `run` flag can also be supplied through an
//! `ACCORD_*` environment variable; settings are read once at startup.

use std::time::Duration;

use accord_protocol::config::{
    DisbursementPolicy, DispatchConfig, GapPolicy, CONTRACT_CALL_GAS_LIMIT, DEFAULT_API_PORT,
    DEFAULT_DISBURSEMENT_WEI, DEFAULT_METRICS_PORT, DEFAULT_NODE_URL, MAX_CHAIN_ID,
    VALUE_TRANSFER_GAS_LIMIT,
};
use alloy_primitives::{Address, U256};
use clap::{Parser, Subcommand};

/// Accord agreement registration gateway.
///
/// Accepts agreement registrations over HTTP, records each one on-chain via
/// the registry contract, and funds the counterparty so it can countersign.
#[derive(Parser, Debug)]
#[command(
    name = "accord-node",
    about = "Accord agreement registration gateway",
    version,
    propagate_version = true
)]
pub struct AccordNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway.
    Run(RunArgs),
    /// Query the status of a running gateway.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// JSON-RPC endpoint of the ledger node.
    #[arg(long, env = "ACCORD_NODE_URL", default_value = DEFAULT_NODE_URL)]
    pub node_url: String,

    /// Hex-encoded secp256k1 private key of the signing identity.
    ///
    /// Prefer the environment variable over the flag so the key does not
    /// show up in process listings.
    #[arg(long, env = "ACCORD_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Address of the deployed agreement registry contract.
    #[arg(long, env = "ACCORD_CONTRACT")]
    pub contract: Address,

    /// Wei sent to each counterparty. With `--cover-gas-units` this is the
    /// floor rather than a fixed amount.
    #[arg(
        long,
        env = "ACCORD_DISBURSEMENT_WEI",
        default_value_t = DEFAULT_DISBURSEMENT_WEI as u128
    )]
    pub disbursement_wei: u128,

    /// Size the disbursement to cover this much gas at the live gas price.
    #[arg(long, env = "ACCORD_COVER_GAS_UNITS")]
    pub cover_gas_units: Option<u64>,

    /// EIP-155 chain id. When set, transactions are replay-protected and the
    /// node's chain id must match at startup.
    #[arg(
        long,
        env = "ACCORD_CHAIN_ID",
        value_parser = clap::value_parser!(u64).range(1..=MAX_CHAIN_ID)
    )]
    pub chain_id: Option<u64>,

    /// Gas limit for the registration call.
    #[arg(long, env = "ACCORD_CALL_GAS_LIMIT", default_value_t = CONTRACT_CALL_GAS_LIMIT)]
    pub call_gas_limit: u64,

    /// Gas limit for the funding transfer.
    #[arg(long, env = "ACCORD_TRANSFER_GAS_LIMIT", default_value_t = VALUE_TRANSFER_GAS_LIMIT)]
    pub transfer_gas_limit: u64,

    /// Seconds to wait for the node to acknowledge a submission.
    #[arg(long, env = "ACCORD_SUBMIT_TIMEOUT_SECS", default_value_t = 30)]
    pub submit_timeout_secs: u64,

    /// What to do after a nonce is burned: `halt` or `continue`.
    #[arg(long, env = "ACCORD_GAP_POLICY", default_value = "halt")]
    pub gap_policy: GapPolicy,

    /// Bearer token required by `/admin/*` routes. Unset leaves them open.
    #[arg(long, env = "ACCORD_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Interface to bind both listeners on.
    #[arg(long, env = "ACCORD_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the agreement API.
    #[arg(long, env = "ACCORD_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "ACCORD_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "ACCORD_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl RunArgs {
    /// The disbursement policy these flags describe.
    pub fn disbursement(&self) -> DisbursementPolicy {
        let amount = U256::from(self.disbursement_wei);
        match self.cover_gas_units {
            Some(gas_units) => DisbursementPolicy::CoverGas {
                floor: amount,
                gas_units,
            },
            None => DisbursementPolicy::Fixed { amount },
        }
    }

    /// Builds the dispatch settings. `chain_id` is the id the signer will
    /// use, already reconciled with the node.
    pub fn dispatch_config(&self, chain_id: Option<u64>) -> DispatchConfig {
        DispatchConfig {
            chain_id,
            call_gas_limit: self.call_gas_limit,
            transfer_gas_limit: self.transfer_gas_limit,
            disbursement: self.disbursement(),
            submit_timeout: Duration::from_secs(self.submit_timeout_secs),
            gap_policy: self.gap_policy,
            ..DispatchConfig::new(self.contract)
        }
    }
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// API endpoint of the running gateway.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub api_url: String,
}
