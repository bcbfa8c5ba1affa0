//! Solana RPC service for GiantWatch (read-only, no wallet)

use anyhow::Result;
use async_trait::async_trait;
use solana_account_decoder::{UiAccountEncoding, UiDataSliceConfig};
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::RpcFilterType,
};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::{str::FromStr, sync::Arc};
use tracing::{info, warn};

use crate::config::Config;

/// Serialized size of a stake account
const STAKE_ACCOUNT_SIZE: u64 = 200;
/// Serialized size of a vote account
const VOTE_ACCOUNT_SIZE: u64 = 3732;

/// Source of candidate addresses when the caller supplies none.
///
/// Implementations are heuristic: they return addresses likely to hold
/// large balances, not an exact or exhaustive top-holder list.
#[async_trait]
pub trait HolderDiscovery: Send + Sync {
    async fn top_holders(&self, limit: usize) -> Result<Vec<String>>;
}

/// Solana service for RPC interactions
pub struct SolanaService {
    pub client: Arc<RpcClient>,
}

impl SolanaService {
    /// Create a new Solana service
    pub fn new(config: &Config) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(
            config.rpc_url.clone(),
            CommitmentConfig::confirmed(),
        ));

        info!(target: "SOLANA", "Connected to Solana RPC (read-only)");

        Self { client }
    }

    /// Program accounts of a given data size, as (address, lamports).
    /// Account data is sliced to zero bytes; only balances are needed.
    async fn program_account_balances(
        &self,
        program_id: &Pubkey,
        data_size: u64,
    ) -> Result<Vec<(Pubkey, u64)>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::DataSize(data_size)]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                data_slice: Some(UiDataSliceConfig {
                    offset: 0,
                    length: 0,
                }),
                commitment: Some(CommitmentConfig::confirmed()),
                ..RpcAccountInfoConfig::default()
            },
            ..RpcProgramAccountsConfig::default()
        };

        let accounts = self
            .client
            .get_program_accounts_with_config(program_id, config)
            .await?;

        Ok(accounts
            .into_iter()
            .map(|(pubkey, account)| (pubkey, account.lamports))
            .collect())
    }

    /// Shorten an address for display
    pub fn shorten_address(address: &str, chars: usize) -> String {
        if address.len() <= chars * 2 || !address.is_ascii() {
            return address.to_string();
        }
        format!("{}...{}", &address[..chars], &address[address.len() - chars..])
    }

    /// Whether `address` parses as a base58 public key
    pub fn is_valid_address(address: &str) -> bool {
        Pubkey::from_str(address).is_ok()
    }
}

#[async_trait]
impl HolderDiscovery for SolanaService {
    /// Largest stake and vote accounts by lamports.
    ///
    /// Stake/vote accounts are a proxy for large holders; plain system
    /// accounts cannot be scanned this way.
    async fn top_holders(&self, limit: usize) -> Result<Vec<String>> {
        let stake_program = solana_sdk::stake::program::id();
        let vote_program = solana_sdk::vote::program::id();
        let (stake, vote) = tokio::join!(
            self.program_account_balances(&stake_program, STAKE_ACCOUNT_SIZE),
            self.program_account_balances(&vote_program, VOTE_ACCOUNT_SIZE),
        );

        let mut accounts = Vec::new();
        match stake {
            Ok(found) => accounts.extend(found),
            Err(e) => warn!(target: "SOLANA", "Stake account scan failed: {}", e),
        }
        match vote {
            Ok(found) => accounts.extend(found),
            Err(e) => warn!(target: "SOLANA", "Vote account scan failed: {}", e),
        }

        let addresses = rank_by_lamports(accounts, limit);
        info!(
            target: "SOLANA",
            "Discovered {} candidate holders from stake/vote accounts",
            addresses.len()
        );
        Ok(addresses)
    }
}

fn rank_by_lamports(mut accounts: Vec<(Pubkey, u64)>, limit: usize) -> Vec<String> {
    accounts.sort_by(|a, b| b.1.cmp(&a.1));
    accounts.truncate(limit);
    accounts.into_iter().map(|(pubkey, _)| pubkey.to_string()).collect()
}
