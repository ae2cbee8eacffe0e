//! Provider-backed RPC facade.
//!
//! Translates high-level intents ("get balance", "sign message") into
//! provider request sequences and normalizes what comes back. The facade
//! is stateless: it borrows one connected provider for its lifetime and
//! keeps nothing between calls. Provider failures are passed through
//! unmodified; there are no retries and no timeouts at this layer.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256, hex};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::domain::{
    ChainConfig, ChainId, DEMO_MESSAGE, DEMO_TRANSFER_WEI, RpcError, TransactionReceipt,
    TransactionRequest, WalletProvider,
};

/// Disposable facade over a connected [`WalletProvider`].
///
/// # Example
///
/// ```ignore
/// let facade = RpcFacade::new(provider.as_ref())?;
/// let balance = facade.get_balance().await?;
/// ```
pub struct RpcFacade<'a> {
    provider: &'a dyn WalletProvider,
}

impl<'a> RpcFacade<'a> {
    /// Wrap a provider handle.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::NotConnected`] when the provider reports it is not
    /// connected. No request is issued in that case.
    pub fn new(provider: &'a dyn WalletProvider) -> Result<Self, RpcError> {
        if !provider.is_connected() {
            return Err(RpcError::NotConnected);
        }
        Ok(Self { provider })
    }

    /// Identifier of the currently connected chain, as a decimal string.
    #[instrument(skip(self))]
    pub async fn get_chain_id(&self) -> Result<String, RpcError> {
        let raw = self.provider.request("eth_chainId", Vec::new()).await?;
        let chain_id = parse_chain_id(&raw)?;
        debug!(chain_id = %chain_id, "Resolved chain id");
        Ok(chain_id.to_string())
    }

    /// Every account the provider exposes.
    #[instrument(skip(self))]
    pub async fn get_accounts(&self) -> Result<Vec<String>, RpcError> {
        let raw = self.provider.request("eth_accounts", Vec::new()).await?;
        let accounts = raw
            .as_array()
            .ok_or_else(|| malformed("eth_accounts", &raw))?
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| malformed("eth_accounts", &raw))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// First account, used wherever a single address is required.
    pub async fn first_account(&self) -> Result<String, RpcError> {
        self.get_accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RpcError::InvalidRequest("provider exposes no accounts".to_string()))
    }

    /// Balance of the first account in ether, as a decimal string.
    #[instrument(skip(self))]
    pub async fn get_balance(&self) -> Result<String, RpcError> {
        let account = self.first_account().await?;
        let raw = self
            .provider
            .request("eth_getBalance", vec![json!(account), json!("latest")])
            .await?;
        let wei = parse_quantity("eth_getBalance", &raw)?;
        Ok(format_balance(wei))
    }

    /// Submit the demo self-transfer and wait for its receipt.
    ///
    /// May suspend for as long as the provider waits on user approval.
    #[instrument(skip(self))]
    pub async fn send_transaction(&self) -> Result<TransactionReceipt, RpcError> {
        let account = self.first_account().await?;
        let to: Address = account
            .parse()
            .map_err(|e| RpcError::rejected_with_cause("provider returned an invalid account", e))?;

        let tx = TransactionRequest::transfer(to, U256::from(DEMO_TRANSFER_WEI));
        let tx_hash = self.provider.send_transaction(&tx).await?;
        info!(tx_hash = %tx_hash, "Transaction submitted, awaiting receipt");

        let receipt = self.provider.wait_for_receipt(&tx_hash).await?;
        info!(
            tx_hash = %receipt.transaction_hash,
            status = ?receipt.status,
            block_number = ?receipt.block_number,
            "Transaction included"
        );
        Ok(receipt)
    }

    /// Sign the fixed demo message with the first account.
    #[instrument(skip(self))]
    pub async fn sign_message(&self) -> Result<String, RpcError> {
        let account = self.first_account().await?;
        let raw = self
            .provider
            .request(
                "personal_sign",
                vec![json!(hex::encode_prefixed(DEMO_MESSAGE.as_bytes())), json!(account)],
            )
            .await?;
        raw.as_str()
            .map(str::to_string)
            .ok_or_else(|| malformed("personal_sign", &raw))
    }

    /// Export the provider's private key.
    ///
    /// The returned value is sensitive: callers must not log or persist it.
    #[instrument(skip(self))]
    pub async fn get_private_key(&self) -> Result<String, RpcError> {
        let raw = self.provider.request("eth_private_key", Vec::new()).await?;
        match raw {
            Value::String(key) => Ok(key),
            _ => Err(RpcError::rejected("malformed eth_private_key response")),
        }
    }

    /// Ask the provider to register a new chain.
    #[instrument(skip(self, config), fields(chain_id = %config.chain_id))]
    pub async fn add_chain(&self, config: &ChainConfig) -> Result<(), RpcError> {
        let params = serde_json::to_value(config)
            .map_err(|e| RpcError::InvalidRequest(format!("unserializable chain config: {}", e)))?;
        self.provider
            .request("wallet_addEthereumChain", vec![params])
            .await?;
        Ok(())
    }

    /// Ask the provider to switch to a previously registered chain.
    #[instrument(skip(self))]
    pub async fn switch_chain(&self, chain_id: ChainId) -> Result<(), RpcError> {
        self.provider
            .request(
                "wallet_switchEthereumChain",
                vec![json!({ "chainId": chain_id.to_hex() })],
            )
            .await?;
        Ok(())
    }

    /// Recover the address that produced `signature` over `message`,
    /// using the provider's verification capability.
    #[instrument(skip(self, message, signature))]
    pub async fn recover_signer(&self, message: &str, signature: &str) -> Result<String, RpcError> {
        let raw = self
            .provider
            .request(
                "personal_ecRecover",
                vec![json!(hex::encode_prefixed(message.as_bytes())), json!(signature)],
            )
            .await?;
        raw.as_str()
            .map(str::to_string)
            .ok_or_else(|| malformed("personal_ecRecover", &raw))
    }
}

fn malformed(method: &str, raw: &Value) -> RpcError {
    RpcError::rejected_with_cause(format!("malformed {} response", method), raw)
}

/// Accepts a `0x` hex quantity, a decimal string or a JSON number.
fn parse_quantity(method: &str, raw: &Value) -> Result<U256, RpcError> {
    match raw {
        Value::String(s) => {
            let parsed = match s.strip_prefix("0x") {
                Some(digits) => U256::from_str_radix(digits, 16),
                None => U256::from_str_radix(s, 10),
            };
            parsed.map_err(|_| malformed(method, raw))
        }
        Value::Number(n) => n.as_u64().map(U256::from).ok_or_else(|| malformed(method, raw)),
        _ => Err(malformed(method, raw)),
    }
}

fn parse_chain_id(raw: &Value) -> Result<ChainId, RpcError> {
    let value = parse_quantity("eth_chainId", raw)?;
    u64::try_from(value)
        .map(ChainId)
        .map_err(|_| malformed("eth_chainId", raw))
}

/// Formats wei as ether, trimming trailing zeros but keeping one decimal.
pub fn format_balance(wei: U256) -> String {
    let formatted = format_ether(wei);
    match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{}.0", whole)
            } else {
                format!("{}.{}", whole, fraction)
            }
        }
        None => format!("{}.0", formatted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReceiptStatus;
    use crate::test_utils::MockProvider;
    use crate::test_utils::mocks::MockConfig;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_new_rejects_disconnected_provider() {
        let mock = MockProvider::new();
        mock.set_connected(false);

        let result = RpcFacade::new(&mock);
        assert!(matches!(result, Err(RpcError::NotConnected)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_chain_id_returns_decimal_string() {
        let mock = MockProvider::new().with_chain_id(84532);
        let facade = RpcFacade::new(&mock).unwrap();

        assert_eq!(facade.get_chain_id().await.unwrap(), "84532");
        assert_eq!(mock.requested_methods(), vec!["eth_chainId".to_string()]);
    }

    #[tokio::test]
    async fn test_get_accounts_is_stable() {
        let mock = MockProvider::new();
        let facade = RpcFacade::new(&mock).unwrap();

        let first = facade.get_accounts().await.unwrap();
        let second = facade.get_accounts().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0], second[0]);
        assert_eq!(first[0].to_lowercase(), mock.address().to_string().to_lowercase());
    }

    #[tokio::test]
    async fn test_get_balance_is_non_negative_decimal() {
        let mock = MockProvider::new().with_balance(U256::from(1_500_000_000_000_000_000u128));
        let facade = RpcFacade::new(&mock).unwrap();

        let balance = facade.get_balance().await.unwrap();
        assert_eq!(balance, "1.5");
        let parsed: f64 = balance.parse().unwrap();
        assert!(parsed >= 0.0);
        assert_eq!(
            mock.requested_methods(),
            vec!["eth_accounts".to_string(), "eth_getBalance".to_string()]
        );
    }

    #[tokio::test]
    async fn test_get_balance_zero() {
        let mock = MockProvider::new().with_balance(U256::ZERO);
        let facade = RpcFacade::new(&mock).unwrap();

        assert_eq!(facade.get_balance().await.unwrap(), "0.0");
    }

    #[tokio::test]
    async fn test_send_transaction_returns_receipt_with_hash() {
        let mock = MockProvider::new();
        let facade = RpcFacade::new(&mock).unwrap();

        let receipt = facade.send_transaction().await.unwrap();
        assert!(!receipt.transaction_hash.is_empty());
        assert_eq!(receipt.status, ReceiptStatus::Success);

        let sent = mock.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, mock.address());
        assert_eq!(sent[0].value, U256::from(DEMO_TRANSFER_WEI));
    }

    #[tokio::test]
    async fn test_send_transaction_user_denied() {
        let mock = MockProvider::new();
        mock.set_approve_transactions(false);
        let facade = RpcFacade::new(&mock).unwrap();

        let err = facade.send_transaction().await.unwrap_err();
        assert!(matches!(err, RpcError::ProviderRejected { .. }));
        assert!(mock.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_signature_recovers_to_first_account() {
        let mock = MockProvider::new();
        let facade = RpcFacade::new(&mock).unwrap();

        let signature = facade.sign_message().await.unwrap();
        assert!(signature.starts_with("0x"));

        let signer = facade.recover_signer(DEMO_MESSAGE, &signature).await.unwrap();
        let account = facade.first_account().await.unwrap();
        assert_eq!(signer.to_lowercase(), account.to_lowercase());
    }

    #[tokio::test]
    async fn test_signature_does_not_recover_for_other_message() {
        let mock = MockProvider::new();
        let facade = RpcFacade::new(&mock).unwrap();

        let signature = facade.sign_message().await.unwrap();
        let signer = facade.recover_signer("something else", &signature).await.unwrap();
        assert_ne!(signer.to_lowercase(), mock.address().to_string().to_lowercase());
    }

    #[tokio::test]
    async fn test_get_private_key() {
        let mock = MockProvider::new();
        let facade = RpcFacade::new(&mock).unwrap();

        let key = facade.get_private_key().await.unwrap();
        assert_eq!(key, crate::test_utils::mocks::TEST_PRIVATE_KEY);
    }

    #[tokio::test]
    async fn test_switch_chain_sends_hex_id() {
        let mock = MockProvider::new();
        let facade = RpcFacade::new(&mock).unwrap();

        facade.switch_chain(ChainId(11155111)).await.unwrap();
        assert_eq!(facade.get_chain_id().await.unwrap(), "11155111");
    }

    #[tokio::test]
    async fn test_add_chain_forwards_config() {
        let mock = MockProvider::new();
        let facade = RpcFacade::new(&mock).unwrap();

        assert_ok!(facade.add_chain(&ChainConfig::ethereum_sepolia()).await);
        assert_eq!(
            mock.requested_methods(),
            vec!["wallet_addEthereumChain".to_string()]
        );
    }

    #[tokio::test]
    async fn test_rejecting_provider_fails_every_operation() {
        let mock = MockProvider::with_config(MockConfig::failure("connection lost"));
        let facade = RpcFacade::new(&mock).unwrap();

        assert_err!(facade.get_chain_id().await);
        assert_err!(facade.get_accounts().await);
        assert_err!(facade.get_balance().await);
        assert_err!(facade.send_transaction().await);
        assert_err!(facade.sign_message().await);
        assert_err!(facade.get_private_key().await);
        assert_err!(facade.switch_chain(ChainId(1)).await);

        let err = facade.get_chain_id().await.unwrap_err();
        assert_eq!(err.to_string(), "connection lost");
    }

    #[test]
    fn test_parse_quantity_variants() {
        assert_eq!(
            parse_quantity("m", &json!("0x10")).unwrap(),
            U256::from(16u64)
        );
        assert_eq!(parse_quantity("m", &json!("42")).unwrap(), U256::from(42u64));
        assert_eq!(parse_quantity("m", &json!(7)).unwrap(), U256::from(7u64));
        assert!(parse_quantity("m", &json!(null)).is_err());
        assert!(parse_quantity("m", &json!("0xnothex")).is_err());
    }

    #[test]
    fn test_parse_chain_id_overflow_is_malformed() {
        let err = parse_chain_id(&json!("0x10000000000000000")).unwrap_err();
        assert!(matches!(err, RpcError::ProviderRejected { .. }));
    }

    #[test]
    fn test_format_balance() {
        assert_eq!(format_balance(U256::ZERO), "0.0");
        assert_eq!(
            format_balance(U256::from(1_000_000_000_000_000_000u128)),
            "1.0"
        );
        assert_eq!(format_balance(U256::from(DEMO_TRANSFER_WEI)), "0.0001");
        assert_eq!(format_balance(U256::from(1u64)), "0.000000000000000001");
    }
}
