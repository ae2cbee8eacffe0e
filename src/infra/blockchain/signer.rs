//! Local secp256k1 key custody for the private-key provider.
//!
//! The raw key stays inside a `SecretString` and is parsed into an alloy
//! signer only in the scope of a signing call.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Signature, hex};
use alloy::signers::Signer;
use alloy::signers::local::PrivateKeySigner;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::domain::{ConfigError, RpcError};

/// Strip an optional `0x` prefix and lowercase the hex key.
fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("0x")
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

fn signer_from_secret(secret: &SecretString) -> Result<PrivateKeySigner, RpcError> {
    secret
        .expose_secret()
        .parse::<PrivateKeySigner>()
        .map_err(|e| RpcError::rejected_with_cause("signing key unavailable", e))
}

/// Holds one account's key and signs on its behalf.
pub struct LocalKeySigner {
    secret: SecretString,
    address: Address,
}

impl LocalKeySigner {
    /// Build a signer from a hex-encoded key, with or without `0x`.
    pub fn new(secret: SecretString) -> Result<Self, ConfigError> {
        let secret = SecretString::from(normalize_key(secret.expose_secret()));
        let signer = signer_from_secret(&secret).map_err(|_| ConfigError::InvalidValue {
            key: "WALLET_PRIVATE_KEY".to_string(),
            message: "not a valid secp256k1 private key".to_string(),
        })?;
        Ok(Self {
            address: signer.address(),
            secret,
        })
    }

    /// Ephemeral key for development.
    #[must_use]
    pub fn random() -> Self {
        let signer = PrivateKeySigner::random();
        Self {
            address: signer.address(),
            secret: SecretString::from(hex::encode(signer.to_bytes())),
        }
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Hex key without prefix. Sensitive.
    #[must_use]
    pub fn export_hex(&self) -> String {
        self.secret.expose_secret().to_string()
    }

    /// EIP-191 personal message signature.
    pub async fn sign_message(&self, message: &[u8]) -> Result<Signature, RpcError> {
        let signer = signer_from_secret(&self.secret)?;
        signer
            .sign_message(message)
            .await
            .map_err(|e| RpcError::rejected_with_cause("message signing failed", e))
    }

    /// Wallet used to sign transaction envelopes.
    pub fn wallet(&self) -> Result<EthereumWallet, RpcError> {
        Ok(EthereumWallet::from(signer_from_secret(&self.secret)?))
    }

    /// Serve a `personal_sign [data, address]` request.
    pub async fn personal_sign(&self, params: &[Value]) -> Result<Value, RpcError> {
        let data = string_param(params, 0, "personal_sign")?;
        let account = string_param(params, 1, "personal_sign")?;
        let account: Address = account
            .parse()
            .map_err(|e| RpcError::InvalidRequest(format!("invalid address '{}': {}", account, e)))?;
        if account != self.address {
            return Err(RpcError::InvalidRequest(format!(
                "account {} is not managed by this provider",
                account
            )));
        }

        let signature = self.sign_message(&decode_message(data)).await?;
        Ok(json!(hex::encode_prefixed(signature.as_bytes())))
    }
}

/// Serve a `personal_ecRecover [data, signature]` request.
pub fn personal_ec_recover(params: &[Value]) -> Result<Value, RpcError> {
    let data = string_param(params, 0, "personal_ecRecover")?;
    let signature = string_param(params, 1, "personal_ecRecover")?;
    let address = recover_address(&decode_message(data), signature)?;
    Ok(json!(address.to_string()))
}

/// Address whose key produced `signature` over the EIP-191 `message`.
pub fn recover_address(message: &[u8], signature: &str) -> Result<Address, RpcError> {
    let bytes = hex::decode(signature)
        .map_err(|e| RpcError::InvalidRequest(format!("signature is not hex: {}", e)))?;
    let signature = Signature::from_raw(&bytes)
        .map_err(|e| RpcError::InvalidRequest(format!("invalid signature: {}", e)))?;
    signature
        .recover_address_from_msg(message)
        .map_err(|e| RpcError::InvalidRequest(format!("signature recovery failed: {}", e)))
}

/// `0x`-prefixed data is hex-decoded; anything else is taken as UTF-8 text.
pub fn decode_message(data: &str) -> Vec<u8> {
    if data.starts_with("0x") {
        if let Ok(bytes) = hex::decode(data) {
            return bytes;
        }
    }
    data.as_bytes().to_vec()
}

fn string_param<'p>(params: &'p [Value], index: usize, method: &str) -> Result<&'p str, RpcError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            RpcError::InvalidRequest(format!("{} expects a string at position {}", method, index))
        })
}
