//! JSON fixtures for stubbing an Ethereum JSON-RPC node.

use serde_json::{Value, json};

/// JSON-RPC 2.0 success envelope around `result`.
#[must_use]
pub fn rpc_result_body(result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": 0, "result": result }).to_string()
}

/// JSON-RPC 2.0 error envelope.
#[must_use]
pub fn rpc_error_body(code: i64, message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 0,
        "error": { "code": code, "message": message }
    })
    .to_string()
}

/// A legacy transaction receipt as `eth_getTransactionReceipt` returns it.
#[must_use]
pub fn receipt_json(tx_hash: &str, succeeded: bool, block_number: u64, party: &str) -> Value {
    json!({
        "type": "0x0",
        "status": if succeeded { "0x1" } else { "0x0" },
        "cumulativeGasUsed": "0x5208",
        "logs": [],
        "logsBloom": format!("0x{}", "00".repeat(256)),
        "transactionHash": tx_hash,
        "transactionIndex": "0x0",
        "blockHash": format!("0x{}", "22".repeat(32)),
        "blockNumber": format!("0x{:x}", block_number),
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x3b9aca00",
        "from": party,
        "to": party,
        "contractAddress": null
    })
}
