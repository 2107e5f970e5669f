//! # JSON-RPC Node Client
//!
//! [`NodeClient`] over a bitcoind-style JSON-RPC endpoint.
//!
//! | Port call | RPC |
//! |-----------|-----|
//! | `get_block_info` / `get_block` | `getblockhash` + `getblock <hash> 2` |
//! | `get_subsidy` | `getblocksubsidy <height>` |
//! | `get_transaction` | `getrawtransaction <txid> 1` |
//! | `tip_height` | `getblockcount` |
//!
//! The derive step asks for the header and then the body of the same
//! height, so the last decoded block is memoized for one `get_block`.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stats_engine::{
    Amount, BlockInfo, BlockKind, Height, NodeClient, NodeError, OutPoint, RawBlock,
    RawTransaction, ScriptKind, TxInput, TxOutput,
};

use crate::config::RpcConfig;

/// `RPC_INVALID_ADDRESS_OR_KEY`: unknown block hash or transaction.
const RPC_NOT_FOUND: i64 = -5;
/// `RPC_INVALID_PARAMETER`: height out of range.
const RPC_INVALID_PARAMETER: i64 = -8;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct VerboseBlock {
    hash: String,
    height: Height,
    time: u64,
    difficulty: f64,
    #[serde(default)]
    flags: String,
    tx: Vec<VerboseTransaction>,
}

#[derive(Debug, Deserialize)]
struct VerboseTransaction {
    txid: String,
    #[serde(default)]
    vin: Vec<VerboseInput>,
    #[serde(default)]
    vout: Vec<VerboseOutput>,
}

#[derive(Debug, Deserialize)]
struct VerboseInput {
    coinbase: Option<String>,
    txid: Option<String>,
    vout: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct VerboseOutput {
    value: f64,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: ScriptPubKey,
}

#[derive(Debug, Deserialize)]
struct ScriptPubKey {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    hex: String,
}

/// Why a call failed, before the caller decides what it means.
#[derive(Debug)]
enum RpcFailure {
    Transport(String),
    Rpc { code: i64, message: String },
    Malformed(String),
}

impl From<RpcFailure> for NodeError {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Transport(msg) => NodeError::Unavailable(msg),
            RpcFailure::Rpc { code, message } => {
                NodeError::Unavailable(format!("RPC error {}: {}", code, message))
            }
            RpcFailure::Malformed(msg) => NodeError::Malformed(msg),
        }
    }
}

/// JSON-RPC node adapter.
pub struct JsonRpcNodeClient {
    client: reqwest::Client,
    config: RpcConfig,
    next_id: AtomicU64,
    last_block: Mutex<Option<(BlockInfo, RawBlock)>>,
}

impl std::fmt::Debug for JsonRpcNodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcNodeClient")
            .field("url", &self.config.url)
            .field("client", &"reqwest::Client")
            .finish()
    }
}

impl JsonRpcNodeClient {
    /// Build a client; no request is sent until the first call.
    pub fn new(config: RpcConfig) -> Result<Self, NodeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NodeError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(1),
            last_block: Mutex::new(None),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcFailure> {
        let request = JsonRpcRequest {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut req_builder = self.client.post(&self.config.url).json(&request);
        if let Some(ref user) = self.config.user {
            req_builder = req_builder.basic_auth(user, self.config.password.as_ref());
        }

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RpcFailure::Transport(format!("{} timed out", method))
            } else if e.is_connect() {
                RpcFailure::Transport(format!("connection failed: {}", e))
            } else {
                RpcFailure::Transport(format!("request failed: {}", e))
            }
        })?;

        // Nodes answer RPC errors with a non-2xx status and a JSON body.
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RpcFailure::Transport(format!("failed to read response: {}", e)))?;

        let rpc_response: JsonRpcResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RpcFailure::Transport(format!("HTTP error: {}", status)));
            }
            Err(e) => {
                return Err(RpcFailure::Malformed(format!(
                    "{}: failed to parse response: {}",
                    method, e
                )));
            }
        };

        if let Some(error) = rpc_response.error {
            return Err(RpcFailure::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = rpc_response
            .result
            .ok_or_else(|| RpcFailure::Malformed(format!("{}: missing result", method)))?;
        serde_json::from_value(result)
            .map_err(|e| RpcFailure::Malformed(format!("{}: unexpected result: {}", method, e)))
    }

    async fn fetch_block(&self, height: Height) -> Result<(BlockInfo, RawBlock), NodeError> {
        let hash: String = self
            .call("getblockhash", vec![json!(height)])
            .await
            .map_err(|f| height_error(height, f))?;
        let block: VerboseBlock = self
            .call("getblock", vec![json!(hash), json!(2)])
            .await
            .map_err(|f| height_error(height, f))?;
        decode_block(block)
    }
}

fn height_error(height: Height, failure: RpcFailure) -> NodeError {
    match failure {
        RpcFailure::Rpc { code, .. } if code == RPC_NOT_FOUND || code == RPC_INVALID_PARAMETER => {
            NodeError::HeightNotFound(height)
        }
        other => other.into(),
    }
}

fn decode_block(block: VerboseBlock) -> Result<(BlockInfo, RawBlock), NodeError> {
    let kind = if block.flags.contains("proof-of-stake") {
        BlockKind::ProofOfStake
    } else {
        BlockKind::ProofOfWork
    };
    let info = BlockInfo {
        height: block.height,
        hash: block.hash,
        time: block.time,
        kind,
        difficulty: block.difficulty,
    };
    let transactions = block
        .tx
        .into_iter()
        .map(decode_transaction)
        .collect::<Result<Vec<_>, _>>()?;
    let raw = RawBlock {
        height: block.height,
        transactions,
    };
    Ok((info, raw))
}

fn decode_transaction(tx: VerboseTransaction) -> Result<RawTransaction, NodeError> {
    let inputs = tx
        .vin
        .into_iter()
        .map(|input| match (input.coinbase, input.txid, input.vout) {
            (Some(_), _, _) => Ok(TxInput { prev_out: None }),
            (None, Some(txid), Some(vout)) => Ok(TxInput {
                prev_out: Some(OutPoint { txid, vout }),
            }),
            _ => Err(NodeError::Malformed(format!(
                "input of {} has neither coinbase nor prevout",
                tx.txid
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let outputs = tx
        .vout
        .into_iter()
        .map(|output| {
            Ok(TxOutput {
                value: coin_amount(output.value)?,
                script: script_kind(&output.script_pub_key),
            })
        })
        .collect::<Result<Vec<_>, NodeError>>()?;

    Ok(RawTransaction {
        txid: tx.txid,
        inputs,
        outputs,
    })
}

fn script_kind(script: &ScriptPubKey) -> ScriptKind {
    match script.kind.as_str() {
        "pubkeyhash" => ScriptKind::PubKeyHash,
        "pubkey" => ScriptKind::PubKey,
        _ if script.hex.is_empty() => ScriptKind::Empty,
        _ => ScriptKind::Other,
    }
}

/// Node values are JSON numbers with at most eight decimals.
fn coin_amount(value: f64) -> Result<Amount, NodeError> {
    if !value.is_finite() || value < 0.0 {
        return Err(NodeError::Malformed(format!("invalid amount {}", value)));
    }
    Amount::from_coin_str(&format!("{:.8}", value)).map_err(|e| NodeError::Malformed(e.to_string()))
}

#[async_trait]
impl NodeClient for JsonRpcNodeClient {
    async fn get_block(&self, height: Height) -> Result<RawBlock, NodeError> {
        let memo = {
            let mut last = self.last_block.lock();
            match last.take() {
                Some((_, block)) if block.height == height => Some(block),
                other => {
                    *last = other;
                    None
                }
            }
        };
        match memo {
            Some(block) => Ok(block),
            None => self.fetch_block(height).await.map(|(_, block)| block),
        }
    }

    async fn get_block_info(&self, height: Height) -> Result<BlockInfo, NodeError> {
        let (info, block) = self.fetch_block(height).await?;
        *self.last_block.lock() = Some((info.clone(), block));
        Ok(info)
    }

    async fn get_subsidy(&self, height: Height) -> Result<Amount, NodeError> {
        let result: Value = self
            .call("getblocksubsidy", vec![json!(height)])
            .await
            .map_err(|f| height_error(height, f))?;
        let value = match &result {
            Value::Number(n) => n.as_f64(),
            Value::Object(fields) => fields.get("miner").and_then(Value::as_f64),
            _ => None,
        };
        match value {
            Some(v) => coin_amount(v),
            None => Err(NodeError::Malformed(format!(
                "getblocksubsidy: unexpected result {}",
                result
            ))),
        }
    }

    async fn get_transaction(&self, txid: &str) -> Result<RawTransaction, NodeError> {
        let tx: VerboseTransaction = self
            .call("getrawtransaction", vec![json!(txid), json!(1)])
            .await
            .map_err(|failure| match failure {
                RpcFailure::Rpc { code, .. } if code == RPC_NOT_FOUND => {
                    NodeError::TransactionNotFound(txid.to_string())
                }
                other => other.into(),
            })?;
        decode_transaction(tx)
    }

    async fn tip_height(&self) -> Result<Height, NodeError> {
        Ok(self.call("getblockcount", Vec::new()).await?)
    }
}
