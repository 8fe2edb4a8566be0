//! # JSON-RPC Ledger Transport
//!
//! [`RpcLedger`] implements [`RegistryReader`] and [`LedgerWriter`] against
//! a ledger gateway speaking JSON-RPC 2.0 over HTTP. The gateway owns the
//! signing keys; the client only names the identity to sign as.
//!
//! ## Methods
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `lapor_institutionCount` | | uint |
//! | `lapor_institution` | id | `[id, name, admin, treasury]` |
//! | `lapor_isValidator` / `lapor_isReporter` | id, address | bool |
//! | `lapor_validators` / `lapor_reporters` | id | `[address, ..]` |
//! | `lapor_reportCount` | | uint |
//! | `lapor_report` | id | `[id, institutionId, title, description, reporter, assignedValidator, status, appealed, createdAt]` |
//! | `lapor_verdictRecord` | id | `null` or `[validator, isValid, description, timestamp]` |
//! | `lapor_stakePosition` | address | `[staked, minimum]` |
//! | `lapor_appealStake` / `lapor_poolBalance` | | uint |
//! | `lapor_tokenBalance` | address | uint |
//! | `lapor_tokenAllowance` | owner, spender | uint |
//! | `lapor_registryLink` | from, to | address or `null` |
//! | `lapor_simulate` | from, call | anything on success |
//! | `lapor_estimateCost` | from, call | uint |
//! | `lapor_sendTransaction` | from, call, costCeiling | tx hash |
//! | `lapor_getReceipt` | tx hash | `null` while pending, else receipt |
//!
//! A uint is a JSON number, a decimal string, or a `0x` hex string.
//! Amounts travel as strings because JSON numbers cannot carry 128 bits.
//!
//! ## Errors
//!
//! | Code | Meaning |
//! |------|---------|
//! | [`NOT_FOUND`] | queried entity does not exist |
//! | [`EXECUTION_REVERTED`] | the call was refused; `data.reason`, `data.origin` |
//! | anything else | transport-level failure |
//!
//! Tuple fields are decoded one by one. A verdict record with a broken
//! field still comes back, the broken field marked undecodable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use lapor_common::{
    Address, ClientConfig, Decoded, Institution, InstitutionId, RawVerdictRecord, RegistryKind,
    Report, ReportId, ReportStatus, StakePosition,
};

use crate::ledger::{
    CallArg, Confirmation, LedgerCall, LedgerWriter, ReadError, RegistryReader, Rejection,
    SimulationOutcome, SubmitError, TxHash,
};
use crate::sanitizer::UNAVAILABLE;

/// Gateway error code for a missing entity.
pub const NOT_FOUND: i64 = -32004;

/// Gateway error code for a refused call.
pub const EXECUTION_REVERTED: i64 = 3;

// ════════════════════════════════════════════════════════════════════════════════
// WIRE TYPES
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Value,
}

/// Why a request did not produce a result.
#[derive(Debug)]
enum CallFailure {
    Timeout,
    Transport(String),
    Rpc(JsonRpcError),
}

impl From<CallFailure> for ReadError {
    fn from(f: CallFailure) -> Self {
        match f {
            CallFailure::Timeout => ReadError::Network("request timed out".to_string()),
            CallFailure::Transport(e) => ReadError::Network(e),
            CallFailure::Rpc(e) if e.code == NOT_FOUND => ReadError::NotFound(e.message),
            CallFailure::Rpc(e) => ReadError::Network(format!("rpc error {}: {}", e.code, e.message)),
        }
    }
}

impl From<CallFailure> for SubmitError {
    fn from(f: CallFailure) -> Self {
        match f {
            CallFailure::Timeout => SubmitError::Timeout,
            CallFailure::Transport(e) => SubmitError::Transport(e),
            CallFailure::Rpc(e) if e.code == EXECUTION_REVERTED => {
                SubmitError::Rejected(rejection_from(&e.message, &e.data))
            }
            CallFailure::Rpc(e) => SubmitError::Transport(format!("rpc error {}: {}", e.code, e.message)),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// FIELD DECODING
// ════════════════════════════════════════════════════════════════════════════════

fn raw(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_uint(v: &Value) -> Option<u128> {
    match v {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) if !hex.is_empty() => u128::from_str_radix(hex, 16).ok(),
            Some(_) => None,
            None => s.parse().ok(),
        },
        _ => None,
    }
}

fn decode_uint(v: &Value, what: &str) -> Result<u128, ReadError> {
    parse_uint(v).ok_or_else(|| ReadError::Decode(format!("{what}: not a uint: {}", raw(v))))
}

fn decode_u64(v: &Value, what: &str) -> Result<u64, ReadError> {
    let n = decode_uint(v, what)?;
    u64::try_from(n).map_err(|_| ReadError::Decode(format!("{what}: {n} exceeds 64 bits")))
}

fn decode_bool(v: &Value, what: &str) -> Result<bool, ReadError> {
    v.as_bool()
        .ok_or_else(|| ReadError::Decode(format!("{what}: not a bool: {}", raw(v))))
}

fn decode_string(v: &Value, what: &str) -> Result<String, ReadError> {
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| ReadError::Decode(format!("{what}: not a string: {}", raw(v))))
}

fn decode_address(v: &Value, what: &str) -> Result<Address, ReadError> {
    let text = decode_string(v, what)?;
    Address::parse(&text).map_err(|e| ReadError::Decode(format!("{what}: {e}")))
}

fn tuple<'a>(v: &'a Value, len: usize, what: &str) -> Result<&'a [Value], ReadError> {
    match v.as_array() {
        Some(items) if items.len() == len => Ok(items),
        Some(items) => Err(ReadError::Decode(format!(
            "{what}: expected {len} fields, got {}",
            items.len()
        ))),
        None => Err(ReadError::Decode(format!("{what}: not a tuple: {}", raw(v)))),
    }
}

/// Display-only text. A broken value becomes [`UNAVAILABLE`] instead of
/// failing the tuple.
fn lenient_text(v: &Value, what: &str) -> String {
    match v.as_str() {
        Some(s) => s.to_string(),
        None => {
            warn!(field = what, value = %raw(v), "text field undecodable");
            UNAVAILABLE.to_string()
        }
    }
}

fn decode_institution(v: &Value) -> Result<Institution, ReadError> {
    let f = tuple(v, 4, "institution")?;
    Ok(Institution {
        id: decode_u64(&f[0], "institution.id")?,
        name: lenient_text(&f[1], "institution.name"),
        admin: decode_address(&f[2], "institution.admin")?,
        treasury: decode_address(&f[3], "institution.treasury")?,
    })
}

/// Id, institution, reporter, assignee, status and appeal flag gate
/// writes and must decode. Title, description and creation time are
/// display-only and degrade on their own.
fn decode_report(v: &Value) -> Result<Report, ReadError> {
    let f = tuple(v, 9, "report")?;
    let code = decode_u64(&f[6], "report.status")?;
    let status = u8::try_from(code)
        .ok()
        .and_then(ReportStatus::from_code)
        .ok_or_else(|| ReadError::Decode(format!("report.status: unknown code {code}")))?;
    let assigned = match &f[5] {
        Value::Null => None,
        other => Some(decode_address(other, "report.assignedValidator")?).filter(|a| !a.is_zero()),
    };
    Ok(Report {
        id: decode_u64(&f[0], "report.id")?,
        institution_id: decode_u64(&f[1], "report.institutionId")?,
        title: lenient_text(&f[2], "report.title"),
        description: lenient_text(&f[3], "report.description"),
        reporter: decode_address(&f[4], "report.reporter")?,
        assigned_validator: assigned,
        status,
        appealed: decode_bool(&f[7], "report.appealed")?,
        created_at: decode_u64(&f[8], "report.createdAt").unwrap_or_else(|e| {
            warn!(error = %e, "report creation time undecodable");
            0
        }),
    })
}

/// Field-by-field: only a wrong shape fails the whole record.
fn decode_verdict_record(v: &Value) -> Result<Option<RawVerdictRecord>, ReadError> {
    if v.is_null() {
        return Ok(None);
    }
    let f = tuple(v, 4, "verdict record")?;
    let text = |v: &Value| match v.as_str() {
        Some(s) => Decoded::Value(s.to_string()),
        None => Decoded::undecodable(raw(v)),
    };
    let validator = text(&f[0]);
    let is_valid = match &f[1] {
        Value::Bool(b) => Decoded::Value(*b),
        other => Decoded::undecodable(raw(other)),
    };
    let description = text(&f[2]);
    let timestamp = match parse_uint(&f[3]).and_then(|n| u64::try_from(n).ok()) {
        Some(t) => Decoded::Value(t),
        None => Decoded::undecodable(raw(&f[3])),
    };
    Ok(Some(RawVerdictRecord {
        validator,
        is_valid,
        description,
        timestamp,
    }))
}

fn rejection_from(message: &str, data: &Value) -> Rejection {
    let reason = data
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or(message)
        .to_string();
    let origin = data
        .get("origin")
        .and_then(Value::as_str)
        .and_then(RegistryKind::from_name);
    Rejection::new(reason, origin)
}

/// `null` while pending.
fn decode_receipt(v: &Value) -> Result<Option<Confirmation>, SubmitError> {
    if v.is_null() {
        return Ok(None);
    }
    let status = v.get("status").and_then(Value::as_str);
    match status {
        Some("confirmed") => {
            let block = v
                .get("block")
                .and_then(parse_uint)
                .and_then(|b| u64::try_from(b).ok())
                .ok_or_else(|| SubmitError::Transport(format!("receipt without block: {v}")))?;
            Ok(Some(Confirmation::Confirmed { block }))
        }
        Some("reverted") => Ok(Some(Confirmation::Reverted {
            rejection: rejection_from("execution reverted", v),
        })),
        _ => Err(SubmitError::Transport(format!("unrecognised receipt: {v}"))),
    }
}

/// Uints go out as decimal strings.
fn arg_json(arg: &CallArg) -> Value {
    match arg {
        CallArg::Uint(v) => json!({"type": "uint", "value": v.to_string()}),
        CallArg::Address(a) => json!({"type": "address", "value": a.to_string()}),
        CallArg::Bool(b) => json!({"type": "bool", "value": b}),
        CallArg::Text(t) => json!({"type": "text", "value": t}),
    }
}

fn call_json(call: &LedgerCall) -> Value {
    json!({
        "target": call.target.name(),
        "to": call.to.to_string(),
        "method": call.method,
        "args": call.args.iter().map(arg_json).collect::<Vec<_>>(),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// RPC LEDGER
// ════════════════════════════════════════════════════════════════════════════════

pub struct RpcLedger {
    client: reqwest::Client,
    rpc_url: String,
    signer: Address,
    next_id: AtomicU64,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("client", &"reqwest::Client")
            .field("rpc_url", &self.rpc_url)
            .field("signer", &self.signer)
            .finish()
    }
}

impl RpcLedger {
    /// Builds the HTTP client with the configured request timeout.
    ///
    /// `signer` is the identity writes are signed as; for a read-only
    /// session pass [`Address::ZERO`].
    pub fn new(config: &ClientConfig, signer: Address) -> Result<Self, ReadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_secs))
            .build()
            .map_err(|e| ReadError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            rpc_url: config.rpc_url.clone(),
            signer,
            next_id: AtomicU64::new(1),
            poll_interval: Duration::from_millis(config.receipt_poll_interval_ms.max(1)),
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
        })
    }

    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, CallFailure> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, id = request.id, "rpc request");

        let response = self
            .client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CallFailure::Timeout
                } else if e.is_connect() {
                    CallFailure::Transport(format!("connection failed: {e}"))
                } else {
                    CallFailure::Transport(format!("network error: {e}"))
                }
            })?;

        let http_status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CallFailure::Transport(format!("failed to read response body: {e}")))?;
        if !http_status.is_success() {
            warn!(method, %http_status, "rpc HTTP error");
            return Err(CallFailure::Transport(format!("HTTP {http_status}: {body}")));
        }

        let parsed: JsonRpcResponse = serde_json::from_str(&body)
            .map_err(|e| CallFailure::Transport(format!("invalid JSON-RPC response: {e}")))?;
        match parsed.error {
            Some(err) => {
                debug!(method, code = err.code, message = %err.message, "rpc error");
                Err(CallFailure::Rpc(err))
            }
            None => Ok(parsed.result),
        }
    }

    async fn read(&self, method: &str, params: Vec<Value>) -> Result<Value, ReadError> {
        self.call(method, params).await.map_err(ReadError::from)
    }

    async fn read_uint(&self, method: &str, params: Vec<Value>) -> Result<u128, ReadError> {
        let v = self.read(method, params).await?;
        decode_uint(&v, method)
    }

    async fn read_bool(&self, method: &str, params: Vec<Value>) -> Result<bool, ReadError> {
        let v = self.read(method, params).await?;
        decode_bool(&v, method)
    }

    async fn read_addresses(&self, method: &str, params: Vec<Value>) -> Result<Vec<Address>, ReadError> {
        let v = self.read(method, params).await?;
        let items = v
            .as_array()
            .ok_or_else(|| ReadError::Decode(format!("{method}: not a list")))?;
        items.iter().map(|a| decode_address(a, method)).collect()
    }
}

#[async_trait]
impl RegistryReader for RpcLedger {
    async fn institution_count(&self) -> Result<u64, ReadError> {
        let v = self.read("lapor_institutionCount", vec![]).await?;
        decode_u64(&v, "institution count")
    }

    async fn institution(&self, id: InstitutionId) -> Result<Institution, ReadError> {
        let v = self.read("lapor_institution", vec![json!(id)]).await?;
        decode_institution(&v)
    }

    async fn is_validator(&self, institution_id: InstitutionId, address: Address) -> Result<bool, ReadError> {
        self.read_bool("lapor_isValidator", vec![json!(institution_id), json!(address.to_string())])
            .await
    }

    async fn is_reporter(&self, institution_id: InstitutionId, address: Address) -> Result<bool, ReadError> {
        self.read_bool("lapor_isReporter", vec![json!(institution_id), json!(address.to_string())])
            .await
    }

    async fn validators(&self, institution_id: InstitutionId) -> Result<Vec<Address>, ReadError> {
        self.read_addresses("lapor_validators", vec![json!(institution_id)])
            .await
    }

    async fn reporters(&self, institution_id: InstitutionId) -> Result<Vec<Address>, ReadError> {
        self.read_addresses("lapor_reporters", vec![json!(institution_id)])
            .await
    }

    async fn report_count(&self) -> Result<u64, ReadError> {
        let v = self.read("lapor_reportCount", vec![]).await?;
        decode_u64(&v, "report count")
    }

    async fn report(&self, id: ReportId) -> Result<Report, ReadError> {
        let v = self.read("lapor_report", vec![json!(id)]).await?;
        decode_report(&v)
    }

    async fn verdict_record(&self, report_id: ReportId) -> Result<Option<RawVerdictRecord>, ReadError> {
        let v = self.read("lapor_verdictRecord", vec![json!(report_id)]).await?;
        decode_verdict_record(&v)
    }

    async fn stake_position(&self, validator: Address) -> Result<StakePosition, ReadError> {
        let v = self.read("lapor_stakePosition", vec![json!(validator.to_string())]).await?;
        let f = tuple(&v, 2, "stake position")?;
        Ok(StakePosition {
            validator,
            staked: decode_uint(&f[0], "stake.staked")?,
            minimum: decode_uint(&f[1], "stake.minimum")?,
        })
    }

    async fn appeal_stake(&self) -> Result<u128, ReadError> {
        self.read_uint("lapor_appealStake", vec![]).await
    }

    async fn token_balance(&self, owner: Address) -> Result<u128, ReadError> {
        self.read_uint("lapor_tokenBalance", vec![json!(owner.to_string())]).await
    }

    async fn token_allowance(&self, owner: Address, spender: Address) -> Result<u128, ReadError> {
        self.read_uint("lapor_tokenAllowance", vec![json!(owner.to_string()), json!(spender)])
            .await
    }

    async fn pool_balance(&self) -> Result<u128, ReadError> {
        self.read_uint("lapor_poolBalance", vec![]).await
    }

    async fn registry_link(&self, from: RegistryKind, to: RegistryKind) -> Result<Option<Address>, ReadError> {
        let v = self
            .read("lapor_registryLink", vec![json!(from.name()), json!(to.name())])
            .await?;
        if v.is_null() {
            return Ok(None);
        }
        let addr = decode_address(&v, "registry link")?;
        Ok(Some(addr).filter(|a| !a.is_zero()))
    }

    async fn simulate(&self, caller: Address, call: &LedgerCall) -> Result<SimulationOutcome, ReadError> {
        match self
            .call("lapor_simulate", vec![json!(caller.to_string()), call_json(call)])
            .await
        {
            Ok(_) => Ok(SimulationOutcome::WouldSucceed),
            Err(CallFailure::Rpc(e)) if e.code == EXECUTION_REVERTED => Ok(
                SimulationOutcome::WouldRevert(rejection_from(&e.message, &e.data)),
            ),
            Err(other) => Err(other.into()),
        }
    }
}

#[async_trait]
impl LedgerWriter for RpcLedger {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn estimate_cost(&self, call: &LedgerCall) -> Result<u64, SubmitError> {
        let v = self
            .call("lapor_estimateCost", vec![json!(self.signer.to_string()), call_json(call)])
            .await?;
        parse_uint(&v)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| SubmitError::Transport(format!("estimate is not a uint: {v}")))
    }

    async fn submit(&self, call: &LedgerCall, cost_ceiling: u64) -> Result<TxHash, SubmitError> {
        let v = self
            .call(
                "lapor_sendTransaction",
                vec![json!(self.signer.to_string()), call_json(call), json!(cost_ceiling)],
            )
            .await?;
        v.as_str()
            .and_then(TxHash::parse)
            .ok_or_else(|| SubmitError::Transport(format!("invalid transaction hash: {v}")))
    }

    async fn await_receipt(&self, tx: &TxHash) -> Result<Confirmation, SubmitError> {
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;
        loop {
            let v = self
                .call("lapor_getReceipt", vec![json!(tx.to_string())])
                .await?;
            if let Some(confirmation) = decode_receipt(&v)? {
                return Ok(confirmation);
            }
            if tokio::time::Instant::now() + self.poll_interval > deadline {
                warn!(tx = %tx, "receipt not available before timeout");
                return Err(SubmitError::Timeout);
            }
            debug!(tx = %tx, "receipt pending");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// COMPILE-TIME ASSERTIONS
// ════════════════════════════════════════════════════════════════════════════════

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<RpcLedger>();
    }
    let _ = check;
};

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a";
    const B: &str = "0x0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b";

    #[test]
    fn uint_forms() {
        assert_eq!(parse_uint(&json!(42)), Some(42));
        assert_eq!(parse_uint(&json!("10000000000000000000000")), Some(10_000_000_000_000_000_000_000));
        assert_eq!(parse_uint(&json!("0xff")), Some(255));
        assert_eq!(parse_uint(&json!("0x")), None);
        assert_eq!(parse_uint(&json!(-1)), None);
        assert_eq!(parse_uint(&json!(true)), None);
    }

    #[test]
    fn report_tuple() {
        let v = json!([7, 3, "Pothole", "Main street", A, B, 2, false, "1700000000"]);
        let r = decode_report(&v).unwrap();
        assert_eq!(r.id, 7);
        assert_eq!(r.status, ReportStatus::Invalid);
        assert_eq!(r.assigned_validator, Some(Address::repeat(0x0b)));
        assert_eq!(r.created_at, 1_700_000_000);
    }

    #[test]
    fn report_zero_assignee_is_none() {
        let zero = Address::ZERO.to_string();
        let v = json!([1, 1, "t", "d", A, zero, 0, false, 1]);
        assert_eq!(decode_report(&v).unwrap().assigned_validator, None);
    }

    #[test]
    fn report_bad_status_is_decode_error() {
        let v = json!([1, 1, "t", "d", A, null, 9, false, 1]);
        assert!(matches!(decode_report(&v), Err(ReadError::Decode(_))));
    }

    #[test]
    fn report_display_fields_degrade_alone() {
        let v = json!([7, 3, "Pothole", {"bytes": "c3"}, A, null, 2, false, "later"]);
        let r = decode_report(&v).unwrap();
        assert_eq!(r.title, "Pothole");
        assert_eq!(r.description, UNAVAILABLE);
        assert_eq!(r.created_at, 0);
        assert_eq!(r.status, ReportStatus::Invalid);
        assert_eq!(r.reporter, Address::repeat(0x0a));
    }

    #[test]
    fn report_bad_reporter_still_fails() {
        let v = json!([7, 3, "Pothole", "Main street", "0xZZ", null, 2, false, 1]);
        assert!(matches!(decode_report(&v), Err(ReadError::Decode(_))));
    }

    #[test]
    fn institution_bad_name_degrades() {
        let v = json!([3, 42, A, B]);
        let inst = decode_institution(&v).unwrap();
        assert_eq!(inst.name, UNAVAILABLE);
        assert_eq!(inst.admin, Address::repeat(0x0a));
    }

    #[test]
    fn verdict_record_fields_fail_independently() {
        let v = json!(["0xZZ", true, {"bytes": "c3"}, "1700000000"]);
        let rec = decode_verdict_record(&v).unwrap().unwrap();
        assert_eq!(rec.validator, Decoded::Value("0xZZ".to_string()));
        assert_eq!(rec.is_valid, Decoded::Value(true));
        assert!(!rec.description.is_decoded());
        assert_eq!(rec.timestamp, Decoded::Value(1_700_000_000));
        assert_eq!(rec.decoded_fields(), 3);
    }

    #[test]
    fn verdict_record_null_and_shape() {
        assert_eq!(decode_verdict_record(&Value::Null).unwrap(), None);
        assert!(matches!(
            decode_verdict_record(&json!([1, 2])),
            Err(ReadError::Decode(_))
        ));
    }

    #[test]
    fn revert_maps_to_rejection_with_origin() {
        let err = JsonRpcError {
            code: EXECUTION_REVERTED,
            message: "execution reverted".into(),
            data: json!({"reason": "caller is not the authorized settlement registry", "origin": "RewardManager"}),
        };
        match SubmitError::from(CallFailure::Rpc(err)) {
            SubmitError::Rejected(r) => {
                assert_eq!(r.reason, "caller is not the authorized settlement registry");
                assert_eq!(r.origin, Some(RegistryKind::RewardManager));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn not_found_and_timeout_mapping() {
        let nf = JsonRpcError {
            code: NOT_FOUND,
            message: "report 9".into(),
            data: Value::Null,
        };
        assert_eq!(ReadError::from(CallFailure::Rpc(nf)), ReadError::NotFound("report 9".into()));
        assert_eq!(SubmitError::from(CallFailure::Timeout), SubmitError::Timeout);
        assert!(matches!(ReadError::from(CallFailure::Timeout), ReadError::Network(_)));
    }

    #[test]
    fn receipts() {
        assert_eq!(decode_receipt(&Value::Null).unwrap(), None);
        assert_eq!(
            decode_receipt(&json!({"status": "confirmed", "block": "0x10"})).unwrap(),
            Some(Confirmation::Confirmed { block: 16 })
        );
        let reverted = decode_receipt(&json!({"status": "reverted"})).unwrap().unwrap();
        assert_eq!(
            reverted,
            Confirmation::Reverted {
                rejection: Rejection::new("execution reverted", None)
            }
        );
        assert!(decode_receipt(&json!({"status": "weird"})).is_err());
    }

    #[test]
    fn call_json_shape() {
        let call = LedgerCall {
            target: RegistryKind::ReportRegistry,
            to: Address::repeat(0x22),
            method: crate::ledger::methods::SUBMIT_APPEAL,
            args: vec![CallArg::Uint(u128::MAX)],
        };
        let v = call_json(&call);
        assert_eq!(v["method"], "submitAppeal");
        assert_eq!(v["target"], "ReportRegistry");
        assert_eq!(v["args"][0]["type"], "uint");
        assert_eq!(v["args"][0]["value"], u128::MAX.to_string());
    }

    #[test]
    fn constructor_keeps_endpoint() {
        let cfg = ClientConfig {
            rpc_url: "http://gateway.test:9000".into(),
            ..ClientConfig::default()
        };
        let ledger = RpcLedger::new(&cfg, Address::repeat(0x0a)).unwrap();
        assert_eq!(ledger.rpc_url(), "http://gateway.test:9000");
        assert_eq!(LedgerWriter::signer(&ledger), Address::repeat(0x0a));
    }
}
