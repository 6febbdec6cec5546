//! The RPC boundary's error formatter (`spec.md` §7): maps the validation
//! crates' stable `ErrorKind` onto an HTTP status and a response envelope,
//! without building the HTTP router itself (out of scope per `spec.md`
//! §6 — the CLI/HTTP surface is a collaborator, not part of this core).

use serde::Serialize;
use serde_json::Value;

use solidus_consensus::ErrorKind;

/// The response envelope every RPC answer uses, success or failure
/// (`spec.md` §7 "User-visible failure").
#[derive(Serialize)]
pub struct RpcResponse {
    pub status: &'static str,
    pub code: u32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    pub fn success(data: Value) -> RpcResponse {
        RpcResponse { status: "success", code: 0, msg: String::new(), detail: None, data: Some(data) }
    }

    pub fn failure(kind: ErrorKind, msg: impl Into<String>) -> RpcResponse {
        let (_, code) = http_status_and_code(kind);
        RpcResponse { status: "fail", code, msg: msg.into(), detail: None, data: None }
    }

    pub fn failure_with_detail(kind: ErrorKind, msg: impl Into<String>, detail: impl Into<String>) -> RpcResponse {
        let (_, code) = http_status_and_code(kind);
        RpcResponse { status: "fail", code, msg: msg.into(), detail: Some(detail.into()), data: None }
    }
}

/// `spec.md` §7: "The top-level API formatter maps a root kind →
/// (httpStatus, code, message)." The numeric `code` is a stable identifier
/// distinct from the HTTP status, assigned in the order `ErrorKind`'s
/// variants are declared so a given kind's code never changes once shipped.
pub fn http_status_and_code(kind: ErrorKind) -> (u16, u32) {
    let code = kind as u32 + 1000;
    let status = match kind {
        ErrorKind::BadRequest
        | ErrorKind::InvalidRequestBody
        | ErrorKind::InsufficientFunds
        | ErrorKind::ImmatureFunds
        | ErrorKind::ReservedUtxo
        | ErrorKind::UtxoNotFound
        | ErrorKind::BadAssetAmount
        | ErrorKind::BadAction
        | ErrorKind::MissingFields
        | ErrorKind::BadActionConstruction
        | ErrorKind::MismatchedMerkleRoot
        | ErrorKind::MismatchedBlock
        | ErrorKind::MisorderedBlockHeight
        | ErrorKind::VersionRegression
        | ErrorKind::BadTimestamp
        | ErrorKind::BadWork
        | ErrorKind::BadCoinbase
        | ErrorKind::OverBlockLimit
        | ErrorKind::VmRange
        | ErrorKind::VmDivZero
        | ErrorKind::VmBadValue
        | ErrorKind::VmVerifyFailed
        | ErrorKind::VmFalseResult => 400,
        ErrorKind::WrongNetwork | ErrorKind::Unauthenticated => 401,
        ErrorKind::RequestTimedOut => 408,
        ErrorKind::StorageCorrupt => 500,
    };
    (status, code)
}

pub fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::BadRequest => "BadRequest",
        ErrorKind::InvalidRequestBody => "InvalidRequestBody",
        ErrorKind::InsufficientFunds => "InsufficientFunds",
        ErrorKind::ImmatureFunds => "ImmatureFunds",
        ErrorKind::ReservedUtxo => "ReservedUTXO",
        ErrorKind::UtxoNotFound => "UTXONotFound",
        ErrorKind::BadAssetAmount => "BadAssetAmount",
        ErrorKind::BadAction => "BadAction",
        ErrorKind::MissingFields => "MissingFields",
        ErrorKind::BadActionConstruction => "BadActionConstruction",
        ErrorKind::WrongNetwork => "WrongNetwork",
        ErrorKind::RequestTimedOut => "RequestTimedOut",
        ErrorKind::Unauthenticated => "Unauthenticated",
        ErrorKind::MismatchedMerkleRoot => "MismatchedMerkleRoot",
        ErrorKind::MismatchedBlock => "MismatchedBlock",
        ErrorKind::MisorderedBlockHeight => "MisorderedBlockHeight",
        ErrorKind::VersionRegression => "VersionRegression",
        ErrorKind::BadTimestamp => "BadTimestamp",
        ErrorKind::BadWork => "BadWork",
        ErrorKind::BadCoinbase => "BadCoinbase",
        ErrorKind::OverBlockLimit => "OverBlockLimit",
        ErrorKind::VmRange => "VMRange",
        ErrorKind::VmDivZero => "VMDivZero",
        ErrorKind::VmBadValue => "VMBadValue",
        ErrorKind::VmVerifyFailed => "VMVerifyFailed",
        ErrorKind::VmFalseResult => "VMFalseResult",
        ErrorKind::StorageCorrupt => "StorageCorrupt",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_utxo_error_maps_to_bad_request() {
        let (status, _) = http_status_and_code(ErrorKind::UtxoNotFound);
        assert_eq!(status, 400);
    }

    #[test]
    fn storage_corruption_maps_to_a_server_error() {
        let (status, _) = http_status_and_code(ErrorKind::StorageCorrupt);
        assert_eq!(status, 500);
    }

    #[test]
    fn a_temporary_kind_is_flagged_as_such_upstream() {
        assert!(ErrorKind::RequestTimedOut.is_temporary());
        assert!(!ErrorKind::BadRequest.is_temporary());
    }
}
