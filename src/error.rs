//! Stable numeric error codes and the two error shapes used throughout verification.
//!
//! Every scalar failure surfaces as an [`ErrorCodeError`]; digest verification is the
//! only place that instead produces an [`ErrorsError`], aggregating per-element issues.

use std::fmt;

use indexmap::IndexMap;

use crate::model::{DataElementIdentifier, NameSpace};
use crate::schema::IssueList;

/// Stable numeric error codes, grouped by the ranges spec'd for this verification core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // 1000-1999: CBOR / schema
    CborDecodingError = 1,
    CborValidationError = 2,

    // 2000-2099: digest / validity
    ValueDigestsMissingForNamespace = 2001,
    DocumentNotValidYet = 2002,
    DocumentExpired = 2003,
    ValidFromMissing = 2004,
    ValidUntilMissing = 2005,
    MsoDigestMismatch = 2006,
    ValueDigestsMissingForDigestId = 2007,

    // 2100-2199: COSE
    X5ChainVerificationFailed = 2100,
    IssuerAuthSignatureVerificationFailed = 2101,
    DetachedPayloadRequired = 2102,
    Sign1ConversionFailed = 2103,
    IssuerAuthAlgorithmMismatch = 2104,
    IssuerAuthPayloadDecodingFailed = 2105,
    MobileSecurityObjectInvalid = 2106,
    DeviceSignatureVerificationFailed = 2107,
    DeviceKeyUnsupported = 2108,

    // 2200-2299: document structure
    DocTypeMissing = 2200,
    IssuerSignedMissing = 2201,
    DeviceSignedMissing = 2202,
    IssuerNameSpacesMissing = 2203,
    IssuerAuthMissing = 2204,
    DeviceNameSpacesMissing = 2205,
    DeviceAuthMissing = 2206,
    DeviceSignatureMissing = 2207,
    DeviceMacNotSupported = 2208,
    WrongDocType = 2209,
}

impl ErrorCode {
    pub fn label(self) -> &'static str {
        match self {
            ErrorCode::CborDecodingError => "CborDecodingError",
            ErrorCode::CborValidationError => "CborValidationError",
            ErrorCode::ValueDigestsMissingForNamespace => "ValueDigestsMissingForNamespace",
            ErrorCode::DocumentNotValidYet => "DocumentNotValidYet",
            ErrorCode::DocumentExpired => "DocumentExpired",
            ErrorCode::ValidFromMissing => "ValidFromMissing",
            ErrorCode::ValidUntilMissing => "ValidUntilMissing",
            ErrorCode::MsoDigestMismatch => "MsoDigestMismatch",
            ErrorCode::ValueDigestsMissingForDigestId => "ValueDigestsMissingForDigestId",
            ErrorCode::X5ChainVerificationFailed => "X5ChainVerificationFailed",
            ErrorCode::IssuerAuthSignatureVerificationFailed => "IssuerAuthSignatureVerificationFailed",
            ErrorCode::DetachedPayloadRequired => "DetachedPayloadRequired",
            ErrorCode::Sign1ConversionFailed => "Sign1ConversionFailed",
            ErrorCode::IssuerAuthAlgorithmMismatch => "IssuerAuthAlgorithmMismatch",
            ErrorCode::IssuerAuthPayloadDecodingFailed => "IssuerAuthPayloadDecodingFailed",
            ErrorCode::MobileSecurityObjectInvalid => "MobileSecurityObjectInvalid",
            ErrorCode::DeviceSignatureVerificationFailed => "DeviceSignatureVerificationFailed",
            ErrorCode::DeviceKeyUnsupported => "DeviceKeyUnsupported",
            ErrorCode::DocTypeMissing => "DocTypeMissing",
            ErrorCode::IssuerSignedMissing => "IssuerSignedMissing",
            ErrorCode::DeviceSignedMissing => "DeviceSignedMissing",
            ErrorCode::IssuerNameSpacesMissing => "IssuerNameSpacesMissing",
            ErrorCode::IssuerAuthMissing => "IssuerAuthMissing",
            ErrorCode::DeviceNameSpacesMissing => "DeviceNameSpacesMissing",
            ErrorCode::DeviceAuthMissing => "DeviceAuthMissing",
            ErrorCode::DeviceSignatureMissing => "DeviceSignatureMissing",
            ErrorCode::DeviceMacNotSupported => "DeviceMacNotSupported",
            ErrorCode::WrongDocType => "WrongDocType",
        }
    }

    fn human(self) -> &'static str {
        match self {
            ErrorCode::CborDecodingError => "CBOR decoding failed",
            ErrorCode::CborValidationError => "CBOR schema validation failed",
            ErrorCode::ValueDigestsMissingForNamespace => "Namespace missing from MSO value digests",
            ErrorCode::DocumentNotValidYet => "Document is not valid yet",
            ErrorCode::DocumentExpired => "Document has expired",
            ErrorCode::ValidFromMissing => "validFrom is missing",
            ErrorCode::ValidUntilMissing => "validUntil is missing",
            ErrorCode::MsoDigestMismatch => "Digest did not match the value in the MSO",
            ErrorCode::ValueDigestsMissingForDigestId => "Digest ID missing from MSO value digests",
            ErrorCode::X5ChainVerificationFailed => "X.509 chain verification failed",
            ErrorCode::IssuerAuthSignatureVerificationFailed => "Issuer auth signature verification failed",
            ErrorCode::DetachedPayloadRequired => "A detached payload is required to verify this signature",
            ErrorCode::Sign1ConversionFailed => "Could not convert input into a COSE_Sign1 structure",
            ErrorCode::IssuerAuthAlgorithmMismatch => "Issuer auth algorithm does not match the signing key",
            ErrorCode::IssuerAuthPayloadDecodingFailed => "Issuer auth payload could not be decoded",
            ErrorCode::MobileSecurityObjectInvalid => "Mobile security object failed schema validation",
            ErrorCode::DeviceSignatureVerificationFailed => "Device signature verification failed",
            ErrorCode::DeviceKeyUnsupported => "Device key type is not supported",
            ErrorCode::DocTypeMissing => "docType is missing",
            ErrorCode::IssuerSignedMissing => "issuerSigned is missing",
            ErrorCode::DeviceSignedMissing => "deviceSigned is missing",
            ErrorCode::IssuerNameSpacesMissing => "nameSpaces is missing from issuerSigned",
            ErrorCode::IssuerAuthMissing => "issuerAuth is missing from issuerSigned",
            ErrorCode::DeviceNameSpacesMissing => "nameSpaces is missing from deviceSigned",
            ErrorCode::DeviceAuthMissing => "deviceAuth is missing from deviceSigned",
            ErrorCode::DeviceSignatureMissing => "deviceSignature is missing from deviceAuth",
            ErrorCode::DeviceMacNotSupported => "deviceMac is not a supported device authentication mode",
            ErrorCode::WrongDocType => "docType does not match the docType embedded in the MSO",
        }
    }
}

/// A single-cause error: the scalar failure shape used everywhere except digest verification.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", self.message)]
pub struct ErrorCodeError {
    pub code: ErrorCode,
    pub cause: Option<String>,
    pub message: String,
}

impl ErrorCodeError {
    pub fn new(code: ErrorCode, cause: Option<String>) -> Self {
        let message = match &cause {
            Some(cause) => format!("{}: {} - {} - {}", code.human(), cause, code as u16, code.label()),
            None => format!("{} - {} - {}", code.human(), code as u16, code.label()),
        };
        ErrorCodeError { code, cause, message }
    }

    pub fn code(code: ErrorCode) -> Self {
        Self::new(code, None)
    }

    pub fn with_cause(code: ErrorCode, cause: impl fmt::Display) -> Self {
        Self::new(code, Some(cause.to_string()))
    }
}

/// Aggregated per-element digest failures: `NameSpace -> ElementIdentifier -> ErrorCode`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ErrorsError {
    pub message: String,
    pub errors: IndexMap<NameSpace, IndexMap<DataElementIdentifier, ErrorCode>>,
}

impl ErrorsError {
    pub fn new(errors: IndexMap<NameSpace, IndexMap<DataElementIdentifier, ErrorCode>>) -> Self {
        let count: usize = errors.values().map(|m| m.len()).sum();
        ErrorsError {
            message: format!("{count} data element(s) failed digest verification"),
            errors,
        }
    }
}

/// Crate-wide error type returned by the public verification API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Single(#[from] ErrorCodeError),
    #[error(transparent)]
    Aggregated(#[from] ErrorsError),
}

impl Error {
    pub fn code(code: ErrorCode) -> Self {
        ErrorCodeError::code(code).into()
    }

    pub fn with_cause(code: ErrorCode, cause: impl fmt::Display) -> Self {
        ErrorCodeError::with_cause(code, cause).into()
    }

    /// Converts a schema [`IssueList`] into a single [`Error`], joining the path-prefixed
    /// issue messages into one cause string.
    pub fn from_issues(code: ErrorCode, issues: IssueList) -> Self {
        let cause = issues
            .into_iter()
            .map(|issue| issue.render())
            .collect::<Vec<_>>()
            .join("; ");
        Self::with_cause(code, cause)
    }

    /// A single representative code for this error, for callers (e.g. batch verification)
    /// that need one code per failed document regardless of error shape.
    pub fn primary_code(&self) -> ErrorCode {
        match self {
            Error::Single(e) => e.code,
            Error::Aggregated(e) => e
                .errors
                .values()
                .flat_map(|m| m.values())
                .next()
                .copied()
                .unwrap_or(ErrorCode::MsoDigestMismatch),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
