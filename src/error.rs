//! Structured error types for the resolver stack.

use std::fmt;

/// Errors produced by the DNS wire codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// The packet ends before the structure being parsed does
    PacketTooShort,
    /// A label exceeds 63 octets (RFC 1035)
    LabelTooLong,
    /// A name exceeds 253 characters (RFC 1035)
    NameTooLong,
    /// A name contains an empty label or is otherwise malformed
    InvalidName,
    /// A compression pointer does not point backwards
    ForwardPointer,
    /// A label or text segment is not valid UTF-8
    InvalidText,
    /// RDATA length disagrees with the record contents
    RdataOverrun,
    /// RDATA does not fit in its 16-bit length field
    RdataTooLong,
    /// A TXT character-string exceeds 255 octets
    StringTooLong,
    /// The response code does not fit in the 4-bit header field
    InvalidRcode,
    /// A section holds more than 65535 entries
    TooManyRecords,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::PacketTooShort => write!(f, "packet too short"),
            WireError::LabelTooLong => write!(f, "label exceeds maximum length (63)"),
            WireError::NameTooLong => write!(f, "name exceeds maximum length (253)"),
            WireError::InvalidName => write!(f, "malformed domain name"),
            WireError::ForwardPointer => write!(f, "forward compression pointer"),
            WireError::InvalidText => write!(f, "invalid UTF-8 in text"),
            WireError::RdataOverrun => write!(f, "RDATA length mismatch"),
            WireError::RdataTooLong => write!(f, "RDATA exceeds 65535 bytes"),
            WireError::StringTooLong => write!(f, "character-string exceeds 255 bytes"),
            WireError::InvalidRcode => write!(f, "invalid DNS response code"),
            WireError::TooManyRecords => write!(f, "too many records in section"),
        }
    }
}

impl std::error::Error for WireError {}

/// Errors surfaced by the packet resolver and the server drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// The request packet could not be parsed
    ParsingFailed(WireError),
    /// The response message could not be packed
    PackingFailed(WireError),
    /// A received DNS packet is a response instead of a request
    ResponseTypeRequest,
    /// A received DNS packet does not contain any questions
    NoQuestions,
    /// The resolver did not return a response
    NoResponse,
    /// The response could not be reduced to fit the size constraints
    TruncatedResponseTooBig,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::ParsingFailed(e) => write!(f, "parsing DNS packet: {}", e),
            ResolveError::PackingFailed(e) => {
                write!(f, "packing DNS response packet: {}", e)
            }
            ResolveError::ResponseTypeRequest => {
                write!(f, "DNS request has type response")
            }
            ResolveError::NoQuestions => {
                write!(f, "DNS request does not contain questions")
            }
            ResolveError::NoResponse => {
                write!(f, "DNS resolver did not return a response")
            }
            ResolveError::TruncatedResponseTooBig => {
                write!(f, "packing DNS response packet: response too big")
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::ParsingFailed(e) | ResolveError::PackingFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// Error returned when a reordering mode is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidReorderingMode;

impl fmt::Display for InvalidReorderingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid reordering mode")
    }
}

impl std::error::Error for InvalidReorderingMode {}
