//! Signature scheme identifiers and per-scheme payload handling.
//!
//! Every signing-block entry starts with a 4-byte scheme id. The id decides
//! two things: the fixed position the entry sorts to when the block is
//! rebuilt, and which payload walker (if any) can pull certificate blobs out
//! of it. Both are driven by one dispatch table, so supporting a new scheme
//! is one more table row.

use crate::error::Result;

/// APK Signature Scheme v2 block id.
pub const V2_ID: u32 = 0x7109871a;
/// APK Signature Scheme v3 block id.
pub const V3_ID: u32 = 0xf05368c0;
/// APK Signature Scheme v3.1 block id.
pub const V31_ID: u32 = 0x1b93ad61;
/// Source stamp (v1) block id.
pub const STAMP_V1_ID: u32 = 0x2b09189e;
/// Source stamp (v2) block id.
pub const STAMP_V2_ID: u32 = 0x6dff800d;
/// Padding block id (`werB`).
pub const PADDING_ID: u32 = 0x42726577;

/// A signature scheme identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureId {
    /// APK Signature Scheme v2.
    V2,
    /// APK Signature Scheme v3.
    V3,
    /// APK Signature Scheme v3.1.
    V31,
    /// Source stamp, original layout.
    SourceStampV1,
    /// Source stamp, verity layout.
    SourceStampV2,
    /// Alignment padding, content ignored.
    Padding,
    /// Any id this crate does not name.
    Unknown(u32),
}

type CertificateWalker = fn(&[u8]) -> Vec<Vec<u8>>;

/// One dispatch row: raw id, sort position, certificate walker.
struct SchemeRow {
    raw: u32,
    id: SignatureId,
    order: u8,
    certificates: Option<CertificateWalker>,
}

const SCHEME_TABLE: &[SchemeRow] = &[
    SchemeRow {
        raw: V2_ID,
        id: SignatureId::V2,
        order: 0,
        certificates: Some(signer_certificates),
    },
    SchemeRow {
        raw: V3_ID,
        id: SignatureId::V3,
        order: 1,
        certificates: Some(signer_certificates),
    },
    SchemeRow {
        raw: V31_ID,
        id: SignatureId::V31,
        order: 2,
        certificates: Some(signer_certificates),
    },
    SchemeRow {
        raw: STAMP_V1_ID,
        id: SignatureId::SourceStampV1,
        order: 3,
        certificates: Some(stamp_certificates),
    },
    SchemeRow {
        raw: STAMP_V2_ID,
        id: SignatureId::SourceStampV2,
        order: 4,
        certificates: Some(stamp_certificates),
    },
    SchemeRow {
        raw: PADDING_ID,
        id: SignatureId::Padding,
        order: 5,
        certificates: None,
    },
];

impl SignatureId {
    /// Decodes a raw 4-byte scheme id.
    pub fn from_raw(raw: u32) -> Self {
        SCHEME_TABLE
            .iter()
            .find(|row| row.raw == raw)
            .map(|row| row.id)
            .unwrap_or(SignatureId::Unknown(raw))
    }

    /// The raw 4-byte id as stored on disk.
    pub fn raw(self) -> u32 {
        match self {
            SignatureId::Unknown(raw) => raw,
            known => SCHEME_TABLE
                .iter()
                .find(|row| row.id == known)
                .map(|row| row.raw)
                .unwrap_or(0),
        }
    }

    fn row(self) -> Option<&'static SchemeRow> {
        SCHEME_TABLE.iter().find(|row| row.id == self)
    }

    /// Position in the fixed rebuild ordering. Unknown schemes sort last,
    /// by raw id among themselves, so rebuilds stay deterministic.
    pub fn order_key(self) -> (u8, u32) {
        match self.row() {
            Some(row) => (row.order, 0),
            None => (u8::MAX, self.raw()),
        }
    }

    /// Best-effort extraction of raw DER certificate blobs from a payload
    /// carrying this scheme.
    ///
    /// Schemes without a known certificate layout, and payloads that do not
    /// parse, yield an empty vector; this never fails.
    pub fn certificates(self, payload: &[u8]) -> Vec<Vec<u8>> {
        match self.row().and_then(|row| row.certificates) {
            Some(walk) => walk(payload),
            None => Vec::new(),
        }
    }
}

impl std::fmt::Display for SignatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureId::V2 => write!(f, "v2"),
            SignatureId::V3 => write!(f, "v3"),
            SignatureId::V31 => write!(f, "v3.1"),
            SignatureId::SourceStampV1 => write!(f, "stamp v1"),
            SignatureId::SourceStampV2 => write!(f, "stamp v2"),
            SignatureId::Padding => write!(f, "padding"),
            SignatureId::Unknown(raw) => write!(f, "unknown ({raw:#010x})"),
        }
    }
}

/// Splits off the next u32-length-prefixed slice.
fn prefixed<'a>(data: &mut &'a [u8]) -> Option<&'a [u8]> {
    if data.len() < 4 {
        return None;
    }
    let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let rest = &data[4..];
    if rest.len() < len {
        return None;
    }
    *data = &rest[len..];
    Some(&rest[..len])
}

/// Walks the v2/v3 layout: a signers sequence, each signer holding signed
/// data whose second field is the certificate sequence.
fn signer_certificates(payload: &[u8]) -> Vec<Vec<u8>> {
    let mut certificates = Vec::new();
    let mut cursor = payload;
    let Some(mut signers) = prefixed(&mut cursor) else {
        return certificates;
    };
    while let Some(mut signer) = prefixed(&mut signers) {
        let Some(mut signed_data) = prefixed(&mut signer) else {
            continue;
        };
        // Signed data: digests, certificates, then scheme-specific fields.
        if prefixed(&mut signed_data).is_none() {
            continue;
        }
        let Some(mut certs) = prefixed(&mut signed_data) else {
            continue;
        };
        while let Some(der) = prefixed(&mut certs) {
            certificates.push(der.to_vec());
        }
    }
    certificates
}

/// Walks the stamp layout: one signer whose first field is the certificate.
fn stamp_certificates(payload: &[u8]) -> Vec<Vec<u8>> {
    let mut cursor = payload;
    let Some(mut signer) = prefixed(&mut cursor) else {
        return Vec::new();
    };
    match prefixed(&mut signer) {
        Some(der) if !der.is_empty() => vec![der.to_vec()],
        _ => Vec::new(),
    }
}

/// External collaborator that turns raw DER blobs into structured
/// certificates.
///
/// This crate only carries the bytes; a consumer plugs in its own parser.
pub trait CertificateDecoder {
    /// The decoded certificate representation.
    type Certificate;

    /// Decodes one DER blob.
    fn decode(&self, der: &[u8]) -> Result<Self::Certificate>;
}
