//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test
//! file compiles as a separate crate and may only use a subset of these
//! helpers.

#![allow(dead_code)]

use zapk::{ArchiveTotals, Result, SigningBlock, StoredTransform, Writer};

/// Builds an in-memory archive of stored entries.
pub fn stored_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    stored_archive_with_result(entries, None)
        .expect("archive build failed")
        .0
}

/// Builds an in-memory archive, optionally signed, returning the totals too.
pub fn stored_archive_with_result(
    entries: &[(&str, &[u8])],
    signing_block: Option<SigningBlock>,
) -> Result<(Vec<u8>, ArchiveTotals)> {
    let mut writer = Writer::new(Vec::new());
    for (name, data) in entries {
        writer.add_bytes(*name, data, &StoredTransform)?;
    }
    if let Some(block) = signing_block {
        writer.set_signing_block(block);
    }
    writer.finish()
}
