//! Cache sweeps: expiry, size-based eviction, expiration statistics.
//!
//! Sweeps are best effort. A key that cannot be read or parsed is logged and
//! recorded in the report, and the sweep moves on.

use crate::storage::adapter::{byte_len, StorageAdapter};
use crate::storage::envelope::EntryMeta;
use crate::storage::error::StorageResult;
use crate::storage::types::{Operation, SweepReport};

struct Candidate {
    key: String,
    timestamp: u64,
    bytes: u64,
}

/// Reads and parses the envelope header under `key`, with its stored size.
fn read_meta(
    adapter: &StorageAdapter,
    operation: Operation,
    key: &str,
) -> StorageResult<Option<(EntryMeta, u64)>> {
    let Some(raw) = adapter.read_raw(operation, key)? else {
        return Ok(None);
    };
    let meta: EntryMeta = adapter.parse(operation, key, &raw)?;
    Ok(Some((meta, byte_len(&raw))))
}

pub(super) fn clear_expired(adapter: &StorageAdapter, now: u64) -> StorageResult<SweepReport> {
    let operation = Operation::ClearExpired;
    let keys = adapter.keys_as(operation)?;
    let report = keys
        .into_iter()
        .fold(SweepReport::default(), |mut report, key| {
            match read_meta(adapter, operation, &key) {
                Ok(Some((meta, bytes))) if meta.is_expired(now) => {
                    match adapter.delete_as(operation, &key) {
                        Ok(()) => report.record_removal(key, bytes),
                        Err(err) => report.record_failure(key, err),
                    }
                }
                Ok(_) => {}
                Err(err) => report.record_failure(key, err),
            }
            report
        });
    log::debug!(
        "cache sweep removed {} expired entries ({} bytes), {} failures",
        report.removed_count(),
        report.freed_bytes,
        report.failures.len()
    );
    Ok(report)
}

pub(super) fn evict_oldest(adapter: &StorageAdapter, max_bytes: u64) -> StorageResult<SweepReport> {
    let operation = Operation::EvictOldest;
    let mut report = SweepReport::default();
    let current = adapter.size_as(operation)?;
    if current <= max_bytes {
        return Ok(report);
    }

    let mut candidates = Vec::new();
    for key in adapter.keys_as(operation)? {
        match read_meta(adapter, operation, &key) {
            Ok(Some((meta, bytes))) => candidates.push(Candidate {
                key,
                timestamp: meta.timestamp,
                bytes,
            }),
            Ok(None) => {}
            Err(err) => report.record_failure(key, err),
        }
    }
    candidates.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key)));

    let mut projected = current;
    for candidate in candidates {
        if projected <= max_bytes {
            break;
        }
        match adapter.delete_as(operation, &candidate.key) {
            Ok(()) => {
                projected = projected.saturating_sub(candidate.bytes);
                report.record_removal(candidate.key, candidate.bytes);
            }
            Err(err) => report.record_failure(candidate.key, err),
        }
    }
    log::debug!(
        "cache eviction freed {} bytes from {} entries, size now {projected} (cap {max_bytes})",
        report.freed_bytes,
        report.removed_count()
    );
    Ok(report)
}

pub(super) fn earliest_expiration(adapter: &StorageAdapter) -> StorageResult<Option<u64>> {
    let operation = Operation::GetExpiration;
    let mut earliest: Option<u64> = None;
    for key in adapter.keys_as(operation)? {
        match read_meta(adapter, operation, &key) {
            Ok(Some((meta, _))) => {
                if let Some(expires_at) = meta.expires_at() {
                    earliest = Some(earliest.map_or(expires_at, |current| current.min(expires_at)));
                }
            }
            Ok(None) => {}
            Err(err) => log::warn!("skipping entry {key} while scanning expirations: {err}"),
        }
    }
    Ok(earliest)
}
