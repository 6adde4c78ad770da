//! Stateful counter normalization.
//!
//! Two strategies turn raw kernel counters into reportable values:
//!
//! - [`normalize`] diffs cumulative counters against the last observation
//!   held in the [`SampleStore`], with explicit policy for first sample,
//!   structural reset, and counter wraparound.
//! - [`read_and_clear`] handles counters whose source supports reset via a
//!   write-back; no store entry is involved.
//!
//! Normalization and reporting are decoupled: the store is updated exactly
//! once per [`normalize`] call, before the caller ever talks to the sink,
//! so a failed report never causes an interval to be re-diffed.

use crate::source::RawSource;
use crate::store::{SampleKey, SampleStore};
use ks_common::Result;
use tracing::warn;

/// Sentinel reported in place of a negative delta on a counter that is
/// declared monotonically non-decreasing (wraparound or unexpected reset).
pub const INVALID_DELTA: i64 = -1;

/// Whether a counter's source guarantees non-decreasing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monotonic {
    Yes,
    No,
}

/// Outcome of one normalization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// First observation for this key; nothing to report this interval.
    Elided,
    /// Structural reset: shape changed, so the current raw values are the
    /// report (no meaningful prior baseline exists).
    Raw(Vec<i64>),
    /// Element-wise delta against the prior observation.
    Delta(Vec<i64>),
}

impl Normalized {
    /// Values to report, if any.
    pub fn values(&self) -> Option<&[i64]> {
        match self {
            Normalized::Elided => None,
            Normalized::Raw(v) | Normalized::Delta(v) => Some(v),
        }
    }
}

/// Normalize one raw sample against the stored record for `key`.
///
/// Scalars are one-element slices; bucketed counters pass their ordered
/// bucket values. The shape fingerprint is the element count.
pub fn normalize(
    store: &mut SampleStore,
    key: &SampleKey,
    raw: &[i64],
    monotonic: Monotonic,
) -> Normalized {
    let prior = match store.get(key) {
        None => {
            // Cold start: remember the baseline, report nothing. Reporting
            // the absolute cumulative value here would masquerade as an
            // interval delta.
            store.put(key.clone(), raw.to_vec());
            return Normalized::Elided;
        }
        Some(record) => {
            if record.fingerprint != raw.len() {
                warn!(
                    target: "ks_core::normalize",
                    key = %key,
                    prior_shape = record.fingerprint,
                    current_shape = raw.len(),
                    "shape fingerprint changed; treating as structural reset"
                );
                store.remove(key);
                store.put(key.clone(), raw.to_vec());
                return Normalized::Raw(raw.to_vec());
            }
            record.values.clone()
        }
    };

    let mut delta = Vec::with_capacity(raw.len());
    for (index, (&current, &previous)) in raw.iter().zip(prior.iter()).enumerate() {
        let diff = current.wrapping_sub(previous);
        if diff < 0 && monotonic == Monotonic::Yes {
            warn!(
                target: "ks_core::normalize",
                key = %key,
                index,
                current,
                previous,
                "monotonic counter regressed; reporting invalid sentinel"
            );
            delta.push(INVALID_DELTA);
        } else {
            delta.push(diff);
        }
    }

    store.put(key.clone(), raw.to_vec());
    Normalized::Delta(delta)
}

/// Clear-on-read collection.
///
/// Reads the counter at `path`, returns `Some(value)` when positive, and
/// writes `reset_token` back regardless (`"0"` for plain counters, a
/// mode-select token for multi-mode counters). A failed reset write is
/// logged and non-fatal: the counter simply keeps accumulating until the
/// next successful clear.
pub fn read_and_clear(
    source: &dyn RawSource,
    path: &str,
    reset_token: &str,
) -> Result<Option<i64>> {
    let value = crate::source::read_int(source, path)?;

    if let Err(e) = source.write_text(path, reset_token) {
        warn!(
            target: "ks_core::normalize",
            path,
            error = %e,
            "failed to clear counter after read"
        );
    }

    Ok(if value > 0 { Some(value) } else { None })
}
