//! Greedy merge of adjacent bins.

use tracing::debug;

use super::range::ConsolidatedBin;

/// Merge contiguous neighbours while the combined count stays within
/// `max_records_per_bin`.
///
/// Input order is kept; non-contiguous bins are never merged. Running the
/// result through again changes nothing.
pub fn consolidate<I, B>(bins: I, max_records_per_bin: u64) -> Vec<ConsolidatedBin>
where
    I: IntoIterator<Item = B>,
    B: Into<ConsolidatedBin>,
{
    let mut out: Vec<ConsolidatedBin> = Vec::new();
    let mut running: Option<ConsolidatedBin> = None;
    let mut seen = 0usize;

    for bin in bins {
        let bin: ConsolidatedBin = bin.into();
        seen += 1;

        running = match running {
            Some(current) => match absorb(&current, &bin, max_records_per_bin) {
                Some(merged) => Some(merged),
                None => {
                    out.push(current);
                    Some(bin)
                }
            },
            None => Some(bin),
        };
    }

    if let Some(current) = running {
        out.push(current);
    }

    debug!("Consolidated {} bins into {}", seen, out.len());
    out
}

fn absorb(
    current: &ConsolidatedBin,
    next: &ConsolidatedBin,
    max_records_per_bin: u64,
) -> Option<ConsolidatedBin> {
    let count = current
        .count
        .checked_add(next.count)
        .filter(|total| *total <= max_records_per_bin)?;
    let range = current.range.join(&next.range)?;
    Some(ConsolidatedBin { range, count })
}
