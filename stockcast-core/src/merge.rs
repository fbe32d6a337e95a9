//! Series merger: folds freshly fetched bars into a stored series.
//!
//! The merge is idempotent per `as_of` date: once a record has been merged for a
//! day, merging again for that day never touches it. All incoming bars are
//! validated before the record is mutated, so a rejected merge leaves the
//! record exactly as it was.

use crate::domain::{Bar, BarError, SymbolRecord};
use chrono::NaiveDate;
use thiserror::Error;

/// What a merge did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// `last_data_update_date` already equals `as_of`; nothing touched.
    AlreadyCurrent,
    /// No bars newer than the stored series; `last_data_update_date` unchanged.
    NoNewData,
    /// `appended` bars were added and `last_data_update_date` set to `as_of`.
    Appended { appended: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error(transparent)]
    MalformedBar(#[from] BarError),

    #[error("incoming bars are not strictly increasing at {date}")]
    NotIncreasing { date: NaiveDate },

    #[error("bar dated {date} is after the merge date {as_of}")]
    FutureBar { date: NaiveDate, as_of: NaiveDate },
}

/// Merge `new_bars` into `record` as of `as_of`.
///
/// Bars dated on or before the last stored bar are overlap from the provider
/// and are dropped; the remainder must be strictly increasing and not later
/// than `as_of`.
pub fn merge(
    record: &mut SymbolRecord,
    new_bars: &[Bar],
    as_of: NaiveDate,
) -> Result<MergeOutcome, MergeError> {
    if record.last_data_update_date == Some(as_of) {
        return Ok(MergeOutcome::AlreadyCurrent);
    }

    let fresh = validate_new_bars(record, new_bars, as_of)?;
    if fresh.is_empty() {
        return Ok(MergeOutcome::NoNewData);
    }

    let appended = fresh.len();
    record.series.extend(fresh.iter().cloned());
    record.last_data_update_date = Some(as_of);
    Ok(MergeOutcome::Appended { appended })
}

fn validate_new_bars<'a>(
    record: &SymbolRecord,
    new_bars: &'a [Bar],
    as_of: NaiveDate,
) -> Result<&'a [Bar], MergeError> {
    let last_stored = record.last_bar().map(|b| b.date);
    let skip = match last_stored {
        Some(last) => new_bars.iter().take_while(|b| b.date <= last).count(),
        None => 0,
    };
    let fresh = &new_bars[skip..];

    let mut prev: Option<NaiveDate> = None;
    for bar in fresh {
        bar.validate()?;
        if prev.is_some_and(|p| bar.date <= p) {
            return Err(MergeError::NotIncreasing { date: bar.date });
        }
        if bar.date > as_of {
            return Err(MergeError::FutureBar {
                date: bar.date,
                as_of,
            });
        }
        prev = Some(bar.date);
    }
    Ok(fresh)
}
