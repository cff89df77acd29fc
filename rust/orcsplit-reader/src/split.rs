//! Assignment of stripes to byte-range splits.
//!
//! A stripe belongs to the split that contains its starting offset. When the
//! splits of a file tile `[0, file_size)` exactly, every stripe is therefore read
//! by exactly one split, whatever the split boundaries are. The selector doesn't
//! compensate for gapped or overlapping splits: stripes starting in a gap are
//! dropped and stripes starting in an overlap are read twice. Callers that
//! build their own splits can check them with [`check_tiling`].

use std::{fmt, ops::Range};

use orcsplit_common::{Result, verify_arg};
use orcsplit_format::StripeInformation;
use serde::{Deserialize, Serialize};

/// Half-open byte interval `[start, start + length)` of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SplitRange {
    pub start: u64,
    pub length: u64,
}

impl SplitRange {
    pub fn new(start: u64, length: u64) -> SplitRange {
        SplitRange { start, length }
    }

    /// Split covering the whole file.
    pub fn whole_file(file_size: u64) -> SplitRange {
        SplitRange::new(0, file_size)
    }

    /// Exclusive end offset, saturating at `u64::MAX`.
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.length)
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.end()
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end()
    }
}

impl fmt::Display for SplitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

/// Stripes of one split, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeSelection {
    pub stripes: Vec<StripeInformation>,
    /// Stripe count of the whole file, regardless of the selection.
    pub total_stripes: usize,
}

impl StripeSelection {
    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }

    /// Sum of the declared row counts of the selected stripes.
    pub fn row_count(&self) -> u64 {
        self.stripes.iter().map(|stripe| stripe.num_rows).sum()
    }

    /// File-wide ordinals of the selected stripes.
    pub fn indices(&self) -> Vec<u64> {
        self.stripes.iter().map(|stripe| stripe.index).collect()
    }
}

/// Selects the stripes whose offset lies within `split`.
///
/// An empty split, or one that contains no stripe offset, yields an empty
/// selection.
pub fn select_stripes(stripes: &[StripeInformation], split: SplitRange) -> StripeSelection {
    let selected = if split.is_empty() {
        Vec::new()
    } else {
        stripes
            .iter()
            .filter(|stripe| split.contains(stripe.offset))
            .copied()
            .collect()
    };
    StripeSelection {
        stripes: selected,
        total_stripes: stripes.len(),
    }
}

/// Divides `[0, file_size)` into consecutive splits of `split_size` bytes, the
/// last one possibly shorter. An empty file yields no splits.
pub fn plan_splits(file_size: u64, split_size: u64) -> Result<Vec<SplitRange>> {
    verify_arg!(split_size, split_size > 0);
    let mut splits = Vec::new();
    let mut start = 0u64;
    while start < file_size {
        let length = split_size.min(file_size - start);
        splits.push(SplitRange::new(start, length));
        start += length;
    }
    Ok(splits)
}

/// Deviation of a split set from an exact tiling of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilingIssue {
    /// Bytes covered by no split.
    Gap { start: u64, end: u64 },
    /// Bytes covered by more than one split.
    Overlap { start: u64, end: u64 },
    /// Split extending past the end of the file.
    OutOfBounds { split: SplitRange },
}

impl fmt::Display for TilingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TilingIssue::Gap { start, end } => write!(f, "gap [{start}, {end})"),
            TilingIssue::Overlap { start, end } => write!(f, "overlap [{start}, {end})"),
            TilingIssue::OutOfBounds { split } => write!(f, "split {split} past end of file"),
        }
    }
}

/// Reports where `splits` fail to tile `[0, file_size)` exactly. An empty result
/// means every stripe of the file is selected by exactly one split.
pub fn check_tiling(splits: &[SplitRange], file_size: u64) -> Vec<TilingIssue> {
    let mut sorted = splits
        .iter()
        .copied()
        .filter(|split| !split.is_empty())
        .collect::<Vec<_>>();
    sorted.sort_by_key(|split| (split.start, split.end()));

    let mut issues = Vec::new();
    let mut covered = 0u64;
    for split in sorted {
        if split.end() > file_size {
            issues.push(TilingIssue::OutOfBounds { split });
        }
        if split.start > covered {
            issues.push(TilingIssue::Gap {
                start: covered,
                end: split.start.min(file_size),
            });
        } else if split.start < covered {
            issues.push(TilingIssue::Overlap {
                start: split.start,
                end: covered.min(split.end()),
            });
        }
        covered = covered.max(split.end());
    }
    if covered < file_size {
        issues.push(TilingIssue::Gap {
            start: covered,
            end: file_size,
        });
    }
    issues.retain(|issue| !matches!(issue, TilingIssue::Gap { start, end } if start >= end));
    issues
}

#[cfg(test)]
mod tests {
    use orcsplit_format::StripeInformation;

    use super::{SplitRange, TilingIssue, check_tiling, plan_splits, select_stripes};

    fn stripes(layout: &[(u64, u64, u64)]) -> Vec<StripeInformation> {
        let mut start_row = 0;
        layout
            .iter()
            .enumerate()
            .map(|(index, &(offset, length, num_rows))| {
                let stripe = StripeInformation {
                    index: index as u64,
                    offset,
                    length,
                    num_rows,
                    start_row,
                };
                start_row += num_rows;
                stripe
            })
            .collect()
    }

    #[test]
    fn test_offset_containment() {
        let all = stripes(&[(0, 100, 10), (100, 150, 20), (250, 80, 15)]);

        let first = select_stripes(&all, SplitRange::new(0, 250));
        assert_eq!(first.indices(), vec![0, 1]);
        assert_eq!(first.row_count(), 30);
        assert_eq!(first.total_stripes, 3);

        let second = select_stripes(&all, SplitRange::new(250, 80));
        assert_eq!(second.indices(), vec![2]);
        assert_eq!(second.row_count(), 15);
        assert_eq!(second.stripes[0].start_row, 30);

        // Stripe 1 spans [100, 250) but starts before the split.
        let middle = select_stripes(&all, SplitRange::new(120, 100));
        assert!(middle.is_empty());
        assert_eq!(middle.total_stripes, 3);
    }

    #[test]
    fn test_empty_and_out_of_range_splits() {
        let all = stripes(&[(3, 100, 10), (103, 50, 5)]);
        assert!(select_stripes(&all, SplitRange::new(3, 0)).is_empty());
        assert!(select_stripes(&all, SplitRange::new(0, 3)).is_empty());
        assert!(select_stripes(&all, SplitRange::new(153, 1000)).is_empty());
        assert!(select_stripes(&all, SplitRange::new(u64::MAX - 1, u64::MAX)).is_empty());
        assert!(select_stripes(&[], SplitRange::new(0, 100)).is_empty());
    }

    #[test]
    fn test_any_tiling_partitions_stripes() {
        let all = stripes(&[
            (3, 40, 4),
            (43, 17, 1),
            (60, 100, 12),
            (160, 1, 1),
            (161, 39, 7),
        ]);
        let file_size = 230;
        let total_rows: u64 = all.iter().map(|s| s.num_rows).sum();
        for split_size in 1..=file_size {
            let splits = plan_splits(file_size, split_size).unwrap();
            assert!(check_tiling(&splits, file_size).is_empty());
            let mut seen = Vec::new();
            let mut rows = 0;
            for split in splits {
                let selection = select_stripes(&all, split);
                rows += selection.row_count();
                seen.extend(selection.indices());
            }
            assert_eq!(seen, vec![0, 1, 2, 3, 4], "split size {split_size}");
            assert_eq!(rows, total_rows);
        }
    }

    #[test]
    fn test_plan_splits() {
        let splits = plan_splits(10, 4).unwrap();
        assert_eq!(
            splits,
            vec![
                SplitRange::new(0, 4),
                SplitRange::new(4, 4),
                SplitRange::new(8, 2)
            ]
        );
        assert!(plan_splits(0, 4).unwrap().is_empty());
        assert!(plan_splits(10, 0).is_err());

        let huge = plan_splits(u64::MAX, 1 << 62).unwrap();
        assert_eq!(huge.len(), 4);
        assert_eq!(huge[3], SplitRange::new(3 << 62, (1 << 62) - 1));
        assert!(check_tiling(&huge, u64::MAX).is_empty());
    }

    #[test]
    fn test_check_tiling_reports_gaps_and_overlaps() {
        let splits = [
            SplitRange::new(0, 100),
            SplitRange::new(150, 100),
            SplitRange::new(200, 150),
        ];
        let issues = check_tiling(&splits, 300);
        assert_eq!(
            issues,
            vec![
                TilingIssue::Gap {
                    start: 100,
                    end: 150
                },
                TilingIssue::OutOfBounds {
                    split: SplitRange::new(200, 150)
                },
                TilingIssue::Overlap {
                    start: 200,
                    end: 250
                },
            ]
        );

        let issues = check_tiling(&[SplitRange::new(0, 100)], 120);
        assert_eq!(
            issues,
            vec![TilingIssue::Gap {
                start: 100,
                end: 120
            }]
        );
        assert!(check_tiling(&[], 0).is_empty());
    }
}
