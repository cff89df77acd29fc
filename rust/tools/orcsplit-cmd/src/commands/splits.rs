//! Splits command implementation

use anyhow::{Context, Result};
use orcsplit_reader::{OrcFormatFile, ReaderOptions, SplitRange, split};
use serde::Serialize;

use crate::commands::open_format_file;

#[derive(Serialize)]
struct SplitPlan {
    file_size: u64,
    split_size: u64,
    total_rows: u64,
    splits: Vec<SplitInfo>,
}

#[derive(Serialize)]
struct SplitInfo {
    start: u64,
    length: u64,
    stripes: Vec<u64>,
    rows: u64,
}

pub fn run(file: String, split_size: u64, options: ReaderOptions) -> Result<()> {
    let format_file = open_format_file(&file, options)?;
    let plan = plan(&format_file, split_size)?;
    let json =
        serde_json::to_string_pretty(&plan).context("Failed to serialize split plan to JSON")?;
    println!("{json}");
    Ok(())
}

/// Selects the stripes of every split and checks that, together, the splits
/// read each stripe exactly once.
fn plan(format_file: &OrcFormatFile, split_size: u64) -> Result<SplitPlan> {
    let catalog = format_file.catalog()?;
    let file_size = catalog.file_size();
    let ranges = split::plan_splits(file_size, split_size)?;
    let issues = split::check_tiling(&ranges, file_size);
    if !issues.is_empty() {
        anyhow::bail!("Splits don't tile the file: {issues:?}");
    }

    let mut reads = vec![0usize; catalog.stripe_count()];
    let mut splits = Vec::with_capacity(ranges.len());
    for range in ranges {
        let selection = format_file.select_stripes(range)?;
        for index in selection.indices() {
            reads[index as usize] += 1;
        }
        log::debug!("split {range}: stripes {:?}", selection.indices());
        splits.push(split_info(range, selection.indices(), selection.row_count()));
    }

    if let Some(index) = reads.iter().position(|&count| count != 1) {
        anyhow::bail!(
            "Stripe {index} is selected by {} splits instead of one",
            reads[index]
        );
    }
    let total_rows = format_file.total_rows()?;
    let split_rows = splits.iter().map(|split| split.rows).sum::<u64>();
    if split_rows != total_rows {
        anyhow::bail!("Splits cover {split_rows} rows, the file has {total_rows}");
    }

    Ok(SplitPlan {
        file_size,
        split_size,
        total_rows,
        splits,
    })
}

fn split_info(range: SplitRange, stripes: Vec<u64>, rows: u64) -> SplitInfo {
    SplitInfo {
        start: range.start,
        length: range.length,
        stripes,
        rows,
    }
}
