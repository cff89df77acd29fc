//! Inspect command implementation

use anyhow::{Context, Result};
use orcsplit_format::{FileColumn, StripeCatalog, StripeInformation};
use orcsplit_reader::ReaderOptions;
use serde::Serialize;

use crate::{commands::open_format_file, utils::format_size};

#[derive(Serialize)]
struct InspectSummary {
    file: FileInfo,
    schema: Vec<ColumnInfo>,
    stripes: Vec<StripeInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    user_metadata: Vec<MetadataInfo>,
}

#[derive(Serialize)]
struct FileInfo {
    size: u64,
    size_display: String,
    format_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    writer_version: Option<u32>,
    compression: &'static str,
    compression_block_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    row_index_stride: Option<u32>,
    total_rows: u64,
    stripe_count: usize,
    footer_at: u64,
    footer_size: u64,
}

#[derive(Serialize)]
struct ColumnInfo {
    name: String,
    index: usize,
    #[serde(rename = "type")]
    orc_type: &'static str,
    /// `None` for types the reader can't produce.
    arrow_type: Option<String>,
}

#[derive(Serialize)]
struct StripeInfo {
    index: u64,
    offset: u64,
    length: u64,
    num_rows: u64,
    start_row: u64,
}

#[derive(Serialize)]
struct MetadataInfo {
    key: String,
    size: usize,
}

pub fn run(file: String, options: ReaderOptions) -> Result<()> {
    let format_file = open_format_file(&file, options)?;
    let catalog = format_file
        .catalog()
        .with_context(|| format!("Failed to read the tail of {file}"))?;
    let summary = summarize(&catalog);
    let json = serde_json::to_string_pretty(&summary)
        .context("Failed to serialize inspection summary to JSON")?;
    println!("{json}");
    Ok(())
}

fn summarize(catalog: &StripeCatalog) -> InspectSummary {
    let footer = catalog.footer_range();
    let file = FileInfo {
        size: catalog.file_size(),
        size_display: format_size(catalog.file_size()),
        format_version: catalog
            .format_version()
            .iter()
            .map(|part| part.to_string())
            .collect::<Vec<_>>()
            .join("."),
        writer_version: catalog.writer_version(),
        compression: catalog.compression().kind().name(),
        compression_block_size: catalog.compression().block_size(),
        row_index_stride: catalog.row_index_stride(),
        total_rows: catalog.total_rows(),
        stripe_count: catalog.stripe_count(),
        footer_at: footer.start,
        footer_size: footer.end - footer.start,
    };
    InspectSummary {
        file,
        schema: catalog.schema().columns().iter().map(column_info).collect(),
        stripes: catalog.stripes().iter().map(stripe_info).collect(),
        user_metadata: catalog
            .user_metadata()
            .iter()
            .map(|(key, value)| MetadataInfo {
                key: key.clone(),
                size: value.len(),
            })
            .collect(),
    }
}

fn column_info(column: &FileColumn) -> ColumnInfo {
    ColumnInfo {
        name: column.name().to_string(),
        index: column.index(),
        orc_type: column.kind().name(),
        arrow_type: column.data_type().map(|data_type| data_type.to_string()),
    }
}

fn stripe_info(stripe: &StripeInformation) -> StripeInfo {
    StripeInfo {
        index: stripe.index,
        offset: stripe.offset,
        length: stripe.length,
        num_rows: stripe.num_rows,
        start_row: stripe.start_row,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use orcsplit_format::{StripeCatalog, proto::TypeKind};
    use orcsplit_io::ReadAt;
    use orcsplit_testkit::orc_file::{OrcFileBuilder, RawStripe};

    use super::summarize;
    use crate::commands::write_test_file;

    #[test]
    fn test_summarize() {
        let mut builder = OrcFileBuilder::new()
            .column("id", TypeKind::Long)
            .column("choice", TypeKind::Union)
            .user_metadata("origin", b"unit-test");
        builder.add_raw_stripe(RawStripe::padded(10, 100));
        builder.add_raw_stripe(RawStripe::padded(5, 40));
        let reader: Arc<dyn ReadAt> = Arc::new(builder.finish());
        let catalog = StripeCatalog::parse(&reader).unwrap();

        let json = serde_json::to_value(summarize(&catalog)).unwrap();
        assert_eq!(json["file"]["total_rows"], 15);
        assert_eq!(json["file"]["stripe_count"], 2);
        assert_eq!(json["file"]["compression"], "NONE");
        assert_eq!(json["file"]["format_version"], "0.12");
        assert_eq!(json["schema"][0]["name"], "id");
        assert_eq!(json["schema"][0]["type"], "bigint");
        assert_eq!(json["schema"][0]["arrow_type"], "Int64");
        assert!(json["schema"][1]["arrow_type"].is_null());
        assert_eq!(json["stripes"][1]["offset"], 103);
        assert_eq!(json["stripes"][1]["start_row"], 10);
        assert_eq!(json["user_metadata"][0]["key"], "origin");
        assert_eq!(json["user_metadata"][0]["size"], 9);
    }

    #[test]
    fn test_run() {
        let file = write_test_file(&[2, 3]);
        super::run(
            file.path().to_str().unwrap().to_string(),
            Default::default(),
        )
        .unwrap();
    }
}
