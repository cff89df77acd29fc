//! Reconciliation of the requested schema with the file schema.

use std::{collections::HashMap, sync::Arc};

use arrow_cast::can_cast_types;
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use orcsplit_common::{Result, error::Error};
use orcsplit_format::{FileColumn, FileSchema};

use crate::options::ReaderOptions;

/// Where a requested output column comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// Position of the column within the decoded batch, i.e. an index into
    /// [`ColumnPlan::indices_to_decode`].
    Decoded(usize),
    /// Absent from the file, synthesized as nulls.
    Missing,
}

/// Per-session column mapping between the file and the requested schema.
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    /// File-local indices to decode, in file order.
    pub indices_to_decode: Vec<usize>,
    /// File column names matching `indices_to_decode`.
    pub names_to_decode: Vec<String>,
    /// Positions in the requested schema with no matching file column.
    pub missing_positions: Vec<usize>,
    /// Source of each requested column.
    pub sources: Vec<ColumnSource>,
    /// Schema of the batches handed out by the decoder: file column names with
    /// the file column types.
    pub decoded_schema: SchemaRef,
    /// Requested schema, with missing columns made nullable.
    pub output_schema: SchemaRef,
}

impl ColumnPlan {
    /// `true` when no file column needs decoding, so batches only carry a row count
    /// (and null-filled missing columns, if any).
    pub fn is_count_only(&self) -> bool {
        self.indices_to_decode.is_empty()
    }

    pub fn missing_names(&self) -> Vec<&str> {
        self.missing_positions
            .iter()
            .map(|&pos| self.output_schema.field(pos).name().as_str())
            .collect()
    }
}

/// Computes the column plan for reading `requested` from a file with `file_schema`.
///
/// # Errors
///
/// Fails with a schema error when a requested column matches a file column of
/// an incompatible type or of a type with no Arrow equivalent, when a
/// case-insensitive match is ambiguous, or when a column is missing and
/// `allow_missing_columns` is off. Nothing is read from the file.
pub fn project(
    file_schema: &FileSchema,
    requested: &Schema,
    options: &ReaderOptions,
) -> Result<ColumnPlan> {
    let lookup = ColumnLookup::new(file_schema, options.case_insensitive_column_matching);

    let mut matches = Vec::<Option<&FileColumn>>::with_capacity(requested.fields().len());
    for field in requested.fields() {
        let column = lookup.find(field.name())?;
        match column {
            Some(column) => check_compatible(column, field, options.strict_types)?,
            None if !options.allow_missing_columns => {
                return Err(Error::schema(
                    field.name().clone(),
                    "column is not present in the file",
                ));
            }
            None => (),
        }
        matches.push(column);
    }

    let mut indices_to_decode = matches
        .iter()
        .flatten()
        .map(|column| column.index())
        .collect::<Vec<_>>();
    indices_to_decode.sort_unstable();
    indices_to_decode.dedup();

    let mut decoded_fields = Vec::with_capacity(indices_to_decode.len());
    let mut names_to_decode = Vec::with_capacity(indices_to_decode.len());
    for &index in &indices_to_decode {
        let column = file_schema
            .column(index)
            .ok_or_else(|| Error::invalid_operation(format!("file column {index}")))?;
        let data_type = column
            .data_type()
            .cloned()
            .ok_or_else(|| Error::invalid_operation(format!("type of {}", column.name())))?;
        names_to_decode.push(column.name().to_string());
        decoded_fields.push(Field::new(column.name(), data_type, true));
    }

    let mut sources = Vec::with_capacity(matches.len());
    let mut missing_positions = Vec::new();
    let mut output_fields = Vec::with_capacity(matches.len());
    for (pos, (column, field)) in matches.iter().zip(requested.fields()).enumerate() {
        match column {
            Some(column) => {
                let decoded_pos = indices_to_decode
                    .binary_search(&column.index())
                    .map_err(|_| Error::invalid_operation("decoded column lookup"))?;
                sources.push(ColumnSource::Decoded(decoded_pos));
                output_fields.push(field.as_ref().clone());
            }
            None => {
                sources.push(ColumnSource::Missing);
                missing_positions.push(pos);
                output_fields.push(field.as_ref().clone().with_nullable(true));
            }
        }
    }

    Ok(ColumnPlan {
        indices_to_decode,
        names_to_decode,
        missing_positions,
        sources,
        decoded_schema: Arc::new(Schema::new(decoded_fields)),
        output_schema: Arc::new(Schema::new_with_metadata(
            output_fields,
            requested.metadata().clone(),
        )),
    })
}

struct ColumnLookup<'a> {
    exact: HashMap<&'a str, &'a FileColumn>,
    folded: Option<HashMap<String, Vec<&'a FileColumn>>>,
}

impl<'a> ColumnLookup<'a> {
    fn new(file_schema: &'a FileSchema, case_insensitive: bool) -> ColumnLookup<'a> {
        let mut exact = HashMap::with_capacity(file_schema.len());
        for column in file_schema.columns() {
            // First occurrence wins for duplicated names.
            exact.entry(column.name()).or_insert(column);
        }
        let folded = case_insensitive.then(|| {
            let mut folded = HashMap::<String, Vec<&FileColumn>>::new();
            for column in file_schema.columns() {
                folded
                    .entry(column.name().to_ascii_lowercase())
                    .or_default()
                    .push(column);
            }
            folded
        });
        ColumnLookup { exact, folded }
    }

    fn find(&self, name: &str) -> Result<Option<&'a FileColumn>> {
        let Some(folded) = &self.folded else {
            return Ok(self.exact.get(name).copied());
        };
        match folded.get(&name.to_ascii_lowercase()).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([column]) => Ok(Some(*column)),
            Some(candidates) => match self.exact.get(name) {
                Some(column) => Ok(Some(*column)),
                None => Err(Error::schema(
                    name,
                    format!(
                        "ambiguous case-insensitive match: {}",
                        candidates
                            .iter()
                            .map(|c| c.name())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                )),
            },
        }
    }
}

fn check_compatible(column: &FileColumn, requested: &Field, strict: bool) -> Result<()> {
    let Some(file_type) = column.data_type() else {
        return Err(Error::schema(
            requested.name().clone(),
            format!(
                "file column '{}' of type {} has no Arrow equivalent",
                column.name(),
                column.kind().name()
            ),
        ));
    };
    let compatible = if strict {
        file_type == requested.data_type()
    } else {
        is_castable(file_type, requested.data_type())
    };
    if compatible {
        Ok(())
    } else {
        Err(Error::schema(
            requested.name().clone(),
            format!(
                "file type {file_type} cannot be read as {}",
                requested.data_type()
            ),
        ))
    }
}

fn is_castable(from: &DataType, to: &DataType) -> bool {
    from == to || can_cast_types(from, to)
}
