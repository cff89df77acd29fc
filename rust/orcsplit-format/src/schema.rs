//! Top-level file schema, discovered from the footer's flattened type tree.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields, Schema, TimeUnit};
use orcsplit_common::{Result, error::Error, verify_data};

use crate::proto::{Type, TypeKind};

const DEFAULT_DECIMAL_PRECISION: u8 = 38;
const DEFAULT_DECIMAL_SCALE: i8 = 10;

/// Deepest type nesting accepted, the root struct being at depth 0.
pub const MAX_TYPE_NESTING: usize = 100;

/// A top-level column of the physical file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileColumn {
    name: String,
    index: usize,
    type_id: u32,
    kind: TypeKind,
    data_type: Option<DataType>,
}

impl FileColumn {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File-local index: position of the column among the root struct's fields.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Id of the column's root type within the footer's type list.
    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Arrow equivalent of the column type, `None` when the type (or one of its
    /// nested children) has no Arrow counterpart, e.g. `uniontype`.
    pub fn data_type(&self) -> Option<&DataType> {
        self.data_type.as_ref()
    }
}

/// Ordered top-level columns of the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSchema {
    columns: Vec<FileColumn>,
}

impl FileSchema {
    pub fn new(columns: Vec<FileColumn>) -> FileSchema {
        FileSchema { columns }
    }

    /// Builds the schema from the footer's pre-order type list. Type `0` must be
    /// the root struct.
    pub fn from_types(types: &[Type]) -> Result<FileSchema> {
        if types.is_empty() {
            return Ok(FileSchema::default());
        }
        verify_layout(types)?;
        let root = &types[0];
        verify_data!("root type kind", kind_of(root)? == TypeKind::Struct);
        verify_data!(
            "root struct field names",
            root.subtypes.len() == root.field_names.len()
        );

        let mut columns = Vec::with_capacity(root.subtypes.len());
        for (index, (&type_id, name)) in root.subtypes.iter().zip(&root.field_names).enumerate() {
            let ty = &types[type_id as usize];
            columns.push(FileColumn {
                name: name.clone(),
                index,
                type_id,
                kind: kind_of(ty)?,
                data_type: arrow_type(types, type_id)?,
            });
        }
        Ok(FileSchema { columns })
    }

    pub fn columns(&self) -> &[FileColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&FileColumn> {
        self.columns.get(index)
    }

    /// Finds the first column with exactly the given name.
    pub fn find(&self, name: &str) -> Option<&FileColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Converts the schema to an Arrow schema, leaving out the columns without
    /// an Arrow equivalent.
    pub fn to_arrow_schema(&self) -> Schema {
        let fields = self
            .columns
            .iter()
            .filter_map(|column| {
                column
                    .data_type
                    .clone()
                    .map(|data_type| Field::new(column.name.clone(), data_type, true))
            })
            .collect::<Vec<_>>();
        Schema::new(fields)
    }
}

fn kind_of(ty: &Type) -> Result<TypeKind> {
    let kind = ty.kind.unwrap_or_default();
    TypeKind::try_from(kind)
        .map_err(|_| Error::invalid_format("type kind", format!("unknown type kind {kind}")))
}

/// Checks that `types` is the pre-order flattening of one tree rooted at type 0:
/// walking the tree depth-first visits the ids in increasing order, so every type
/// is referenced exactly once and the children of a compound type follow it.
///
/// The walk uses an explicit stack and bounds the nesting depth, so the later
/// recursive conversion stays linear and shallow on any footer.
fn verify_layout(types: &[Type]) -> Result<()> {
    let mut pending = vec![(0u32, 0usize)];
    let mut next_id = 0u64;
    while let Some((type_id, depth)) = pending.pop() {
        if u64::from(type_id) != next_id {
            return Err(Error::invalid_format(
                "subtype id",
                format!("type {type_id} referenced where type {next_id} was expected"),
            ));
        }
        next_id += 1;
        let ty = types.get(type_id as usize).ok_or_else(|| {
            Error::invalid_format(
                "subtype id",
                format!("type {type_id} out of range ({} types)", types.len()),
            )
        })?;
        if !ty.subtypes.is_empty() {
            verify_data!("type nesting depth", depth < MAX_TYPE_NESTING);
        }
        pending.extend(ty.subtypes.iter().rev().map(|&child_id| (child_id, depth + 1)));
    }
    Ok(())
}

/// Arrow equivalent of `type_id`; `types` must have passed [`verify_layout`].
fn arrow_type(types: &[Type], type_id: u32) -> Result<Option<DataType>> {
    let ty = &types[type_id as usize];
    let data_type = match kind_of(ty)? {
        TypeKind::Boolean => DataType::Boolean,
        TypeKind::Byte => DataType::Int8,
        TypeKind::Short => DataType::Int16,
        TypeKind::Int => DataType::Int32,
        TypeKind::Long => DataType::Int64,
        TypeKind::Float => DataType::Float32,
        TypeKind::Double => DataType::Float64,
        TypeKind::String | TypeKind::Varchar | TypeKind::Char => DataType::Utf8,
        TypeKind::Binary => DataType::Binary,
        TypeKind::Timestamp => DataType::Timestamp(TimeUnit::Nanosecond, None),
        TypeKind::TimestampInstant => {
            DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()))
        }
        TypeKind::Date => DataType::Date32,
        TypeKind::Decimal => {
            let precision = ty
                .precision
                .filter(|&p| p != 0)
                .map(|p| u8::try_from(p).unwrap_or(u8::MAX))
                .unwrap_or(DEFAULT_DECIMAL_PRECISION);
            let scale = ty
                .scale
                .map(|s| i8::try_from(s).unwrap_or(i8::MAX))
                .unwrap_or(DEFAULT_DECIMAL_SCALE);
            verify_data!("decimal precision", precision <= 38);
            verify_data!("decimal scale", scale as i16 <= precision as i16);
            DataType::Decimal128(precision, scale)
        }
        TypeKind::List => {
            verify_data!("list subtypes", ty.subtypes.len() == 1);
            let item_id = ty.subtypes[0];
            let Some(item) = arrow_type(types, item_id)? else {
                return Ok(None);
            };
            DataType::List(Arc::new(Field::new("item", item, true)))
        }
        TypeKind::Map => {
            verify_data!("map subtypes", ty.subtypes.len() == 2);
            let (key_id, value_id) = (ty.subtypes[0], ty.subtypes[1]);
            let (Some(key), Some(value)) = (arrow_type(types, key_id)?, arrow_type(types, value_id)?)
            else {
                return Ok(None);
            };
            let entries = Fields::from(vec![
                Field::new("key", key, false),
                Field::new("value", value, true),
            ]);
            DataType::Map(
                Arc::new(Field::new("entries", DataType::Struct(entries), false)),
                false,
            )
        }
        TypeKind::Struct => {
            verify_data!(
                "struct field names",
                ty.subtypes.len() == ty.field_names.len()
            );
            let mut fields = Vec::with_capacity(ty.subtypes.len());
            for (&child_id, name) in ty.subtypes.iter().zip(&ty.field_names) {
                let Some(child) = arrow_type(types, child_id)? else {
                    return Ok(None);
                };
                fields.push(Field::new(name.clone(), child, true));
            }
            DataType::Struct(Fields::from(fields))
        }
        TypeKind::Union => return Ok(None),
    };
    Ok(Some(data_type))
}
