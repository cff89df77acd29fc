//! Record batch generators.

use std::sync::Arc;

use arrow_array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};

/// Schema of [`id_name_batch`]: `id: Int64 not null, name: Utf8`.
pub fn id_name_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ]))
}

/// Generates `rows` rows with consecutive ids starting at `first_id`.
///
/// `name` is `"name_{id}"`, except for ids divisible by 5 where it is null.
pub fn id_name_batch(first_id: i64, rows: usize) -> RecordBatch {
    let ids = (first_id..first_id + rows as i64).collect::<Vec<_>>();
    let names = ids
        .iter()
        .map(|id| (id % 5 != 0).then(|| format!("name_{id}")))
        .collect::<StringArray>();
    RecordBatch::try_new(
        id_name_schema(),
        vec![
            Arc::new(Int64Array::from(ids)) as ArrayRef,
            Arc::new(names) as ArrayRef,
        ],
    )
    .expect("valid batch")
}

#[cfg(test)]
mod tests {
    use arrow_array::{Array, cast::AsArray, types::Int64Type};

    #[test]
    fn test_id_name_batch() {
        let batch = super::id_name_batch(3, 4);
        assert_eq!(batch.num_rows(), 4);
        let ids = batch.column(0).as_primitive::<Int64Type>();
        assert_eq!(ids.values().as_ref(), &[3, 4, 5, 6]);
        let names = batch.column(1).as_string::<i32>();
        assert_eq!(names.value(0), "name_3");
        assert!(names.is_null(2));
    }
}
