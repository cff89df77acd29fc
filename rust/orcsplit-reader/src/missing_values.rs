use arrow_buffer::BooleanBuffer;

/// Per-batch record of which cells were synthesized rather than decoded.
///
/// Holds one optional bitmap per requested column: `None` for decoded columns,
/// a bitmap with the synthesized rows set for missing ones. Today a missing
/// column is missing for every row of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingValues {
    num_rows: usize,
    columns: Vec<Option<BooleanBuffer>>,
}

impl MissingValues {
    /// Map for a batch of `num_rows` rows and `num_columns` requested columns,
    /// where the columns at `missing_positions` are fully synthesized.
    pub fn new(num_rows: usize, num_columns: usize, missing_positions: &[usize]) -> MissingValues {
        let mut columns = vec![None; num_columns];
        for &pos in missing_positions {
            columns[pos] = Some(BooleanBuffer::new_set(num_rows));
        }
        MissingValues { num_rows, columns }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// `true` when every cell of the batch was decoded.
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Option::is_none)
    }

    /// Positions of the columns with at least one synthesized row.
    pub fn missing_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, bitmap)| bitmap.as_ref().is_some_and(|b| b.count_set_bits() > 0))
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Bitmap of synthesized rows for the column, `None` if fully decoded.
    pub fn column(&self, column: usize) -> Option<&BooleanBuffer> {
        self.columns.get(column).and_then(Option::as_ref)
    }

    pub fn is_missing(&self, column: usize, row: usize) -> bool {
        self.column(column)
            .is_some_and(|bitmap| row < bitmap.len() && bitmap.value(row))
    }
}

#[cfg(test)]
mod tests {
    use super::MissingValues;

    #[test]
    fn test_missing_values() {
        let missing = MissingValues::new(4, 3, &[1]);
        assert!(!missing.is_empty());
        assert_eq!(missing.missing_columns(), vec![1]);
        assert!(missing.is_missing(1, 0));
        assert!(missing.is_missing(1, 3));
        assert!(!missing.is_missing(1, 4));
        assert!(!missing.is_missing(0, 0));
        assert!(!missing.is_missing(7, 0));
        assert_eq!(missing.column(1).unwrap().len(), 4);

        let decoded = MissingValues::new(4, 2, &[]);
        assert!(decoded.is_empty());
        assert!(decoded.missing_columns().is_empty());

        // A zero-row batch records the column but no cell.
        let empty = MissingValues::new(0, 1, &[0]);
        assert!(empty.missing_columns().is_empty());
    }
}
