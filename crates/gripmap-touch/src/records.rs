//! Loading recorded calibration tables.
//!
//! Calibration recordings are plain CSV, one sample per row, with the
//! reference force in one column and flattened touch counts in the
//! rest. Logging rigs prepend header or unit rows and occasionally
//! truncate a row mid-write; anything that does not parse as a full
//! numeric row is dropped rather than fatal.

use ndarray::Array2;
use std::path::Path;

use gripmap_core::{Error, Result};

/// Column the reference force lands in with the usual logging rig
pub const DEFAULT_FORCE_COLUMN: usize = 2;

/// Read a CSV file into a dense numeric table.
///
/// A row is kept only when every field parses as a finite number.
/// The first kept row fixes the column count; later rows of any other
/// width are dropped. Fails only when nothing numeric is left.
pub fn load_numeric_table(path: &Path) -> Result<Array2<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::Table(e.to_string()))?;

    let mut width = 0;
    let mut rows = 0;
    let mut data = Vec::new();
    let mut parsed = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| Error::Table(e.to_string()))?;

        parsed.clear();
        let mut numeric = true;
        for field in record.iter() {
            match field.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => parsed.push(v),
                _ => {
                    numeric = false;
                    break;
                }
            }
        }
        if !numeric || parsed.is_empty() {
            continue;
        }

        if width == 0 {
            width = parsed.len();
        } else if parsed.len() != width {
            tracing::debug!(
                "dropping row with {} fields in a {} column table",
                parsed.len(),
                width
            );
            continue;
        }
        data.extend_from_slice(&parsed);
        rows += 1;
    }

    if rows == 0 {
        return Err(Error::EmptyTable {
            path: path.display().to_string(),
        });
    }
    Array2::from_shape_vec((rows, width), data).map_err(|e| Error::Table(e.to_string()))
}

/// One column of a loaded table as a force vector.
pub fn force_column(table: &Array2<f64>, column: usize) -> Result<Vec<f64>> {
    if column >= table.ncols() {
        return Err(Error::ColumnOutOfRange {
            column,
            width: table.ncols(),
        });
    }
    Ok(table.column(column).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_header_and_unit_rows_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(
            &path,
            "time,step,force_g,s1,s2\n\
             s,-,g,counts,counts\n\
             0.0,1,2.5,100,101\n\
             0.1,2,3.5,110,111\n",
        )
        .unwrap();

        let table = load_numeric_table(&path).unwrap();
        assert_eq!(table.dim(), (2, 5));
        assert_eq!(table[[0, 2]], 2.5);
        assert_eq!(table[[1, 4]], 111.0);
    }

    #[test]
    fn test_ragged_and_nan_rows_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(
            &path,
            "1.0,2.0,3.0\n\
             4.0,5.0\n\
             nan,6.0,7.0\n\
             8.0,9.0,10.0\n",
        )
        .unwrap();

        let table = load_numeric_table(&path).unwrap();
        assert_eq!(table.dim(), (2, 3));
        assert_eq!(table[[1, 0]], 8.0);
    }

    #[test]
    fn test_all_header_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(&path, "a,b,c\nx,y,z\n").unwrap();

        let result = load_numeric_table(&path);
        assert!(matches!(result, Err(Error::EmptyTable { .. })));
    }

    #[test]
    fn test_force_column_bounds() {
        let table = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(force_column(&table, 2).unwrap(), vec![3.0, 6.0]);
        assert!(matches!(
            force_column(&table, 3),
            Err(Error::ColumnOutOfRange { column: 3, width: 3 })
        ));
    }
}
