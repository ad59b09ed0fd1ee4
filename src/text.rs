//! Whitespace-separated text arrays, one row per line.
//!
//! Blank lines and lines starting with `#` are skipped. A file with a
//! single row or a single column is read as a 1-D array.

use crate::error::{ConfigurationError, Error, ParseTextError};
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Parses a text array from `reader`.
pub fn read_text_from<A, R>(reader: R) -> Result<ArrayD<A>, Error>
where
    A: FromStr,
    R: BufRead,
{
    let mut rows: Vec<Vec<A>> = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let row = trimmed
            .split_whitespace()
            .map(|token| {
                token.parse().map_err(|_| ParseTextError {
                    line: i + 1,
                    token: token.to_owned(),
                })
            })
            .collect::<Result<Vec<A>, _>>()?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(ConfigurationError::ShapeMismatch {
                    expected: vec![first.len()],
                    found: vec![row.len()],
                }
                .into());
            }
        }
        rows.push(row);
    }

    let ncols = rows.first().map_or(0, Vec::len);
    let nrows = rows.len();
    let shape = if nrows == 1 || ncols == 1 {
        vec![nrows * ncols]
    } else {
        vec![nrows, ncols]
    };
    let data: Vec<A> = rows.into_iter().flatten().collect();
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)
        .map_err(|_| ConfigurationError::Overflow)?)
}

/// Reads the text array at `path`.
pub fn read_text<A, P>(path: P) -> Result<ArrayD<A>, Error>
where
    A: FromStr,
    P: AsRef<Path>,
{
    read_text_from(BufReader::new(File::open(path)?))
}

/// Writes a 1-D array one element per line, or a 2-D array one row per
/// line.
pub fn write_text_to<A, S, D, W>(array: &ArrayBase<S, D>, mut writer: W) -> Result<(), Error>
where
    A: fmt::Display,
    S: Data<Elem = A>,
    D: Dimension,
    W: Write,
{
    let array = array.view().into_dyn();
    match array.ndim() {
        1 => {
            for x in array.iter() {
                writeln!(writer, "{}", x)?;
            }
        }
        2 => {
            for row in array.outer_iter() {
                let line: Vec<String> = row.iter().map(ToString::to_string).collect();
                writeln!(writer, "{}", line.join(" "))?;
            }
        }
        ndim => {
            return Err(ConfigurationError::Unsupported(format!(
                "text arrays must be 1-D or 2-D, not {}-D",
                ndim
            ))
            .into())
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes `array` as text to `path`.
pub fn write_text<A, S, D, P>(array: &ArrayBase<S, D>, path: P) -> Result<(), Error>
where
    A: fmt::Display,
    S: Data<Elem = A>,
    D: Dimension,
    P: AsRef<Path>,
{
    write_text_to(array, BufWriter::new(File::create(path)?))
}
