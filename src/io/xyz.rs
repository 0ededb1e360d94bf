use ndarray::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{Geometry, LoadError};

struct TextParserContext {
    buf_reader: BufReader<File>,
    filepath: String,
    line_count: usize,
}

impl TextParserContext {
    /// Reads a line and increase the line counter. It already trim the string.
    /// Returns `None` at the end of the file.
    fn read_line(&mut self) -> Result<Option<String>, LoadError> {
        let mut line = String::new();
        if self.buf_reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        self.line_count += 1;
        Ok(Some(line.trim().to_string()))
    }

    /// Formats an error message by putting the file name, the current line and the supplied message.
    ///
    /// # Arguments
    ///
    /// * `message` - An error message.
    fn gen_error(&self, message: String) -> LoadError {
        LoadError::ParseError(format!(
            "{}:{}: {}",
            self.filepath, self.line_count, message
        ))
    }
}

/// Reads a whitespace separated point cloud where each line holds `x y z`
/// followed by zero or more auxiliary values (e.g. per-point label scores).
/// Every point line must have the same number of columns. Empty lines and
/// lines starting with `#` are skipped.
///
/// # Arguments
///
/// * `filepath` - Path to the text file.
///
/// # Returns
///
/// The geometry with `points` and, when the file has more than three columns, `extra`.
pub fn read_labeled_point_cloud<P>(filepath: P) -> Result<Geometry, LoadError>
where
    P: AsRef<Path>,
{
    let file = File::open(filepath.as_ref())?;
    let mut parser_context = TextParserContext {
        buf_reader: BufReader::new(file),
        filepath: filepath.as_ref().display().to_string(),
        line_count: 0,
    };

    let mut values = Vec::<f32>::new();
    let mut num_columns = None;
    while let Some(line) = parser_context.read_line()? {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let row = line
            .split_whitespace()
            .map(|x| x.parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| parser_context.gen_error(format!("Invalid point. Got `{line}`")))?;

        if row.len() < 3 {
            return Err(parser_context.gen_error(format!(
                "A point needs at least 3 coordinates, got `{line}`"
            )));
        }

        match num_columns {
            None => num_columns = Some(row.len()),
            Some(n) if n != row.len() => {
                return Err(parser_context.gen_error(format!(
                    "Expected {n} columns as in the first point, got {}",
                    row.len()
                )));
            }
            Some(_) => (),
        }

        values.extend(row);
    }

    let num_columns = num_columns.unwrap_or(3);
    let num_points = values.len() / num_columns;
    let table = Array2::from_shape_vec((num_points, num_columns), values)
        .map_err(|err| parser_context.gen_error(err.to_string()))?;

    let points = table.slice(s![.., 0..3]).to_owned();
    let extra = if num_columns > 3 {
        Some(table.slice(s![.., 3..]).to_owned())
    } else {
        None
    };

    Ok(Geometry {
        points,
        colors: None,
        extra,
    })
}
