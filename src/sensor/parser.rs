use crate::sensor::types::RawSample;
use crate::sensor::{Result, SampleError};

/// Parse one sensor line.
///
/// Formats:
/// - `channel,r,g,b,c`
/// - `r,g,b,c` (channel 0)
///
/// Fields are decimal integers; surrounding whitespace is ignored. Values are not range-checked.
pub fn parse_sample_line(line: &str) -> Result<RawSample> {
    let fields: Vec<&str> = line.split(',').collect();

    let values = fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            field.trim().parse::<i32>().map_err(|_| SampleError::InvalidField {
                index,
                value: field.trim().to_string(),
            })
        });

    match fields.len() {
        5 => {
            let v = values.collect::<Result<Vec<i32>>>()?;
            Ok(RawSample { channel: v[0], r: v[1], g: v[2], b: v[3], c: v[4] })
        }
        4 => {
            let v = values.collect::<Result<Vec<i32>>>()?;
            Ok(RawSample { channel: 0, r: v[0], g: v[1], b: v[2], c: v[3] })
        }
        count => Err(SampleError::FieldCount(count)),
    }
}
