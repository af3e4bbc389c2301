//! Delimited event tables.
//!
//! Events arrive already compensated and transformed, one row per event:
//!
//! ```text
//! FSC-A,SSC-A,FITC-A:CD3,PE-A:CD4
//! 512.0,208.5,1030.2,14.0
//! ```
//!
//! A header cell is a channel's short name, optionally followed by `:` and its
//! stain. A leading [`IDENTITY_HEADER`] column supplies event identities;
//! without it identities are assigned in row order.

use std::io::Read;
use std::path::Path;

use flowgate_core::{ChannelLabels, ChannelMap, EventMatrix};

use crate::error::{Result, WorkspaceError};

/// Header of the optional identity column.
pub const IDENTITY_HEADER: &str = "event_id";

const STAIN_SEPARATOR: char = ':';

/// Events and the channel map describing their columns.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTable {
    pub events: EventMatrix,
    pub channels: ChannelMap,
}

impl EventTable {
    pub fn read(path: impl AsRef<Path>, delimiter: u8) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| WorkspaceError::io(path, source))?;
        let table = Self::from_reader(file, delimiter)?;
        tracing::debug!(
            target: "flowgate.table",
            path = %path.display(),
            events = table.events.len(),
            channels = table.channels.len(),
            "event table loaded"
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let has_identity = headers.get(0) == Some(IDENTITY_HEADER);

        let mut channels = ChannelMap::new();
        let first_channel = usize::from(has_identity);
        for (index, cell) in headers.iter().enumerate().skip(first_channel) {
            let labels = match cell.split_once(STAIN_SEPARATOR) {
                Some((name, stain)) if !stain.trim().is_empty() => {
                    ChannelLabels::new(name.trim()).with_stain(stain.trim())
                }
                Some((name, _)) => ChannelLabels::new(name.trim()),
                None => ChannelLabels::new(cell),
            };
            channels.insert(index - first_channel + 1, labels)?;
        }

        let width = headers.len();
        let mut data = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != width {
                return Err(WorkspaceError::table(
                    row + 1,
                    record.len(),
                    format!("expected {width} columns"),
                ));
            }
            for (column, cell) in record.iter().enumerate() {
                let value: f64 = cell.parse().map_err(|_| {
                    WorkspaceError::table(row + 1, column + 1, format!("`{cell}` is not a number"))
                })?;
                data.push(value);
            }
        }

        let events = if has_identity {
            EventMatrix::from_rows(width, data)?
        } else {
            EventMatrix::from_measurements(width, &data)?
        };
        Ok(Self { events, channels })
    }
}
