//! CSV decoding for ticket rows.
//!
//! Input is a header row `name,email,reference,barcode,table_no` followed by
//! one ticket per row. Row-level problems are skipped and reported, never
//! fatal; only a broken reader ends the decode.

use std::io::Read;

use serde::Deserialize;
use thiserror::Error;

use crate::models::NewTicket;

/// Structurally malformed CSV; ends the whole decode.
#[derive(Error, Debug)]
#[error("malformed csv: {0}")]
pub struct ParseError(#[from] csv::Error);

/// A data row that could not be turned into a ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIssue {
    /// 1-based data-row number; the header row is not counted.
    pub row: u64,
    pub reason: String,
}

#[derive(Debug)]
pub enum Row {
    Ticket(NewTicket),
    Skipped(RowIssue),
}

#[derive(Debug, Deserialize)]
struct RawRow {
    name: String,
    email: String,
    reference: String,
    barcode: String,
    table_no: String,
}

/// Streams tickets out of CSV bytes, single pass.
pub fn decode<R: Read>(reader: R) -> TicketRows<R> {
    let records = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .into_deserialize();

    TicketRows { records, row: 0 }
}

pub struct TicketRows<R: Read> {
    records: csv::DeserializeRecordsIntoIter<R, RawRow>,
    row: u64,
}

impl<R: Read> Iterator for TicketRows<R> {
    type Item = Result<Row, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        self.row += 1;

        let raw = match record {
            Ok(raw) => raw,
            Err(err) => return Some(self.classify(err)),
        };

        match raw.table_no.parse::<i64>() {
            Ok(table_no) => Some(Ok(Row::Ticket(NewTicket {
                name: raw.name,
                email: raw.email,
                reference: raw.reference,
                barcode: raw.barcode,
                table_no,
            }))),
            Err(_) => Some(Ok(Row::Skipped(RowIssue {
                row: self.row,
                reason: format!("table_no {:?} is not an integer", raw.table_no),
            }))),
        }
    }
}

impl<R: Read> TicketRows<R> {
    /// Row-level problems (field count, encoding, coercion) are skipped;
    /// reader failures end the decode.
    fn classify(&self, err: csv::Error) -> Result<Row, ParseError> {
        match err.kind() {
            csv::ErrorKind::Io(_) => Err(ParseError(err)),
            _ => Ok(Row::Skipped(RowIssue {
                row: self.row,
                reason: err.to_string(),
            })),
        }
    }
}
