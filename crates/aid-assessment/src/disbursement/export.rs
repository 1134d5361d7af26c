use std::io;

use thiserror::Error;

use super::DisbursementRecord;

#[derive(Debug, Error)]
pub enum ScheduleExportError {
    #[error("failed to write disbursement csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush disbursement csv: {0}")]
    Io(#[from] io::Error),
}

const HEADER: [&str; 5] = [
    "disbursement_date",
    "negotiated_expiry_date",
    "value_code",
    "value_amount",
    "eligible",
];

/// Writes one CSV row per award per disbursement record.
pub struct DisbursementWriter<W: io::Write> {
    writer: csv::Writer<W>,
}

impl<W: io::Write> DisbursementWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().from_writer(inner),
        }
    }

    pub fn write_records(&mut self, records: &[DisbursementRecord]) -> Result<(), ScheduleExportError> {
        self.writer.write_record(HEADER)?;
        for record in records {
            let date = record.disbursement_date.to_string();
            let expiry = record.negotiated_expiry_date.to_string();
            for value in &record.awards {
                self.writer.write_record([
                    date.as_str(),
                    expiry.as_str(),
                    value.value_code.label(),
                    value.value_amount.to_string().as_str(),
                    if value.eligible { "true" } else { "false" },
                ])?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W, ScheduleExportError> {
        self.writer
            .into_inner()
            .map_err(|err| ScheduleExportError::Io(err.into_error()))
    }
}
