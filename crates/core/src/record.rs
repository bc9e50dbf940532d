//! Records and their headers.
//!
//! A [`Record`] is one unit of input data plus the metadata the engine tracks
//! about it. Records are never mutated in place: every transformation stage
//! produces a new record, usually keeping the header of its input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata attached to every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    number: u64,
    source: String,
    creation_time: DateTime<Utc>,
    scanned: bool,
}

impl Header {
    /// Create a header stamped with the current time.
    ///
    /// `number` is the 1-based position of the record in its data source, or `0`
    /// when the source has no natural ordering.
    pub fn new(number: u64, source: impl Into<String>) -> Self {
        Self::with_creation_time(number, source, Utc::now())
    }

    pub fn with_creation_time(
        number: u64,
        source: impl Into<String>,
        creation_time: DateTime<Utc>,
    ) -> Self {
        Self {
            number,
            source: source.into(),
            creation_time,
            scanned: false,
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// Whether the record was re-written on its own after its batch failed.
    pub fn is_scanned(&self) -> bool {
        self.scanned
    }

    /// Copy of this header flagged as scanned.
    pub fn scanned(&self) -> Self {
        Self {
            scanned: true,
            ..self.clone()
        }
    }
}

impl core::fmt::Display for Header {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "number={}, source=\"{}\", creationTime=\"{}\"",
            self.number,
            self.source,
            self.creation_time.format(crate::format::TIME_FORMAT)
        )?;
        if self.scanned {
            write!(f, ", scanned=true")?;
        }
        Ok(())
    }
}

/// One unit of data flowing through a job.
///
/// The payload type is opaque to the engine; only readers, mappers, processors
/// and writers interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<P> {
    header: Header,
    payload: P,
}

impl<P> Record<P> {
    pub fn new(header: Header, payload: P) -> Self {
        Self { header, payload }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    pub fn into_parts(self) -> (Header, P) {
        (self.header, self.payload)
    }

    /// Produce a new record with the same header and a transformed payload.
    pub fn map<Q>(self, f: impl FnOnce(P) -> Q) -> Record<Q> {
        Record {
            header: self.header,
            payload: f(self.payload),
        }
    }

    /// Produce a new record with the same header and another payload.
    pub fn with_payload<Q>(self, payload: Q) -> Record<Q> {
        Record {
            header: self.header,
            payload,
        }
    }

    /// Produce the same record flagged as scanned.
    pub fn into_scanned(self) -> Self {
        Self {
            header: self.header.scanned(),
            payload: self.payload,
        }
    }
}

impl<P: core::fmt::Debug> core::fmt::Display for Record<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Record: {{header=[{}], payload=[{:?}]}}", self.header, self.payload)
    }
}
