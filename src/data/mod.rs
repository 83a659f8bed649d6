//! Tick data structures
//!
//! Core types for raw price observations and recorded tick series.

mod synthetic;

pub use synthetic::*;

use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One raw price observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl Tick {
    /// Create a new tick
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Recorded series of ticks for one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickSeries {
    pub symbol: String,
    pub data: Vec<Tick>,
}

impl TickSeries {
    /// Create an empty series
    pub fn new(symbol: String) -> Self {
        Self {
            symbol,
            data: Vec::new(),
        }
    }

    /// Create a series with data
    pub fn with_data(symbol: String, data: Vec<Tick>) -> Self {
        Self { symbol, data }
    }

    /// Check if series is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of ticks
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Get all prices
    pub fn prices(&self) -> Vec<f64> {
        self.data.iter().map(|t| t.price).collect()
    }

    /// Get all timestamps
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.data.iter().map(|t| t.timestamp).collect()
    }

    /// Get the latest tick
    pub fn latest(&self) -> Option<&Tick> {
        self.data.last()
    }

    /// Append a tick
    pub fn push(&mut self, tick: Tick) {
        self.data.push(tick);
    }

    /// Calculate tick-to-tick returns
    pub fn returns(&self) -> Vec<f64> {
        if self.data.len() < 2 {
            return vec![];
        }

        self.data
            .windows(2)
            .map(|w| {
                if w[0].price > 0.0 {
                    (w[1].price - w[0].price) / w[0].price
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Write the series as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);

        writer.write_record(["timestamp", "price"])?;
        for tick in &self.data {
            writer.write_record([tick.timestamp.to_rfc3339(), tick.price.to_string()])?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Save to a CSV file
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }

    /// Read a series from CSV
    pub fn read_csv<R: Read>(reader: R, symbol: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let mut data = Vec::new();

        for result in reader.records() {
            let record = result?;

            let timestamp: DateTime<Utc> = record[0]
                .parse()
                .map_err(|e| crate::error::PipelineError::InvalidInput(format!(
                    "bad timestamp {:?}: {}",
                    &record[0], e
                )))?;
            let price: f64 = record[1]
                .parse()
                .map_err(|e| crate::error::PipelineError::InvalidInput(format!(
                    "bad price {:?}: {}",
                    &record[1], e
                )))?;

            data.push(Tick::new(timestamp, price));
        }

        Ok(Self::with_data(symbol.to_string(), data))
    }

    /// Load from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, symbol: &str) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_csv(file, symbol)
    }
}
