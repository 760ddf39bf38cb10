//! Aligned multi-column data frame
//!
//! A [`Frame`] holds named f64 columns over one shared timestamp index. It is
//! the logical input/output structure for gap-filling and the critical-day
//! limiter; persistence formats are handled outside the core.

use crate::app::models::TimeSeries;
use crate::{Error, Result};
use chrono::NaiveDateTime;

/// Named f64 columns over one shared, strictly increasing timestamp index
#[derive(Debug, Clone)]
pub struct Frame {
    index: Vec<NaiveDateTime>,
    columns: Vec<(String, Vec<f64>)>,
}

impl Frame {
    /// Create an empty frame over the given index
    pub fn new(index: Vec<NaiveDateTime>) -> Result<Self> {
        for pair in index.windows(2) {
            if pair[1] <= pair[0] {
                return Err(Error::validation(
                    "frame timestamps must be unique and strictly increasing",
                ));
            }
        }
        Ok(Self {
            index,
            columns: Vec::new(),
        })
    }

    /// Build a frame from series sharing one index
    pub fn from_series(series: &[&TimeSeries]) -> Result<Self> {
        let first = series
            .first()
            .ok_or_else(|| Error::validation("cannot build a frame from zero series"))?;
        let mut frame = Self::new(first.index().to_vec())?;
        for s in series {
            frame.insert_series(s)?;
        }
        Ok(frame)
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Insert a column, replacing an existing column of the same name
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if values.len() != self.index.len() {
            return Err(Error::validation(format!(
                "column length {} does not match frame length {}",
                values.len(),
                self.index.len()
            )));
        }
        let name = name.into();
        if let Some(slot) = self.columns.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = values;
        } else {
            self.columns.push((name, values));
        }
        Ok(())
    }

    /// Insert a series as a column; its index must match the frame index
    pub fn insert_series(&mut self, series: &TimeSeries) -> Result<()> {
        if series.index() != self.index {
            return Err(Error::validation(format!(
                "series '{}' index does not match frame index",
                series.name()
            )));
        }
        self.insert(series.name().to_string(), series.values().to_vec())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Column lookup that fails with a validation error when absent
    pub fn require(&self, name: &str) -> Result<&[f64]> {
        self.column(name)
            .ok_or_else(|| Error::validation(format!("frame has no column '{name}'")))
    }

    /// Extract one column as a series
    pub fn series(&self, name: &str) -> Result<TimeSeries> {
        let values = self.require(name)?.to_vec();
        TimeSeries::new(name, self.index.clone(), values)
    }

    /// New frame holding only the named columns, in the given order
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let mut out = Self::new(self.index.clone())?;
        for name in names {
            out.insert(name.to_string(), self.require(name)?.to_vec())?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn index(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2022, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n as i32).map(|i| start + Duration::minutes(30) * i).collect()
    }

    #[test]
    fn insert_and_select() {
        let mut frame = Frame::new(index(3)).unwrap();
        frame.insert("TA", vec![1.0, 2.0, 3.0]).unwrap();
        frame.insert("RH", vec![50.0, 60.0, 70.0]).unwrap();
        assert_eq!(frame.column("TA"), Some(&[1.0, 2.0, 3.0][..]));

        let selected = frame.select(&["RH"]).unwrap();
        assert_eq!(selected.names(), vec!["RH"]);
        assert!(selected.column("TA").is_none());
    }

    #[test]
    fn insert_replaces_existing_column() {
        let mut frame = Frame::new(index(2)).unwrap();
        frame.insert("TA", vec![1.0, 2.0]).unwrap();
        frame.insert("TA", vec![5.0, 6.0]).unwrap();
        assert_eq!(frame.n_columns(), 1);
        assert_eq!(frame.column("TA"), Some(&[5.0, 6.0][..]));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut frame = Frame::new(index(3)).unwrap();
        let result = frame.insert("TA", vec![1.0]);
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn missing_column_lookup_fails() {
        let frame = Frame::new(index(2)).unwrap();
        assert!(frame.require("NEP").is_err());
    }
}
