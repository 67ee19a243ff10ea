//! Post-write verification
//!
//! After every create or update the adapter re-reads the object and compares
//! what the cluster reports against what was asked for. Only the documented
//! normalizations are tolerated:
//!
//! - numeric strings compare as floats with an absolute tolerance of 1e-9
//!   (Ceph echoes `0.5` as `0.500000`)
//! - subuser permission `full` on the wire equals `full-control`
//! - RGW suspension `0`/`1` equals `false`/`true`
//!
//! The last two are absorbed when wire data is projected into models, so
//! this module only sees model values.

use crate::domain::value::Nullable;
use crate::error::{Error, Result};
use std::fmt::Debug;
use tracing::{debug, warn};

/// Absolute tolerance for numeric comparisons
pub const FLOAT_TOLERANCE: f64 = 1e-9;

/// Compare two floats within [`FLOAT_TOLERANCE`]
pub fn float_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= FLOAT_TOLERANCE
}

/// Compare two strings, treating both-numeric strings as floats
pub fn numeric_str_eq(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => float_eq(x, y),
        _ => false,
    }
}

/// Replace `observed` with `reference` when both name the same number, so a
/// refresh keeps the declared spelling (`3` rather than the server's `3.0`)
pub fn keep_numeric_spelling(reference: &str, observed: &mut String) {
    if reference != observed && numeric_str_eq(reference, observed) {
        observed.replace_range(.., reference);
    }
}

/// Accumulates divergences between intended and observed state
#[derive(Debug)]
pub struct DriftCheck<'a> {
    resource: &'a str,
    id: String,
    divergences: Vec<(String, String, String)>,
}

impl<'a> DriftCheck<'a> {
    pub fn new(resource: &'a str, id: impl Into<String>) -> Self {
        Self {
            resource,
            id: id.into(),
            divergences: Vec::new(),
        }
    }

    fn record(&mut self, attribute: &str, expected: impl Debug, observed: impl Debug) {
        self.divergences.push((
            attribute.to_string(),
            format!("{:?}", expected),
            format!("{:?}", observed),
        ));
    }

    /// Always-present attribute: must match exactly
    pub fn exact<T: PartialEq + Debug>(&mut self, attribute: &str, expected: &T, observed: &T) -> &mut Self {
        if expected != observed {
            self.record(attribute, expected, observed);
        }
        self
    }

    /// Optional attribute: checked only when the plan carries a value
    pub fn nullable<T: PartialEq + Debug>(
        &mut self,
        attribute: &str,
        expected: &Nullable<T>,
        observed: &Nullable<T>,
    ) -> &mut Self {
        if let Nullable::Value(want) = expected {
            if observed.value() != Some(want) {
                self.record(attribute, want, observed);
            }
        }
        self
    }

    /// Optional float attribute, compared with tolerance
    pub fn float(&mut self, attribute: &str, expected: &Nullable<f64>, observed: &Nullable<f64>) -> &mut Self {
        if let Nullable::Value(want) = expected {
            match observed.value() {
                Some(got) if float_eq(*want, *got) => {}
                _ => self.record(attribute, want, observed),
            }
        }
        self
    }

    /// String attribute compared with numeric normalization
    pub fn numeric_str(&mut self, attribute: &str, expected: &str, observed: &str) -> &mut Self {
        if !numeric_str_eq(expected, observed) {
            self.record(attribute, expected, observed);
        }
        self
    }

    /// Fail with the first divergence, logging the rest
    pub fn finish(&mut self) -> Result<()> {
        let mut divergences = std::mem::take(&mut self.divergences).into_iter();
        let Some((attribute, expected, observed)) = divergences.next() else {
            debug!("{} {} verified after write", self.resource, self.id);
            return Ok(());
        };

        for (other, want, got) in divergences {
            warn!(
                "{} {}: {} is {} after apply, expected {}",
                self.resource, self.id, other, got, want
            );
        }

        Err(Error::PostWriteDrift {
            resource: self.resource.to_string(),
            id: self.id.clone(),
            attribute,
            expected,
            observed,
        })
    }
}
