//! Capture parameter parsing and unit normalization
//!
//! Raw request values arrive as strings. They are turned into bounded,
//! typed [`CaptureParameters`] before anything touches the camera.
//!
//! ## Shutter units
//!
//! Callers routinely forget which unit the shutter is expressed in, so the
//! value is interpreted by magnitude:
//!
//! | raw value `s`          | interpreted as | microseconds  |
//! |------------------------|----------------|---------------|
//! | `s <= 30`              | seconds        | `s * 1_000_000` |
//! | `30 < s <= 30_000`     | milliseconds   | `s * 1_000`     |
//! | `s > 30_000`           | microseconds   | `s`             |
//!
//! ## Non-positive values
//!
//! A shutter or gain of zero or below means "not provided": the option is
//! left out of the command entirely, exactly as if the field were absent.
//!
//! ## Long exposures
//!
//! Above one second of exposure the auto-exposure pipeline is bypassed, so a
//! fixed analog gain (4.0 unless the caller gave one) and fixed white-balance
//! gains are requested as well.

use crate::error::{CaptureError, Result};
use serde::Deserialize;
use std::fmt;

/// Upper bound for the normalized exposure (10 minutes).
pub const MAX_SHUTTER_US: u64 = 600_000_000;

/// Exposures above this get the long-exposure gain policy.
pub const LONG_EXPOSURE_US: u64 = 1_000_000;

/// Gain used for long exposures when the caller supplied none.
pub const LONG_EXPOSURE_GAIN: f64 = 4.0;

const SECONDS_MAX: i64 = 30;
const MILLISECONDS_MAX: i64 = 30_000;

/// Raw request values, as handed over by the HTTP layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureRequest {
    pub shutter: Option<String>,
    pub gain: Option<String>,
}

impl CaptureRequest {
    pub fn new(shutter: Option<&str>, gain: Option<&str>) -> Self {
        Self {
            shutter: shutter.map(str::to_string),
            gain: gain.map(str::to_string),
        }
    }

    /// Fill fields missing here from `fallback` (query wins over form body).
    pub fn or(self, fallback: CaptureRequest) -> Self {
        Self {
            shutter: self.shutter.or(fallback.shutter),
            gain: self.gain.or(fallback.gain),
        }
    }
}

/// Red/blue white-balance multipliers passed as `--awbgains r,b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AwbGains {
    pub red: f64,
    pub blue: f64,
}

impl AwbGains {
    pub const LONG_EXPOSURE: Self = Self { red: 1.0, blue: 0.6 };
}

impl fmt::Display for AwbGains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.red, self.blue)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureParameters {
    pub shutter_us: Option<u64>,
    pub gain: Option<f64>,
    pub awb_gains: Option<AwbGains>,
}

impl CaptureParameters {
    pub fn is_long_exposure(&self) -> bool {
        self.shutter_us.is_some_and(|us| us > LONG_EXPOSURE_US)
    }
}

/// Validate and normalize raw request values.
pub fn normalize(request: &CaptureRequest) -> Result<CaptureParameters> {
    let shutter_raw = request
        .shutter
        .as_deref()
        .map(parse_shutter)
        .transpose()?;
    let gain_raw = request.gain.as_deref().map(parse_gain).transpose()?;

    let shutter_us = shutter_raw.filter(|s| *s > 0).map(shutter_to_us);
    if let Some(us) = shutter_us {
        if us > MAX_SHUTTER_US {
            return Err(CaptureError::validation("shutter value too large"));
        }
    }

    let mut params = CaptureParameters {
        shutter_us,
        gain: gain_raw.filter(|g| *g > 0.0),
        awb_gains: None,
    };

    if params.is_long_exposure() {
        params.gain.get_or_insert(LONG_EXPOSURE_GAIN);
        params.awb_gains = Some(AwbGains::LONG_EXPOSURE);
    }

    Ok(params)
}

fn parse_shutter(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| CaptureError::validation("invalid shutter value"))
}

fn parse_gain(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|g| g.is_finite())
        .ok_or_else(|| CaptureError::validation("invalid gain value"))
}

/// Apply the unit heuristic to a positive raw shutter value.
fn shutter_to_us(s: i64) -> u64 {
    let s = s.unsigned_abs();
    if s <= SECONDS_MAX as u64 {
        s * 1_000_000
    } else if s <= MILLISECONDS_MAX as u64 {
        s * 1_000
    } else {
        s
    }
}
