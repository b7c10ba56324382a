use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::RecoveryError;

/// Metadata for one seismic event: origin coordinates and time, optional
/// catalogue fields, and the analysis window/taper lengths (seconds,
/// relative to the event time) used when cutting data around it.
///
/// Immutable once constructed; the constructor validates every field.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    latitude: f64,
    longitude: f64,
    time: DateTime<Utc>,
    id: Option<String>,
    magnitude: Option<f64>,
    win_start: f64,
    win_end: f64,
    taper_start: f64,
    taper_end: f64,
}

impl Event {
    /// Build an event from catalogue fields. The time string must be
    /// formatted `MM/DD/YYYY HH:MM:SS`; malformed times and out-of-range
    /// or non-finite coordinates are rejected.
    pub fn new(latitude: f64, longitude: f64, time: &str) -> Result<Self, RecoveryError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(RecoveryError::BadEvent(format!(
                "latitude {} out of range",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(RecoveryError::BadEvent(format!(
                "longitude {} out of range",
                longitude
            )));
        }
        let time = NaiveDateTime::parse_from_str(time, "%m/%d/%Y %H:%M:%S")
            .map_err(|e| {
                RecoveryError::BadEvent(format!(
                    "time '{}' is not MM/DD/YYYY HH:MM:SS: {}",
                    time, e
                ))
            })?
            .and_utc();
        Ok(Event {
            latitude,
            longitude,
            time,
            id: None,
            magnitude: None,
            win_start: 0.0,
            win_end: -1.0,
            taper_start: 10.0,
            taper_end: 10.0,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Result<Self, RecoveryError> {
        if !magnitude.is_finite() {
            return Err(RecoveryError::BadEvent("non-finite magnitude".to_string()));
        }
        self.magnitude = Some(magnitude);
        Ok(self)
    }

    /// Set the analysis window relative to the event time.
    pub fn with_window(mut self, start: f64, end: f64) -> Result<Self, RecoveryError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(RecoveryError::BadEvent("non-finite window".to_string()));
        }
        self.win_start = start;
        self.win_end = end;
        Ok(self)
    }

    pub fn with_tapers(mut self, start: f64, end: f64) -> Result<Self, RecoveryError> {
        if start < 0.0 || end < 0.0 {
            return Err(RecoveryError::BadEvent(
                "taper lengths must be non-negative".to_string(),
            ));
        }
        self.taper_start = start;
        self.taper_end = end;
        Ok(self)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn magnitude(&self) -> Option<f64> {
        self.magnitude
    }

    pub fn window(&self) -> (f64, f64) {
        (self.win_start, self.win_end)
    }

    pub fn tapers(&self) -> (f64, f64) {
        (self.taper_start, self.taper_end)
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "event {} at ({:.4}, {:.4}) {}",
            self.id.as_deref().unwrap_or("<unnamed>"),
            self.latitude,
            self.longitude,
            self.time.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        if let Some(mag) = self.magnitude {
            write!(f, " M{:.1}", mag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalogue_time_strings() {
        let event = Event::new(44.36, -103.75, "06/17/2025 08:30:15")
            .unwrap()
            .with_id("ev0001")
            .with_magnitude(2.4)
            .unwrap();
        assert_eq!(event.time().format("%Y%m%d%H%M%S").to_string(), "20250617083015");
        assert_eq!(event.id(), Some("ev0001"));
    }

    #[test]
    fn rejects_malformed_fields() {
        assert!(Event::new(44.0, -103.0, "2025-06-17 08:30:15").is_err());
        assert!(Event::new(44.0, -103.0, "not a time").is_err());
        assert!(Event::new(95.0, -103.0, "06/17/2025 08:30:15").is_err());
        assert!(Event::new(44.0, 200.0, "06/17/2025 08:30:15").is_err());
        assert!(Event::new(44.0, -103.0, "06/17/2025 08:30:15")
            .unwrap()
            .with_magnitude(f64::NAN)
            .is_err());
    }
}
