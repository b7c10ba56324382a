use crate::error::RecoveryError;
use crate::trace::Trace;

/// One orthogonal sensing direction of a three-component seismometer.
///
/// Radial/Transverse are the horizontal components rotated to a bearing
/// (degrees clockwise from north), as produced by an R/T rotation of the
/// East/North pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Channel {
    East,
    North,
    Vertical,
    Radial { bearing_deg: f64 },
    Transverse { bearing_deg: f64 },
}

impl Channel {
    /// Unit vector of the sensing direction in the array frame
    /// (x = east, y = north, z = up).
    pub fn unit_vector(&self) -> [f64; 3] {
        match *self {
            Channel::East => [1.0, 0.0, 0.0],
            Channel::North => [0.0, 1.0, 0.0],
            Channel::Vertical => [0.0, 0.0, 1.0],
            Channel::Radial { bearing_deg } => {
                let b = bearing_deg.to_radians();
                [b.sin(), b.cos(), 0.0]
            }
            Channel::Transverse { bearing_deg } => {
                let b = bearing_deg.to_radians();
                [b.cos(), -b.sin(), 0.0]
            }
        }
    }

    /// Channel code used for display and trace naming.
    pub fn code(&self) -> &'static str {
        match self {
            Channel::East => "HHE",
            Channel::North => "HHN",
            Channel::Vertical => "HHZ",
            Channel::Radial { .. } => "HHR",
            Channel::Transverse { .. } => "HHT",
        }
    }

    /// Parse a channel code. Accepts the long seismometer codes
    /// (HHE/HHN/HHZ) and single-letter shorthand (e/n/z).
    pub fn parse(code: &str) -> Result<Channel, RecoveryError> {
        match code.to_ascii_uppercase().as_str() {
            "HHE" | "E" => Ok(Channel::East),
            "HHN" | "N" => Ok(Channel::North),
            "HHZ" | "Z" => Ok(Channel::Vertical),
            other => Err(RecoveryError::BadConfig(format!(
                "unknown channel code '{}'",
                other
            ))),
        }
    }

    /// The default translational channel set used for recovery.
    pub fn translational() -> Vec<Channel> {
        vec![Channel::East, Channel::North, Channel::Vertical]
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Insertion-ordered mapping from station name to a 3D location vector
/// (meters, array-frame coordinates). The iteration order is stable for the
/// lifetime of the value, which is what ties matrix row/column bookkeeping
/// together during one inversion run.
#[derive(Debug, Clone, Default)]
pub struct StationLayout {
    entries: Vec<(String, [f64; 3])>,
}

impl StationLayout {
    pub fn new() -> Self {
        StationLayout {
            entries: Vec::new(),
        }
    }

    /// Insert or replace a station. Non-finite coordinates are rejected.
    pub fn insert(&mut self, name: &str, location: [f64; 3]) -> Result<(), RecoveryError> {
        if location.iter().any(|c| !c.is_finite()) {
            return Err(RecoveryError::BadConfig(format!(
                "station '{}' has a non-finite coordinate",
                name
            )));
        }
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = location;
        } else {
            self.entries.push((name.to_string(), location));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<[f64; 3]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, loc)| *loc)
    }

    /// Location lookup that treats a missing station as a configuration
    /// error.
    pub fn location(&self, name: &str) -> Result<[f64; 3], RecoveryError> {
        self.get(name)
            .ok_or_else(|| RecoveryError::MissingStation(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A small built-in underground array used by the demo binary and the
    /// end-to-end tests. Locations are in meters; z is positive up, so the
    /// buried stations carry negative depths.
    pub fn demo_array() -> Self {
        let mut layout = StationLayout::new();
        for (name, loc) in [
            ("YATES", [0.0, 0.0, 0.0]),
            ("ROSS", [710.0, -320.0, -240.0]),
            ("ORO", [-430.0, 640.0, -370.0]),
            ("DEAD", [290.0, 520.0, -150.0]),
            ("LEAD", [-260.0, -450.0, -490.0]),
        ] {
            layout.insert(name, loc).expect("demo layout is finite");
        }
        layout
    }
}

/// Per-station channel data: the traces recorded (or synthesized) on each
/// sensing direction of one seismometer.
#[derive(Debug, Clone, Default)]
pub struct Seismometer {
    channels: Vec<(Channel, Trace)>,
}

impl Seismometer {
    pub fn new() -> Self {
        Seismometer {
            channels: Vec::new(),
        }
    }

    pub fn set(&mut self, channel: Channel, trace: Trace) {
        if let Some(entry) = self.channels.iter_mut().find(|(c, _)| *c == channel) {
            entry.1 = trace;
        } else {
            self.channels.push((channel, trace));
        }
    }

    pub fn get(&self, channel: Channel) -> Option<&Trace> {
        self.channels
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, t)| t)
    }

    pub fn get_mut(&mut self, channel: Channel) -> Option<&mut Trace> {
        self.channels
            .iter_mut()
            .find(|(c, _)| *c == channel)
            .map(|(_, t)| t)
    }

    pub fn channels(&self) -> impl Iterator<Item = (Channel, &Trace)> {
        self.channels.iter().map(|(c, t)| (*c, t))
    }
}

/// Ordered collection of seismometers keyed by station name. Station order
/// is insertion order and stays stable within one inversion run.
#[derive(Debug, Clone, Default)]
pub struct SeismometerArray {
    entries: Vec<(String, Seismometer)>,
}

impl SeismometerArray {
    pub fn new() -> Self {
        SeismometerArray {
            entries: Vec::new(),
        }
    }

    /// Zero-filled three-component array over every station of a layout,
    /// ready for signal injection.
    pub fn initialize(
        layout: &StationLayout,
        duration: f64,
        sample_rate: f64,
    ) -> Result<Self, RecoveryError> {
        let nsamp = (duration * sample_rate).round() as usize;
        let mut array = SeismometerArray::new();
        for name in layout.names() {
            let mut seismometer = Seismometer::new();
            for channel in Channel::translational() {
                let trace = Trace::zeros(nsamp, sample_rate, 0.0, format!("{} {}", name, channel))?;
                seismometer.set(channel, trace);
            }
            array.insert(name, seismometer);
        }
        Ok(array)
    }

    pub fn insert(&mut self, name: &str, seismometer: Seismometer) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = seismometer;
        } else {
            self.entries.push((name.to_string(), seismometer));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Seismometer> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Seismometer> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    /// Trace lookup that treats a missing station or channel as a
    /// configuration error.
    pub fn trace(&self, station: &str, channel: Channel) -> Result<&Trace, RecoveryError> {
        let seismometer = self
            .get(station)
            .ok_or_else(|| RecoveryError::MissingStation(station.to_string()))?;
        seismometer
            .get(channel)
            .ok_or_else(|| RecoveryError::MissingChannel {
                station: station.to_string(),
                channel: channel.code().to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
