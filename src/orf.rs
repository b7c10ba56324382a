use ndarray::prelude::*;
use num_complex::Complex;

use crate::error::RecoveryError;

type C64 = Complex<f64>;

/// Discretized sky over which directional sensitivity and recovery are
/// computed: ordered polar angles (theta, from the zenith axis) and azimuth
/// angles (phi, from east toward north), both in radians.
///
/// The grid established by the first design-vector computation of an
/// inversion run is authoritative for the rest of that run.
#[derive(Debug, Clone)]
pub struct AngularGrid {
    thetas: Array1<f64>,
    phis: Array1<f64>,
}

impl AngularGrid {
    pub fn new(thetas: Array1<f64>, phis: Array1<f64>) -> Result<Self, RecoveryError> {
        if thetas.is_empty() || phis.is_empty() {
            return Err(RecoveryError::BadConfig(
                "angular grid must have at least one polar and one azimuth angle".to_string(),
            ));
        }
        if thetas.iter().chain(phis.iter()).any(|v| !v.is_finite()) {
            return Err(RecoveryError::BadConfig(
                "angular grid contains a non-finite angle".to_string(),
            ));
        }
        Ok(AngularGrid { thetas, phis })
    }

    /// Cell-centered grid with the given step in degrees: polar angles
    /// step/2..180, azimuths step/2..360.
    pub fn with_step_deg(step_deg: f64) -> Self {
        let make = |stop: f64| {
            let mut v = Vec::new();
            let mut a = step_deg / 2.0;
            while a < stop {
                v.push(a.to_radians());
                a += step_deg;
            }
            Array1::from_vec(v)
        };
        AngularGrid {
            thetas: make(180.0),
            phis: make(360.0),
        }
    }

    /// The default 6-degree sky grid.
    pub fn default_grid() -> Self {
        AngularGrid::with_step_deg(6.0)
    }

    pub fn thetas(&self) -> ArrayView1<f64> {
        self.thetas.view()
    }

    pub fn phis(&self) -> ArrayView1<f64> {
        self.phis.view()
    }

    /// (polar, azimuth) extent; also the shape of every map computed on
    /// this grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.thetas.len(), self.phis.len())
    }

    pub fn cells(&self) -> usize {
        self.thetas.len() * self.phis.len()
    }

    pub fn same_angles(&self, other: &AngularGrid) -> bool {
        self.thetas == other.thetas && self.phis == other.phis
    }
}

/// Wave-type descriptor carrying the propagation parameters needed to
/// compute its directional response. S-waves decompose into two orthogonal
/// transverse polarizations and therefore contribute two design blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaveType {
    P {
        speed: f64,
    },
    S {
        speed: f64,
    },
    Rayleigh {
        speed: f64,
        /// Vertical-to-horizontal amplitude ratio.
        epsilon: f64,
        /// Depth-decay length in meters.
        alpha: f64,
    },
}

impl WaveType {
    pub fn speed(&self) -> f64 {
        match *self {
            WaveType::P { speed } => speed,
            WaveType::S { speed } => speed,
            WaveType::Rayleigh { speed, .. } => speed,
        }
    }

    /// Map tags contributed by this wave type, in block order.
    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            WaveType::P { .. } => &["p"],
            WaveType::S { .. } => &["s1", "s2"],
            WaveType::Rayleigh { .. } => &["rayleigh"],
        }
    }

    pub fn block_count(&self) -> usize {
        self.tags().len()
    }
}

fn dot3(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Unit propagation direction for sky cell (theta, phi).
fn direction(theta: f64, phi: f64) -> [f64; 3] {
    [
        phi.cos() * theta.sin(),
        phi.sin() * theta.sin(),
        theta.cos(),
    ]
}

/// Baseline phase factor e^{2 pi i f (omega . (x2 - x1)) / v}.
fn baseline_phase(omega: [f64; 3], x1: [f64; 3], x2: [f64; 3], speed: f64, frequency: f64) -> C64 {
    let dx = [x2[0] - x1[0], x2[1] - x1[1], x2[2] - x1[2]];
    let arg = 2.0 * std::f64::consts::PI * frequency * dot3(omega, dx) / speed;
    C64::from_polar(1.0, arg)
}

/// Directional sensitivity of a channel pair to a P wave (particle motion
/// along the propagation direction), per sky cell.
pub fn orf_p_directional(
    e1: [f64; 3],
    e2: [f64; 3],
    x1: [f64; 3],
    x2: [f64; 3],
    speed: f64,
    frequency: f64,
    grid: &AngularGrid,
) -> Array2<C64> {
    let (nt, np) = grid.shape();
    Array2::from_shape_fn((nt, np), |(i, j)| {
        let omega = direction(grid.thetas[i], grid.phis[j]);
        let phase = baseline_phase(omega, x1, x2, speed, frequency);
        dot3(e1, omega) * dot3(e2, omega) * phase
    })
}

/// Directional sensitivity to an S wave, one array per transverse
/// polarization (theta-hat and phi-hat).
pub fn orf_s_directional(
    e1: [f64; 3],
    e2: [f64; 3],
    x1: [f64; 3],
    x2: [f64; 3],
    speed: f64,
    frequency: f64,
    grid: &AngularGrid,
) -> (Array2<C64>, Array2<C64>) {
    let (nt, np) = grid.shape();
    let mut g1 = Array2::<C64>::zeros((nt, np));
    let mut g2 = Array2::<C64>::zeros((nt, np));
    for i in 0..nt {
        let theta = grid.thetas[i];
        for j in 0..np {
            let phi = grid.phis[j];
            let omega = direction(theta, phi);
            let theta_hat = [
                theta.cos() * phi.cos(),
                theta.cos() * phi.sin(),
                -theta.sin(),
            ];
            let phi_hat = [-phi.sin(), phi.cos(), 0.0];
            let phase = baseline_phase(omega, x1, x2, speed, frequency);
            g1[[i, j]] = dot3(e1, theta_hat) * dot3(e2, theta_hat) * phase;
            g2[[i, j]] = dot3(e1, phi_hat) * dot3(e2, phi_hat) * phase;
        }
    }
    (g1, g2)
}

/// Per-station Rayleigh response of one channel: horizontal motion along
/// the propagation azimuth decaying with depth, vertical motion in
/// quadrature with the inverse depth scaling.
fn rayleigh_response(e: [f64; 3], x: [f64; 3], phi: f64, epsilon: f64, alpha: f64) -> C64 {
    let horizontal = (-x[2] / alpha).exp() * (phi.cos() * e[0] + phi.sin() * e[1]);
    let vertical = epsilon * (x[2] / alpha).exp() * e[2];
    C64::new(horizontal, vertical)
}

/// Directional sensitivity to a Rayleigh wave.
pub fn orf_r_directional(
    e1: [f64; 3],
    e2: [f64; 3],
    x1: [f64; 3],
    x2: [f64; 3],
    epsilon: f64,
    alpha: f64,
    speed: f64,
    frequency: f64,
    grid: &AngularGrid,
) -> Array2<C64> {
    let (nt, np) = grid.shape();
    Array2::from_shape_fn((nt, np), |(i, j)| {
        let theta = grid.thetas[i];
        let phi = grid.phis[j];
        let omega = direction(theta, phi);
        let phase = baseline_phase(omega, x1, x2, speed, frequency);
        let h1 = rayleigh_response(e1, x1, phi, epsilon, alpha);
        let h2 = rayleigh_response(e2, x2, phi, epsilon, alpha);
        h1.conj() * h2 * phase
    })
}

/// Compute the directional sensitivity array(s) of one wave type for a
/// channel pair and station pair. Passing `None` for the grid computes the
/// default sky grid; the grid actually used is returned so the first call
/// of an inversion run can establish the grid every later call must reuse.
pub fn directional_response(
    wave: WaveType,
    e1: [f64; 3],
    e2: [f64; 3],
    x1: [f64; 3],
    x2: [f64; 3],
    frequency: f64,
    grid: Option<&AngularGrid>,
) -> (Vec<Array2<C64>>, AngularGrid) {
    let grid = grid.cloned().unwrap_or_else(AngularGrid::default_grid);
    let blocks = match wave {
        WaveType::P { speed } => {
            vec![orf_p_directional(e1, e2, x1, x2, speed, frequency, &grid)]
        }
        WaveType::S { speed } => {
            let (g1, g2) = orf_s_directional(e1, e2, x1, x2, speed, frequency, &grid);
            vec![g1, g2]
        }
        WaveType::Rayleigh {
            speed,
            epsilon,
            alpha,
        } => vec![orf_r_directional(
            e1, e2, x1, x2, epsilon, alpha, speed, frequency, &grid,
        )],
    };
    (blocks, grid)
}
