use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use ndarray::prelude::*;
use num_complex::Complex;

use crate::csd::{cross_spectrum, BinSelection, CsdConfig};
use crate::error::RecoveryError;
use crate::orf::{directional_response, AngularGrid, WaveType};
use crate::solver::{lsqr, SolveStatus, SolverOptions};
use crate::station::{Channel, SeismometerArray, StationLayout};

type C64 = Complex<f64>;

/// Full configuration of one inversion call. Everything is passed by value
/// per call; the core keeps no state between calls.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Analysis frequency in Hz.
    pub frequency: f64,
    /// Wave types recovered jointly; their order fixes the block order of
    /// the stacked design vector and of the returned maps.
    pub wave_types: Vec<WaveType>,
    /// Channel subset used for pairing.
    pub channels: Vec<Channel>,
    /// Include the degenerate same-station, same-channel pair.
    pub autocorrelations: bool,
    /// Sky-grid override; `None` lets the first design-vector computation
    /// establish the default grid.
    pub grid: Option<AngularGrid>,
    pub csd: CsdConfig,
    pub bin_selection: BinSelection,
    pub solver: SolverOptions,
}

impl RecoveryConfig {
    pub fn new(frequency: f64, wave_types: Vec<WaveType>) -> Self {
        RecoveryConfig {
            frequency,
            wave_types,
            channels: Channel::translational(),
            autocorrelations: true,
            grid: None,
            csd: CsdConfig::default(),
            bin_selection: BinSelection::Nearest,
            solver: SolverOptions::default(),
        }
    }
}

/// One qualifying (station-pair, channel-pair) combination, as indices into
/// the station and channel orderings of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairKey {
    pub station_a: usize,
    pub station_b: usize,
    pub chan_a: usize,
    pub chan_b: usize,
}

/// Enumerate every unordered station pair and unordered channel pair
/// exactly once: station pair (i, j) only for j >= i, channel pair (k, l)
/// only for l >= k. The degenerate same-station, same-channel combination
/// is kept only when `autocorrelations` is set; the flag applies uniformly,
/// whatever wave types are being recovered.
pub fn qualifying_pairs(
    n_stations: usize,
    n_channels: usize,
    autocorrelations: bool,
) -> Vec<PairKey> {
    let mut pairs = Vec::new();
    for ii in 0..n_stations {
        for jj in ii..n_stations {
            for kk in 0..n_channels {
                for ll in kk..n_channels {
                    if !autocorrelations && ii == jj && kk == ll {
                        continue;
                    }
                    pairs.push(PairKey {
                        station_a: ii,
                        station_b: jj,
                        chan_a: kk,
                        chan_b: ll,
                    });
                }
            }
        }
    }
    pairs
}

/// Tag and 2D shape of one block of the stacked design vector; the reshaper
/// uses the recorded layout to slice the solution back apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    pub tag: &'static str,
    pub shape: (usize, usize),
}

/// Flattened, vertically stacked design vector ("gamma") for one station
/// pair and channel pair, covering every requested wave type in caller
/// order. The grid used is returned so the first call of a run establishes
/// the grid all later calls receive back.
pub fn stacked_gamma(
    wave_types: &[WaveType],
    e1: [f64; 3],
    e2: [f64; 3],
    x1: [f64; 3],
    x2: [f64; 3],
    frequency: f64,
    grid: Option<&AngularGrid>,
) -> (Array1<C64>, Vec<BlockLayout>, AngularGrid) {
    let mut established = grid.cloned();
    let mut stacked: Vec<C64> = Vec::new();
    let mut blocks = Vec::new();
    for wave in wave_types {
        let (arrays, used) =
            directional_response(*wave, e1, e2, x1, x2, frequency, established.as_ref());
        if established.is_none() {
            established = Some(used);
        }
        for (array, tag) in arrays.into_iter().zip(wave.tags()) {
            blocks.push(BlockLayout {
                tag,
                shape: array.dim(),
            });
            stacked.extend(array.iter().copied());
        }
    }
    (
        Array1::from_vec(stacked),
        blocks,
        established.expect("at least one wave type"),
    )
}

/// Incrementally accumulated normal-equations system. Single-writer: one
/// accumulator per inversion call, folded sequentially over the qualifying
/// pairs; the sums are commutative up to floating-point summation order.
#[derive(Debug, Clone)]
pub struct NormalEquations {
    gram: Array2<C64>,
    rhs: Array1<C64>,
}

impl NormalEquations {
    pub fn new(n: usize) -> Self {
        NormalEquations {
            gram: Array2::zeros((n, n)),
            rhs: Array1::zeros(n),
        }
    }

    pub fn dim(&self) -> usize {
        self.rhs.len()
    }

    /// Fold one pair into the system:
    /// Gram += conj(gamma) . gamma^T, RHS += conj(gamma) * cross.
    /// The Gram matrix stays Hermitian by construction.
    pub fn accumulate(&mut self, gamma: &Array1<C64>, cross: C64) -> Result<(), RecoveryError> {
        let n = self.rhs.len();
        if gamma.len() != n {
            return Err(RecoveryError::ShapeMismatch {
                expected: n,
                actual: gamma.len(),
            });
        }
        for i in 0..n {
            let cg = gamma[i].conj();
            self.rhs[i] += cg * cross;
            for j in 0..n {
                self.gram[[i, j]] += cg * gamma[j];
            }
        }
        Ok(())
    }

    pub fn gram(&self) -> ArrayView2<C64> {
        self.gram.view()
    }

    pub fn rhs(&self) -> ArrayView1<C64> {
        self.rhs.view()
    }

    /// Real projection of the system handed to the solver. The imaginary
    /// residual is discarded by design.
    pub fn real_system(&self) -> (DMatrix<f64>, DVector<f64>) {
        let n = self.rhs.len();
        let gram = DMatrix::from_fn(n, n, |i, j| self.gram[[i, j]].re);
        let rhs = DVector::from_iterator(n, self.rhs.iter().map(|v| v.re));
        (gram, rhs)
    }
}

/// Solver termination diagnostics for one inversion call.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub iterations: usize,
    pub residual_norm: f64,
    /// Residual norm relative to the right-hand-side norm.
    pub relative_residual: f64,
}

/// Recovered amplitude map over the sky grid for one wave-type tag.
/// Created as output only; immutable once returned.
#[derive(Debug, Clone)]
pub struct RecoveryMap {
    data: Array2<f64>,
    grid: AngularGrid,
    tag: String,
}

impl RecoveryMap {
    pub fn new(
        data: Array2<f64>,
        grid: AngularGrid,
        tag: impl Into<String>,
    ) -> Result<Self, RecoveryError> {
        if data.dim() != grid.shape() {
            return Err(RecoveryError::BadConfig(format!(
                "map shape {:?} does not match grid shape {:?}",
                data.dim(),
                grid.shape()
            )));
        }
        Ok(RecoveryMap {
            data,
            grid,
            tag: tag.into(),
        })
    }

    pub fn data(&self) -> ArrayView2<f64> {
        self.data.view()
    }

    pub fn grid(&self) -> &AngularGrid {
        &self.grid
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// (theta, phi, value) of the largest map cell.
    pub fn peak(&self) -> (f64, f64, f64) {
        let mut best = (0, 0);
        let mut best_val = f64::NEG_INFINITY;
        for ((i, j), &v) in self.data.indexed_iter() {
            if v > best_val {
                best_val = v;
                best = (i, j);
            }
        }
        (
            self.grid.thetas()[best.0],
            self.grid.phis()[best.1],
            best_val,
        )
    }
}

/// Everything one inversion call returns: per-tag maps, the grid they share
/// and the solver diagnostics.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    pub maps: BTreeMap<String, RecoveryMap>,
    pub grid: AngularGrid,
    pub report: SolveReport,
}

/// Slice the flat solution vector back into per-wave-type blocks in the
/// order used during assembly, reshape each to its grid shape and label it.
/// A mismatch between the block layout and the solution length means the
/// caller passed inconsistent wave-type/grid lists and is fatal.
pub fn package_maps(
    solution: &[f64],
    blocks: &[BlockLayout],
    grid: &AngularGrid,
) -> Result<BTreeMap<String, RecoveryMap>, RecoveryError> {
    let total: usize = blocks.iter().map(|b| b.shape.0 * b.shape.1).sum();
    if total != solution.len() {
        return Err(RecoveryError::ShapeMismatch {
            expected: total,
            actual: solution.len(),
        });
    }
    let mut maps = BTreeMap::new();
    let mut offset = 0;
    for block in blocks {
        let len = block.shape.0 * block.shape.1;
        let data = Array2::from_shape_vec(block.shape, solution[offset..offset + len].to_vec())
            .expect("block length matches shape");
        offset += len;
        let map = RecoveryMap::new(data, grid.clone(), block.tag)?;
        if maps.insert(block.tag.to_string(), map).is_some() {
            return Err(RecoveryError::BadConfig(format!(
                "duplicate wave-type tag '{}'",
                block.tag
            )));
        }
    }
    Ok(maps)
}

/// Run one full inversion: estimate cross-spectra for every qualifying
/// pair, accumulate the normal equations, solve their real projection and
/// package the per-direction maps.
pub fn recover(
    array: &SeismometerArray,
    layout: &StationLayout,
    cfg: &RecoveryConfig,
) -> Result<RecoveryOutcome, RecoveryError> {
    if cfg.wave_types.is_empty() {
        return Err(RecoveryError::BadConfig(
            "at least one wave type is required".to_string(),
        ));
    }
    if cfg.channels.is_empty() {
        return Err(RecoveryError::BadConfig(
            "at least one channel is required".to_string(),
        ));
    }
    let mut seen_tags: Vec<&str> = Vec::new();
    for wave in &cfg.wave_types {
        for tag in wave.tags() {
            if seen_tags.contains(tag) {
                return Err(RecoveryError::BadConfig(format!(
                    "wave-type tag '{}' requested more than once",
                    tag
                )));
            }
            seen_tags.push(*tag);
        }
    }
    if array.is_empty() {
        return Err(RecoveryError::BadConfig(
            "seismometer array is empty".to_string(),
        ));
    }

    let stations: Vec<&str> = array.names().collect();
    // Resolve every location up front so a missing station fails before any
    // spectral work.
    let locations: Vec<[f64; 3]> = stations
        .iter()
        .map(|name| layout.location(name))
        .collect::<Result<_, _>>()?;

    let pairs = qualifying_pairs(stations.len(), cfg.channels.len(), cfg.autocorrelations);
    if pairs.is_empty() {
        return Err(RecoveryError::BadConfig(
            "no qualifying station/channel pairs".to_string(),
        ));
    }

    let mut established = cfg.grid.clone();
    let mut blocks: Option<Vec<BlockLayout>> = None;
    let mut system: Option<NormalEquations> = None;

    for pair in &pairs {
        let chan_a = cfg.channels[pair.chan_a];
        let chan_b = cfg.channels[pair.chan_b];
        let trace_a = array.trace(stations[pair.station_a], chan_a)?;
        let trace_b = array.trace(stations[pair.station_b], chan_b)?;

        let spectrum = cross_spectrum(trace_a, trace_b, &cfg.csd)?;
        let p12 = spectrum.value_at(cfg.frequency, cfg.bin_selection)?;

        let (gamma, pair_blocks, grid) = stacked_gamma(
            &cfg.wave_types,
            chan_a.unit_vector(),
            chan_b.unit_vector(),
            locations[pair.station_a],
            locations[pair.station_b],
            cfg.frequency,
            established.as_ref(),
        );
        if established.is_none() {
            established = Some(grid);
        }
        if blocks.is_none() {
            blocks = Some(pair_blocks);
        }

        system
            .get_or_insert_with(|| NormalEquations::new(gamma.len()))
            .accumulate(&gamma, p12)?;
    }

    let system = system.expect("pair list is non-empty");
    let blocks = blocks.expect("pair list is non-empty");
    let grid = established.expect("pair list is non-empty");

    let (gram, rhs) = system.real_system();
    let rhs_norm = rhs.norm();
    let solution = lsqr(&gram, &rhs, &cfg.solver);
    if solution.status == SolveStatus::IterationLimit {
        eprintln!(
            "#WARN: recovery solver stopped at the iteration cap ({}) with residual {:.3e}; using the best-effort map",
            solution.iterations, solution.residual_norm
        );
    }

    let report = SolveReport {
        status: solution.status,
        iterations: solution.iterations,
        residual_norm: solution.residual_norm,
        relative_residual: if rhs_norm > 0.0 {
            solution.residual_norm / rhs_norm
        } else {
            0.0
        },
    };

    let maps = package_maps(solution.x.as_slice(), &blocks, &grid)?;
    Ok(RecoveryOutcome { maps, grid, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth;

    #[test]
    fn unordered_pairs_are_visited_exactly_once() {
        // 3 stations x 2 channels, autocorrelations excluded: 6 station
        // pairs x 3 channel pairs minus the 6 degenerate combinations.
        let pairs = qualifying_pairs(3, 2, false);
        assert_eq!(pairs.len(), 12);
        let mut seen = Vec::new();
        for p in &pairs {
            assert!(p.station_b >= p.station_a);
            assert!(p.chan_b >= p.chan_a);
            assert!(!(p.station_a == p.station_b && p.chan_a == p.chan_b));
            assert!(!seen.contains(p), "pair revisited: {:?}", p);
            seen.push(*p);
        }

        let with_auto = qualifying_pairs(3, 2, true);
        assert_eq!(with_auto.len(), 18);
    }

    #[test]
    fn accumulated_gram_is_hermitian() {
        let mut system = NormalEquations::new(4);
        let gammas = [
            array![
                C64::new(1.0, 0.5),
                C64::new(-0.3, 0.2),
                C64::new(0.0, -1.1),
                C64::new(0.7, 0.0)
            ],
            array![
                C64::new(0.2, -0.9),
                C64::new(1.4, 0.1),
                C64::new(-0.5, 0.3),
                C64::new(0.0, 0.8)
            ],
        ];
        for (i, g) in gammas.iter().enumerate() {
            system
                .accumulate(g, C64::new(0.3 * (i as f64 + 1.0), -0.1))
                .unwrap();
        }
        assert_eq!(system.dim(), 4);
        assert_eq!(system.rhs().len(), 4);
        let gram = system.gram();
        for i in 0..4 {
            for j in 0..4 {
                let delta = gram[[i, j]] - gram[[j, i]].conj();
                assert!(delta.norm() < 1e-12);
            }
        }
    }

    #[test]
    fn accumulate_rejects_mismatched_gamma() {
        let mut system = NormalEquations::new(3);
        let gamma = array![C64::new(1.0, 0.0), C64::new(2.0, 0.0)];
        assert!(matches!(
            system.accumulate(&gamma, C64::new(1.0, 0.0)),
            Err(RecoveryError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn reshape_round_trips_known_blocks_in_any_order() {
        let grid = AngularGrid::with_step_deg(45.0);
        let (nt, np) = grid.shape();
        let cells = nt * np;

        let block_p: Vec<f64> = (0..cells).map(|i| i as f64).collect();
        let block_r: Vec<f64> = (0..cells).map(|i| 1000.0 + i as f64).collect();

        for order in [["p", "rayleigh"], ["rayleigh", "p"]] {
            let blocks: Vec<BlockLayout> = order
                .iter()
                .map(|tag| BlockLayout {
                    tag: *tag,
                    shape: (nt, np),
                })
                .collect();
            let mut solution = Vec::new();
            for tag in order {
                solution.extend(if tag == "p" { &block_p } else { &block_r });
            }
            let maps = package_maps(&solution, &blocks, &grid).unwrap();
            assert_eq!(maps["p"].data().iter().copied().collect::<Vec<_>>(), block_p);
            assert_eq!(
                maps["rayleigh"].data().iter().copied().collect::<Vec<_>>(),
                block_r
            );
        }
    }

    #[test]
    fn reshape_mismatch_is_fatal() {
        let grid = AngularGrid::with_step_deg(45.0);
        let (nt, np) = grid.shape();
        let blocks = vec![BlockLayout {
            tag: "p",
            shape: (nt, np),
        }];
        let short = vec![0.0; nt * np - 1];
        assert!(matches!(
            package_maps(&short, &blocks, &grid),
            Err(RecoveryError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn stacked_calls_reuse_the_established_grid() {
        let waves = [
            WaveType::P { speed: 5700.0 },
            WaveType::S { speed: 3000.0 },
        ];
        let e = [1.0, 0.0, 0.0];
        let x1 = [0.0, 0.0, 0.0];
        let x2 = [400.0, 250.0, -100.0];

        let (gamma0, blocks0, grid0) = stacked_gamma(&waves, e, e, x1, x2, 1.0, None);
        assert_eq!(blocks0.len(), 3);
        for repeat in 0..3 {
            let (gamma, blocks, grid) =
                stacked_gamma(&waves, e, e, x1, x2, 1.0, Some(&grid0));
            assert!(grid.same_angles(&grid0), "grid drifted on call {}", repeat);
            assert_eq!(gamma.len(), gamma0.len());
            assert_eq!(blocks, blocks0);
        }
    }

    #[test]
    fn pure_p_wave_recovers_direction_and_power() {
        let layout = StationLayout::demo_array();
        let sample_rate = 100.0;
        let duration = 16.0;
        let frequency = 5.0;
        let amplitude = 2.0;
        let speed = 3000.0;

        // Injected direction sits exactly on a 45-degree grid point.
        let grid = AngularGrid::with_step_deg(45.0);
        let theta = 67.5f64.to_radians();
        let phi = 112.5f64.to_radians();

        let mut array = SeismometerArray::initialize(&layout, duration, sample_rate).unwrap();
        let source = synth::WaveSource {
            amplitude,
            phi,
            theta,
            frequency,
            phase: 0.0,
        };
        synth::add_p_wave(&mut array, &layout, &source, speed).unwrap();

        let mut cfg = RecoveryConfig::new(frequency, vec![WaveType::P { speed }]);
        cfg.grid = Some(grid);
        cfg.solver = SolverOptions {
            iter_lim: 5000,
            atol: 1e-10,
            btol: 1e-10,
        };

        let outcome = recover(&array, &layout, &cfg).unwrap();
        let map = &outcome.maps["p"];
        let (peak_theta, peak_phi, peak_value) = map.peak();

        let step = 45.0f64.to_radians();
        assert!(
            (peak_theta - theta).abs() <= step + 1e-9,
            "peak theta {:.1} deg",
            peak_theta.to_degrees()
        );
        assert!(
            (peak_phi - phi).abs() <= step + 1e-9,
            "peak phi {:.1} deg",
            peak_phi.to_degrees()
        );

        // A sinusoid of amplitude A carries power A^2/2.
        let injected_power = amplitude * amplitude / 2.0;
        assert!(
            (peak_value - injected_power).abs() / injected_power < 0.1,
            "peak value {} vs injected {}",
            peak_value,
            injected_power
        );
        assert!(outcome.report.relative_residual < 1e-3);
    }

    #[test]
    fn missing_station_fails_before_any_spectral_work() {
        let mut layout = StationLayout::new();
        layout.insert("ONLY", [0.0, 0.0, 0.0]).unwrap();
        let array =
            SeismometerArray::initialize(&StationLayout::demo_array(), 4.0, 100.0).unwrap();
        let cfg = RecoveryConfig::new(5.0, vec![WaveType::P { speed: 5700.0 }]);
        assert!(matches!(
            recover(&array, &layout, &cfg),
            Err(RecoveryError::MissingStation(_))
        ));
    }

    #[test]
    fn duplicate_wave_types_are_rejected() {
        let layout = StationLayout::demo_array();
        let array = SeismometerArray::initialize(&layout, 4.0, 100.0).unwrap();
        let cfg = RecoveryConfig::new(
            5.0,
            vec![WaveType::P { speed: 5700.0 }, WaveType::P { speed: 3000.0 }],
        );
        assert!(matches!(
            recover(&array, &layout, &cfg),
            Err(RecoveryError::BadConfig(_))
        ));
    }
}
