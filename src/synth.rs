use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::error::RecoveryError;
use crate::station::{Channel, SeismometerArray, StationLayout};

/// Source parameters of one injected plane/surface wave. Angles follow the
/// sky-grid convention: theta from the zenith axis, phi from east toward
/// north, both in radians.
#[derive(Debug, Clone, Copy)]
pub struct WaveSource {
    pub amplitude: f64,
    pub phi: f64,
    pub theta: f64,
    /// Hz; 0 is not supported here, use `add_white_noise` for broadband.
    pub frequency: f64,
    /// Phase offset in radians.
    pub phase: f64,
}

fn propagation_direction(phi: f64, theta: f64) -> [f64; 3] {
    [
        phi.cos() * theta.sin(),
        phi.sin() * theta.sin(),
        theta.cos(),
    ]
}

/// E/N/Z particle-motion coefficients of an S wave with polarization angle
/// psi measured from the theta-hat direction in the transverse plane.
fn polarization_coeffs(phi: f64, theta: f64, psi: f64) -> [f64; 3] {
    let theta_hat = [
        theta.cos() * phi.cos(),
        theta.cos() * phi.sin(),
        -theta.sin(),
    ];
    let phi_hat = [-phi.sin(), phi.cos(), 0.0];
    [
        psi.cos() * theta_hat[0] + psi.sin() * phi_hat[0],
        psi.cos() * theta_hat[1] + psi.sin() * phi_hat[1],
        psi.cos() * theta_hat[2] + psi.sin() * phi_hat[2],
    ]
}

/// Evaluate the delayed carrier on a station's sample clock. Delays are
/// applied in continuous time, so the injected phase is exact rather than
/// rounded to the nearest sample.
fn delayed_carrier(
    n: usize,
    sample_rate: f64,
    source: &WaveSource,
    delay: f64,
    quadrature: bool,
) -> Array1<f64> {
    let w = 2.0 * std::f64::consts::PI * source.frequency;
    Array1::from_shape_fn(n, |i| {
        let t = i as f64 / sample_rate;
        let arg = w * (t - delay) + source.phase;
        if quadrature {
            -source.amplitude * arg.sin()
        } else {
            source.amplitude * arg.cos()
        }
    })
}

fn add_polarized_wave(
    array: &mut SeismometerArray,
    layout: &StationLayout,
    source: &WaveSource,
    speed: f64,
    coeffs: [f64; 3],
) -> Result<(), RecoveryError> {
    let omega = propagation_direction(source.phi, source.theta);
    let names: Vec<String> = array.names().map(str::to_string).collect();
    for name in names {
        let x = layout.location(&name)?;
        let delay = -(omega[0] * x[0] + omega[1] * x[1] + omega[2] * x[2]) / speed;
        for (channel, coeff) in [
            (Channel::East, coeffs[0]),
            (Channel::North, coeffs[1]),
            (Channel::Vertical, coeffs[2]),
        ] {
            let trace = array
                .get_mut(&name)
                .and_then(|s| s.get_mut(channel))
                .ok_or_else(|| RecoveryError::MissingChannel {
                    station: name.clone(),
                    channel: channel.code().to_string(),
                })?;
            let carrier = delayed_carrier(trace.len(), trace.sample_rate(), source, delay, false);
            trace.add_samples(&(&carrier * coeff))?;
        }
    }
    Ok(())
}

/// Inject a plane P wave: particle motion along the propagation direction.
pub fn add_p_wave(
    array: &mut SeismometerArray,
    layout: &StationLayout,
    source: &WaveSource,
    speed: f64,
) -> Result<(), RecoveryError> {
    let coeffs = propagation_direction(source.phi, source.theta);
    add_polarized_wave(array, layout, source, speed, coeffs)
}

/// Inject a plane S wave with polarization angle `psi` in the transverse
/// plane.
pub fn add_s_wave(
    array: &mut SeismometerArray,
    layout: &StationLayout,
    source: &WaveSource,
    psi: f64,
    speed: f64,
) -> Result<(), RecoveryError> {
    let coeffs = polarization_coeffs(source.phi, source.theta, psi);
    add_polarized_wave(array, layout, source, speed, coeffs)
}

/// Inject a Rayleigh wave: horizontal motion along the propagation azimuth
/// with depth decay `alpha`, vertical motion in quadrature scaled by
/// `epsilon`.
pub fn add_r_wave(
    array: &mut SeismometerArray,
    layout: &StationLayout,
    source: &WaveSource,
    epsilon: f64,
    alpha: f64,
    speed: f64,
) -> Result<(), RecoveryError> {
    let omega = propagation_direction(source.phi, source.theta);
    let names: Vec<String> = array.names().map(str::to_string).collect();
    for name in names {
        let x = layout.location(&name)?;
        let delay = -(omega[0] * x[0] + omega[1] * x[1] + omega[2] * x[2]) / speed;
        let horizontal_scale = (-x[2] / alpha).exp();
        let vertical_scale = epsilon * (x[2] / alpha).exp();
        for (channel, coeff, quadrature) in [
            (Channel::East, source.phi.cos() * horizontal_scale, false),
            (Channel::North, source.phi.sin() * horizontal_scale, false),
            (Channel::Vertical, vertical_scale, true),
        ] {
            let trace = array
                .get_mut(&name)
                .and_then(|s| s.get_mut(channel))
                .ok_or_else(|| RecoveryError::MissingChannel {
                    station: name.clone(),
                    channel: channel.code().to_string(),
                })?;
            let carrier =
                delayed_carrier(trace.len(), trace.sample_rate(), source, delay, quadrature);
            trace.add_samples(&(&carrier * coeff))?;
        }
    }
    Ok(())
}

/// Add an independent white Gaussian noise realization of standard
/// deviation `sigma` to every channel of every station. Seeded, so a test
/// or demo run is repeatable.
pub fn add_white_noise(
    array: &mut SeismometerArray,
    sigma: f64,
    seed: u64,
) -> Result<(), RecoveryError> {
    if sigma < 0.0 || !sigma.is_finite() {
        return Err(RecoveryError::BadConfig(format!(
            "noise amplitude must be finite and non-negative, got {}",
            sigma
        )));
    }
    if sigma == 0.0 {
        return Ok(());
    }
    let normal = Normal::new(0.0, sigma)
        .map_err(|e| RecoveryError::BadConfig(format!("noise distribution: {}", e)))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let names: Vec<String> = array.names().map(str::to_string).collect();
    for name in names {
        let seismometer = array.get_mut(&name).expect("name from iteration");
        for channel in Channel::translational() {
            if let Some(trace) = seismometer.get_mut(channel) {
                let noise = Array1::from_shape_fn(trace.len(), |_| normal.sample(&mut rng));
                trace.add_samples(&noise)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::StationLayout;

    fn two_station_layout() -> StationLayout {
        let mut layout = StationLayout::new();
        layout.insert("A", [0.0, 0.0, 0.0]).unwrap();
        layout.insert("B", [600.0, -300.0, -150.0]).unwrap();
        layout
    }

    #[test]
    fn p_wave_samples_match_the_delayed_carrier() {
        let layout = two_station_layout();
        let mut array = SeismometerArray::initialize(&layout, 2.0, 100.0).unwrap();
        let source = WaveSource {
            amplitude: 1.5,
            phi: 0.9,
            theta: 1.2,
            frequency: 4.0,
            phase: 0.3,
        };
        let speed = 3000.0;
        add_p_wave(&mut array, &layout, &source, speed).unwrap();

        let omega = propagation_direction(source.phi, source.theta);
        let x = layout.get("B").unwrap();
        let delay = -(omega[0] * x[0] + omega[1] * x[1] + omega[2] * x[2]) / speed;
        let east = array.trace("B", Channel::East).unwrap();
        let w = 2.0 * std::f64::consts::PI * source.frequency;
        for i in [0usize, 17, 101] {
            let t = i as f64 / 100.0;
            let expected = omega[0] * source.amplitude * (w * (t - delay) + source.phase).cos();
            assert!((east.data()[i] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn s_wave_motion_is_transverse() {
        let layout = two_station_layout();
        let mut array = SeismometerArray::initialize(&layout, 2.0, 100.0).unwrap();
        let source = WaveSource {
            amplitude: 1.0,
            phi: 2.1,
            theta: 0.7,
            frequency: 3.0,
            phase: 0.0,
        };
        add_s_wave(&mut array, &layout, &source, 0.6, 3000.0).unwrap();

        let omega = propagation_direction(source.phi, source.theta);
        let e = array.trace("A", Channel::East).unwrap().data().to_owned();
        let n = array.trace("A", Channel::North).unwrap().data().to_owned();
        let z = array.trace("A", Channel::Vertical).unwrap().data().to_owned();
        for i in 0..e.len() {
            let along = e[i] * omega[0] + n[i] * omega[1] + z[i] * omega[2];
            assert!(along.abs() < 1e-12, "sample {} moves along the ray", i);
        }
    }

    #[test]
    fn rayleigh_vertical_is_in_quadrature_at_the_surface() {
        let layout = two_station_layout();
        let mut array = SeismometerArray::initialize(&layout, 2.0, 100.0).unwrap();
        let source = WaveSource {
            amplitude: 1.0,
            phi: 0.0,
            theta: std::f64::consts::FRAC_PI_2,
            frequency: 2.0,
            phase: 0.0,
        };
        let epsilon = 0.4;
        add_r_wave(&mut array, &layout, &source, epsilon, 1000.0, 200.0).unwrap();

        // Station A sits at the surface and at the origin: no delay, no
        // depth scaling. East rides the cosine, vertical the shifted sine.
        let east = array.trace("A", Channel::East).unwrap();
        let z = array.trace("A", Channel::Vertical).unwrap();
        let w = 2.0 * std::f64::consts::PI * source.frequency;
        for i in [3usize, 40, 77] {
            let t = i as f64 / 100.0;
            assert!((east.data()[i] - (w * t).cos()).abs() < 1e-12);
            assert!((z.data()[i] + epsilon * (w * t).sin()).abs() < 1e-12);
        }
    }

    #[test]
    fn white_noise_is_repeatable_per_seed() {
        let layout = two_station_layout();
        let mut a = SeismometerArray::initialize(&layout, 1.0, 100.0).unwrap();
        let mut b = SeismometerArray::initialize(&layout, 1.0, 100.0).unwrap();
        add_white_noise(&mut a, 0.5, 42).unwrap();
        add_white_noise(&mut b, 0.5, 42).unwrap();
        let ta = a.trace("A", Channel::North).unwrap();
        let tb = b.trace("A", Channel::North).unwrap();
        assert_eq!(ta.data().to_vec(), tb.data().to_vec());

        let mut c = SeismometerArray::initialize(&layout, 1.0, 100.0).unwrap();
        add_white_noise(&mut c, 0.5, 43).unwrap();
        let tc = c.trace("A", Channel::North).unwrap();
        assert_ne!(ta.data().to_vec(), tc.data().to_vec());
    }
}
