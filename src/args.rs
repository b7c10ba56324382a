use clap::Parser;

/// Demo driver options: synthesize a wave on the built-in array and run the
/// directional recovery at one analysis frequency.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "seisrec",
    version,
    about = "Directional recovery of seismic wavefields from array cross-spectra"
)]
pub struct Args {
    /// Wave types to recover jointly, comma separated: p, s, rayleigh.
    #[arg(long, aliases = ["rec", "reco", "recov"], value_delimiter = ',', default_value = "p")]
    pub recover: Vec<String>,

    /// Wave type to inject: p, s or rayleigh.
    #[arg(long, aliases = ["inj", "inje"], default_value = "p")]
    pub inject: String,

    /// Analysis (and injection) frequency in Hz.
    #[arg(long, aliases = ["fr", "freq"], default_value_t = 5.0)]
    pub frequency: f64,

    /// Injected wave amplitude.
    #[arg(long, aliases = ["am", "amp"], default_value_t = 1.0)]
    pub amplitude: f64,

    /// Source azimuth in degrees (from east toward north).
    #[arg(long, default_value_t = 105.0)]
    pub phi: f64,

    /// Source polar angle in degrees (from the zenith axis).
    #[arg(long, default_value_t = 75.0)]
    pub theta: f64,

    /// S-wave polarization angle in degrees.
    #[arg(long, default_value_t = 30.0)]
    pub psi: f64,

    /// White-noise standard deviation added to every channel.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Noise seed.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Synthesized record length in seconds.
    #[arg(long, aliases = ["du", "dur"], default_value_t = 64.0)]
    pub duration: f64,

    /// Sample rate in Hz.
    #[arg(long, default_value_t = 100.0)]
    pub sample_rate: f64,

    /// P-wave speed in m/s.
    #[arg(long, default_value_t = 5700.0)]
    pub vp: f64,

    /// S-wave speed in m/s.
    #[arg(long, default_value_t = 3000.0)]
    pub vs: f64,

    /// Rayleigh-wave speed in m/s.
    #[arg(long, default_value_t = 2500.0)]
    pub vr: f64,

    /// Rayleigh vertical-to-horizontal amplitude ratio.
    #[arg(long, default_value_t = 0.1)]
    pub epsilon: f64,

    /// Rayleigh depth-decay length in meters.
    #[arg(long, default_value_t = 1000.0)]
    pub alpha: f64,

    /// Channels used for pairing, comma separated (e, n, z).
    #[arg(long, aliases = ["ch", "chan"], value_delimiter = ',', default_value = "e,n,z")]
    pub channels: Vec<String>,

    /// Sky-grid step in degrees.
    #[arg(long, default_value_t = 6.0)]
    pub grid_step: f64,

    /// Welch segment length in seconds.
    #[arg(long, aliases = ["seg", "segm"], default_value_t = 2.0)]
    pub segment: f64,

    /// Welch segment overlap in seconds.
    #[arg(long, aliases = ["ov", "over"], default_value_t = 1.0)]
    pub overlap: f64,

    /// Worker threads for the per-segment FFTs.
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// Drop the same-station, same-channel autocorrelation pairs.
    #[arg(long)]
    pub no_autocorr: bool,

    /// Sum the nearest bin and its neighbours instead of taking the single
    /// nearest bin.
    #[arg(long)]
    pub tri_bin: bool,

    /// Solver iteration cap.
    #[arg(long, default_value_t = 1000)]
    pub iter_lim: usize,

    /// Solver normal-equation residual tolerance.
    #[arg(long, default_value_t = 1e-6)]
    pub atol: f64,

    /// Solver estimate residual tolerance.
    #[arg(long, default_value_t = 1e-6)]
    pub btol: f64,
}
