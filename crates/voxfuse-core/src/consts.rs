/// Minimum voxel count to use lane/voxel-level Rayon parallelism.
pub const PARALLEL_VOXEL_THRESHOLD: usize = 65_536;

/// Conversion from full-width-half-maximum to Gaussian standard deviation.
pub const FWHM_TO_SIGMA: f64 = 2.355;

/// Default regularization weight (lambda) for both solvers.
pub const DEFAULT_REG_WEIGHT: f32 = 0.1;

/// Default percentile of |g| used as the GGR edge threshold.
pub const DEFAULT_TAU_PERCENTILE: f32 = 0.8;

/// Default largest stencil order P; triples range over [-P, P]^3.
pub const DEFAULT_GRADIENT_SCALE: i32 = 2;

/// Default bilateral-TV decay base alpha.
pub const DEFAULT_DECAY_ALPHA: f32 = 0.6;

/// Edge weight w(g) assigned where g^4 + tau^4 == 0 (in particular g == 0).
/// The limit of g / (1 + (tau/g)^4) as g -> 0 is 0.
pub const EDGE_WEIGHT_AT_ZERO: f32 = 0.0;

/// Spectral solution assigned where the solver denominator is exactly zero.
pub const SPECTRAL_ZERO_SOLUTION: f32 = 0.0;

/// Absolute tolerance when comparing spacing/origin/direction of two grids.
pub const GRID_TOLERANCE: f64 = 1e-6;

/// Default minimum normalized correlation peak accepted by phase-correlation
/// registration.
pub const DEFAULT_MIN_CORRELATION_PEAK: f64 = 0.02;

/// Stem of the mean-fusion output file.
pub const MEAN_FILE_STEM: &str = "img_mean";

/// Working-directory geometry record file name.
pub const GEOMETRY_FILE: &str = "geometry.bin";

/// Working-directory manifest file name.
pub const MANIFEST_FILE: &str = "data_fn.txt";

/// Prefix of registered secondary volume files.
pub const REGISTERED_PREFIX: &str = "reg_";

/// Suffix appended to the base name of volumes resampled on the canonical grid.
pub const RESAMPLED_SUFFIX: &str = "_x";

/// Prefix and extension of per-view filter files.
pub const FILTER_PREFIX: &str = "h_";
pub const FILTER_EXTENSION: &str = "flt";
