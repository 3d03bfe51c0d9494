//! Min-max signal normalization over a volume window.

/// Lower edge of the default normalization window, in mL.
///
/// Injection artifacts show up before half a millilitre has eluted.
pub const DEFAULT_WINDOW_START_ML: f64 = 0.5;

/// An open volume interval `(lo, hi)` in mL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormWindow {
    /// Lower bound (exclusive)
    pub lo: f64,
    /// Upper bound (exclusive)
    pub hi: f64,
}

impl NormWindow {
    /// Build a window from two edges given in either order.
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            lo: a.min(b),
            hi: a.max(b),
        }
    }

    /// Whether `volume` falls strictly inside the window.
    #[inline]
    pub fn contains(&self, volume: f64) -> bool {
        volume > self.lo && volume < self.hi
    }
}

/// Min-max normalizer for a single (Sample, Channel) group.
///
/// The ceiling is the maximum signal inside the window. The floor is the
/// minimum signal inside the window when `strict` is set, otherwise the minimum
/// over the whole group. A flat or empty window normalizes every point to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Normalizer {
    /// Volume window; `None` means `(0.5, max(volume))`
    pub window: Option<NormWindow>,
    /// Take the floor from the window instead of the whole trace
    pub strict: bool,
}

impl Normalizer {
    /// Create a normalizer.
    pub fn new(window: Option<NormWindow>, strict: bool) -> Self {
        Self { window, strict }
    }

    /// Window used for a group with the given volumes.
    pub fn effective_window(&self, volumes: &[f64]) -> NormWindow {
        self.window.unwrap_or_else(|| {
            let max_volume = volumes
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .fold(f64::NEG_INFINITY, f64::max);
            NormWindow::new(DEFAULT_WINDOW_START_ML, max_volume)
        })
    }

    /// Floor and ceiling for a group, or `None` when the group is degenerate.
    pub fn bounds(&self, volumes: &[f64], signals: &[f64]) -> Option<(f64, f64)> {
        debug_assert_eq!(volumes.len(), signals.len());
        let window = self.effective_window(volumes);

        let mut window_min = f64::INFINITY;
        let mut window_max = f64::NEG_INFINITY;
        let mut global_min = f64::INFINITY;
        for (&volume, &signal) in volumes.iter().zip(signals) {
            if !signal.is_finite() {
                continue;
            }
            global_min = global_min.min(signal);
            if window.contains(volume) {
                window_min = window_min.min(signal);
                window_max = window_max.max(signal);
            }
        }

        let floor = if self.strict { window_min } else { global_min };
        let ceiling = window_max;
        let span = ceiling - floor;
        if floor.is_finite() && ceiling.is_finite() && span != 0.0 && span.is_finite() {
            Some((floor, ceiling))
        } else {
            None
        }
    }

    /// Normalized values for a group, indexed like `signals`.
    pub fn normalize(&self, volumes: &[f64], signals: &[f64]) -> Vec<f64> {
        match self.bounds(volumes, signals) {
            Some((floor, ceiling)) => signals
                .iter()
                .map(|&s| {
                    let v = (s - floor) / (ceiling - floor);
                    if v.is_finite() {
                        v
                    } else {
                        0.0
                    }
                })
                .collect(),
            None => vec![0.0; signals.len()],
        }
    }
}
