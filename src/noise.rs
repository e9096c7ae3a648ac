use noise::{NoiseFn, SuperSimplex};

/// Raw height, in normalized-space terms, below which a cell is considered
/// underwater by the noise layer's own river logic. This mirrors, but is
/// independent from, [`crate::SEA_LEVEL`] (which operates on `nH`).
const RAW_SEA_LEVEL: f64 = 0.3;

/// Seeded scalar noise fields feeding the terrain generator.
///
/// Every public function here is pure and deterministic: identical
/// `(seed, x, y)` yields the identical value on any host, in any process,
/// forever. Five `SuperSimplex` instances are derived from one seed by
/// wrapping-add offset, the same way the teacher derives
/// `density/hilly/stone/gravel/grass` from a single world seed.
#[derive(Clone)]
pub struct NoiseEngine {
    height: SuperSimplex,
    warp: SuperSimplex,
    temperature: SuperSimplex,
    precipitation: SuperSimplex,
    river: SuperSimplex,
}

impl NoiseEngine {
    #[must_use]
    pub fn new(seed: u32) -> Self {
        Self {
            height: SuperSimplex::new(seed),
            warp: SuperSimplex::new(seed.wrapping_add(1)),
            temperature: SuperSimplex::new(seed.wrapping_add(2)),
            precipitation: SuperSimplex::new(seed.wrapping_add(3)),
            river: SuperSimplex::new(seed.wrapping_add(4)),
        }
    }

    fn sample(noise: &SuperSimplex, x: f64, y: f64) -> f64 {
        let n = noise.get([x, y]);
        if n.is_finite() {
            n
        } else {
            // A NaN sample is a numeric edge case, not a terrain feature:
            // fall back to a neutral value and let the caller's octave loop
            // keep going rather than propagate it into a classified tile.
            0.0
        }
    }

    /// Sums `octaves` layers of `noise` at exponentially rising frequency
    /// and decaying amplitude, normalized by cumulative amplitude.
    fn fbm(noise: &SuperSimplex, x: f64, y: f64, octaves: u32, lacunarity: f64, persistence: f64) -> f64 {
        let mut freq = 1.0;
        let mut amp = 1.0;
        let mut amp_sum = 0.0;
        let mut sum = 0.0;

        for _ in 0..octaves {
            sum += Self::sample(noise, x * freq, y * freq) * amp;
            amp_sum += amp;

            freq *= lacunarity;
            amp *= persistence;
        }

        if amp_sum == 0.0 {
            0.0
        } else {
            sum / amp_sum
        }
    }

    /// Displaces `(x, y)` by a noise field so the sampled shapes stop
    /// looking like raw coherent noise.
    fn domain_warp(&self, x: f64, y: f64, amp: f64, freq: f64) -> (f64, f64) {
        let xf = x * freq;
        let yf = y * freq;

        let wx = x + amp * Self::fbm(&self.warp, xf, yf, 4, 2.0, 0.5);
        let wy = y + amp * Self::fbm(&self.warp, xf + 5.2, yf + 1.3, 4, 2.0, 0.5);

        (wx, wy)
    }

    /// Raw height in `[-1, 1]`, with river valleys carved in above sea
    /// level.
    #[must_use]
    pub fn height(&self, x: f64, y: f64) -> f64 {
        let (wx, wy) = self.domain_warp(x, y, 30.0, 0.01);
        let mut h = Self::fbm(&self.height, wx * 0.01, wy * 0.01, 4, 2.0, 0.5);

        if h > RAW_SEA_LEVEL {
            let river = self.river_map(x, y, h);
            let carve = river * 0.1 * ((h - RAW_SEA_LEVEL) * 2.5).min(1.0);
            h -= carve;
        }

        h.clamp(-1.0, 1.0)
    }

    /// Temperature in `[0, 1]`: a latitude band cooled by elevation, plus a
    /// small amount of coherent variation.
    #[must_use]
    pub fn temperature(&self, x: f64, y: f64, h: f64) -> f64 {
        let latitude = (y / 1000.0 * std::f64::consts::PI).cos() * (1.0 - 1.5 * h).max(0.0);
        let variation = Self::fbm(&self.temperature, x * 0.02, y * 0.02, 3, 2.0, 0.5) * 0.2;

        (latitude + variation).clamp(0.0, 1.0)
    }

    /// Precipitation in `[0, 1]`: base moisture reduced by a rain-shadow
    /// term, scaled toward temperate latitudes.
    #[must_use]
    pub fn precipitation(&self, x: f64, y: f64, h: f64, t: f64) -> f64 {
        let base = Self::fbm(&self.precipitation, x * 0.01 + 100.0, y * 0.01 + 100.0, 4, 2.0, 0.5) * 0.5 + 0.5;

        let shadow_noise = Self::fbm(&self.precipitation, x * 0.001, y * 0.001, 1, 2.0, 0.5).max(0.0);
        let shadow = (h - 0.5).max(0.0) * 2.0 * shadow_noise * 0.5;

        let temperate = 0.5 + (1.0 - (t - 0.5).abs() * 2.0) * 0.5;

        ((base - shadow) * temperate).clamp(0.0, 1.0)
    }

    /// River-carving strength at `(x, y)`, independent of whether the final
    /// (possibly already-carved) height at that point has dropped below
    /// sea level. Used by the terrain classifier to tell a carved river or
    /// lake channel apart from true ocean.
    #[must_use]
    pub fn river_strength(&self, x: f64, y: f64) -> f64 {
        let (wx, wy) = self.domain_warp(x, y, 30.0, 0.01);
        let raw_h = Self::fbm(&self.height, wx * 0.01, wy * 0.01, 4, 2.0, 0.5);
        self.river_map(x, y, raw_h)
    }

    /// Ridged noise used to carve rivers, attenuated toward zero near sea
    /// level and below. Zero below [`RAW_SEA_LEVEL`].
    #[must_use]
    pub fn river_map(&self, x: f64, y: f64, h: f64) -> f64 {
        if h <= RAW_SEA_LEVEL {
            return 0.0;
        }

        let (wx, wy) = self.domain_warp(x, y, 30.0, 0.01);
        let n = Self::fbm(&self.river, wx * 0.04, wy * 0.04, 3, 2.0, 0.5);
        let ridged = 1.0 - (2.0 * n - 1.0).abs();

        let attenuation = ((h - RAW_SEA_LEVEL) * 2.5).clamp(0.0, 1.0);

        ridged * attenuation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_is_deterministic_across_instances() {
        let a = NoiseEngine::new(12345);
        let b = NoiseEngine::new(12345);

        for (x, y) in [(0.0, 0.0), (123.0, -45.0), (9999.5, 42.0)] {
            assert_eq!(a.height(x, y), b.height(x, y));
        }
    }

    #[test]
    fn different_seeds_usually_diverge() {
        let a = NoiseEngine::new(1);
        let b = NoiseEngine::new(2);

        let diverged = (0..20)
            .map(|i| (i as f64 * 37.0, i as f64 * 19.0))
            .any(|(x, y)| a.height(x, y) != b.height(x, y));

        assert!(diverged);
    }

    #[test]
    fn fields_stay_in_contract_range() {
        let engine = NoiseEngine::new(777);

        for i in -50..50 {
            let x = f64::from(i) * 13.0;
            let y = f64::from(i) * -7.0;

            let h = engine.height(x, y);
            assert!((-1.0..=1.0).contains(&h), "height out of range: {h}");

            let n_h = (h + 1.0) / 2.0;
            let t = engine.temperature(x, y, n_h);
            assert!((0.0..=1.0).contains(&t), "temperature out of range: {t}");

            let p = engine.precipitation(x, y, n_h, t);
            assert!((0.0..=1.0).contains(&p), "precipitation out of range: {p}");

            let r = engine.river_map(x, y, h);
            assert!((0.0..=1.0).contains(&r), "river_map out of range: {r}");
        }
    }

    #[test]
    fn river_map_is_zero_below_sea_level() {
        let engine = NoiseEngine::new(42);
        assert_eq!(engine.river_map(10.0, 10.0, 0.1), 0.0);
        assert_eq!(engine.river_map(10.0, 10.0, RAW_SEA_LEVEL), 0.0);
    }
}
