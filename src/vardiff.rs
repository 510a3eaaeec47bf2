use super::*;

/// Tuning knobs for the per-connection difficulty controller, lifted out
/// of [`Settings`] so tests can build them directly.
#[derive(Debug, Clone)]
pub(crate) struct VardiffConfig {
    pub(crate) enabled: bool,
    pub(crate) min_target: f64,
    pub(crate) max_target: f64,
    pub(crate) target_time: u64,
    pub(crate) retarget_time: u64,
    pub(crate) variance_percent: f64,
    pub(crate) x2_mode: bool,
    pub(crate) float: bool,
}

/// Per-connection difficulty adaptation. Keeps a sliding window of the
/// last share arrival times; every retarget interval the average
/// inter-arrival gap is compared against the target time and the
/// difficulty rescaled when it falls outside the variance band.
#[derive(Debug, Clone)]
pub(crate) struct Vardiff {
    config: VardiffConfig,
    current: f64,
    arrivals: VecDeque<u64>,
    last_retarget: u64,
}

impl Vardiff {
    pub(crate) fn new(config: VardiffConfig, start_diff: f64, now: u64) -> Self {
        Self {
            config,
            current: start_diff,
            arrivals: VecDeque::with_capacity(VARDIFF_WINDOW_SHARES),
            last_retarget: now,
        }
    }

    pub(crate) fn current(&self) -> f64 {
        self.current
    }

    /// Records a share arrival and returns the new difficulty when a
    /// retarget fires. The window resets on every change so the next
    /// decision is based on fresh arrivals only.
    pub(crate) fn record_share(&mut self, now: u64) -> Option<f64> {
        if !self.config.enabled {
            return None;
        }

        if self.arrivals.len() == VARDIFF_WINDOW_SHARES {
            self.arrivals.pop_front();
        }
        self.arrivals.push_back(now);

        if now.saturating_sub(self.last_retarget) < self.config.retarget_time {
            return None;
        }

        self.last_retarget = now;

        if self.arrivals.len() < 2 {
            return None;
        }

        let span = self.arrivals.back()?.saturating_sub(*self.arrivals.front()?);
        let average = span as f64 / (self.arrivals.len() - 1) as f64;
        let target = self.config.target_time as f64;

        if (average - target).abs() <= target * self.config.variance_percent / 100.0 {
            debug!(
                "Vardiff: average {average:.1}s within {}% of {target}s, holding",
                self.config.variance_percent
            );
            return None;
        }

        // Shares per second scale with difficulty; faster arrivals mean
        // the target must tighten by the same ratio.
        let scaled = self.current * target / average.max(1e-3);
        let next = self.snap(scaled.clamp(self.config.min_target, self.config.max_target));

        if next == self.current {
            return None;
        }

        debug!(
            "Vardiff: average {average:.1}s vs target {target}s, difficulty {} -> {next}",
            self.current
        );

        self.current = next;
        self.arrivals.clear();

        Some(next)
    }

    fn snap(&self, difficulty: f64) -> f64 {
        if self.config.x2_mode {
            2f64.powi(difficulty.log2().round() as i32)
                .clamp(self.config.min_target, self.config.max_target)
        } else if !self.config.float {
            difficulty.round().max(1.0)
        } else {
            difficulty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VardiffConfig {
        VardiffConfig {
            enabled: true,
            min_target: 0.00390625,
            max_target: 65536.0,
            target_time: 15,
            retarget_time: 90,
            variance_percent: 30.0,
            x2_mode: false,
            float: true,
        }
    }

    fn feed(vardiff: &mut Vardiff, start: u64, interval: u64, count: u64) -> Option<f64> {
        let mut result = None;
        for i in 0..count {
            if let Some(next) = vardiff.record_share(start + i * interval) {
                result = Some(next);
            }
        }
        result
    }

    #[test]
    fn no_retarget_before_interval_elapses() {
        let mut vardiff = Vardiff::new(config(), 1.0, 0);

        for i in 0..5 {
            assert_eq!(vardiff.record_share(i * 10), None);
        }
    }

    #[test]
    fn fast_shares_scale_difficulty_up_by_a_third() {
        let mut vardiff = Vardiff::new(config(), 1.0, 0);

        // One share every 5s against a 15s target: difficulty triples.
        let next = feed(&mut vardiff, 0, 5, 20).expect("retarget must fire");

        assert!((next - 3.0).abs() < 0.2, "expected ~3.0, got {next}");
        assert_eq!(vardiff.current(), next);
    }

    #[test]
    fn slow_shares_scale_difficulty_down() {
        let mut vardiff = Vardiff::new(config(), 8.0, 0);

        // One share every 60s against a 15s target: quarter difficulty.
        let next = feed(&mut vardiff, 0, 60, 3).expect("retarget must fire");

        assert!(next < 8.0, "difficulty must drop, got {next}");
        assert!((next - 2.0).abs() < 0.5, "expected ~2.0, got {next}");
    }

    #[test]
    fn on_target_shares_hold_steady() {
        let mut vardiff = Vardiff::new(config(), 4.0, 0);

        assert_eq!(feed(&mut vardiff, 0, 15, 30), None);
        assert_eq!(vardiff.current(), 4.0);
    }

    #[test]
    fn within_variance_band_holds_steady() {
        let mut vardiff = Vardiff::new(config(), 4.0, 0);

        // 18s average is within 30% of the 15s target.
        assert_eq!(feed(&mut vardiff, 0, 18, 30), None);
    }

    #[test]
    fn difficulty_stays_clamped() {
        let mut config = config();
        config.max_target = 2.0;

        let mut vardiff = Vardiff::new(config.clone(), 1.0, 0);
        let next = feed(&mut vardiff, 0, 1, 200).expect("retarget must fire");
        assert!(next <= config.max_target);

        let mut vardiff = Vardiff::new(config.clone(), 1.0, 0);
        let next = feed(&mut vardiff, 0, 3600, 3).expect("retarget must fire");
        assert!(next >= config.min_target);
    }

    #[test]
    fn x2_mode_snaps_to_powers_of_two() {
        let mut config = config();
        config.x2_mode = true;
        config.min_target = 0.25;
        config.max_target = 1024.0;

        let mut current = 1.0;
        let mut vardiff = Vardiff::new(config, current, 0);

        let mut time = 0;
        for _ in 0..200 {
            time += 5;
            if let Some(next) = vardiff.record_share(time) {
                let ratio = if next > current {
                    next / current
                } else {
                    current / next
                };
                assert_eq!(
                    ratio.log2().fract(),
                    0.0,
                    "consecutive targets must differ by a power of two: {current} -> {next}"
                );
                current = next;
            }
        }

        assert!(current > 1.0, "fast shares must have raised the target");
    }

    #[test]
    fn integer_mode_rounds_to_whole_difficulties() {
        let mut config = config();
        config.float = false;

        let mut vardiff = Vardiff::new(config, 2.0, 0);

        if let Some(next) = feed(&mut vardiff, 0, 5, 40) {
            assert_eq!(next.fract(), 0.0, "non-float mode must snap to integers");
        }
    }

    #[test]
    fn window_resets_after_change() {
        let mut vardiff = Vardiff::new(config(), 1.0, 0);

        feed(&mut vardiff, 0, 5, 20).expect("retarget must fire");
        assert!(vardiff.arrivals.is_empty());
    }

    #[test]
    fn disabled_controller_never_retargets() {
        let mut config = config();
        config.enabled = false;

        let mut vardiff = Vardiff::new(config, 1.0, 0);
        assert_eq!(feed(&mut vardiff, 0, 1, 500), None);
        assert_eq!(vardiff.current(), 1.0);
    }
}
