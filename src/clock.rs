use super::*;

/// The only source of wall-clock time in the pool core. Tests inject a
/// fixed clock so that work expiry, ntime windows, vardiff retargets and
/// ban windows are deterministic.
#[derive(Debug, Clone)]
pub(crate) enum Clock {
    System,
    Fixed(Arc<AtomicU64>),
}

impl Clock {
    pub(crate) fn now(&self) -> u64 {
        match self {
            Clock::System => std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            Clock::Fixed(seconds) => seconds.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub(crate) fn fixed(start: u64) -> Self {
        Clock::Fixed(Arc::new(AtomicU64::new(start)))
    }

    #[cfg(test)]
    pub(crate) fn advance(&self, seconds: u64) {
        if let Clock::Fixed(current) = self {
            current.fetch_add(seconds, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_deterministic() {
        let clock = Clock::fixed(1_345_678_900);
        assert_eq!(clock.now(), 1_345_678_900);

        clock.advance(60);
        assert_eq!(clock.now(), 1_345_678_960);
    }

    #[test]
    fn fixed_clock_clones_share_time() {
        let clock = Clock::fixed(100);
        let other = clock.clone();

        clock.advance(5);
        assert_eq!(other.now(), 105);
    }
}
