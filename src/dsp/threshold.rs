/// Which extreme of the feature the tracker follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Max,
    Min,
}

impl Extreme {
    fn seed(self) -> f32 {
        match self {
            Extreme::Max => 0.0,
            Extreme::Min => f32::MAX,
        }
    }

    fn exceeds(self, value: f32, current: f32) -> bool {
        match self {
            Extreme::Max => value > current,
            Extreme::Min => value < current,
        }
    }
}

/// How a threshold percentage turns into a threshold line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdConvention {
    /// `extreme * pct`
    Ratio,
    /// `extreme * pct / 100`
    Percent,
}

impl ThresholdConvention {
    fn apply(self, extreme: f32, pct: f32) -> f32 {
        match self {
            ThresholdConvention::Ratio => extreme * pct,
            ThresholdConvention::Percent => extreme * pct / 100.0,
        }
    }
}

/// Low/high decision lines derived from the most extreme feature value seen
/// since the last reset. The lines are recomputed whenever the extreme or a
/// percentage changes, so they are never stale.
#[derive(Debug, Clone)]
pub struct ThresholdTracker {
    extreme: Extreme,
    convention: ThresholdConvention,
    start: Option<f32>,
    running: f32,
    low_pct: f32,
    high_pct: f32,
    low: f32,
    high: f32,
}

impl ThresholdTracker {
    pub fn new(extreme: Extreme, convention: ThresholdConvention, low_pct: f32, high_pct: f32) -> Self {
        let mut tracker = Self {
            extreme,
            convention,
            start: None,
            running: extreme.seed(),
            low_pct,
            high_pct,
            low: 0.0,
            high: 0.0,
        };
        tracker.recompute();
        tracker
    }

    /// Seed the running extreme with a manual starting value instead of the
    /// sentinel. The seed survives [`reset`](Self::reset).
    pub fn with_start(mut self, start: Option<f32>) -> Self {
        self.start = start;
        if let Some(value) = start {
            self.running = value;
            self.recompute();
        }
        self
    }

    pub fn extreme(&self) -> f32 {
        self.running
    }

    pub fn low(&self) -> f32 {
        self.low
    }

    pub fn high(&self) -> f32 {
        self.high
    }

    /// Fold a new feature value in. Returns true when it became the new
    /// extreme.
    pub fn observe(&mut self, value: f32) -> bool {
        if self.extreme.exceeds(value, self.running) {
            self.running = value;
            self.recompute();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.running = self.start.unwrap_or_else(|| self.extreme.seed());
        self.recompute();
    }

    fn recompute(&mut self) {
        self.low = self.convention.apply(self.running, self.low_pct);
        self.high = self.convention.apply(self.running, self.high_pct);
    }
}
