/// Bounds and steps of the adaptive JPEG quality, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityConfig {
    pub initial: u8,
    pub min: u8,
    pub max: u8,
    pub step: u8,
    /// Consecutive successes needed before quality goes back up.
    pub success_streak: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            initial: 80,
            min: 50,
            max: 90,
            step: 10,
            success_streak: 10,
        }
    }
}

/// Asymmetric quality adjustment: drops on every failure, climbs only after a streak.
#[derive(Debug, Clone)]
pub struct QualityController {
    config: QualityConfig,
    current: u8,
    streak: u32,
}

impl QualityController {
    pub fn new(config: QualityConfig) -> Self {
        let (min, max) = if config.min <= config.max {
            (config.min, config.max)
        } else {
            (config.max, config.min)
        };
        let (min, max) = (min.min(100), max.min(100));
        let config = QualityConfig { min, max, ..config };
        Self {
            current: config.initial.clamp(min, max),
            config,
            streak: 0,
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn factor(&self) -> f32 {
        f32::from(self.current) / 100.0
    }

    pub fn record_success(&mut self) -> u8 {
        self.streak += 1;
        if self.streak >= self.config.success_streak {
            self.streak = 0;
            self.current = self
                .current
                .saturating_add(self.config.step)
                .min(self.config.max);
        }
        self.current
    }

    pub fn record_failure(&mut self) -> u8 {
        self.streak = 0;
        self.current = self
            .current
            .saturating_sub(self.config.step)
            .max(self.config.min);
        self.current
    }
}

impl Default for QualityController {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}
