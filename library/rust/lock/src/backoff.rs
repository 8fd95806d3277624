use std::time::Duration;

/// ロック待機中の再試行間隔。指数的に伸ばし、上限で頭打ちにする。
#[derive(Debug, Clone)]
pub struct WaitBackoff {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for WaitBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl WaitBackoff {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(32) as i32;
        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_millis() as f64);
        let delay_ms = if self.jitter {
            let jitter_range = capped * 0.1;
            capped - jitter_range + (rand::random::<f64>() * jitter_range * 2.0)
        } else {
            capped
        };
        // 0ms の sleep はビジーループになるため最低 1ms 待つ
        Duration::from_millis((delay_ms as u64).max(1))
    }
}
