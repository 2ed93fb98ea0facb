//! Fixed-timestep accumulator decoupling simulation from render frames

/// Runs the simulation at a constant rate regardless of how often the host's
/// render loop calls in.
///
/// Wall time accumulates per frame; whole tick intervals are drained and the
/// remainder carries over, so simulation stays deterministic across refresh
/// rates. Accumulation is clamped so a long stall (tab backgrounded, debugger
/// pause) catches up with a bounded burst instead of a spiral of death.
pub struct FixedTickScheduler {
    tick_interval_ms: f32,
    max_accumulation_ms: f32,
    accumulator_ms: f32,
    tick_count: u64,
}

impl FixedTickScheduler {
    pub fn new(tick_interval_ms: f32, max_accumulation_ms: f32) -> Self {
        Self {
            tick_interval_ms,
            max_accumulation_ms,
            accumulator_ms: 0.0,
            tick_count: 0,
        }
    }

    /// Fixed tick duration in seconds, the `dt` every simulation step sees.
    pub fn tick_dt(&self) -> f32 {
        self.tick_interval_ms / 1000.0
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Accumulates `frame_ms` of wall time and runs `step` once per elapsed
    /// tick interval. Returns the number of steps run.
    pub fn advance<F: FnMut(f32)>(&mut self, frame_ms: f32, mut step: F) -> u32 {
        self.accumulator_ms += frame_ms.max(0.0);

        if self.accumulator_ms > self.max_accumulation_ms {
            self.accumulator_ms = self.max_accumulation_ms;
        }

        let dt = self.tick_dt();
        let mut steps = 0;
        while self.accumulator_ms >= self.tick_interval_ms {
            self.accumulator_ms -= self.tick_interval_ms;
            self.tick_count += 1;
            steps += 1;
            step(dt);
        }
        steps
    }
}
