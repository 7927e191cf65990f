/// Stops training after `patience` epochs without a strict improvement of
/// the monitored value.
#[derive(Debug)]
pub struct EarlyStopping {
    patience: usize,
    best: f32,
    epochs_since_best: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience: patience.max(1),
            best: f32::NEG_INFINITY,
            epochs_since_best: 0,
        }
    }

    /// Feed one epoch's value. Returns `true` on strict improvement.
    pub fn observe(&mut self, value: f32) -> bool {
        if value > self.best {
            self.best = value;
            self.epochs_since_best = 0;
            true
        } else {
            self.epochs_since_best += 1;
            false
        }
    }

    pub fn should_stop(&self) -> bool {
        self.epochs_since_best >= self.patience
    }

    pub fn best(&self) -> f32 {
        self.best
    }
}

/// Multiplies the learning rate by `factor` after `patience` epochs without
/// improvement, then restarts its stall counter.
#[derive(Debug)]
pub struct PlateauDecay {
    patience: usize,
    factor: f64,
    best: f32,
    epochs_since_best: usize,
}

impl PlateauDecay {
    pub fn new(patience: usize, factor: f64) -> Self {
        Self {
            patience: patience.max(1),
            factor: factor.clamp(0.0, 1.0),
            best: f32::NEG_INFINITY,
            epochs_since_best: 0,
        }
    }

    /// Feed one epoch's value; returns the learning rate to use next.
    pub fn observe(&mut self, value: f32, learning_rate: f64) -> f64 {
        if value > self.best {
            self.best = value;
            self.epochs_since_best = 0;
            return learning_rate;
        }
        self.epochs_since_best += 1;
        if self.epochs_since_best >= self.patience {
            self.epochs_since_best = 0;
            learning_rate * self.factor
        } else {
            learning_rate
        }
    }
}
