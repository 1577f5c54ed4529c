use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tch::nn;

/// Cosine annealing with warm restarts.
///
/// Each parameter group's rate decays from its base rate down to
/// `eta_min` along a cosine curve over one cycle; when a full cycle
/// elapses the schedule restarts at the base rate and the next cycle
/// length is scaled by `factor`.
///
/// The whole schedule state is serializable so a resumed run continues
/// at the exact cycle position the checkpoint recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosineWithRestarts {
    base_rates: Vec<f64>,
    t_max: usize,
    eta_min: f64,
    factor: f64,
    step_num: usize,
    cycle_counter: usize,
    cycle_factor: f64,
    cycle_len: usize,
    last_restart: usize,
    initialized: bool,
}

impl CosineWithRestarts {
    /// `t_max` is the number of steps in the first cycle; must be > 0.
    pub fn new(base_rates: Vec<f64>, t_max: usize) -> Self {
        let t_max = t_max.max(1);
        Self {
            base_rates,
            t_max,
            eta_min: 0.0,
            factor: 1.0,
            step_num: 0,
            cycle_counter: 0,
            cycle_factor: 1.0,
            cycle_len: t_max,
            last_restart: 0,
            initialized: false,
        }
    }

    /// Floor learning rate, default 0.
    pub fn eta_min(mut self, eta_min: f64) -> Self {
        self.eta_min = eta_min;
        self
    }

    /// Multiplicative cycle-length factor applied at every restart,
    /// default 1 (constant cycle length).
    pub fn factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn base_rates(&self) -> &[f64] {
        &self.base_rates
    }

    pub fn cycle_length(&self) -> usize {
        self.cycle_len
    }

    /// Advances the schedule one step and returns the rate per
    /// parameter group. The very first call returns the base rates
    /// unchanged; this mirrors the init query the host framework's
    /// scheduler protocol issues before training starts.
    pub fn step(&mut self) -> Vec<f64> {
        if !self.initialized {
            self.initialized = true;
            return self.base_rates.clone();
        }

        self.step_num += 1;
        let step = self.step_num;
        self.cycle_counter = step - self.last_restart;

        let phase = (self.cycle_counter % self.cycle_len) as f64 / self.cycle_len as f64;
        let rates = self
            .base_rates
            .iter()
            .map(|&base| self.eta_min + (base - self.eta_min) / 2.0 * ((PI * phase).cos() + 1.0))
            .collect();

        if self.cycle_counter % self.cycle_len == 0 {
            self.cycle_factor *= self.factor;
            self.cycle_counter = 0;
            // A shrinking factor must not collapse the cycle to zero.
            self.cycle_len = ((self.cycle_factor * self.t_max as f64) as usize).max(1);
            self.last_restart = step;
        }

        rates
    }
}

/// Pushes scheduler output into a tch optimizer, one rate per
/// parameter group (a single rate sets the global learning rate).
pub fn apply_rates(optimizer: &mut nn::Optimizer, rates: &[f64]) {
    if let [rate] = rates {
        optimizer.set_lr(*rate);
    } else {
        for (group, &rate) in rates.iter().enumerate() {
            optimizer.set_lr_group(group, rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_returns_base_rates_exactly() {
        let mut scheduler = CosineWithRestarts::new(vec![0.1, 0.01], 10);
        assert_eq!(scheduler.step(), vec![0.1, 0.01]);
    }

    #[test]
    fn quarter_cycle_value_matches_cosine_formula() {
        let mut scheduler = CosineWithRestarts::new(vec![1.0], 4);
        scheduler.step(); // init sentinel
        let rate = scheduler.step()[0];
        // cos(pi/4) = sqrt(2)/2
        let expected = (2f64.sqrt() / 2.0 + 1.0) / 2.0;
        assert!((rate - expected).abs() < 1e-12);
    }

    #[test]
    fn restarts_return_to_peak() {
        let mut scheduler = CosineWithRestarts::new(vec![1.0], 2);
        scheduler.step();
        // Within a cycle of length 2: trough, then peak at the restart step.
        assert!((scheduler.step()[0] - 0.5).abs() < 1e-12);
        assert!((scheduler.step()[0] - 1.0).abs() < 1e-12);
        assert!((scheduler.step()[0] - 0.5).abs() < 1e-12);
        assert!((scheduler.step()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn eta_min_floors_the_decay() {
        let mut scheduler = CosineWithRestarts::new(vec![0.1], 2).eta_min(0.1);
        scheduler.step();
        for _ in 0..5 {
            assert!((scheduler.step()[0] - 0.1).abs() < 1e-12);
        }
    }

    #[test]
    fn factor_rescales_cycle_length_after_restart() {
        let mut scheduler = CosineWithRestarts::new(vec![1.0], 4).factor(0.5);
        scheduler.step();
        for _ in 0..4 {
            scheduler.step();
        }
        // After the first restart the cycle is floor(0.5 * 4) = 2 steps.
        assert_eq!(scheduler.cycle_length(), 2);
        for _ in 0..2 {
            scheduler.step();
        }
        // floor(0.25 * 4) = 1.
        assert_eq!(scheduler.cycle_length(), 1);
    }

    #[test]
    fn growth_factor_lengthens_cycles() {
        let mut scheduler = CosineWithRestarts::new(vec![1.0], 2).factor(2.0);
        scheduler.step();
        scheduler.step();
        scheduler.step(); // restart happens here
        assert_eq!(scheduler.cycle_length(), 4);
    }

    #[test]
    fn serialized_state_resumes_identical_sequence() {
        let mut original = CosineWithRestarts::new(vec![0.3], 5).factor(0.8);
        for _ in 0..7 {
            original.step();
        }

        let json = serde_json::to_string(&original).unwrap();
        let mut resumed: CosineWithRestarts = serde_json::from_str(&json).unwrap();

        for _ in 0..20 {
            assert_eq!(original.step(), resumed.step());
        }
    }
}
