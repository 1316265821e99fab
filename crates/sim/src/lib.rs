use agent::Reading;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};

#[derive(Clone, Copy, Debug)]
pub struct SimParams {
    /// Resting temperature the device drifts back to (°C).
    pub nominal_temp_c: f64,
    /// Heating per tick while the fault is active.
    pub heat_rate_c: f64,
    /// Heating stops at this ceiling.
    pub max_temp_c: f64,
    /// Cooling per tick while above nominal.
    pub cool_rate_c: f64,
    /// Warming per tick while below nominal.
    pub warm_rate_c: f64,
    pub nominal_volt: f64,
    pub nominal_curr: f64,
    /// Half-width of the uniform temperature noise.
    pub temp_noise_c: f64,
    /// Half-width of the uniform voltage noise.
    pub volt_noise: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            nominal_temp_c: 45.0,
            heat_rate_c: 1.5,
            max_temp_c: 95.0,
            cool_rate_c: 0.8,
            warm_rate_c: 0.5,
            nominal_volt: 5.0,
            nominal_curr: 1.2,
            temp_noise_c: 0.3,
            volt_noise: 0.05,
        }
    }
}

/// Simulated device: heats while a fault is injected, relaxes toward nominal otherwise.
#[derive(Clone, Debug)]
pub struct SimDevice {
    pub params: SimParams,
    temp_c: f64,
    fault_active: bool,
    rng: StdRng,
}

impl SimDevice {
    pub fn new(params: SimParams, seed: u64) -> Self {
        Self {
            temp_c: params.nominal_temp_c,
            params,
            fault_active: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn true_temp(&self) -> f64 {
        self.temp_c
    }

    pub fn fault_active(&self) -> bool {
        self.fault_active
    }

    pub fn set_fault(&mut self, active: bool) {
        self.fault_active = active;
    }

    /// Toggle the injected fault; returns the new flag.
    pub fn inject_fault(&mut self) -> bool {
        self.fault_active = !self.fault_active;
        self.fault_active
    }

    /// Advance the thermal model one tick without sampling.
    pub fn step(&mut self) {
        let p = &self.params;
        if self.fault_active {
            if self.temp_c < p.max_temp_c {
                self.temp_c += p.heat_rate_c;
            }
        } else if self.temp_c > p.nominal_temp_c {
            self.temp_c -= p.cool_rate_c;
        } else if self.temp_c < p.nominal_temp_c {
            self.temp_c += p.warm_rate_c;
        }
    }

    /// Advance one tick and return a noisy reading.
    pub fn read(&mut self) -> Reading {
        self.step();

        let temp = self.temp_c + noise(&mut self.rng, self.params.temp_noise_c);
        let volt = self.params.nominal_volt + noise(&mut self.rng, self.params.volt_noise);

        Reading::new(round2(temp), round2(volt), round2(self.params.nominal_curr))
    }
}

fn noise(rng: &mut StdRng, half_width: f64) -> f64 {
    if half_width > 0.0 {
        Uniform::new_inclusive(-half_width, half_width).sample(rng)
    } else {
        0.0
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
