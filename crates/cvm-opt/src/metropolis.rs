use cvm_core::RngHandle;

/// Metropolis acceptance probability of moving from `energy_old` to
/// `energy_new` at search temperature `temperature`.
pub fn metropolis_acceptance(energy_old: f64, energy_new: f64, temperature: f64) -> f64 {
    let beta = 1.0 / temperature.max(1e-12);
    (-(energy_new - energy_old) * beta).exp().min(1.0)
}

/// Draws against the Metropolis probability. Returns the decision and the
/// probability used.
pub fn attempt_hop(
    energy_old: f64,
    energy_new: f64,
    temperature: f64,
    rng: &mut RngHandle,
) -> (bool, f64) {
    let acceptance = metropolis_acceptance(energy_old, energy_new, temperature);
    (rng.unit() < acceptance, acceptance)
}

/// Next hop size given the acceptance rate of all hops so far. The step
/// grows only while more than half of the hops are accepted.
pub fn adapt_stepsize(stepsize: f64, acceptance_rate: f64) -> f64 {
    const TARGET: f64 = 0.5;
    const FACTOR: f64 = 0.9;
    if acceptance_rate > TARGET {
        stepsize / FACTOR
    } else {
        stepsize * FACTOR
    }
}
