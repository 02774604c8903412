use nalgebra::{DMatrix, DVector};
use uav_lqr::{presets, riccati, stability};
use uav_lqr::{gain, ACTUATION_CHANNELS};

// Compare closed-loop modes for a few input weights before flying
fn main() {
    env_logger::init();

    for r_weight in [1.0, 1e8, 1e9, 1e10] {
        let q = DMatrix::identity(presets::MAMBO_STATES, presets::MAMBO_STATES);
        let r = DMatrix::from_diagonal(&DVector::from_element(ACTUATION_CHANNELS, r_weight));

        let result = presets::mambo_with_weights(q, r).and_then(|model| {
            let solution = riccati::solve(&model)?;
            let k = gain::derive(&model, solution.p())?;
            let report = stability::analyze(&model, &k)?;
            Ok((solution, k, report))
        });

        match result {
            Ok((solution, k, report)) => {
                println!(
                    "R = {r_weight:e} I: {} riccati steps, ‖K‖ = {:.3e}, spectral radius {:.4}, stable: {}",
                    solution.iterations(),
                    k.k().norm(),
                    report.spectral_radius(),
                    report.is_stable()
                );
                for mode in report.modes().iter().take(3) {
                    println!(
                        "    λ = {:+.4} {:+.4}i  |λ| = {:.4}",
                        mode.eigenvalue.re, mode.eigenvalue.im, mode.magnitude
                    );
                }
            }
            Err(e) => println!("R = {r_weight:e} I: design failed: {e}"),
        }
    }
}
