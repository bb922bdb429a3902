use std::f64::consts::PI;
use std::time::Instant;

use lds_mpc::{Horizon, MpcController, PoissonSystem, System};
use log::{debug, info};
use nalgebra::{DMatrix, DVector, dmatrix, dvector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};

const DT: f64 = 1e-3;
const DURATION: f64 = 10.0;
const N: usize = 25;
const M: usize = 20;

const A: f64 = 0.986;
const B: f64 = 0.054;

// Reference rate (spikes per bin) and its modulation
const Y_REF0: f64 = 30.0 * DT;
const REF_FREQ: f64 = 0.5;

// Probability per bin of the disturbance switching level
const PR_SWITCH: f64 = 1e-3;

fn main() {
    env_logger::init();
    let n_t = (DURATION / DT) as usize;
    let mut rng = StdRng::seed_from_u64(100);

    let m_low = (1.0 * DT).ln() * (1.0 - A);
    let m_high = (20.0 * DT).ln() * (1.0 - A);

    let mut plant = PoissonSystem::new(1, 1, 1, DT);
    plant.dynamics_mut().set_A(dmatrix![A]).unwrap();
    plant.dynamics_mut().set_B(dmatrix![B]).unwrap();
    plant.dynamics_mut().set_m(dvector![m_low]).unwrap();
    plant.dynamics_mut().set_x0(dvector![(1.0 * DT).ln()]).unwrap();
    plant.reset();

    // The controller starts at the reference and learns the disturbance
    let mut model = plant.clone();
    model.dynamics_mut().set_x0(dvector![Y_REF0.ln()]).unwrap();
    model.dynamics_mut().set_Q_m(dmatrix![1e-5]).unwrap();
    model.set_adapt_disturbance(true);
    model.reset();

    let mut ctrl = MpcController::new(model, dvector![0.0], dvector![5.0]).unwrap();
    ctrl.set_output_cost(dmatrix![1e5], dmatrix![0.0], dmatrix![0.0], Horizon::new(N, M).unwrap())
        .unwrap();
    ctrl.set_constraint(
        dvector![f64::NEG_INFINITY],
        dvector![f64::INFINITY],
        dvector![0.0],
        dvector![5.0],
    )
    .unwrap();

    let y_ref = DMatrix::from_fn(1, n_t + N + 1, |_, t| {
        Y_REF0 * (1.0 + (REF_FREQ * 2.0 * PI * DT * t as f64 - PI / 4.0).sin())
    });

    let mut u = DVector::zeros(1);
    let mut high = false;
    let mut abs_error = 0.0;
    let mut total_iters = 0;

    let start = Instant::now();
    for t in 1..n_t {
        if rng.gen_bool(PR_SWITCH) {
            high = !high;
            let m = if high { m_high } else { m_low };
            plant.dynamics_mut().set_m(dvector![m]).unwrap();
        }

        let rate = plant.simulate(&u)[0];
        let spikes: f64 = Poisson::new(rate).unwrap().sample(&mut rng);

        let window = y_ref.columns(t, N + 1).into_owned();
        let out = ctrl
            .step_output_reference(DT, &dvector![spikes], &window, true)
            .unwrap();
        u = out.control;
        if let Some(diagnostics) = out.diagnostics {
            total_iters += diagnostics.iterations;
            debug!("t = {t}: J = {:.4e}", diagnostics.objective);
        }

        abs_error += (plant.y()[0] - y_ref[(0, t)]).abs();
        if t % 1000 == 0 {
            info!(
                "t = {:4.1} s  y_ref {:.4}  y {:.4}  y_hat {:.4}  m {:.4}  m_hat {:.4}  u {:.3}",
                t as f64 * DT,
                y_ref[(0, t)],
                plant.y()[0],
                ctrl.sys().y()[0],
                plant.disturbance()[0],
                ctrl.sys().disturbance()[0],
                u[0],
            );
        }
    }
    let elapsed = start.elapsed();

    println!(
        "Simulated {DURATION} s in {:.1} ms ({:.1} us per step)",
        elapsed.as_secs_f64() * 1e3,
        elapsed.as_secs_f64() * 1e6 / n_t as f64
    );
    println!("Mean absolute tracking error: {:.5}", abs_error / (n_t - 1) as f64);
    println!("Total iterations: {total_iters}");
}
