use lds_mpc::{GaussianSystem, Horizon, MpcController, System};
use log::{debug, info};
use nalgebra::{DMatrix, dmatrix, dvector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

const DT: f64 = 1e-3;
const NT: usize = 5000;
const N: usize = 25;
const M: usize = 20;

// Control runs at a quarter of the sample rate
const N_SIM: usize = 4;

const MEAS_NOISE: f64 = 1e-2;

fn main() {
    env_logger::init();
    let mut rng = StdRng::seed_from_u64(42);
    let noise = Normal::new(0.0, MEAS_NOISE).unwrap();

    let mut plant = GaussianSystem::new(1, 2, 1, DT);
    plant.dynamics_mut().set_A(dmatrix![0.99, 0.01; 0.0, 0.98]).unwrap();
    plant.dynamics_mut().set_B(dmatrix![0.0; 0.05]).unwrap();
    plant.dynamics_mut().set_C(dmatrix![1.0, 0.0]).unwrap();
    plant.reset();

    let mut model = plant.clone();
    model.set_R(dmatrix![MEAS_NOISE * MEAS_NOISE]).unwrap();
    model.dynamics_mut().set_Q(DMatrix::identity(2, 2) * 1e-5).unwrap();

    let mut ctrl = MpcController::new(model, dvector![-2.0], dvector![2.0]).unwrap();
    ctrl.set_cost(
        dmatrix![1e3, 0.0; 0.0, 1.0],
        dmatrix![1e-2],
        dmatrix![1.0],
        Horizon::new(N, M).unwrap(),
    )
    .unwrap();

    // Square wave on the first state; the second follows its steady-state value
    let reference = DMatrix::from_fn(2, NT + N * N_SIM, |i, t| {
        let level = if (t / 1000) % 2 == 0 { 0.5 } else { -0.5 };
        if i == 0 { level } else { level * (1.0 - 0.99) / 0.01 }
    });

    let mut sq_error = 0.0;
    let mut ticks = 0;

    for t in (0..NT).step_by(N_SIM) {
        let z = plant.y() + dvector![noise.sample(&mut rng)];
        let window = reference.columns(t, N * N_SIM).into_owned();
        let out = ctrl
            .step(N_SIM as f64 * DT, &z, &window, true)
            .unwrap();
        let u = out.control;
        if let Some(diagnostics) = out.diagnostics {
            debug!(
                "t = {t}: {:?} in {} iterations",
                diagnostics.status, diagnostics.iterations
            );
        }

        for _ in 0..N_SIM {
            plant.simulate(&u);
        }

        let error = plant.x()[0] - reference[(0, t + N_SIM)];
        sq_error += error * error;
        ticks += 1;
        if t % 500 == 0 {
            info!(
                "t = {:4.2} s  x_ref {:+.3}  x {:+.3}  x_hat {:+.3}  u {:+.3}",
                t as f64 * DT,
                reference[(0, t)],
                plant.x()[0],
                ctrl.sys().x()[0],
                u[0]
            );
        }
    }

    println!("RMS tracking error: {:.4}", (sq_error / ticks as f64).sqrt());
}
