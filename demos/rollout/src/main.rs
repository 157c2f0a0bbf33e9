//! Trains a readout for a single-rank reservoir model on a synthetic
//! traveling wave, then drives the online synchronize/increment/predict
//! protocol the way a prognostic run loop would.

#[macro_use]
extern crate log;

use std::f64::consts::TAU;
use std::sync::Arc;

use common::Activation;
use lin_reg::TikhonovRegularization;
use nalgebra::DMatrix;
use ndarray::{Array, ArrayD, IxDyn};
use reservoir_models::{
    RankDivider, Reservoir, ReservoirComputingModel, ReservoirComputingReadout,
    ReservoirHyperparameters,
};

const GRID: usize = 8;
const LAYOUT: [usize; 2] = [2, 2];
const OVERLAP: usize = 1;
const STATE_SIZE: usize = 200;
const TRAIN_LEN: usize = 500;
const WASHOUT_LEN: usize = 50;
const SYNC_LEN: usize = 100;
const ROLLOUT_LEN: usize = 50;
const SEED: u64 = 0;

/// Traveling wave sampled on the periodic rank grid, halo included when
/// `pad` is nonzero
fn wave_field(t: usize, pad: usize) -> ArrayD<f64> {
    let extent = GRID + 2 * pad;
    Array::from_shape_fn(IxDyn(&[extent, extent]), |ix| {
        // wrap halo coordinates onto the periodic domain
        let x = (ix[0] + GRID - pad) % GRID;
        let y = (ix[1] + GRID - pad) % GRID;
        let phase = TAU * (x as f64 + 0.25 * t as f64) / GRID as f64;
        phase.sin() * (TAU * y as f64 / GRID as f64).cos()
    })
}

fn main() {
    pretty_env_logger::init();

    let divider = Arc::new(
        RankDivider::new(
            LAYOUT,
            ["x".to_string(), "y".to_string()],
            [GRID, GRID],
            OVERLAP,
        )
        .expect("valid demo geometry"),
    );
    let input_size = divider.n_subdomain_features(1, true);
    let output_size = divider.n_subdomain_features(1, false);
    let n_subdomains = divider.n_subdomains();

    let hyperparameters = ReservoirHyperparameters {
        state_size: STATE_SIZE,
        adjacency_matrix_sparsity: 0.9,
        spectral_radius: 0.9,
        input_coupling_sparsity: 0.0,
        input_coupling_scaling: 0.5,
        bias_scaling: 0.0,
        activation: Activation::Tanh,
        seed: SEED,
    };
    let mut reservoir = Reservoir::new(hyperparameters.clone(), input_size);
    reservoir
        .reset_state((STATE_SIZE, n_subdomains))
        .expect("state size matches hyperparameters");

    // harvest reservoir states: every subdomain column is one sample, the
    // matching target is that subdomain's field at the next timestep
    let harvest_len = (TRAIN_LEN - WASHOUT_LEN) * n_subdomains;
    let mut design = Vec::with_capacity(harvest_len * STATE_SIZE);
    let mut targets = Vec::with_capacity(harvest_len * output_size);
    for t in 0..TRAIN_LEN {
        let padded = wave_field(t, OVERLAP);
        let columns = divider
            .flatten_subdomains_to_columns(&padded, true)
            .expect("training field carries the halo");
        reservoir.increment_state(&columns).expect("shapes agree");

        // discard earlier values, as the state has to stabilize first
        if t >= WASHOUT_LEN {
            let state = reservoir.state().expect("state was reset");
            let next = divider
                .flatten_subdomains_to_columns(&wave_field(t + 1, 0), false)
                .expect("target field is unpadded");
            for col in 0..n_subdomains {
                design.extend(state.column(col).iter());
                targets.extend(next.column(col).iter());
            }
        }
    }
    let design = DMatrix::from_row_slice(harvest_len, STATE_SIZE, &design);
    let targets = DMatrix::from_row_slice(harvest_len, output_size, &targets);
    info!("harvested {} training samples", design.nrows());

    let regressor = TikhonovRegularization {
        regularization_coeff: 1e-6,
    };
    let readout = ReservoirComputingReadout::fit(&regressor, &design, &targets)
        .expect("readout fit succeeds on the harvested states");

    let mut model = ReservoirComputingModel::new(
        vec!["wave".to_string()],
        vec!["wave".to_string()],
        Reservoir::new(hyperparameters, input_size),
        Arc::new(readout),
        Arc::clone(&divider),
        false,
        None,
    );
    model.reset_state().expect("divider and reservoir agree");

    // warm the state up from a known trajectory before trusting predictions
    let sync_series: Vec<DMatrix<f64>> = (0..SYNC_LEN)
        .map(|t| {
            divider
                .flatten_subdomains_to_columns(&wave_field(t, OVERLAP), true)
                .expect("sync field carries the halo")
        })
        .collect();
    model.synchronize(&sync_series).expect("sync inputs match");

    let mut sum_sq = 0.0;
    let mut n_vals = 0;
    for t in SYNC_LEN..SYNC_LEN + ROLLOUT_LEN {
        let flat = model.predict().expect("state is initialized");
        let columns = DMatrix::from_column_slice(output_size, n_subdomains, flat.as_slice());
        let merged = divider.merge_subdomains(&columns).expect("column order");

        let truth = wave_field(t, 0);
        for (p, o) in merged.iter().zip(truth.iter()) {
            sum_sq += (p - o) * (p - o);
            n_vals += 1;
        }

        let next_input = divider
            .flatten_subdomains_to_columns(&wave_field(t, OVERLAP), true)
            .expect("rollout field carries the halo");
        model.increment_state(&next_input).expect("shapes agree");
    }
    let rmse = (sum_sq / n_vals as f64).sqrt();
    info!("one-step rollout over {} steps: rmse = {:.6}", ROLLOUT_LEN, rmse);
}
