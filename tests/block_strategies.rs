//! Integration tests for the general-purpose block preconditioners.
//!
//! Each strategy is checked on a matrix for which it must be exact (block-diagonal,
//! block-triangular, or arbitrary coupling), plus the back-substitution order of
//! the triangular sweep, nesting of composites, and options-driven construction.

use approx::assert_abs_diff_eq;
use kryst_block::error::KError;
use kryst_block::block::{DofClassifier, DofTypeMap};
use kryst_block::config::BlockPcOptions;
use kryst_block::context::{BlockPc, ilu0, jacobi};
use kryst_block::matrix::{CsrMatrix, DoubleVector};
use kryst_block::preconditioner::{
    BlockAssembly, BlockDiagonalPreconditioner, BlockTriangularPreconditioner, DummyBlockPreconditioner,
    ExactBlockPreconditioner, GeneralPurposeBlockPreconditioner, Preconditioner, SubsidiaryPreconditionerFn,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Diagonally dominant matrix of size `n` with pseudo-random couplings.
///
/// Entry `(i, j)` is kept only if `keep(type[i], type[j])`.
fn coupled_matrix(types: &[usize], keep: impl Fn(usize, usize) -> bool, seed: u64) -> CsrMatrix {
    let n = types.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut triplets = Vec::new();
    for i in 0..n {
        for j in 0..n {
            if i == j {
                triplets.push((i, i, 2.0 * n as f64 + rng.gen_range(0.0..1.0)));
            } else if keep(types[i], types[j]) && rng.gen_bool(0.6) {
                triplets.push((i, j, rng.gen_range(-1.0..1.0)));
            }
        }
    }
    CsrMatrix::from_triplets(n, n, &triplets)
}

/// `(b, x)` with `b = A x` for a random `x`.
fn rhs_for(a: &CsrMatrix, seed: u64) -> (DoubleVector, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x: Vec<f64> = (0..a.ncols()).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let mut b = vec![0.0; a.nrows()];
    a.spmv(&x, &mut b);
    (DoubleVector::from(b), x)
}

fn mesh(types: &[usize]) -> Arc<dyn DofClassifier> {
    Arc::new(DofTypeMap::from_types(types.to_vec()))
}

fn apply(pc: &dyn Preconditioner, r: &DoubleVector) -> DoubleVector {
    let mut z = DoubleVector::new();
    pc.preconditioner_solve(r, &mut z).unwrap();
    z
}

fn assert_close(z: &DoubleVector, x: &[f64]) {
    assert_eq!(z.len(), x.len());
    for (zi, xi) in z.values().iter().zip(x) {
        assert_abs_diff_eq!(*zi, *xi, epsilon = 1e-10);
    }
}

const TYPES: [usize; 9] = [0, 1, 2, 0, 1, 2, 2, 1, 0];

#[test]
fn block_diagonal_is_exact_on_block_diagonal_matrix() {
    let a = coupled_matrix(&TYPES, |ti, tj| ti == tj, 1);
    let (b, x) = rhs_for(&a, 2);
    let mut pc = BlockDiagonalPreconditioner::new();
    pc.add_mesh(mesh(&TYPES));
    pc.setup(&a).unwrap();
    assert_eq!(pc.nblock_types(), 3);
    assert_close(&apply(&pc, &b), &x);
}

#[test]
fn block_triangular_upper_is_exact_on_block_upper_matrix() {
    let a = coupled_matrix(&TYPES, |ti, tj| ti <= tj, 3);
    let (b, x) = rhs_for(&a, 4);
    let mut pc = BlockTriangularPreconditioner::new();
    pc.add_mesh(mesh(&TYPES));
    pc.setup(&a).unwrap();
    assert_close(&apply(&pc, &b), &x);
}

#[test]
fn block_triangular_lower_is_exact_on_block_lower_matrix() {
    let a = coupled_matrix(&TYPES, |ti, tj| ti >= tj, 5);
    let (b, x) = rhs_for(&a, 6);
    let mut pc = BlockTriangularPreconditioner::new();
    pc.lower_triangular();
    assert!(!pc.is_upper_triangular());
    pc.add_mesh(mesh(&TYPES));
    pc.setup(&a).unwrap();
    assert_close(&apply(&pc, &b), &x);
}

#[test]
fn upper_sweep_matches_hand_back_substitution() {
    // Lower entries must be ignored in upper mode.
    //     [2 1 3]        [ 1]
    // A = [1 4 2],   r = [ 2]
    //     [7 0 5]        [10]
    // z2 = 10/5 = 2
    // z1 = (2 - 2*z2)/4 = -0.5
    // z0 = (1 - 3*z2 - 1*z1)/2 = -2.25
    let a = CsrMatrix::from_triplets(
        3,
        3,
        &[(0, 0, 2.0), (0, 1, 1.0), (0, 2, 3.0), (1, 0, 1.0), (1, 1, 4.0), (1, 2, 2.0), (2, 0, 7.0), (2, 2, 5.0)],
    );
    let mut pc = BlockTriangularPreconditioner::new();
    pc.add_mesh(mesh(&[0, 1, 2]));
    pc.setup(&a).unwrap();
    let z = apply(&pc, &DoubleVector::from(vec![1.0, 2.0, 10.0]));
    assert_close(&z, &[-2.25, -0.5, 2.0]);
}

#[test]
fn exact_is_exact_for_any_coupling_and_both_assemblies() {
    let a = coupled_matrix(&TYPES, |_, _| true, 7);
    let (b, x) = rhs_for(&a, 8);
    let mut results = Vec::new();
    for assembly in [BlockAssembly::Simultaneous, BlockAssembly::BlockRow] {
        let mut pc = ExactBlockPreconditioner::new();
        pc.set_block_assembly(assembly);
        pc.add_mesh(mesh(&TYPES));
        pc.setup(&a).unwrap();
        let z = apply(&pc, &b);
        assert_close(&z, &x);
        results.push(z);
    }
    assert_eq!(results[0], results[1]);
}

#[test]
fn dof_to_block_map_groups_types() {
    // types 0 and 2 in one block: block-diagonal in the coarse grouping only
    let a = coupled_matrix(&TYPES, |ti, tj| (ti == 1) == (tj == 1), 9);
    let (b, x) = rhs_for(&a, 10);
    let mut pc = BlockDiagonalPreconditioner::new();
    pc.add_mesh(mesh(&TYPES));
    pc.set_dof_to_block_map(&[0, 1, 0]);
    pc.setup(&a).unwrap();
    assert_eq!(pc.nblock_types(), 2);
    assert_close(&apply(&pc, &b), &x);
}

#[test]
fn empty_dof_to_block_map_is_one_block_per_type() {
    let a = coupled_matrix(&TYPES, |ti, tj| ti == tj, 21);
    let (b, x) = rhs_for(&a, 22);
    let mut pc = BlockDiagonalPreconditioner::new();
    pc.add_mesh(mesh(&TYPES));
    pc.set_dof_to_block_map(&[]);
    pc.setup(&a).unwrap();
    assert_eq!(pc.nblock_types(), 3);
    assert_close(&apply(&pc, &b), &x);
}

#[test]
fn singular_lu_block_fails_at_solve() {
    // block 1 is [[1, 1], [1, 1]]; LU factorizes it and the solve reports the block
    let a = CsrMatrix::from_triplets(3, 3, &[(0, 0, 2.0), (1, 1, 1.0), (1, 2, 1.0), (2, 1, 1.0), (2, 2, 1.0)]);
    let mut pc = BlockDiagonalPreconditioner::new();
    pc.add_mesh(mesh(&[0, 1, 1]));
    pc.setup(&a).unwrap();
    let mut z = DoubleVector::new();
    let err = pc.preconditioner_solve(&DoubleVector::from(vec![1.0, 1.0, 2.0]), &mut z).unwrap_err();
    assert!(matches!(err, KError::Subsidiary { block: 1, .. }));
}

#[test]
fn dummy_is_the_identity() {
    let a = coupled_matrix(&TYPES, |_, _| true, 11);
    let mut pc = DummyBlockPreconditioner::new();
    pc.add_mesh(mesh(&TYPES));
    pc.setup(&a).unwrap();
    let (r, _) = rhs_for(&a, 12);
    assert_eq!(apply(&pc, &r), r);
}

#[test]
fn two_level_matches_sequential() {
    let a = coupled_matrix(&TYPES, |_, _| true, 13);
    let (r, _) = rhs_for(&a, 14);
    let factories: [Option<SubsidiaryPreconditionerFn>; 3] = [None, Some(jacobi), Some(ilu0)];
    for factory in factories {
        let mut sequential = BlockDiagonalPreconditioner::new();
        let mut two_level = BlockDiagonalPreconditioner::new();
        two_level.enable_two_level_parallelisation();
        for pc in [&mut sequential, &mut two_level] {
            pc.add_mesh(mesh(&TYPES));
            if let Some(f) = factory {
                pc.set_subsidiary_preconditioner_function(f);
            }
            pc.setup(&a).unwrap();
        }
        let zs = apply(&sequential, &r);
        let zt = apply(&two_level, &r);
        for (s, t) in zs.values().iter().zip(zt.values()) {
            assert_abs_diff_eq!(*s, *t, epsilon = 1e-14);
        }
    }
}

/// Exact inner preconditioner over a 2-row block whose rows have different DOF types.
fn exact_inner() -> Box<dyn Preconditioner> {
    let mut pc = ExactBlockPreconditioner::new();
    pc.add_mesh(Arc::new(DofTypeMap::from_types(vec![1, 0])));
    Box::new(pc)
}

#[test]
fn block_diagonal_of_exact_composites() {
    let types = [0, 0, 1, 1, 2, 2];
    let a = coupled_matrix(&types, |ti, tj| ti == tj, 15);
    let (b, x) = rhs_for(&a, 16);
    let mut pc = BlockDiagonalPreconditioner::new();
    pc.add_mesh(mesh(&types));
    pc.set_subsidiary_preconditioner_function(exact_inner);
    pc.setup(&a).unwrap();
    assert!(pc.subsidiary_block_preconditioner(2).is_some());
    assert_close(&apply(&pc, &b), &x);
}

#[test]
fn options_build_the_configured_strategy() {
    let a = coupled_matrix(&TYPES, |_, _| true, 17);
    let (b, x) = rhs_for(&a, 18);
    let opts = BlockPcOptions::from_args(&[
        "-pc_block_type", "exact",
        "-pc_block_assembly", "block_row",
        "-pc_block_dof_to_block", "0,1,1",
    ])
    .unwrap();
    let mut pc = BlockPc::from_options(&opts).mesh(mesh(&TYPES)).build();
    pc.setup(&a).unwrap();
    assert_close(&apply(pc.as_ref(), &b), &x);

    // block-diagonal with Jacobi blocks is only approximate, but must still run
    let opts = BlockPcOptions::from_args(&["-pc_block_sub_type", "jacobi", "-pc_block_two_level"]).unwrap();
    let mut pc = BlockPc::from_options(&opts).mesh(mesh(&TYPES)).build();
    pc.setup(&a).unwrap();
    let z = apply(pc.as_ref(), &b);
    for (i, zi) in z.values().iter().enumerate() {
        assert_abs_diff_eq!(*zi, b[i] / a.get(i, i), epsilon = 1e-14);
    }
}

#[test]
fn repeated_setup_tracks_new_matrix() {
    let mut pc = BlockTriangularPreconditioner::new();
    pc.add_mesh(mesh(&TYPES));
    for seed in [19, 20] {
        let a = coupled_matrix(&TYPES, |ti, tj| ti <= tj, seed);
        let (b, x) = rhs_for(&a, seed + 100);
        pc.setup(&a).unwrap();
        assert_close(&apply(&pc, &b), &x);
    }
}
