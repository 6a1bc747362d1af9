use criterion::{black_box, Criterion, criterion_group, criterion_main};
use kryst_block::block::{DofClassifier, DofTypeMap};
use kryst_block::matrix::{CsrMatrix, DoubleVector};
use kryst_block::preconditioner::{
    BlockAssembly, BlockDiagonalPreconditioner, BlockTriangularPreconditioner, ExactBlockPreconditioner,
    GeneralPurposeBlockPreconditioner,
};
use std::sync::Arc;

const NBLOCK: usize = 4;

/// Banded, diagonally dominant system with `NBLOCK` interleaved dof types.
fn system(n: usize) -> (CsrMatrix, Arc<dyn DofClassifier>) {
    let mut triplets = Vec::new();
    for i in 0..n {
        triplets.push((i, i, 8.0));
        for d in [1, 2, 5] {
            if i + d < n {
                triplets.push((i, i + d, -((i % 7) as f64 + 1.0).recip()));
                triplets.push((i + d, i, -((i % 3) as f64 + 1.0).recip()));
            }
        }
    }
    let mesh: Arc<dyn DofClassifier> = Arc::new(DofTypeMap::from_types((0..n).map(|k| k % NBLOCK).collect()));
    (CsrMatrix::from_triplets(n, n, &triplets), mesh)
}

fn bench_strategy<P: GeneralPurposeBlockPreconditioner>(c: &mut Criterion, name: &str, mut pc: P) {
    let n = 400;
    let (a, mesh) = system(n);
    let r = DoubleVector::from((0..n).map(|i| (i as f64).cos()).collect::<Vec<_>>());
    pc.add_mesh(mesh);

    c.bench_function(&format!("{name} setup"), |ben| {
        ben.iter(|| pc.setup(black_box(&a)).unwrap())
    });

    let mut z = DoubleVector::new();
    c.bench_function(&format!("{name} solve"), |ben| {
        ben.iter(|| pc.preconditioner_solve(black_box(&r), &mut z).unwrap())
    });
}

fn bench_block_strategies(c: &mut Criterion) {
    bench_strategy(c, "block diagonal", BlockDiagonalPreconditioner::new());

    let mut two_level = BlockDiagonalPreconditioner::new();
    two_level.enable_two_level_parallelisation();
    bench_strategy(c, "block diagonal (two-level)", two_level);

    bench_strategy(c, "block upper triangular", BlockTriangularPreconditioner::new());

    bench_strategy(c, "exact (simultaneous)", ExactBlockPreconditioner::new());
    let mut by_row = ExactBlockPreconditioner::new();
    by_row.set_block_assembly(BlockAssembly::BlockRow);
    bench_strategy(c, "exact (block row)", by_row);
}

criterion_group!(benches, bench_block_strategies);
criterion_main!(benches);
