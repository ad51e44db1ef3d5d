/// Similarity-engine contract tests
///
/// Standalone checks of the numerical contract behind the analogy search:
/// standardized cosine similarity, its rank-order equivalence with
/// Euclidean distance on unit vectors, the epsilon guard for degenerate
/// rows, and stable tie ordering.
///
/// NOTE: These mirror the engine's math without touching the binary crate,
/// so they stay runnable as plain integration tests.

fn standardize_columns(matrix: &mut [Vec<f64>]) {
    if matrix.is_empty() {
        return;
    }
    let rows = matrix.len();
    let cols = matrix[0].len();

    for j in 0..cols {
        let mean = matrix.iter().map(|r| r[j]).sum::<f64>() / rows as f64;
        let variance =
            matrix.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / rows as f64;
        let std = variance.sqrt();
        let scale = if std == 0.0 { 1.0 } else { std };

        for row in matrix.iter_mut() {
            row[j] = (row[j] - mean) / scale;
        }
    }
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let norm_a = a.iter().map(|v| v * v).sum::<f64>().sqrt() + 1e-10;
    let norm_b = b.iter().map(|v| v * v).sum::<f64>().sqrt() + 1e-10;
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn to_unit(v: &[f64]) -> Vec<f64> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt() + 1e-10;
    v.iter().map(|x| x / norm).collect()
}

// ---------------------------------------------------------------------------
// Cosine similarity basics
// ---------------------------------------------------------------------------

#[test]
fn test_cosine_identical_vectors_near_one() {
    let v = vec![1.5, -2.0, 0.3];
    let sim = cosine(&v, &v);
    assert!((sim - 1.0).abs() < 1e-6);
}

#[test]
fn test_cosine_opposite_vectors_near_minus_one() {
    let v = vec![1.0, 2.0, 3.0];
    let neg: Vec<f64> = v.iter().map(|x| -x).collect();
    assert!((cosine(&v, &neg) + 1.0).abs() < 1e-6);
}

#[test]
fn test_cosine_orthogonal_vectors_zero() {
    assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
}

#[test]
fn test_zero_vector_guard_no_nan() {
    // Degenerate all-zero row must produce a finite similarity, not NaN
    let sim = cosine(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]);
    assert!(sim.is_finite());
    assert_eq!(sim, 0.0);
}

// ---------------------------------------------------------------------------
// Rank-order equivalence: cosine on unit vectors vs Euclidean distance
// ---------------------------------------------------------------------------

#[test]
fn test_cosine_rank_matches_euclidean_rank_on_unit_vectors() {
    let query = to_unit(&[0.8, -1.2, 0.4, 2.0]);
    let candidates = vec![
        to_unit(&[0.7, -1.0, 0.5, 1.8]),
        to_unit(&[-0.5, 2.0, -1.0, 0.2]),
        to_unit(&[0.9, -1.3, 0.3, 2.1]),
        to_unit(&[2.0, 0.0, -2.0, -1.0]),
    ];

    let mut by_cosine: Vec<usize> = (0..candidates.len()).collect();
    by_cosine.sort_by(|&a, &b| {
        cosine(&candidates[b], &query)
            .partial_cmp(&cosine(&candidates[a], &query))
            .unwrap()
    });

    let mut by_euclidean: Vec<usize> = (0..candidates.len()).collect();
    by_euclidean.sort_by(|&a, &b| {
        euclidean(&candidates[a], &query)
            .partial_cmp(&euclidean(&candidates[b], &query))
            .unwrap()
    });

    // On unit vectors, descending cosine equals ascending distance
    assert_eq!(by_cosine, by_euclidean);
}

// ---------------------------------------------------------------------------
// Standardization
// ---------------------------------------------------------------------------

#[test]
fn test_standardized_columns_zero_mean_unit_variance() {
    let mut matrix = vec![
        vec![10.0, 100.0],
        vec![20.0, 400.0],
        vec![30.0, 250.0],
        vec![40.0, 50.0],
    ];
    standardize_columns(&mut matrix);

    for j in 0..2 {
        let mean = matrix.iter().map(|r| r[j]).sum::<f64>() / matrix.len() as f64;
        let var = matrix.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>()
            / matrix.len() as f64;
        assert!(mean.abs() < 1e-9, "column {} mean {}", j, mean);
        assert!((var - 1.0).abs() < 1e-9, "column {} var {}", j, var);
    }
}

#[test]
fn test_constant_column_survives_standardization() {
    let mut matrix = vec![vec![5.0, 1.0], vec![5.0, 2.0], vec![5.0, 3.0]];
    standardize_columns(&mut matrix);
    // Zero-variance column passes through with scale 1.0, no NaN/inf
    for row in &matrix {
        assert!(row[0].is_finite());
        assert_eq!(row[0], 0.0);
    }
}

#[test]
fn test_standardization_makes_scales_comparable() {
    // Without standardization the volume-scale column dominates cosine;
    // with it, the small-scale column matters equally.
    let mut matrix = vec![
        vec![25.0, 9_000_000.0],
        vec![75.0, 9_000_100.0],
        vec![26.0, 1_000_000.0],
    ];
    // Fit the scaler on historical rows only, then transform the query
    // with the same statistics
    let mean0 = (25.0 + 75.0 + 26.0) / 3.0;
    let std0 = (((25.0f64 - mean0).powi(2) + (75.0 - mean0).powi(2) + (26.0 - mean0).powi(2))
        / 3.0)
        .sqrt();
    let mean1 = (9_000_000.0 + 9_000_100.0 + 1_000_000.0) / 3.0;
    let std1 = (((9_000_000.0f64 - mean1).powi(2)
        + (9_000_100.0 - mean1).powi(2)
        + (1_000_000.0 - mean1).powi(2))
        / 3.0)
        .sqrt();
    let query = vec![(25.0 - mean0) / std0, (1_000_050.0 - mean1) / std1];

    standardize_columns(&mut matrix);
    let sims: Vec<f64> = matrix.iter().map(|row| cosine(row, &query)).collect();

    // Row 2 (rsi 26, low volume) is the true neighbor after standardization
    let best = sims
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(best, 2);
}

// ---------------------------------------------------------------------------
// Tie-breaking
// ---------------------------------------------------------------------------

#[test]
fn test_stable_sort_preserves_insertion_order_on_ties() {
    let sims = [0.9, 0.7, 0.9, 0.5, 0.9];
    let mut order: Vec<usize> = (0..sims.len()).collect();
    order.sort_by(|&a, &b| sims[b].partial_cmp(&sims[a]).unwrap());

    // The three tied 0.9 entries keep their original relative order
    assert_eq!(order, vec![0, 2, 4, 1, 3]);
}
