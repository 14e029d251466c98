/**
 * Return `n` uniformly spaced nodes on [0, 1], end points included. Node
 * sets with `1 + (n - 1) * k` points contain every node of the set with
 * `n` points.
 */
pub fn uniform(n: usize) -> Vec<f64> {
    assert!(n >= 2, "at least two nodes are needed");
    (0..n).map(|k| k as f64 / (n - 1) as f64).collect()
}




/// Coefficients, lowest order first, of the Lagrange polynomial which is one
/// at `nodes[j]` and zero at the other nodes.
fn lagrange_coefficients(nodes: &[f64], j: usize) -> Vec<f64> {
    let mut coeffs = vec![1.0];

    for (_, &tk) in nodes.iter().enumerate().filter(|&(k, _)| k != j) {
        let denom = nodes[j] - tk;
        let mut next = vec![0.0; coeffs.len() + 1];

        for (p, c) in coeffs.iter().enumerate() {
            next[p + 1] += c / denom;
            next[p] -= c * tk / denom;
        }
        coeffs = next;
    }
    coeffs
}

fn antiderivative(coeffs: &[f64], t: f64) -> f64 {
    coeffs
        .iter()
        .enumerate()
        .rev()
        .fold(0.0, |acc, (p, c)| acc * t + c / (p + 1) as f64) * t
}

fn evaluate(coeffs: &[f64], t: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * t + c)
}




/**
 * The node-to-node integration matrix: row `m` holds the weights which
 * integrate the interpolating polynomial of values at the nodes from
 * `nodes[m]` to `nodes[m + 1]`.
 */
pub fn integration_matrix(nodes: &[f64]) -> Vec<Vec<f64>> {
    let basis: Vec<_> = (0..nodes.len()).map(|j| lagrange_coefficients(nodes, j)).collect();

    nodes
        .windows(2)
        .map(|w| basis.iter().map(|l| antiderivative(l, w[1]) - antiderivative(l, w[0])).collect())
        .collect()
}




/**
 * The matrix which maps values at the `src` nodes to the values of their
 * interpolating polynomial at the `dst` nodes.
 */
pub fn interpolation_matrix(dst: &[f64], src: &[f64]) -> Vec<Vec<f64>> {
    let basis: Vec<_> = (0..src.len()).map(|j| lagrange_coefficients(src, j)).collect();

    dst.iter()
        .map(|&t| basis.iter().map(|l| evaluate(l, t)).collect())
        .collect()
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn uniform_nodes_are_nested() {
        let coarse = uniform(3);
        let fine = uniform(9);
        for (m, t) in coarse.iter().enumerate() {
            assert_eq!(*t, fine[4 * m]);
        }
    }

    #[test]
    fn integration_matrix_is_exact_for_polynomials() {
        let nodes = uniform(5);
        let smat = integration_matrix(&nodes);

        for (m, row) in smat.iter().enumerate() {
            let approx: f64 = row.iter().zip(&nodes).map(|(s, t)| s * t.powi(3)).sum();
            let exact = (nodes[m + 1].powi(4) - nodes[m].powi(4)) / 4.0;
            assert!((approx - exact).abs() < 1e-14);
        }
        let total: f64 = smat.iter().flatten().sum();
        assert!((total - 1.0).abs() < 1e-14);
    }

    #[test]
    fn interpolation_matrix_injects_nested_nodes() {
        let pmat = interpolation_matrix(&uniform(5), &uniform(3));
        assert!((pmat[2][1] - 1.0).abs() < 1e-14);
        assert!((pmat[1].iter().sum::<f64>() - 1.0).abs() < 1e-14);
        assert!((pmat[1][0] - 0.375).abs() < 1e-14);
    }
}
