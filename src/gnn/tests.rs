use super::*;
use crate::autograd::{clear_graph, get_grad};
use rand::SeedableRng;

fn ring_edges() -> Vec<EdgeIndex> {
    // Directed ring: 0 → 1 → 2 → 0
    vec![(0, 1), (1, 2), (2, 0)]
}

fn adjacency(n: usize, edges: &[EdgeIndex]) -> Arc<NormalizedAdjacency> {
    Arc::new(NormalizedAdjacency::new(n, edges).unwrap())
}

fn coeff(adj: &NormalizedAdjacency, s: usize, t: usize) -> f32 {
    adj.entries()
        .iter()
        .filter(|&&(a, b, _)| a == s && b == t)
        .map(|&(_, _, c)| c)
        .sum()
}

#[test]
fn test_isolated_nodes_keep_their_features() {
    let adj = adjacency(3, &[]);
    let x = Tensor::new(&[1.0, 2.0, 3.0], &[3, 1]);
    let out = adj.propagate(&x);
    assert_eq!(out.data(), &[1.0, 2.0, 3.0]);
}

#[test]
fn test_ring_coefficients() {
    // Every node has in-degree 1 plus its self-loop.
    let adj = adjacency(3, &ring_edges());
    assert_eq!(adj.num_entries(), 6);
    assert!((coeff(&adj, 0, 1) - 0.5).abs() < 1e-6);
    assert!((coeff(&adj, 1, 1) - 0.5).abs() < 1e-6);
    assert_eq!(coeff(&adj, 1, 0), 0.0);
}

#[test]
fn test_messages_flow_source_to_target() {
    let adj = adjacency(2, &[(0, 1)]);
    // deg[0] = 1, deg[1] = 2
    let x = Tensor::new(&[4.0, 0.0], &[2, 1]);
    let out = adj.propagate(&x);
    assert!((out.data()[0] - 4.0).abs() < 1e-6);
    assert!((out.data()[1] - 4.0 / 2.0_f32.sqrt()).abs() < 1e-5);
}

#[test]
fn test_existing_self_loops_collapse() {
    let with_loops = adjacency(2, &[(0, 0), (0, 0), (0, 1)]);
    let without = adjacency(2, &[(0, 1)]);
    assert_eq!(with_loops.entries(), without.entries());
}

#[test]
fn test_duplicate_edges_count_in_degree() {
    let adj = adjacency(2, &[(0, 1), (0, 1)]);
    // deg[1] = 3, deg[0] = 1: each duplicate carries 1/sqrt(3)
    assert!((coeff(&adj, 0, 1) - 2.0 / 3.0_f32.sqrt()).abs() < 1e-5);
    assert!((coeff(&adj, 1, 1) - 1.0 / 3.0).abs() < 1e-6);
}

#[test]
fn test_out_of_range_edge_rejected() {
    let err = NormalizedAdjacency::new(3, &[(0, 3)]).unwrap_err();
    assert!(matches!(err, BotliftError::DataIntegrity(_)));
}

#[test]
fn test_propagate_gradient_is_transpose() {
    clear_graph();
    let adj = adjacency(2, &[(0, 1)]);
    let x = Tensor::new(&[1.0, 1.0], &[2, 1]).requires_grad();
    // Only node 1's output contributes.
    let out = adj.propagate(&x);
    out.mul(&Tensor::new(&[0.0, 1.0], &[2, 1])).sum().backward();

    let grad = get_grad(x.id()).unwrap();
    assert!((grad.data()[0] - 1.0 / 2.0_f32.sqrt()).abs() < 1e-5);
    assert!((grad.data()[1] - 0.5).abs() < 1e-6);
}

#[test]
fn test_gcn_conv_shapes_and_params() {
    let mut rng = StdRng::seed_from_u64(1);
    let gcn = GCNConv::new(4, 8, &mut rng);
    assert_eq!(gcn.in_features(), 4);
    assert_eq!(gcn.out_features(), 8);
    assert_eq!(gcn.parameters().len(), 2);
    assert_eq!(gcn.num_parameters(), 4 * 8 + 8);

    let out = gcn.forward(&Tensor::ones(&[3, 4]), &adjacency(3, &ring_edges()));
    assert_eq!(out.shape(), &[3, 8]);
}

#[test]
fn test_gcn_conv_bias_starts_at_zero() {
    let gcn = GCNConv::new(2, 3, &mut StdRng::seed_from_u64(5));
    assert!(gcn.parameters()[1].data().iter().all(|&b| b == 0.0));
}

#[test]
fn test_gcn_conv_gradients_reach_parameters() {
    clear_graph();
    let gcn = GCNConv::new(1, 2, &mut StdRng::seed_from_u64(2));
    let out = gcn.forward(&Tensor::ones(&[3, 1]), &adjacency(3, &ring_edges()));
    out.sum().backward();

    for param in gcn.parameters() {
        assert!(get_grad(param.id()).is_some(), "missing gradient");
    }
    // Each output row receives the bias once.
    assert_eq!(get_grad(gcn.parameters()[1].id()).unwrap().data(), &[3.0, 3.0]);
}

#[test]
#[should_panic(expected = "input features")]
fn test_gcn_conv_rejects_wrong_width() {
    let gcn = GCNConv::new(2, 3, &mut StdRng::seed_from_u64(5));
    let _ = gcn.forward(&Tensor::ones(&[3, 1]), &adjacency(3, &ring_edges()));
}
