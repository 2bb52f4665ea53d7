//! CART regression tree grown on squared error.

use rand::Rng;
use rand::seq::SliceRandom;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct TreeParams {
    /// A split is only kept when both children hold at least this many samples.
    pub min_samples_leaf: usize,
    /// Maximum number of splits from the root to any leaf.
    pub max_depth: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        value: f64,
        left: usize,
        right: usize,
    },
}

impl Node {
    fn value(&self) -> f64 {
        match self {
            Node::Leaf { value } | Node::Split { value, .. } => *value,
        }
    }
}

/// A fitted regression tree over column-major features.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    /// Grow a tree on the samples listed in `samples` (duplicates allowed).
    ///
    /// `columns[f][row]` is the value of feature `f` for `row`. Features are
    /// examined in a freshly shuffled order at every node; among equally good
    /// splits the first one examined wins.
    pub fn fit<R: Rng>(
        columns: &[Vec<f64>],
        target: &[f64],
        samples: Vec<usize>,
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let min_leaf = params.min_samples_leaf.max(1);
        let mut nodes = Vec::new();
        // (node slot, samples, depth)
        let mut stack = vec![(0usize, samples, 0usize)];
        nodes.push(Node::Leaf { value: 0.0 });

        while let Some((slot, samples, depth)) = stack.pop() {
            let value = mean(samples.iter().map(|&i| target[i]));
            nodes[slot] = Node::Leaf { value };

            if depth >= params.max_depth || samples.len() < 2 * min_leaf {
                continue;
            }

            let Some(best) = find_split(columns, target, &samples, min_leaf, rng) else {
                continue;
            };

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&i| columns[best.feature][i] <= best.threshold);

            let left = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });
            let right = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });

            nodes[slot] = Node::Split {
                feature: best.feature,
                threshold: best.threshold,
                value,
                left,
                right,
            };
            stack.push((right, right_samples, depth + 1));
            stack.push((left, left_samples, depth + 1));
        }

        Self { nodes }
    }

    /// Prediction for one row of feature values.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Mean target of the training samples at the root.
    pub fn bias(&self) -> f64 {
        self.nodes[0].value()
    }

    /// Add each feature's path contribution for `row` into `out`.
    ///
    /// Every split on the decision path credits `child mean - parent mean` to
    /// its feature, so `bias() + sum(out)` equals `predict(row)`.
    pub fn add_contributions(&self, row: &[f64], out: &mut [f64]) {
        let mut idx = 0;
        while let Node::Split {
            feature,
            threshold,
            value,
            left,
            right,
        } = &self.nodes[idx]
        {
            let next = if row[*feature] <= *threshold {
                *left
            } else {
                *right
            };
            out[*feature] += self.nodes[next].value() - value;
            idx = next;
        }
    }

    /// Number of nodes, leaves included.
    #[cfg(test)]
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf.
    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Best squared-error split of `samples`, or `None` if no split improves on the parent.
fn find_split<R: Rng>(
    columns: &[Vec<f64>],
    target: &[f64],
    samples: &[usize],
    min_leaf: usize,
    rng: &mut R,
) -> Option<BestSplit> {
    let n = samples.len();
    let total: f64 = samples.iter().map(|&i| target[i]).sum();
    // maximizing sum_l^2/n_l + sum_r^2/n_r minimizes the children's squared error
    let parent_score = total * total / n as f64;

    let mut features: Vec<usize> = (0..columns.len()).collect();
    features.shuffle(rng);

    let mut best: Option<BestSplit> = None;
    let mut order = samples.to_vec();

    for feature in features {
        let column = &columns[feature];
        order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

        let mut left_sum = 0.0;
        for k in 1..n {
            left_sum += target[order[k - 1]];
            if k < min_leaf || n - k < min_leaf {
                continue;
            }
            let lo = column[order[k - 1]];
            let hi = column[order[k]];
            if lo == hi {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64;
            let threshold_score = best.as_ref().map_or(parent_score, |b| b.score);
            if score > threshold_score + 1e-12 * threshold_score.abs().max(1.0) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(BestSplit {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let noise: Vec<f64> = (0..20).map(|i| ((i * 7) % 5) as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| if *v < 10.0 { 1.0 } else { 5.0 }).collect();
        (vec![x, noise], y)
    }

    #[test]
    fn test_tree_learns_step() {
        let (columns, y) = step_data();
        let mut rng = StdRng::seed_from_u64(0);
        let params = TreeParams {
            min_samples_leaf: 1,
            max_depth: 3,
        };
        let tree = RegressionTree::fit(&columns, &y, (0..20).collect(), params, &mut rng);

        assert_eq!(tree.predict(&[2.0, 0.0]), 1.0);
        assert_eq!(tree.predict(&[15.0, 0.0]), 5.0);
        assert_eq!(tree.bias(), 3.0);
    }

    #[test]
    fn test_depth_limit() {
        let (columns, y) = step_data();
        let mut rng = StdRng::seed_from_u64(0);
        let params = TreeParams {
            min_samples_leaf: 1,
            max_depth: 0,
        };
        let tree = RegressionTree::fit(&columns, &y, (0..20).collect(), params, &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_min_samples_leaf_blocks_small_splits() {
        let (columns, y) = step_data();
        let mut rng = StdRng::seed_from_u64(0);
        let params = TreeParams {
            min_samples_leaf: 11,
            max_depth: 5,
        };
        let tree = RegressionTree::fit(&columns, &y, (0..20).collect(), params, &mut rng);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_contributions_sum_to_prediction() {
        let (columns, y) = step_data();
        let mut rng = StdRng::seed_from_u64(3);
        let params = TreeParams {
            min_samples_leaf: 2,
            max_depth: 4,
        };
        let tree = RegressionTree::fit(&columns, &y, (0..20).collect(), params, &mut rng);

        for row in 0..20 {
            let features = [columns[0][row], columns[1][row]];
            let mut contrib = vec![0.0; 2];
            tree.add_contributions(&features, &mut contrib);
            let total = tree.bias() + contrib.iter().sum::<f64>();
            assert!((total - tree.predict(&features)).abs() < 1e-9);
        }
    }
}
