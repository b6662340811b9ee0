//! Decision tree learning over points labelled with sets of terms.

use crate::spec::Signature;

/// A decision tree whose leaves are term indices and whose inner nodes test predicate indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionTree {
    Leaf(usize),
    Split {
        pred: usize,
        yes: Box<DecisionTree>,
        no: Box<DecisionTree>,
    },
}

impl DecisionTree {
    /// Number of inner nodes.
    pub fn splits(&self) -> usize {
        match self {
            DecisionTree::Leaf(_) => 0,
            DecisionTree::Split { yes, no, .. } => 1 + yes.splits() + no.splits(),
        }
    }
}

/// Learns a tree that, at every point, selects a term satisfying that point.
///
/// `term_sigs[t]` holds the points satisfied by term `t`; `pred_sigs[p]` holds the points at which predicate `p` is true.
/// Returns `None` if the predicates cannot separate the points.
pub fn learn(term_sigs: &[&Signature], pred_sigs: &[&Signature], n_points: usize) -> Option<DecisionTree> {
    let labels: Vec<Vec<usize>> = (0..n_points)
        .map(|p| {
            term_sigs
                .iter()
                .enumerate()
                .filter(|(_, s)| s.get(p))
                .map(|(t, _)| t)
                .collect()
        })
        .collect();
    if labels.iter().any(|l| l.is_empty()) {
        return None;
    }
    let points: Vec<usize> = (0..n_points).collect();
    id3(&points, &labels, term_sigs, pred_sigs)
}

fn id3(
    points: &[usize],
    labels: &[Vec<usize>],
    term_sigs: &[&Signature],
    pred_sigs: &[&Signature],
) -> Option<DecisionTree> {
    // a term satisfying every point in the set
    if let Some(t) = (0..term_sigs.len()).find(|t| points.iter().all(|p| term_sigs[*t].get(*p))) {
        return Some(DecisionTree::Leaf(t));
    }

    let entropy = multi_label_entropy(points, labels);
    let mut best: Option<(f64, usize, Vec<usize>, Vec<usize>)> = None;
    for (i, sig) in pred_sigs.iter().enumerate() {
        let (yes, no): (Vec<usize>, Vec<usize>) = points.iter().partition(|p| sig.get(**p));
        if yes.is_empty() || no.is_empty() {
            continue;
        }
        let n = points.len() as f64;
        let gain = entropy
            - (yes.len() as f64 / n) * multi_label_entropy(&yes, labels)
            - (no.len() as f64 / n) * multi_label_entropy(&no, labels);
        if best.as_ref().map_or(true, |(g, ..)| gain > *g) {
            best = Some((gain, i, yes, no));
        }
    }
    let (_, pred, yes, no) = best?;
    let yes = id3(&yes, labels, term_sigs, pred_sigs)?;
    let no = id3(&no, labels, term_sigs, pred_sigs)?;
    Some(DecisionTree::Split {
        pred,
        yes: Box::new(yes),
        no: Box::new(no),
    })
}

/// Entropy where each point spreads its weight evenly over its labels.
fn multi_label_entropy(points: &[usize], labels: &[Vec<usize>]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let mut weights: std::collections::HashMap<usize, f64> = std::collections::HashMap::new();
    for p in points {
        let share = 1.0 / labels[*p].len() as f64;
        for l in &labels[*p] {
            *weights.entry(*l).or_default() += share;
        }
    }
    let n = points.len() as f64;
    weights
        .values()
        .map(|w| w / n)
        .filter(|q| *q > 0.0)
        .map(|q| -q * q.log2())
        .sum()
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    fn sig(bits: &[bool]) -> Signature {
        let mut s = Signature::new(0);
        bits.iter().for_each(|b| s.push(*b));
        s
    }

    #[test]
    fn common_term_is_a_leaf() {
        let t0 = sig(&[true, false, true]);
        let t1 = sig(&[true, true, true]);
        let tree = learn(&[&t0, &t1], &[], 3).unwrap();
        assert_eq!(tree, DecisionTree::Leaf(1));
    }

    #[test]
    fn splits_on_separating_predicate() {
        let t0 = sig(&[true, false]);
        let t1 = sig(&[false, true]);
        let useless = sig(&[true, true]);
        let p = sig(&[true, false]);
        let tree = learn(&[&t0, &t1], &[&useless, &p], 2).unwrap();
        assert_eq!(
            tree,
            DecisionTree::Split {
                pred: 1,
                yes: Box::new(DecisionTree::Leaf(0)),
                no: Box::new(DecisionTree::Leaf(1)),
            }
        );
    }

    #[test]
    fn inseparable_points_fail() {
        let t0 = sig(&[true, false]);
        let t1 = sig(&[false, true]);
        let p = sig(&[true, true]);
        assert!(learn(&[&t0, &t1], &[&p], 2).is_none());
    }

    #[test]
    fn entropy_of_single_label_is_zero() {
        let labels = vec![vec![0], vec![0]];
        assert_eq!(multi_label_entropy(&[0, 1], &labels), 0.0);
        let labels = vec![vec![0], vec![1]];
        assert!((multi_label_entropy(&[0, 1], &labels) - 1.0).abs() < 1e-9);
    }

    /// With a predicate per point, every labelling is learnable and the tree picks a correct term everywhere.
    #[quickcheck]
    fn learned_tree_is_correct(labels: Vec<u8>) -> bool {
        let n = labels.len().min(12);
        let n_terms = 3;
        let term_sigs: Vec<Signature> = (0..n_terms)
            .map(|t| sig(&(0..n).map(|p| labels[p] as usize % n_terms == t || labels[p] % 7 == 0).collect::<Vec<_>>()))
            .collect();
        let pred_sigs: Vec<Signature> = (0..n)
            .map(|q| sig(&(0..n).map(|p| p == q).collect::<Vec<_>>()))
            .collect();
        let ts: Vec<&Signature> = term_sigs.iter().collect();
        let ps: Vec<&Signature> = pred_sigs.iter().collect();
        let Some(tree) = learn(&ts, &ps, n) else {
            return false;
        };
        (0..n).all(|p| {
            let mut node = &tree;
            loop {
                match node {
                    DecisionTree::Leaf(t) => return term_sigs[*t].get(p),
                    DecisionTree::Split { pred, yes, no } => {
                        node = if pred_sigs[*pred].get(p) { yes } else { no };
                    }
                }
            }
        })
    }
}
