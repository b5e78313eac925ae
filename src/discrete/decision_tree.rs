//! Generic immutable decision trees
//!
//! A [`DecisionTree`] maps an assignment of discrete variables to a leaf
//! value. Subtrees are reference-counted and shared; a branch whose children
//! are all identical collapses to a single child, so storage is proportional
//! to the number of *distinct* leaf values rather than the full Cartesian
//! product of the variables.
//!
//! Canonical ordering: branch keys strictly increase along every root-to-leaf
//! path. All constructors produce trees in this form, which is what makes
//! [`DecisionTree::apply`] between independently constructed trees
//! well-defined.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use super::assignment::Assignment;
use super::key::{DiscreteKey, Key};
use crate::errors::InferenceError;

/// A tree node: terminal value or decision on one variable
#[derive(Debug)]
pub enum Node<L> {
    /// Terminal value
    Leaf(L),
    /// Decision on `key`; child `i` covers value `i` of the variable
    Branch {
        /// Variable this node branches on
        key: Key,
        /// One child per value, indexed 0..cardinality-1
        children: Vec<Arc<Node<L>>>,
    },
}

/// Immutable key-labeled branching structure with shared subtrees
#[derive(Debug, Clone)]
pub struct DecisionTree<L> {
    root: Arc<Node<L>>,
}

/// Deep equality with a pointer-identity fast path for shared subtrees
fn node_eq<L: PartialEq>(a: &Arc<Node<L>>, b: &Arc<Node<L>>) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    match (a.as_ref(), b.as_ref()) {
        (Node::Leaf(x), Node::Leaf(y)) => x == y,
        (
            Node::Branch {
                key: ka,
                children: ca,
            },
            Node::Branch {
                key: kb,
                children: cb,
            },
        ) => ka == kb && ca.len() == cb.len() && ca.iter().zip(cb).all(|(x, y)| node_eq(x, y)),
        _ => false,
    }
}

/// Build a branch node, collapsing it when all children are identical
fn make_branch<L: PartialEq>(key: Key, mut children: Vec<Arc<Node<L>>>) -> Arc<Node<L>> {
    debug_assert!(!children.is_empty());
    if children.iter().skip(1).all(|c| node_eq(c, &children[0])) {
        return children.swap_remove(0);
    }
    Arc::new(Node::Branch { key, children })
}

impl<L: PartialEq> PartialEq for DecisionTree<L> {
    fn eq(&self, other: &Self) -> bool {
        node_eq(&self.root, &other.root)
    }
}

impl<L> DecisionTree<L> {
    /// A constant tree: one leaf, no branches
    pub fn leaf(value: L) -> Self {
        Self {
            root: Arc::new(Node::Leaf(value)),
        }
    }

    /// Walk the tree following the assignment and return the leaf value
    ///
    /// Fails with [`InferenceError::MissingVariable`] when a branch variable
    /// is absent from the assignment, and with `DimensionMismatch` when an
    /// assigned value exceeds the branch cardinality.
    pub fn evaluate(&self, assignment: &Assignment) -> Result<&L, InferenceError> {
        let mut node = self.root.as_ref();
        loop {
            match node {
                Node::Leaf(value) => return Ok(value),
                Node::Branch { key, children } => {
                    let value = assignment
                        .get(*key)
                        .ok_or(InferenceError::MissingVariable { key: *key })?;
                    node = children
                        .get(value)
                        .ok_or_else(|| InferenceError::DimensionMismatch {
                            expected: children.len(),
                            actual: value,
                            context: format!("value of key {}", key),
                        })?
                        .as_ref();
                }
            }
        }
    }

    /// Call `f` once per leaf node (shared leaves are visited per occurrence)
    pub fn visit_leaves(&self, mut f: impl FnMut(&L)) {
        fn visit<L>(node: &Node<L>, f: &mut impl FnMut(&L)) {
            match node {
                Node::Leaf(value) => f(value),
                Node::Branch { children, .. } => {
                    for child in children {
                        visit(child, f);
                    }
                }
            }
        }
        visit(&self.root, &mut f);
    }

    /// Verify that every branch node agrees with the declared cardinalities
    ///
    /// Branching on an undeclared key is a `Construction` error; a child
    /// count differing from the declared cardinality is `DimensionMismatch`.
    pub fn check_cardinalities(&self, keys: &[DiscreteKey]) -> Result<(), InferenceError> {
        fn check<L>(node: &Node<L>, keys: &[DiscreteKey]) -> Result<(), InferenceError> {
            if let Node::Branch { key, children } = node {
                match keys.iter().find(|k| k.key == *key) {
                    None => {
                        return Err(InferenceError::Construction {
                            description: format!("tree branches on undeclared key {}", key),
                        })
                    }
                    Some(declared) if declared.cardinality != children.len() => {
                        return Err(InferenceError::DimensionMismatch {
                            expected: declared.cardinality,
                            actual: children.len(),
                            context: format!("cardinality of key {}", key),
                        })
                    }
                    _ => {}
                }
                for child in children {
                    check(child, keys)?;
                }
            }
            Ok(())
        }
        check(&self.root, keys)
    }
}

impl<L: PartialEq> DecisionTree<L> {
    /// Build a tree by calling `f` for every full assignment of `keys`
    ///
    /// Identical subtrees merge automatically, so a function that is
    /// constant over some region costs only one leaf for that region.
    pub fn build(keys: &[DiscreteKey], mut f: impl FnMut(&Assignment) -> L) -> Self {
        let result: Result<Self, Infallible> = Self::try_build(keys, |a| Ok(f(a)));
        match result {
            Ok(tree) => tree,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [`DecisionTree::build`]
    pub fn try_build<E>(
        keys: &[DiscreteKey],
        mut f: impl FnMut(&Assignment) -> Result<L, E>,
    ) -> Result<Self, E> {
        fn build_node<L: PartialEq, E, F: FnMut(&Assignment) -> Result<L, E>>(
            keys: &[DiscreteKey],
            assignment: &mut Assignment,
            f: &mut F,
        ) -> Result<Arc<Node<L>>, E> {
            match keys.split_first() {
                None => Ok(Arc::new(Node::Leaf(f(assignment)?))),
                Some((first, rest)) => {
                    let mut children = Vec::with_capacity(first.cardinality);
                    for value in 0..first.cardinality {
                        assignment.insert(first.key, value);
                        children.push(build_node(rest, assignment, f)?);
                    }
                    assignment.remove(first.key);
                    Ok(make_branch(first.key, children))
                }
            }
        }

        let mut sorted: Vec<DiscreteKey> = keys.to_vec();
        sorted.sort_by_key(|k| k.key);
        sorted.dedup_by_key(|k| k.key);
        let mut assignment = Assignment::new();
        let root = build_node(&sorted, &mut assignment, &mut f)?;
        Ok(Self { root })
    }

    /// Build a tree from a flat table of leaf values
    ///
    /// The table is interpreted in the same nested order as
    /// [`Assignment::cartesian_product`] over `keys`: the first key varies
    /// slowest. The table length must equal the product of the cardinalities.
    pub fn from_table(keys: &[DiscreteKey], values: &[L]) -> Result<Self, InferenceError>
    where
        L: Clone,
    {
        let mut seen: Vec<Key> = Vec::with_capacity(keys.len());
        for key in keys {
            if seen.contains(&key.key) {
                return Err(InferenceError::Construction {
                    description: format!("duplicate key {} in table keys", key.key),
                });
            }
            seen.push(key.key);
        }
        let expected: usize = keys.iter().map(|k| k.cardinality).product();
        if values.len() != expected {
            return Err(InferenceError::Construction {
                description: format!(
                    "table has {} entries but keys require {}",
                    values.len(),
                    expected
                ),
            });
        }
        Ok(Self::build(keys, |assignment| {
            let mut index = 0;
            for key in keys {
                index = index * key.cardinality + assignment.get(key.key).unwrap_or(0);
            }
            values[index].clone()
        }))
    }

    /// Merge two trees into one over the union of their variables
    ///
    /// The trees may have disjoint, overlapping, or nested variable sets;
    /// the walk descends whichever side still has unvisited variables, in
    /// canonical key order. `op` is evaluated at every combined leaf.
    pub fn apply<M, N: PartialEq>(
        &self,
        other: &DecisionTree<M>,
        op: impl Fn(&L, &M) -> N,
    ) -> Result<DecisionTree<N>, InferenceError> {
        fn apply_node<L, M, N: PartialEq, F: Fn(&L, &M) -> N>(
            a: &Arc<Node<L>>,
            b: &Arc<Node<M>>,
            op: &F,
        ) -> Result<Arc<Node<N>>, InferenceError> {
            match (a.as_ref(), b.as_ref()) {
                (Node::Leaf(x), Node::Leaf(y)) => Ok(Arc::new(Node::Leaf(op(x, y)))),
                (
                    Node::Branch {
                        key: ka,
                        children: ca,
                    },
                    Node::Branch {
                        key: kb,
                        children: cb,
                    },
                ) => {
                    if ka == kb {
                        if ca.len() != cb.len() {
                            return Err(InferenceError::DimensionMismatch {
                                expected: ca.len(),
                                actual: cb.len(),
                                context: format!("cardinality of key {}", ka),
                            });
                        }
                        let children = ca
                            .iter()
                            .zip(cb)
                            .map(|(x, y)| apply_node(x, y, op))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(make_branch(*ka, children))
                    } else if ka < kb {
                        let children = ca
                            .iter()
                            .map(|x| apply_node(x, b, op))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(make_branch(*ka, children))
                    } else {
                        let children = cb
                            .iter()
                            .map(|y| apply_node(a, y, op))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(make_branch(*kb, children))
                    }
                }
                (Node::Branch { key, children }, Node::Leaf(_)) => {
                    let children = children
                        .iter()
                        .map(|x| apply_node(x, b, op))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(make_branch(*key, children))
                }
                (Node::Leaf(_), Node::Branch { key, children }) => {
                    let children = children
                        .iter()
                        .map(|y| apply_node(a, y, op))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(make_branch(*key, children))
                }
            }
        }

        Ok(DecisionTree {
            root: apply_node(&self.root, &other.root, &op)?,
        })
    }

    /// Produce a new tree by transforming every leaf
    ///
    /// Shared input subtrees map to shared output subtrees (memoized by
    /// node identity), so the cost is bounded by the number of distinct
    /// nodes, not the number of assignments.
    pub fn map<M: PartialEq>(&self, mut f: impl FnMut(&L) -> M) -> DecisionTree<M> {
        let result: Result<DecisionTree<M>, Infallible> = self.try_map(|l| Ok(f(l)));
        match result {
            Ok(tree) => tree,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [`DecisionTree::map`]
    pub fn try_map<M: PartialEq, E>(
        &self,
        mut f: impl FnMut(&L) -> Result<M, E>,
    ) -> Result<DecisionTree<M>, E> {
        fn map_node<L, M: PartialEq, E, F: FnMut(&L) -> Result<M, E>>(
            node: &Arc<Node<L>>,
            f: &mut F,
            memo: &mut HashMap<*const Node<L>, Arc<Node<M>>>,
        ) -> Result<Arc<Node<M>>, E> {
            let ptr = Arc::as_ptr(node);
            if let Some(hit) = memo.get(&ptr) {
                return Ok(hit.clone());
            }
            let mapped = match node.as_ref() {
                Node::Leaf(value) => Arc::new(Node::Leaf(f(value)?)),
                Node::Branch { key, children } => {
                    let mapped_children = children
                        .iter()
                        .map(|c| map_node(c, f, memo))
                        .collect::<Result<Vec<_>, _>>()?;
                    make_branch(*key, mapped_children)
                }
            };
            memo.insert(ptr, mapped.clone());
            Ok(mapped)
        }

        let mut memo = HashMap::new();
        Ok(DecisionTree {
            root: map_node(&self.root, &mut f, &mut memo)?,
        })
    }

    /// Condition the tree on a partial assignment
    ///
    /// Branches on assigned variables are replaced by the selected child;
    /// branches on unassigned variables are kept.
    pub fn restrict(&self, assignment: &Assignment) -> Result<Self, InferenceError> {
        fn restrict_node<L: PartialEq>(
            node: &Arc<Node<L>>,
            assignment: &Assignment,
        ) -> Result<Arc<Node<L>>, InferenceError> {
            match node.as_ref() {
                Node::Leaf(_) => Ok(node.clone()),
                Node::Branch { key, children } => match assignment.get(*key) {
                    Some(value) => {
                        let child =
                            children
                                .get(value)
                                .ok_or_else(|| InferenceError::DimensionMismatch {
                                    expected: children.len(),
                                    actual: value,
                                    context: format!("value of key {}", key),
                                })?;
                        restrict_node(child, assignment)
                    }
                    None => {
                        let restricted = children
                            .iter()
                            .map(|c| restrict_node(c, assignment))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(make_branch(*key, restricted))
                    }
                },
            }
        }

        Ok(Self {
            root: restrict_node(&self.root, assignment)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_ab() -> [DiscreteKey; 2] {
        [DiscreteKey::new(0, 2), DiscreteKey::new(1, 2)]
    }

    #[test]
    fn test_constant_tree() {
        let tree = DecisionTree::leaf(5.0);
        assert_eq!(*tree.evaluate(&Assignment::new()).unwrap(), 5.0);
    }

    #[test]
    fn test_from_table_and_evaluate() {
        let keys = keys_ab();
        // first key slowest: (0,0)->1, (0,1)->2, (1,0)->3, (1,1)->4
        let tree = DecisionTree::from_table(&keys, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        for (a0, a1, expected) in [(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 4.0)] {
            let assignment = Assignment::from_pairs([(0, a0), (1, a1)]);
            assert_eq!(*tree.evaluate(&assignment).unwrap(), expected);
        }
    }

    #[test]
    fn test_missing_variable() {
        let keys = keys_ab();
        let tree = DecisionTree::from_table(&keys, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let partial = Assignment::from_pairs([(0, 0)]);
        assert!(matches!(
            tree.evaluate(&partial),
            Err(InferenceError::MissingVariable { key: 1 })
        ));
    }

    #[test]
    fn test_identical_subtrees_collapse() {
        let keys = keys_ab();
        // constant over key 1 whenever key 0 == 0
        let tree = DecisionTree::from_table(&keys, &[7.0, 7.0, 1.0, 2.0]).unwrap();
        let mut leaves = 0;
        tree.visit_leaves(|_| leaves += 1);
        assert_eq!(leaves, 3);

        // fully constant table collapses to a single leaf
        let constant = DecisionTree::from_table(&keys, &[7.0, 7.0, 7.0, 7.0]).unwrap();
        assert_eq!(constant, DecisionTree::leaf(7.0));
    }

    #[test]
    fn test_from_table_count_check() {
        let keys = keys_ab();
        assert!(matches!(
            DecisionTree::from_table(&keys, &[1.0, 2.0, 3.0]),
            Err(InferenceError::Construction { .. })
        ));
    }

    #[test]
    fn test_apply_same_keys() {
        let keys = keys_ab();
        let a = DecisionTree::from_table(&keys, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = DecisionTree::from_table(&keys, &[10.0, 20.0, 30.0, 40.0]).unwrap();
        let sum = a.apply(&b, |x, y| x + y).unwrap();
        let assignment = Assignment::from_pairs([(0, 1), (1, 0)]);
        assert_eq!(*sum.evaluate(&assignment).unwrap(), 33.0);
    }

    #[test]
    fn test_apply_disjoint_keys() {
        let a = DecisionTree::from_table(&[DiscreteKey::new(0, 2)], &[1.0, 2.0]).unwrap();
        let b = DecisionTree::from_table(&[DiscreteKey::new(5, 3)], &[10.0, 20.0, 30.0]).unwrap();
        let product = a.apply(&b, |x, y| x * y).unwrap();
        for (v0, v5) in [(0, 0), (0, 2), (1, 1)] {
            let assignment = Assignment::from_pairs([(0, v0), (5, v5)]);
            let expected = [1.0, 2.0][v0] * [10.0, 20.0, 30.0][v5];
            assert_eq!(*product.evaluate(&assignment).unwrap(), expected);
        }
    }

    #[test]
    fn test_apply_overlapping_keys() {
        let ka = [DiscreteKey::new(0, 2), DiscreteKey::new(1, 2)];
        let kb = [DiscreteKey::new(1, 2), DiscreteKey::new(2, 2)];
        let a = DecisionTree::from_table(&ka, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = DecisionTree::from_table(&kb, &[5.0, 6.0, 7.0, 8.0]).unwrap();
        let sum = a.apply(&b, |x, y| x + y).unwrap();
        // (k0=1, k1=0, k2=1): a = 3, b = 6
        let assignment = Assignment::from_pairs([(0, 1), (1, 0), (2, 1)]);
        assert_eq!(*sum.evaluate(&assignment).unwrap(), 9.0);
    }

    #[test]
    fn test_apply_cardinality_conflict() {
        let a = DecisionTree::from_table(&[DiscreteKey::new(0, 2)], &[1.0, 2.0]).unwrap();
        let b = DecisionTree::from_table(&[DiscreteKey::new(0, 3)], &[1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            a.apply(&b, |x, y| x + y),
            Err(InferenceError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_map() {
        let keys = keys_ab();
        let tree = DecisionTree::from_table(&keys, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let doubled = tree.map(|v| v * 2.0);
        let assignment = Assignment::from_pairs([(0, 1), (1, 1)]);
        assert_eq!(*doubled.evaluate(&assignment).unwrap(), 8.0);
    }

    #[test]
    fn test_restrict() {
        let keys = keys_ab();
        let tree = DecisionTree::from_table(&keys, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let fixed = Assignment::from_pairs([(0, 1)]);
        let restricted = tree.restrict(&fixed).unwrap();
        let assignment = Assignment::from_pairs([(1, 0)]);
        assert_eq!(*restricted.evaluate(&assignment).unwrap(), 3.0);
    }

    #[test]
    fn test_check_cardinalities() {
        let keys = keys_ab();
        let tree = DecisionTree::from_table(&keys, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(tree.check_cardinalities(&keys).is_ok());
        assert!(tree
            .check_cardinalities(&[DiscreteKey::new(0, 2)])
            .is_err());
        assert!(tree
            .check_cardinalities(&[DiscreteKey::new(0, 3), DiscreteKey::new(1, 2)])
            .is_err());
    }

    #[test]
    fn test_structural_sharing_equality() {
        let keys = keys_ab();
        let a = DecisionTree::from_table(&keys, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = a.clone();
        assert_eq!(a, b);
        let c = DecisionTree::from_table(&keys, &[1.0, 2.0, 3.0, 5.0]).unwrap();
        assert_ne!(a, c);
    }
}
