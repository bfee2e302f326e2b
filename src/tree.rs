//! Parameter-Tree Algebra: element-wise arithmetic over nested parameter
//! containers, restricted to a single concrete shape rather than a
//! polymorphic nesting (see DESIGN.md for why).
//!
//! A [`ParamTree`] is a name-sorted map from leaf name to a dense `f32`
//! buffer with a known shape. Two trees have the *same structure* when their
//! leaf names and per-leaf shapes match exactly. Every operation below
//! allocates a fresh tree; leaves never alias across trees.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct Leaf {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Leaf {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        let expected: usize = shape.iter().product();
        debug_assert_eq!(
            data.len(),
            expected,
            "leaf data length must match the product of its shape"
        );
        Leaf { shape, data }
    }

    fn same_shape(&self, other: &Leaf) -> bool {
        self.shape == other.shape
    }
}

/// A nested-but-flattened parameter container: a sorted map of named dense
/// leaves. Construction order does not matter; iteration order is always
/// name-sorted, which is what gives the engine its deterministic leaf order.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ParamTree {
    leaves: BTreeMap<String, Leaf>,
}

impl fmt::Display for ParamTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParamTree{{")?;
        for (i, (name, leaf)) in self.leaves.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {:?}", leaf.shape)?;
        }
        write!(f, "}}")
    }
}

impl ParamTree {
    pub fn new() -> Self {
        ParamTree {
            leaves: BTreeMap::new(),
        }
    }

    pub fn from_leaves<I: IntoIterator<Item = (String, Vec<usize>, Vec<f32>)>>(iter: I) -> Self {
        let mut leaves = BTreeMap::new();
        for (name, shape, data) in iter {
            leaves.insert(name, Leaf::new(shape, data));
        }
        ParamTree { leaves }
    }

    /// Single unnamed scalar leaf — the common case for toy 1-D targets.
    pub fn scalar(value: f32) -> Self {
        ParamTree::from_leaves([("x".to_string(), vec![], vec![value])])
    }

    pub fn from_vec(name: &str, values: Vec<f32>) -> Self {
        let len = values.len();
        ParamTree::from_leaves([(name.to_string(), vec![len], values)])
    }

    pub fn leaf_names(&self) -> Vec<String> {
        self.leaves.keys().cloned().collect()
    }

    pub fn leaf(&self, name: &str) -> Option<&Leaf> {
        self.leaves.get(name)
    }

    pub fn leaves(&self) -> impl Iterator<Item = (&String, &Leaf)> {
        self.leaves.iter()
    }

    pub fn same_structure(&self, other: &ParamTree) -> bool {
        if self.leaves.len() != other.leaves.len() {
            return false;
        }
        self.leaves.iter().all(|(name, leaf)| {
            other
                .leaves
                .get(name)
                .is_some_and(|o| leaf.same_shape(o))
        })
    }

    pub fn is_finite(&self) -> bool {
        self.leaves
            .values()
            .all(|l| l.data.iter().all(|v| v.is_finite()))
    }

    fn map(&self, f: impl Fn(f32) -> f32) -> ParamTree {
        let leaves = self
            .leaves
            .iter()
            .map(|(name, leaf)| {
                let data = leaf.data.iter().map(|&v| f(v)).collect();
                (name.clone(), Leaf::new(leaf.shape.clone(), data))
            })
            .collect();
        ParamTree { leaves }
    }

    fn zip_with(&self, other: &ParamTree, f: impl Fn(f32, f32) -> f32) -> ParamTree {
        debug_assert!(
            self.same_structure(other),
            "tree algebra requires matching structure: {self} vs {other}"
        );
        let leaves = self
            .leaves
            .iter()
            .map(|(name, leaf)| {
                let other_leaf = &other.leaves[name];
                let data = leaf
                    .data
                    .iter()
                    .zip(other_leaf.data.iter())
                    .map(|(&a, &b)| f(a, b))
                    .collect();
                (name.clone(), Leaf::new(leaf.shape.clone(), data))
            })
            .collect();
        ParamTree { leaves }
    }

    pub fn add(&self, other: &ParamTree) -> ParamTree {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &ParamTree) -> ParamTree {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &ParamTree) -> ParamTree {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn div(&self, other: &ParamTree) -> ParamTree {
        self.zip_with(other, |a, b| a / b)
    }

    pub fn scale(&self, s: f64) -> ParamTree {
        let s = s as f32;
        self.map(|a| a * s)
    }

    pub fn add_scaled(&self, other: &ParamTree, s: f64) -> ParamTree {
        let s = s as f32;
        self.zip_with(other, move |a, b| a + s * b)
    }

    pub fn sqrt(&self) -> ParamTree {
        self.map(|a| a.sqrt())
    }

    pub fn map_add_scalar(&self, s: f64) -> ParamTree {
        let s = s as f32;
        self.map(|a| a + s)
    }

    pub fn recip(&self) -> ParamTree {
        self.map(|a| 1.0 / a)
    }

    pub fn zeros_like(&self) -> ParamTree {
        self.map(|_| 0.0)
    }

    pub fn ones_like(&self) -> ParamTree {
        self.map(|_| 1.0)
    }

    /// Sum over every leaf and every element, as `f64` to keep the
    /// accumulation stable even though leaves are stored as `f32`.
    pub fn sum(&self) -> f64 {
        self.leaves
            .values()
            .flat_map(|l| l.data.iter())
            .map(|&v| v as f64)
            .sum()
    }

    /// Sum of elementwise products across all leaves.
    pub fn dot(&self, other: &ParamTree) -> f64 {
        debug_assert!(self.same_structure(other));
        self.leaves
            .iter()
            .flat_map(|(name, leaf)| leaf.data.iter().zip(other.leaves[name].data.iter()))
            .map(|(&a, &b)| (a as f64) * (b as f64))
            .sum()
    }

    pub fn total_elements(&self) -> usize {
        self.leaves.values().map(|l| l.data.len()).sum()
    }

    /// Flatten into a single ordered `(name, index_within_leaf)` -> value
    /// view. Used by diagnostics, which need one scalar series per position.
    pub fn flat_iter(&self) -> impl Iterator<Item = (String, usize, f32)> + '_ {
        self.leaves.iter().flat_map(|(name, leaf)| {
            leaf.data
                .iter()
                .enumerate()
                .map(move |(i, &v)| (name.clone(), i, v))
        })
    }
}

/// Stack `k` same-structure trees along a new leading axis, producing one
/// buffer per leaf of length `k * leaf_len`, row-major with the stack index
/// as the outermost dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct StackedTree {
    pub count: usize,
    leaves: BTreeMap<String, Leaf>,
}

impl StackedTree {
    pub fn stack(trees: &[ParamTree]) -> StackedTree {
        assert!(!trees.is_empty(), "cannot stack zero trees");
        let first = &trees[0];
        for t in &trees[1..] {
            debug_assert!(first.same_structure(t), "stack requires same-structure trees");
        }
        let mut leaves = BTreeMap::new();
        for name in first.leaf_names() {
            let base_shape = first.leaf(&name).unwrap().shape.clone();
            let mut shape = vec![trees.len()];
            shape.extend(base_shape.iter().cloned());
            let mut data = Vec::with_capacity(trees.len() * first.leaf(&name).unwrap().data.len());
            for t in trees {
                data.extend_from_slice(&t.leaf(&name).unwrap().data);
            }
            leaves.insert(name, Leaf::new(shape, data));
        }
        StackedTree {
            count: trees.len(),
            leaves,
        }
    }

    pub fn leaf(&self, name: &str) -> Option<&Leaf> {
        self.leaves.get(name)
    }

    pub fn leaves(&self) -> impl Iterator<Item = (&String, &Leaf)> {
        self.leaves.iter()
    }

    /// Construct a `StackedTree` directly from an already-stacked leaf map,
    /// e.g. when folding a chain axis onto an existing sample-stacked tree.
    pub fn from_parts(count: usize, leaves: BTreeMap<String, Leaf>) -> StackedTree {
        StackedTree { count, leaves }
    }
}
