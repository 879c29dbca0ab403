//! Closed-interval tree: an AVL tree ordered by `(low, high, value)`, each
//! node augmented with the highest upper bound of its subtree. Nodes live in
//! a slab so that rotations only shuffle indexes.

use slab::Slab;
use std::cmp::Ordering;

#[derive(Debug)]
struct TreeNode<V> {
    low: f64,
    high: f64,
    value: V,
    max: f64,
    height: u32,
    left: Option<usize>,
    right: Option<usize>,
}

#[derive(Debug)]
pub(crate) struct IntervalTree<V> {
    nodes: Slab<TreeNode<V>>,
    root: Option<usize>,
}

impl<V> Default for IntervalTree<V> {
    fn default() -> Self {
        Self {
            nodes: Slab::new(),
            root: None,
        }
    }
}

impl<V: Ord + Copy> IntervalTree<V> {
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `false` if the exact same interval and value are already stored.
    pub(crate) fn insert(&mut self, low: f64, high: f64, value: V) -> bool {
        let before = self.nodes.len();
        self.root = Some(self.insert_at(self.root, low, high, value));
        self.nodes.len() > before
    }

    pub(crate) fn remove(&mut self, low: f64, high: f64, value: V) -> bool {
        let before = self.nodes.len();
        self.root = self.remove_at(self.root, low, high, value);
        self.nodes.len() < before
    }

    /// Calls `visit` with the value of every interval containing `point`.
    pub(crate) fn stab(&self, point: f64, visit: &mut impl FnMut(V)) {
        self.stab_at(self.root, point, visit);
    }

    fn stab_at(&self, node: Option<usize>, point: f64, visit: &mut impl FnMut(V)) {
        let Some(index) = node else {
            return;
        };
        let node = &self.nodes[index];
        if node.max < point {
            return;
        }
        self.stab_at(node.left, point, visit);
        if node.low <= point {
            if point <= node.high {
                visit(node.value);
            }
            self.stab_at(node.right, point, visit);
        }
    }

    fn compare(&self, index: usize, low: f64, high: f64, value: V) -> Ordering {
        let node = &self.nodes[index];
        low.total_cmp(&node.low)
            .then_with(|| high.total_cmp(&node.high))
            .then_with(|| value.cmp(&node.value))
    }

    fn insert_at(&mut self, node: Option<usize>, low: f64, high: f64, value: V) -> usize {
        let Some(index) = node else {
            return self.nodes.insert(TreeNode {
                low,
                high,
                value,
                max: high,
                height: 1,
                left: None,
                right: None,
            });
        };
        match self.compare(index, low, high, value) {
            Ordering::Equal => return index,
            Ordering::Less => {
                let left = self.insert_at(self.nodes[index].left, low, high, value);
                self.nodes[index].left = Some(left);
            }
            Ordering::Greater => {
                let right = self.insert_at(self.nodes[index].right, low, high, value);
                self.nodes[index].right = Some(right);
            }
        }
        self.rebalance(index)
    }

    fn remove_at(&mut self, node: Option<usize>, low: f64, high: f64, value: V) -> Option<usize> {
        let index = node?;
        match self.compare(index, low, high, value) {
            Ordering::Less => {
                let left = self.remove_at(self.nodes[index].left, low, high, value);
                self.nodes[index].left = left;
            }
            Ordering::Greater => {
                let right = self.remove_at(self.nodes[index].right, low, high, value);
                self.nodes[index].right = right;
            }
            Ordering::Equal => {
                let removed = self.nodes.remove(index);
                return match (removed.left, removed.right) {
                    (None, None) => None,
                    (Some(child), None) | (None, Some(child)) => Some(child),
                    (Some(left), Some(right)) => {
                        let (right, successor) = self.take_min(right);
                        self.nodes[successor].left = Some(left);
                        self.nodes[successor].right = right;
                        Some(self.rebalance(successor))
                    }
                };
            }
        }
        Some(self.rebalance(index))
    }

    /// Detaches the leftmost node of a subtree. Returns the new subtree root
    /// and the detached node.
    fn take_min(&mut self, index: usize) -> (Option<usize>, usize) {
        match self.nodes[index].left {
            None => (self.nodes[index].right.take(), index),
            Some(left) => {
                let (left, min) = self.take_min(left);
                self.nodes[index].left = left;
                (Some(self.rebalance(index)), min)
            }
        }
    }

    fn height(&self, node: Option<usize>) -> u32 {
        node.map_or(0, |index| self.nodes[index].height)
    }

    fn max(&self, node: Option<usize>) -> f64 {
        node.map_or(f64::NEG_INFINITY, |index| self.nodes[index].max)
    }

    fn update(&mut self, index: usize) {
        let (left, right) = (self.nodes[index].left, self.nodes[index].right);
        let height = 1 + self.height(left).max(self.height(right));
        let max = self.nodes[index].high.max(self.max(left)).max(self.max(right));
        let node = &mut self.nodes[index];
        node.height = height;
        node.max = max;
    }

    fn balance(&self, index: usize) -> i64 {
        let node = &self.nodes[index];
        i64::from(self.height(node.left)) - i64::from(self.height(node.right))
    }

    fn rebalance(&mut self, index: usize) -> usize {
        self.update(index);
        let balance = self.balance(index);
        if balance > 1 {
            if let Some(left) = self.nodes[index].left {
                if self.balance(left) < 0 {
                    let left = self.rotate_left(left);
                    self.nodes[index].left = Some(left);
                }
            }
            self.rotate_right(index)
        } else if balance < -1 {
            if let Some(right) = self.nodes[index].right {
                if self.balance(right) > 0 {
                    let right = self.rotate_right(right);
                    self.nodes[index].right = Some(right);
                }
            }
            self.rotate_left(index)
        } else {
            index
        }
    }

    fn rotate_right(&mut self, index: usize) -> usize {
        let Some(pivot) = self.nodes[index].left else {
            unreachable!("rotating right requires a left child. This is a bug.");
        };
        self.nodes[index].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(index);
        self.update(index);
        self.update(pivot);
        pivot
    }

    fn rotate_left(&mut self, index: usize) -> usize {
        let Some(pivot) = self.nodes[index].right else {
            unreachable!("rotating left requires a right child. This is a bug.");
        };
        self.nodes[index].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(index);
        self.update(index);
        self.update(pivot);
        pivot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stab(tree: &IntervalTree<u32>, point: f64) -> Vec<u32> {
        let mut found = vec![];
        tree.stab(point, &mut |value| found.push(value));
        found.sort_unstable();
        found
    }

    #[test]
    fn can_find_every_interval_containing_a_point() {
        let mut tree = IntervalTree::default();
        tree.insert(0.0, 10.0, 1);
        tree.insert(5.0, 15.0, 2);
        tree.insert(20.0, 30.0, 3);
        tree.insert(f64::NEG_INFINITY, 4.0, 4);

        assert_eq!(vec![1, 2], stab(&tree, 7.0));
        assert_eq!(vec![1, 4], stab(&tree, 0.0));
        assert_eq!(vec![3], stab(&tree, 30.0));
        assert!(stab(&tree, 17.0).is_empty());
    }

    #[test]
    fn bounds_are_inclusive() {
        let mut tree = IntervalTree::default();
        tree.insert(1.0, 2.0, 1);

        assert_eq!(vec![1], stab(&tree, 1.0));
        assert_eq!(vec![1], stab(&tree, 2.0));
    }

    #[test]
    fn inserting_the_same_interval_twice_is_a_no_op() {
        let mut tree = IntervalTree::default();

        assert!(tree.insert(1.0, 2.0, 1));
        assert!(!tree.insert(1.0, 2.0, 1));
        assert!(tree.insert(1.0, 2.0, 2));
        assert_eq!(2, tree.len());
    }

    #[test]
    fn can_remove_intervals() {
        let mut tree = IntervalTree::default();
        for i in 0..100u32 {
            tree.insert(f64::from(i), f64::from(i) + 10.0, i);
        }

        for i in (0..100u32).step_by(2) {
            assert!(tree.remove(f64::from(i), f64::from(i) + 10.0, i));
        }

        assert!(!tree.remove(0.0, 10.0, 0));
        assert_eq!(50, tree.len());
        assert_eq!(vec![41, 43, 45, 47, 49], stab(&tree, 50.5));
    }

    #[test]
    fn stays_balanced_on_sorted_insertions() {
        let mut tree = IntervalTree::default();
        for i in 0..1024u32 {
            tree.insert(f64::from(i), f64::from(i), i);
        }

        assert!(tree.height(tree.root) <= 14);
        assert_eq!(vec![512], stab(&tree, 512.0));
    }

    #[test]
    fn removing_everything_empties_the_tree() {
        let mut tree = IntervalTree::default();
        for i in 0..32u32 {
            tree.insert(0.0, f64::from(i), i);
        }
        for i in 0..32u32 {
            tree.remove(0.0, f64::from(i), i);
        }

        assert!(tree.is_empty());
        assert!(stab(&tree, 0.0).is_empty());
    }
}
