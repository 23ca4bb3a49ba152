// Copyright 2025 Ramble Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! B-tree key set
//!
//! The ordered backing store of every relation index. Keys are unique;
//! iteration is in-order with early exit, and range traversal is bounded
//! on both ends (inclusive).

use std::cmp::Ordering;

/// Maximum number of keys per node
const MAX_KEYS: usize = 31;

/// Minimum number of keys per node (except root)
const MIN_KEYS: usize = MAX_KEYS / 2;

/// A B-tree node
#[derive(Debug, Clone)]
struct BTreeNode<K> {
    /// Keys stored in this node (sorted)
    keys: Vec<K>,
    /// Child pointers (len = keys.len() + 1 for internal nodes, 0 for leaves)
    children: Vec<BTreeNode<K>>,
    /// Whether this is a leaf node
    is_leaf: bool,
}

impl<K: Ord + Clone> BTreeNode<K> {
    fn new_leaf() -> Self {
        Self {
            keys: Vec::new(),
            children: Vec::new(),
            is_leaf: true,
        }
    }

    fn new_internal() -> Self {
        Self {
            keys: Vec::new(),
            children: Vec::new(),
            is_leaf: false,
        }
    }

    /// Find the position for a key using binary search
    /// Returns the index of the first key >= target
    fn find_position(&self, key: &K) -> usize {
        match self.keys.binary_search(key) {
            Ok(i) => i,
            Err(i) => i,
        }
    }

    fn is_full(&self) -> bool {
        self.keys.len() >= MAX_KEYS
    }

    fn has_min_keys(&self) -> bool {
        self.keys.len() <= MIN_KEYS
    }

    /// Search for a key in this subtree
    fn contains(&self, key: &K) -> bool {
        let i = self.find_position(key);

        if i < self.keys.len() && self.keys[i].cmp(key) == Ordering::Equal {
            return true;
        }

        if self.is_leaf {
            return false;
        }

        self.children[i].contains(key)
    }

    /// Insert a key into this subtree
    /// Returns true if a new key was inserted
    fn insert(&mut self, key: K) -> bool {
        let i = self.find_position(&key);

        if i < self.keys.len() && self.keys[i].cmp(&key) == Ordering::Equal {
            return false;
        }

        if self.is_leaf {
            self.keys.insert(i, key);
            return true;
        }

        // Check if child is full
        if self.children[i].is_full() {
            self.split_child(i);
            // Decide which child to follow
            let cmp = key.cmp(&self.keys[i]);
            if cmp == Ordering::Equal {
                return false;
            } else if cmp == Ordering::Greater {
                return self.children[i + 1].insert(key);
            }
        }
        self.children[i].insert(key)
    }

    /// Split a full child
    fn split_child(&mut self, child_index: usize) {
        let child = &mut self.children[child_index];
        let mid = child.keys.len() / 2;

        let right_node = BTreeNode {
            keys: child.keys.split_off(mid + 1),
            children: if child.is_leaf {
                Vec::new()
            } else {
                child.children.split_off(mid + 1)
            },
            is_leaf: child.is_leaf,
        };

        let median_key = child.keys.pop().expect("split of an empty node");

        self.keys.insert(child_index, median_key);
        self.children.insert(child_index + 1, right_node);
    }

    /// Delete a key from this subtree
    /// Returns true if the key was deleted
    fn delete(&mut self, key: &K) -> bool {
        let i = self.find_position(key);
        let key_found = i < self.keys.len() && self.keys[i].cmp(key) == Ordering::Equal;

        if key_found {
            if self.is_leaf {
                self.keys.remove(i);
                true
            } else {
                self.delete_from_internal(i)
            }
        } else if self.is_leaf {
            false
        } else {
            // Rebalancing may merge the target subtree into its left
            // sibling, shifting its index.
            let child_idx = if self.children[i].has_min_keys() {
                self.ensure_child_has_enough_keys(i)
            } else {
                i
            };
            self.children[child_idx].delete(key)
        }
    }

    /// Delete from an internal node
    fn delete_from_internal(&mut self, key_idx: usize) -> bool {
        // Try to take the predecessor from the left child
        if !self.children[key_idx].has_min_keys() {
            let pred_key = self.children[key_idx].find_rightmost();
            self.keys[key_idx] = pred_key.clone();
            return self.children[key_idx].delete(&pred_key);
        }

        // Try to take the successor from the right child
        if !self.children[key_idx + 1].has_min_keys() {
            let succ_key = self.children[key_idx + 1].find_leftmost();
            self.keys[key_idx] = succ_key.clone();
            return self.children[key_idx + 1].delete(&succ_key);
        }

        // Both children have minimum keys, merge them
        let merge_key = self.keys[key_idx].clone();
        self.merge_children(key_idx);
        self.children[key_idx].delete(&merge_key)
    }

    fn find_rightmost(&self) -> K {
        if self.is_leaf {
            self.keys[self.keys.len() - 1].clone()
        } else {
            self.children[self.children.len() - 1].find_rightmost()
        }
    }

    fn find_leftmost(&self) -> K {
        if self.is_leaf {
            self.keys[0].clone()
        } else {
            self.children[0].find_leftmost()
        }
    }

    /// Ensure a child has enough keys for deletion.
    ///
    /// Returns the index the child ends up at: unchanged after a borrow,
    /// shifted left after a merge into the left sibling.
    fn ensure_child_has_enough_keys(&mut self, child_idx: usize) -> usize {
        // Try to borrow from left sibling
        if child_idx > 0 && !self.children[child_idx - 1].has_min_keys() {
            self.borrow_from_left(child_idx);
            return child_idx;
        }

        // Try to borrow from right sibling
        if child_idx < self.children.len() - 1 && !self.children[child_idx + 1].has_min_keys() {
            self.borrow_from_right(child_idx);
            return child_idx;
        }

        // Merge with a sibling
        if child_idx > 0 {
            self.merge_children(child_idx - 1);
            child_idx - 1
        } else {
            self.merge_children(child_idx);
            child_idx
        }
    }

    fn borrow_from_left(&mut self, child_idx: usize) {
        let key_from_parent = self.keys[child_idx - 1].clone();

        let left_sibling = &mut self.children[child_idx - 1];
        let key_from_left = left_sibling.keys.pop().expect("borrow from empty sibling");
        let child_from_left = if !left_sibling.is_leaf {
            Some(left_sibling.children.pop().expect("internal node without children"))
        } else {
            None
        };

        self.keys[child_idx - 1] = key_from_left;

        let child = &mut self.children[child_idx];
        child.keys.insert(0, key_from_parent);
        if let Some(c) = child_from_left {
            child.children.insert(0, c);
        }
    }

    fn borrow_from_right(&mut self, child_idx: usize) {
        let key_from_parent = self.keys[child_idx].clone();

        let right_sibling = &mut self.children[child_idx + 1];
        let key_from_right = right_sibling.keys.remove(0);
        let child_from_right = if !right_sibling.is_leaf {
            Some(right_sibling.children.remove(0))
        } else {
            None
        };

        self.keys[child_idx] = key_from_right;

        let child = &mut self.children[child_idx];
        child.keys.push(key_from_parent);
        if let Some(c) = child_from_right {
            child.children.push(c);
        }
    }

    fn merge_children(&mut self, key_idx: usize) {
        let key_from_parent = self.keys.remove(key_idx);
        let mut right_child = self.children.remove(key_idx + 1);

        let left_child = &mut self.children[key_idx];
        left_child.keys.push(key_from_parent);
        left_child.keys.append(&mut right_child.keys);
        left_child.children.append(&mut right_child.children);
    }

    /// Iterate over all keys in order
    fn for_each<F>(&self, callback: &mut F) -> bool
    where
        F: FnMut(&K) -> bool,
    {
        for i in 0..self.keys.len() {
            if !self.is_leaf && i < self.children.len() && !self.children[i].for_each(callback) {
                return false;
            }

            if !callback(&self.keys[i]) {
                return false;
            }
        }

        if !self.is_leaf
            && self.children.len() > self.keys.len()
            && !self.children[self.keys.len()].for_each(callback)
        {
            return false;
        }

        true
    }

    /// Iterate over keys within `[lo, hi]` in order.
    ///
    /// Returns false once the traversal stops, whether by callback or by
    /// passing the upper bound.
    fn for_each_in_range<F>(&self, lo: &K, hi: &K, callback: &mut F) -> bool
    where
        F: FnMut(&K) -> bool,
    {
        let start = self.find_position(lo);

        for i in start..self.keys.len() {
            // The subtree left of keys[i] can still hold keys >= lo.
            if !self.is_leaf && !self.children[i].for_each_in_range(lo, hi, callback) {
                return false;
            }

            if self.keys[i].cmp(hi) == Ordering::Greater {
                return false;
            }

            if !callback(&self.keys[i]) {
                return false;
            }
        }

        if !self.is_leaf {
            return self.children[self.keys.len()].for_each_in_range(lo, hi, callback);
        }

        true
    }
}

/// An ordered set of unique keys backed by a B-tree.
#[derive(Debug, Clone)]
pub struct BTree<K> {
    root: Option<Box<BTreeNode<K>>>,
    size: usize,
}

impl<K: Ord + Clone> BTree<K> {
    /// Create a new empty B-tree
    pub fn new() -> Self {
        Self {
            root: Some(Box::new(BTreeNode::new_leaf())),
            size: 0,
        }
    }

    /// Get the number of keys in the tree
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &K) -> bool {
        self.root.as_ref().is_some_and(|root| root.contains(key))
    }

    /// Insert a key into the tree
    ///
    /// Returns true if a new key was inserted, false if it was present.
    pub fn insert(&mut self, key: K) -> bool {
        // Handle root split if needed
        if let Some(ref root) = self.root {
            if root.is_full() {
                let mut new_root = Box::new(BTreeNode::new_internal());
                let old_root = *self.root.take().expect("tree without a root");
                new_root.children.push(old_root);
                new_root.split_child(0);
                self.root = Some(new_root);
            }
        }

        if let Some(ref mut root) = self.root {
            let inserted = root.insert(key);
            if inserted {
                self.size += 1;
            }
            inserted
        } else {
            false
        }
    }

    /// Delete a key from the tree
    ///
    /// Returns true if the key was found and deleted, false otherwise.
    pub fn delete(&mut self, key: &K) -> bool {
        let deleted = if let Some(ref mut root) = self.root {
            root.delete(key)
        } else {
            false
        };

        if deleted {
            self.size -= 1;

            // If root is empty and has a child, make it the new root
            if let Some(ref root) = self.root {
                if root.keys.is_empty() && !root.is_leaf {
                    let mut old_root = self.root.take().expect("tree without a root");
                    self.root = Some(Box::new(old_root.children.remove(0)));
                }
            }
        }

        deleted
    }

    /// Drop every key.
    pub fn clear(&mut self) {
        self.root = Some(Box::new(BTreeNode::new_leaf()));
        self.size = 0;
    }

    /// Iterate over all keys in order
    pub fn for_each<F>(&self, mut callback: F)
    where
        F: FnMut(&K) -> bool,
    {
        if let Some(ref root) = self.root {
            root.for_each(&mut callback);
        }
    }

    /// Iterate over the keys within `[lo, hi]` (inclusive) in order.
    pub fn for_each_in_range<F>(&self, lo: &K, hi: &K, mut callback: F)
    where
        F: FnMut(&K) -> bool,
    {
        if lo.cmp(hi) == Ordering::Greater {
            return;
        }
        if let Some(ref root) = self.root {
            root.for_each_in_range(lo, hi, &mut callback);
        }
    }
}

impl<K: Ord + Clone> Default for BTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(tree: &BTree<i32>) -> Vec<i32> {
        let mut keys = Vec::new();
        tree.for_each(|k| {
            keys.push(*k);
            true
        });
        keys
    }

    fn collect_range(tree: &BTree<i32>, lo: i32, hi: i32) -> Vec<i32> {
        let mut keys = Vec::new();
        tree.for_each_in_range(&lo, &hi, |k| {
            keys.push(*k);
            true
        });
        keys
    }

    #[test]
    fn test_new_tree() {
        let tree: BTree<i32> = BTree::new();
        assert_eq!(tree.size(), 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_insert_and_contains() {
        let mut tree = BTree::new();

        for k in [5, 3, 7, 1, 9] {
            assert!(tree.insert(k));
        }

        assert_eq!(tree.size(), 5);
        for k in [5, 3, 7, 1, 9] {
            assert!(tree.contains(&k));
        }
        assert!(!tree.contains(&0));
        assert!(!tree.contains(&10));
    }

    #[test]
    fn test_duplicate_insert() {
        let mut tree = BTree::new();

        assert!(tree.insert(5));
        assert!(!tree.insert(5));
        assert_eq!(tree.size(), 1);
    }

    #[test]
    fn test_delete() {
        let mut tree = BTree::new();

        for i in 1..=10 {
            tree.insert(i);
        }

        assert!(tree.delete(&5));
        assert_eq!(tree.size(), 9);
        assert!(!tree.contains(&5));

        assert!(tree.delete(&1));
        assert!(tree.delete(&10));
        assert_eq!(tree.size(), 7);

        assert!(!tree.delete(&100));
        assert_eq!(tree.size(), 7);

        assert!(tree.contains(&3));
        assert!(tree.contains(&7));
    }

    #[test]
    fn test_many_insertions_stay_ordered() {
        let mut tree = BTree::new();

        for i in (0..1000).rev() {
            tree.insert(i);
        }

        assert_eq!(tree.size(), 1000);
        assert_eq!(collect(&tree), (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_for_each_early_exit() {
        let mut tree = BTree::new();

        for i in 1..=10 {
            tree.insert(i);
        }

        let mut count = 0;
        tree.for_each(|_| {
            count += 1;
            count < 5
        });

        assert_eq!(count, 5);
    }

    #[test]
    fn test_range_inclusive_bounds() {
        let mut tree = BTree::new();
        for i in (0..100).step_by(10) {
            tree.insert(i);
        }

        assert_eq!(collect_range(&tree, 20, 50), vec![20, 30, 40, 50]);
        assert_eq!(collect_range(&tree, 15, 45), vec![20, 30, 40]);
        assert_eq!(collect_range(&tree, 90, 200), vec![90]);
        assert_eq!(collect_range(&tree, 100, 200), Vec::<i32>::new());
        assert_eq!(collect_range(&tree, 50, 20), Vec::<i32>::new());
    }

    #[test]
    fn test_range_over_deep_tree() {
        let mut tree = BTree::new();
        for i in 0..2000 {
            tree.insert(i);
        }

        assert_eq!(collect_range(&tree, 995, 1005), (995..=1005).collect::<Vec<_>>());
        assert_eq!(collect_range(&tree, 0, 0), vec![0]);
        assert_eq!(collect_range(&tree, 1999, 1999), vec![1999]);
    }

    #[test]
    fn test_range_early_exit() {
        let mut tree = BTree::new();
        for i in 0..100 {
            tree.insert(i);
        }

        let mut seen = Vec::new();
        tree.for_each_in_range(&10, &90, |k| {
            seen.push(*k);
            seen.len() < 3
        });
        assert_eq!(seen, vec![10, 11, 12]);
    }

    #[test]
    fn test_clear() {
        let mut tree = BTree::new();
        for i in 0..50 {
            tree.insert(i);
        }
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(collect(&tree), Vec::<i32>::new());
        assert!(tree.insert(7));
    }

    #[test]
    fn test_scattered_deletes_in_deep_tree() {
        let mut tree = BTree::new();
        for i in 0..2000 {
            tree.insert(i);
        }

        // Every third key, spread across many internal-node rebalances.
        for i in (0..2000).step_by(3) {
            assert!(tree.delete(&i), "key {i} not deleted");
        }

        for i in 0..2000 {
            assert_eq!(tree.contains(&i), i % 3 != 0, "key {i}");
        }
        assert_eq!(tree.size(), 1333);
        assert_eq!(collect(&tree).len(), 1333);
    }

    #[test]
    fn test_delete_all() {
        let mut tree = BTree::new();

        for i in 0..50 {
            tree.insert(i);
        }

        for i in 0..50 {
            assert!(tree.delete(&i));
        }

        assert_eq!(tree.size(), 0);
        assert!(tree.is_empty());
    }
}
