//! # Thread Assembler
//!
//! Rebuilds parent → children trees from a flat, `left`-ordered row set in a
//! single pass. No parent-pointer lookups and no extra queries: interval
//! containment alone decides where each row hangs.

use serde::Serialize;

use crate::models::{Bounds, Message};

/// Anything carrying an interval position.
pub trait Positioned {
    fn bounds(&self) -> Bounds;
}

impl Positioned for Message {
    fn bounds(&self) -> Bounds {
        self.bounds
    }
}

/// One message and its replies, in reply order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadNode<T> {
    pub message: T,
    pub children: Vec<ThreadNode<T>>,
}

impl<T> ThreadNode<T> {
    pub fn leaf(message: T) -> Self {
        Self { message, children: Vec::new() }
    }

    /// Rows in this subtree, this node included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ThreadNode::size).sum::<usize>()
    }

    /// Transforms every node while keeping the shape.
    pub fn map<U, F>(self, f: &mut F) -> ThreadNode<U>
    where
        F: FnMut(T) -> U,
    {
        ThreadNode {
            message: f(self.message),
            children: self.children.into_iter().map(|child| child.map(f)).collect(),
        }
    }

    /// Depth-first walk, parent before children.
    pub fn preorder(&self) -> Vec<&T> {
        let mut out = Vec::with_capacity(self.size());
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            out.push(&node.message);
            pending.extend(node.children.iter().rev());
        }
        out
    }
}

/// Builds the forest for a pre-order (`left` ascending) sequence.
///
/// Keeps a stack of open ancestors; a row whose interval is not inside the
/// stack top closes that ancestor. Each row's parent is whatever is open when
/// it is visited. Rows without an open ancestor become roots, so a subtree
/// fetched from the middle of a thread comes back rooted at its first row.
pub fn assemble<T, I>(rows: I) -> Vec<ThreadNode<T>>
where
    T: Positioned,
    I: IntoIterator<Item = T>,
{
    let mut roots = Vec::new();
    let mut open: Vec<ThreadNode<T>> = Vec::new();

    for row in rows {
        let bounds = row.bounds();
        while let Some(top) = open.pop() {
            if top.message.bounds().contains(&bounds) {
                open.push(top);
                break;
            }
            close(&mut open, &mut roots, top);
        }
        open.push(ThreadNode::leaf(row));
    }
    while let Some(top) = open.pop() {
        close(&mut open, &mut roots, top);
    }
    roots
}

fn close<T>(open: &mut [ThreadNode<T>], roots: &mut Vec<ThreadNode<T>>, done: ThreadNode<T>) {
    match open.last_mut() {
        Some(parent) => parent.children.push(done),
        None => roots.push(done),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Positioned for (&'static str, Bounds) {
        fn bounds(&self) -> Bounds {
            self.1
        }
    }

    fn names(node: &ThreadNode<(&'static str, Bounds)>) -> String {
        if node.children.is_empty() {
            return node.message.0.to_string();
        }
        let inner: Vec<String> = node.children.iter().map(names).collect();
        format!("{}[{}]", node.message.0, inner.join(","))
    }

    #[test]
    fn rebuilds_nested_thread() {
        let rows = vec![
            ("root", Bounds::new(1, 12)),
            ("child1", Bounds::new(2, 5)),
            ("grandchild1", Bounds::new(3, 4)),
            ("child2", Bounds::new(6, 9)),
            ("grandchild2", Bounds::new(7, 8)),
        ];
        let forest = assemble(rows);
        assert_eq!(forest.len(), 1);
        assert_eq!(names(&forest[0]), "root[child1[grandchild1],child2[grandchild2]]");
        assert_eq!(forest[0].size(), 5);
    }

    #[test]
    fn sibling_roots_stay_in_order() {
        let rows = vec![
            ("a", Bounds::new(1, 4)),
            ("a1", Bounds::new(2, 3)),
            ("b", Bounds::new(5, 6)),
            ("c", Bounds::new(7, 8)),
        ];
        let forest = assemble(rows);
        let tops: Vec<String> = forest.iter().map(names).collect();
        assert_eq!(tops, vec!["a[a1]", "b", "c"]);
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        let forest = assemble(Vec::<(&'static str, Bounds)>::new());
        assert!(forest.is_empty());
    }

    #[test]
    fn preorder_matches_left_order() {
        let rows = vec![
            ("r", Bounds::new(1, 10)),
            ("x", Bounds::new(2, 7)),
            ("x1", Bounds::new(3, 4)),
            ("x2", Bounds::new(5, 6)),
            ("y", Bounds::new(8, 9)),
        ];
        let forest = assemble(rows);
        let order: Vec<&str> = forest[0].preorder().into_iter().map(|r| r.0).collect();
        assert_eq!(order, vec!["r", "x", "x1", "x2", "y"]);
    }

    #[test]
    fn map_keeps_shape() {
        let forest = assemble(vec![("r", Bounds::new(1, 4)), ("c", Bounds::new(2, 3))]);
        let mapped = forest.into_iter().next().unwrap().map(&mut |row| row.0.len());
        assert_eq!(mapped.message, 1);
        assert_eq!(mapped.children[0].message, 1);
    }
}
