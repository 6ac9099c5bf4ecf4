//! A segment trie mapping paths such as `["com", "acme", "Widget.class"]` to sets of values.

use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Node<V> {
    values: Vec<V>,
    children: HashMap<String, Node<V>>,
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            children: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrefixTrie<V> {
    root: Node<V>,
    len: usize,
}

impl<V> Default for PrefixTrie<V> {
    fn default() -> Self {
        Self {
            root: Node::default(),
            len: 0,
        }
    }
}

impl<V: PartialEq> PrefixTrie<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` at `path`. Returns `false` if it was already present there.
    pub fn insert<S: AsRef<str>>(&mut self, path: &[S], value: V) -> bool {
        let mut node = &mut self.root;
        for seg in path {
            node = node.children.entry(seg.as_ref().to_string()).or_default();
        }
        if node.values.contains(&value) {
            return false;
        }
        node.values.push(value);
        self.len += 1;
        true
    }

    /// Values stored exactly at `path`.
    pub fn at<S: AsRef<str>>(&self, path: &[S]) -> &[V] {
        self.node(path).map(|n| n.values.as_slice()).unwrap_or(&[])
    }

    /// Values stored at `path` or anywhere beneath it.
    pub fn under<S: AsRef<str>>(&self, path: &[S]) -> Vec<&V> {
        let mut out = Vec::new();
        if let Some(node) = self.node(path) {
            collect(node, &mut out);
        }
        out
    }

    /// Values stored at every prefix of `path`, shortest prefix first.
    pub fn along<S: AsRef<str>>(&self, path: &[S]) -> Vec<&V> {
        let mut out: Vec<&V> = self.root.values.iter().collect();
        let mut node = &self.root;
        for seg in path {
            match node.children.get(seg.as_ref()) {
                Some(child) => {
                    out.extend(child.values.iter());
                    node = child;
                }
                None => break,
            }
        }
        out
    }

    pub fn contains_path<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.node(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node<S: AsRef<str>>(&self, path: &[S]) -> Option<&Node<V>> {
        let mut node = &self.root;
        for seg in path {
            node = node.children.get(seg.as_ref())?;
        }
        Some(node)
    }
}

fn collect<'a, V>(node: &'a Node<V>, out: &mut Vec<&'a V>) {
    out.extend(node.values.iter());
    for child in node.children.values() {
        collect(child, out);
    }
}
