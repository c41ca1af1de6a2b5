//! The passed-state set.
//!
//! Stores every discovered state's compressed marking key in a radix tree.
//! Keys of reachable markings share long prefixes (places early in id order
//! rarely change), so path compression keeps the per-state overhead to the
//! suffix that actually differs plus a few child slots.

use smallvec::SmallVec;

struct Node {
    /// Compressed path fragment leading into this node.
    label: Vec<u8>,
    /// Children sorted by their first label byte.
    children: SmallVec<[(u8, u32); 4]>,
    /// Whether a stored key ends here.
    terminal: bool,
}

pub struct PassedSet {
    nodes: Vec<Node>,
    len: usize,
}

impl PassedSet {
    pub fn new() -> Self {
        PassedSet {
            nodes: vec![Node {
                label: Vec::new(),
                children: SmallVec::new(),
                terminal: false,
            }],
            len: 0,
        }
    }

    /// Inserts `key`, returning whether it was new.
    pub fn insert(&mut self, key: &[u8]) -> bool {
        let mut node = 0usize;
        let mut rest = key;
        loop {
            let shared = common_prefix(&self.nodes[node].label, rest);
            if shared < self.nodes[node].label.len() {
                self.split_node(node, shared);
            }
            rest = &rest[shared..];
            if rest.is_empty() {
                if self.nodes[node].terminal {
                    return false;
                }
                self.nodes[node].terminal = true;
                self.len += 1;
                return true;
            }
            match self.nodes[node]
                .children
                .binary_search_by_key(&rest[0], |&(byte, _)| byte)
            {
                Ok(slot) => node = self.nodes[node].children[slot].1 as usize,
                Err(slot) => {
                    let leaf = self.nodes.len() as u32;
                    self.nodes.push(Node {
                        label: rest.to_vec(),
                        children: SmallVec::new(),
                        terminal: true,
                    });
                    self.nodes[node].children.insert(slot, (rest[0], leaf));
                    self.len += 1;
                    return true;
                }
            }
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let mut node = 0usize;
        let mut rest = key;
        loop {
            let label = &self.nodes[node].label;
            if rest.len() < label.len() || &rest[..label.len()] != label.as_slice() {
                return false;
            }
            rest = &rest[label.len()..];
            if rest.is_empty() {
                return self.nodes[node].terminal;
            }
            match self.nodes[node]
                .children
                .binary_search_by_key(&rest[0], |&(byte, _)| byte)
            {
                Ok(slot) => node = self.nodes[node].children[slot].1 as usize,
                Err(_) => return false,
            }
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cuts `node`'s label at `at`, pushing the tail (with the node's
    /// children and terminal flag) down into a new child.
    fn split_node(&mut self, node: usize, at: usize) {
        let tail_label = self.nodes[node].label.split_off(at);
        let tail_children = std::mem::take(&mut self.nodes[node].children);
        let tail_terminal = self.nodes[node].terminal;
        let first = tail_label[0];
        let tail = self.nodes.len() as u32;
        self.nodes.push(Node {
            label: tail_label,
            children: tail_children,
            terminal: tail_terminal,
        });
        self.nodes[node].terminal = false;
        self.nodes[node].children.push((first, tail));
    }
}

impl Default for PassedSet {
    fn default() -> Self {
        PassedSet::new()
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_newness() {
        let mut set = PassedSet::new();
        assert!(set.insert(b"abc"));
        assert!(!set.insert(b"abc"));
        assert_eq!(set.len(), 1);
        assert!(set.contains(b"abc"));
        assert!(!set.contains(b"ab"));
        assert!(!set.contains(b"abcd"));
    }

    #[test]
    fn prefixes_and_extensions_are_distinct_keys() {
        let mut set = PassedSet::new();
        assert!(set.insert(b"abcd"));
        assert!(set.insert(b"ab"));
        assert!(set.insert(b"abcdef"));
        assert!(!set.insert(b"ab"));
        assert_eq!(set.len(), 3);
        for key in [b"ab".as_slice(), b"abcd", b"abcdef"] {
            assert!(set.contains(key));
        }
        assert!(!set.contains(b"a"));
        assert!(!set.contains(b"abc"));
        assert!(!set.contains(b"abcde"));
    }

    #[test]
    fn the_empty_key_is_a_key() {
        let mut set = PassedSet::new();
        assert!(set.insert(b""));
        assert!(!set.insert(b""));
        assert!(set.contains(b""));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn diverging_keys_split_shared_paths() {
        let mut set = PassedSet::new();
        assert!(set.insert(&[1, 2, 3, 4]));
        assert!(set.insert(&[1, 2, 9, 9]));
        assert!(set.insert(&[1, 2, 3, 7]));
        assert!(set.insert(&[5]));
        assert_eq!(set.len(), 4);

        for key in [
            [1, 2, 3, 4].as_slice(),
            &[1, 2, 9, 9],
            &[1, 2, 3, 7],
            &[5],
        ] {
            assert!(set.contains(key));
        }
        assert!(!set.contains(&[1, 2]));
        assert!(!set.contains(&[1, 2, 3]));
        assert!(!set.contains(&[1, 2, 9]));
    }

    #[test]
    fn handles_many_similar_keys() {
        let mut set = PassedSet::new();
        let mut key = vec![0u8; 32];
        for value in 0..200u8 {
            key[16] = value;
            key[31] = value.wrapping_mul(7);
            assert!(set.insert(&key));
            assert!(!set.insert(&key));
        }
        assert_eq!(set.len(), 200);
        for value in 0..200u8 {
            key[16] = value;
            key[31] = value.wrapping_mul(7);
            assert!(set.contains(&key));
        }
        key[0] = 1;
        assert!(!set.contains(&key));
    }
}
