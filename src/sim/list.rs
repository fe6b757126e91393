//! Intrusive membership lists over arena-allocated nodes
//!
//! A list tracks a group of entities by handle (e.g. a spawner's surviving
//! children). Nodes live in one shared arena so entities can unlink
//! themselves in O(1) when they die, holding only a `ListId` + `NodeId`.

use serde::{Deserialize, Serialize};

use crate::sim::pool::EntityHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, Default)]
struct Node {
    prev: Option<u32>,
    next: Option<u32>,
    handle: EntityHandle,
    in_use: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct ListHead {
    first: Option<u32>,
    last: Option<u32>,
    count: i64,
}

/// Arena of doubly-linked lists
#[derive(Debug, Default)]
pub struct ListArena {
    nodes: Vec<Node>,
    free_nodes: Vec<u32>,
    lists: Vec<ListHead>,
}

impl ListArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_list(&mut self) -> ListId {
        self.lists.push(ListHead::default());
        ListId(self.lists.len() as u32 - 1)
    }

    fn alloc_node(&mut self, handle: EntityHandle) -> u32 {
        match self.free_nodes.pop() {
            Some(i) => {
                self.nodes[i as usize] = Node {
                    handle,
                    in_use: true,
                    ..Default::default()
                };
                i
            }
            None => {
                self.nodes.push(Node {
                    handle,
                    in_use: true,
                    ..Default::default()
                });
                self.nodes.len() as u32 - 1
            }
        }
    }

    pub fn append(&mut self, list: ListId, handle: EntityHandle) -> NodeId {
        let node = self.alloc_node(handle);
        let last = self.lists[list.0 as usize].last;

        self.nodes[node as usize].prev = last;
        match last {
            Some(prev) => self.nodes[prev as usize].next = Some(node),
            None => self.lists[list.0 as usize].first = Some(node),
        }

        let head = &mut self.lists[list.0 as usize];
        head.last = Some(node);
        head.count += 1;

        NodeId(node)
    }

    pub fn push_front(&mut self, list: ListId, handle: EntityHandle) -> NodeId {
        let node = self.alloc_node(handle);
        let first = self.lists[list.0 as usize].first;

        self.nodes[node as usize].next = first;
        match first {
            Some(next) => self.nodes[next as usize].prev = Some(node),
            None => self.lists[list.0 as usize].last = Some(node),
        }

        let head = &mut self.lists[list.0 as usize];
        head.first = Some(node);
        head.count += 1;

        NodeId(node)
    }

    /// Unlink a node; ignores nodes already removed
    pub fn remove(&mut self, list: ListId, node: NodeId) {
        let n = self.nodes[node.0 as usize];
        if !n.in_use {
            return;
        }

        match n.prev {
            Some(prev) => self.nodes[prev as usize].next = n.next,
            None => self.lists[list.0 as usize].first = n.next,
        }
        match n.next {
            Some(next) => self.nodes[next as usize].prev = n.prev,
            None => self.lists[list.0 as usize].last = n.prev,
        }

        self.lists[list.0 as usize].count -= 1;
        self.nodes[node.0 as usize].in_use = false;
        self.free_nodes.push(node.0);
    }

    pub fn count(&self, list: ListId) -> i64 {
        self.lists[list.0 as usize].count
    }

    pub fn iter(&self, list: ListId) -> ListIter<'_> {
        ListIter {
            arena: self,
            cur: self.lists[list.0 as usize].first,
        }
    }
}

pub struct ListIter<'a> {
    arena: &'a ListArena,
    cur: Option<u32>,
}

impl Iterator for ListIter<'_> {
    type Item = EntityHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.cur?;
        let node = &self.arena.nodes[i as usize];
        self.cur = node.next;
        Some(node.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(uid: u64) -> EntityHandle {
        EntityHandle { uid, slot: uid as u32 }
    }

    #[test]
    fn test_append_and_iterate_in_order() {
        let mut arena = ListArena::new();
        let list = arena.new_list();
        arena.append(list, h(1));
        arena.append(list, h(2));
        arena.append(list, h(3));

        let uids: Vec<u64> = arena.iter(list).map(|e| e.uid).collect();
        assert_eq!(uids, vec![1, 2, 3]);
        assert_eq!(arena.count(list), 3);
    }

    #[test]
    fn test_push_front() {
        let mut arena = ListArena::new();
        let list = arena.new_list();
        arena.append(list, h(2));
        arena.push_front(list, h(1));

        let uids: Vec<u64> = arena.iter(list).map(|e| e.uid).collect();
        assert_eq!(uids, vec![1, 2]);
    }

    #[test]
    fn test_remove_middle_and_ends() {
        let mut arena = ListArena::new();
        let list = arena.new_list();
        let a = arena.append(list, h(1));
        let b = arena.append(list, h(2));
        let c = arena.append(list, h(3));

        arena.remove(list, b);
        let uids: Vec<u64> = arena.iter(list).map(|e| e.uid).collect();
        assert_eq!(uids, vec![1, 3]);

        arena.remove(list, a);
        arena.remove(list, c);
        assert_eq!(arena.count(list), 0);
        assert!(arena.iter(list).next().is_none());

        // Double remove is a no-op
        arena.remove(list, c);
        assert_eq!(arena.count(list), 0);
    }

    #[test]
    fn test_node_reuse_across_lists() {
        let mut arena = ListArena::new();
        let list_a = arena.new_list();
        let list_b = arena.new_list();

        let n = arena.append(list_a, h(1));
        arena.remove(list_a, n);
        arena.append(list_b, h(2));

        assert_eq!(arena.count(list_a), 0);
        assert_eq!(arena.count(list_b), 1);
        assert_eq!(arena.iter(list_b).next().map(|e| e.uid), Some(2));
    }
}
