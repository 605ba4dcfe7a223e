//! Doubly linked lists kept in the list and node segments.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::heap::{Segment, SegmentKind, SegmentTable};
use crate::kernel::KernelReturn;
use crate::reg::Reg;
use crate::state::EngineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListData {
    pub first: Reg,
    pub last: Reg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeData {
    pub pred: Reg,
    pub succ: Reg,
    pub key: Reg,
    pub value: Reg,
}

/// List and node payloads. The segments in the heap track which slots are
/// live; this store holds what is in them.
#[derive(Debug, Default)]
pub struct ListStore {
    list_segment: Option<u16>,
    node_segment: Option<u16>,
    lists: BTreeMap<u32, ListData>,
    nodes: BTreeMap<u32, NodeData>,
    next_list: u32,
    next_node: u32,
}

impl ListStore {
    fn segment_id(heap: &mut SegmentTable, cached: &mut Option<u16>, kind: SegmentKind) -> u16 {
        if let Some(id) = *cached {
            return id;
        }
        let id = heap
            .first_of_kind(kind)
            .unwrap_or_else(|| heap.allocate(Segment::table(kind)));
        *cached = Some(id);
        id
    }

    /// Claims the next free slot at or after `next`. Slots may already be
    /// taken by a heap that was loaded rather than built here.
    fn claim_next(heap: &mut SegmentTable, segment: u16, next: &mut u32) -> Reg {
        loop {
            let reg = Reg::new(segment, *next);
            *next = next.wrapping_add(1);
            if heap.claim_slot(reg) {
                return reg;
            }
            debug!("slot {reg} already in use");
        }
    }

    pub fn new_list(&mut self, heap: &mut SegmentTable) -> Reg {
        let segment = Self::segment_id(heap, &mut self.list_segment, SegmentKind::Lists);
        let reg = Self::claim_next(heap, segment, &mut self.next_list);
        self.lists.insert(reg.offset, ListData::default());
        reg
    }

    pub fn new_node(&mut self, heap: &mut SegmentTable, value: Reg, key: Reg) -> Reg {
        let segment = Self::segment_id(heap, &mut self.node_segment, SegmentKind::Nodes);
        let reg = Self::claim_next(heap, segment, &mut self.next_node);
        self.nodes.insert(
            reg.offset,
            NodeData {
                key,
                value,
                ..NodeData::default()
            },
        );
        reg
    }

    pub fn list(&self, reg: Reg) -> Option<&ListData> {
        if Some(reg.segment) != self.list_segment {
            return None;
        }
        self.lists.get(&reg.offset)
    }

    pub fn node(&self, reg: Reg) -> Option<&NodeData> {
        if Some(reg.segment) != self.node_segment {
            return None;
        }
        self.nodes.get(&reg.offset)
    }

    fn list_mut(&mut self, reg: Reg) -> Option<&mut ListData> {
        if Some(reg.segment) != self.list_segment {
            return None;
        }
        self.lists.get_mut(&reg.offset)
    }

    fn node_mut(&mut self, reg: Reg) -> Option<&mut NodeData> {
        if Some(reg.segment) != self.node_segment {
            return None;
        }
        self.nodes.get_mut(&reg.offset)
    }

    /// Nodes of `list` from first to last.
    pub fn nodes_of(&self, list: Reg) -> Vec<Reg> {
        let mut out = Vec::new();
        let mut cursor = self.list(list).map_or(Reg::NULL, |list| list.first);
        while let Some(node) = self.node(cursor) {
            out.push(cursor);
            cursor = node.succ;
            if out.len() > self.nodes.len() {
                warn!("list {list} is circular");
                break;
            }
        }
        out
    }

    pub fn add_to_front(&mut self, list: Reg, node: Reg) -> bool {
        let Some(first) = self.list(list).map(|list| list.first) else {
            return false;
        };
        if self.node(node).is_none() {
            return false;
        }
        if let Some(data) = self.node_mut(node) {
            data.pred = Reg::NULL;
            data.succ = first;
        }
        if let Some(old_first) = self.node_mut(first) {
            old_first.pred = node;
        }
        if let Some(data) = self.list_mut(list) {
            if data.last.is_null() {
                data.last = node;
            }
            data.first = node;
        }
        true
    }

    pub fn add_to_end(&mut self, list: Reg, node: Reg) -> bool {
        let Some(last) = self.list(list).map(|list| list.last) else {
            return false;
        };
        if self.node(node).is_none() {
            return false;
        }
        if let Some(data) = self.node_mut(node) {
            data.pred = last;
            data.succ = Reg::NULL;
        }
        if let Some(old_last) = self.node_mut(last) {
            old_last.succ = node;
        }
        if let Some(data) = self.list_mut(list) {
            if data.first.is_null() {
                data.first = node;
            }
            data.last = node;
        }
        true
    }

    pub fn add_after(&mut self, list: Reg, anchor: Reg, node: Reg) -> bool {
        let Some(anchor_succ) = self.node(anchor).map(|anchor| anchor.succ) else {
            return false;
        };
        if self.list(list).is_none() || self.node(node).is_none() {
            return false;
        }
        if let Some(data) = self.node_mut(node) {
            data.pred = anchor;
            data.succ = anchor_succ;
        }
        if let Some(data) = self.node_mut(anchor) {
            data.succ = node;
        }
        match self.node_mut(anchor_succ) {
            Some(next) => next.pred = node,
            None => {
                if let Some(data) = self.list_mut(list) {
                    data.last = node;
                }
            }
        }
        true
    }

    pub fn find_key(&self, list: Reg, key: Reg) -> Option<Reg> {
        self.nodes_of(list)
            .into_iter()
            .find(|node| self.node(*node).is_some_and(|data| data.key == key))
    }

    /// Unlinks and frees `node`.
    pub fn delete_node(&mut self, heap: &mut SegmentTable, list: Reg, node: Reg) -> bool {
        let Some(data) = self.node(node).copied() else {
            return false;
        };
        match self.node_mut(data.pred) {
            Some(pred) => pred.succ = data.succ,
            None => {
                if let Some(list) = self.list_mut(list) {
                    list.first = data.succ;
                }
            }
        }
        match self.node_mut(data.succ) {
            Some(succ) => succ.pred = data.pred,
            None => {
                if let Some(list) = self.list_mut(list) {
                    list.last = data.pred;
                }
            }
        }
        self.nodes.remove(&node.offset);
        heap.release_slot(node);
        true
    }

    /// Frees `list` and every node still linked into it.
    pub fn dispose_list(&mut self, heap: &mut SegmentTable, list: Reg) -> bool {
        if self.list(list).is_none() {
            return false;
        }
        for node in self.nodes_of(list) {
            self.nodes.remove(&node.offset);
            heap.release_slot(node);
        }
        self.lists.remove(&list.offset);
        heap.release_slot(list);
        true
    }
}

fn reg_result(reg: Reg) -> KernelReturn {
    KernelReturn::Value(reg)
}

fn arg(args: &[Reg], index: usize) -> Reg {
    args.get(index).copied().unwrap_or(Reg::NULL)
}

pub fn k_new_list(state: &mut EngineState, _: &[Reg]) -> KernelReturn {
    reg_result(state.lists.new_list(&mut state.heap))
}

pub fn k_dispose_list(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    if !state.lists.dispose_list(&mut state.heap, arg(args, 0)) {
        warn!("kDisposeList: {} is not a list", arg(args, 0));
    }
    KernelReturn::Keep
}

/// `NewNode(value [, key])`; the key defaults to the value.
pub fn k_new_node(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let value = arg(args, 0);
    let key = args.get(1).copied().unwrap_or(value);
    reg_result(state.lists.new_node(&mut state.heap, value, key))
}

pub fn k_first_node(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    reg_result(state.lists.list(arg(args, 0)).map_or(Reg::NULL, |list| list.first))
}

pub fn k_last_node(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    reg_result(state.lists.list(arg(args, 0)).map_or(Reg::NULL, |list| list.last))
}

pub fn k_empty_list(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let empty = state
        .lists
        .list(arg(args, 0))
        .is_some_and(|list| list.first.is_null());
    reg_result(Reg::int(empty as u16))
}

pub fn k_next_node(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    reg_result(state.lists.node(arg(args, 0)).map_or(Reg::NULL, |node| node.succ))
}

pub fn k_prev_node(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    reg_result(state.lists.node(arg(args, 0)).map_or(Reg::NULL, |node| node.pred))
}

pub fn k_node_value(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    reg_result(state.lists.node(arg(args, 0)).map_or(Reg::NULL, |node| node.value))
}

fn set_key(state: &mut EngineState, node: Reg, key: Option<&Reg>) {
    if let (Some(key), Some(data)) = (key, state.lists.node_mut(node)) {
        data.key = *key;
    }
}

pub fn k_add_after(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let (list, anchor, node) = (arg(args, 0), arg(args, 1), arg(args, 2));
    if !state.lists.add_after(list, anchor, node) {
        warn!("kAddAfter: cannot link {node} after {anchor} in {list}");
    }
    set_key(state, node, args.get(3));
    KernelReturn::Keep
}

pub fn k_add_to_front(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let (list, node) = (arg(args, 0), arg(args, 1));
    if !state.lists.add_to_front(list, node) {
        warn!("kAddToFront: cannot link {node} into {list}");
    }
    set_key(state, node, args.get(2));
    KernelReturn::Keep
}

pub fn k_add_to_end(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let (list, node) = (arg(args, 0), arg(args, 1));
    if !state.lists.add_to_end(list, node) {
        warn!("kAddToEnd: cannot link {node} into {list}");
    }
    set_key(state, node, args.get(2));
    KernelReturn::Keep
}

pub fn k_find_key(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    reg_result(
        state
            .lists
            .find_key(arg(args, 0), arg(args, 1))
            .unwrap_or(Reg::NULL),
    )
}

pub fn k_delete_key(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let list = arg(args, 0);
    let Some(node) = state.lists.find_key(list, arg(args, 1)) else {
        return reg_result(Reg::NULL);
    };
    state.lists.delete_node(&mut state.heap, list, node);
    reg_result(Reg::int(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{HeapInspect, RegKind};
    use crate::platform::ScriptedPlatform;
    use crate::version::SciVersion;

    fn value_of(outcome: KernelReturn) -> Reg {
        match outcome {
            KernelReturn::Value(reg) => reg,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lists_and_nodes_live_in_their_segments() {
        let mut state = EngineState::with_system_platform(SciVersion::Sci0Late);
        let list = value_of(k_new_list(&mut state, &[]));
        let node = value_of(k_new_node(&mut state, &[Reg::int(5)]));
        assert_eq!(state.classify(list).kind, RegKind::List);
        assert_eq!(state.classify(node).kind, RegKind::Node);
        assert!(!state.classify(node).invalid_offset);
        assert_eq!(state.lists.node(node).unwrap().key, Reg::int(5));
    }

    #[test]
    fn linking_keeps_order_and_ends() {
        let mut state = EngineState::with_system_platform(SciVersion::Sci0Late);
        let list = value_of(k_new_list(&mut state, &[]));
        assert_eq!(value_of(k_empty_list(&mut state, &[list])), Reg::int(1));

        let a = value_of(k_new_node(&mut state, &[Reg::int(1), Reg::int(10)]));
        let b = value_of(k_new_node(&mut state, &[Reg::int(2), Reg::int(20)]));
        let c = value_of(k_new_node(&mut state, &[Reg::int(3), Reg::int(30)]));
        k_add_to_end(&mut state, &[list, b]);
        k_add_to_front(&mut state, &[list, a]);
        k_add_after(&mut state, &[list, b, c]);

        assert_eq!(state.lists.nodes_of(list), vec![a, b, c]);
        assert_eq!(value_of(k_first_node(&mut state, &[list])), a);
        assert_eq!(value_of(k_last_node(&mut state, &[list])), c);
        assert_eq!(value_of(k_next_node(&mut state, &[a])), b);
        assert_eq!(value_of(k_prev_node(&mut state, &[c])), b);
        assert_eq!(value_of(k_node_value(&mut state, &[c])), Reg::int(3));
        assert_eq!(value_of(k_empty_list(&mut state, &[list])), Reg::NULL);
    }

    #[test]
    fn find_and_delete_by_key() {
        let mut state = EngineState::with_system_platform(SciVersion::Sci0Late);
        let list = value_of(k_new_list(&mut state, &[]));
        let a = value_of(k_new_node(&mut state, &[Reg::int(1), Reg::int(10)]));
        let b = value_of(k_new_node(&mut state, &[Reg::int(2), Reg::int(20)]));
        k_add_to_end(&mut state, &[list, a]);
        k_add_to_end(&mut state, &[list, b]);

        assert_eq!(value_of(k_find_key(&mut state, &[list, Reg::int(20)])), b);
        assert_eq!(value_of(k_find_key(&mut state, &[list, Reg::int(99)])), Reg::NULL);
        assert_eq!(value_of(k_delete_key(&mut state, &[list, Reg::int(10)])), Reg::int(1));
        assert_eq!(state.lists.nodes_of(list), vec![b]);
        assert!(state.classify(a).invalid_offset);
        assert_eq!(value_of(k_prev_node(&mut state, &[b])), Reg::NULL);
        assert_eq!(value_of(k_delete_key(&mut state, &[list, Reg::int(10)])), Reg::NULL);
    }

    #[test]
    fn dispose_frees_list_and_nodes() {
        let mut state = EngineState::with_system_platform(SciVersion::Sci0Late);
        let list = value_of(k_new_list(&mut state, &[]));
        let node = value_of(k_new_node(&mut state, &[Reg::int(1)]));
        k_add_to_end(&mut state, &[list, node]);
        assert_eq!(k_dispose_list(&mut state, &[list]), KernelReturn::Keep);
        assert!(state.classify(list).invalid_offset);
        assert!(state.classify(node).invalid_offset);
    }

    #[test]
    fn loaded_slots_are_not_reused() {
        let mut heap = SegmentTable::new();
        let mut lists = Segment::table(SegmentKind::Lists);
        lists.slots.extend([0, 1]);
        heap.insert(1, lists);
        let mut nodes = Segment::table(SegmentKind::Nodes);
        nodes.slots.insert(0);
        heap.insert(2, nodes);
        let mut state = EngineState::new(
            SciVersion::Sci1Late,
            heap,
            Box::new(ScriptedPlatform::new(Vec::new())),
        );

        let list = value_of(k_new_list(&mut state, &[]));
        assert_eq!(list, Reg::new(1, 2));
        let node = value_of(k_new_node(&mut state, &[Reg::int(4)]));
        assert_eq!(node, Reg::new(2, 1));
        let next = value_of(k_new_node(&mut state, &[Reg::int(5)]));
        assert_eq!(next, Reg::new(2, 2));
        assert_eq!(state.lists.node(node).unwrap().value, Reg::int(4));
    }
}
