//! Intrusive singly-linked BCP lists. Three operations only: insert-tail,
//! remove-head, remove-element. `next` is a `ProcId` index
//! into the process table rather than a raw pointer, which is what lets
//! these run over a plain `&mut [Bcp]` with no unsafe code.
//!
//! Contract: list order is insertion order. `remove_element` does nothing
//! if the BCP named isn't actually on the list — callers are responsible
//! for knowing it is. `next` of a removed BCP is left `None`, not left
//! dangling.
//!
//! All mutation here runs inside a `CriticalSection` at `NIVEL_3`; this
//! module does not raise/lower interrupt level itself (see `crit.rs`), it
//! only does the splicing.

use crate::bcp::{Bcp, ListTag, ProcId};

#[derive(Debug, Clone, Copy)]
pub struct BcpList {
    pub head: Option<ProcId>,
    pub tail: Option<ProcId>,
}

impl BcpList {
    pub const fn new() -> Self {
        BcpList { head: None, tail: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn insert_tail(&mut self, procs: &mut [Bcp], id: ProcId, tag: ListTag) {
        procs[id.0].next = None;
        procs[id.0].list_tag = tag;
        match self.tail {
            Some(t) => procs[t.0].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    pub fn remove_head(&mut self, procs: &mut [Bcp]) -> Option<ProcId> {
        let id = self.head?;
        self.head = procs[id.0].next;
        if self.head.is_none() {
            self.tail = None;
        }
        procs[id.0].next = None;
        procs[id.0].list_tag = ListTag::Off;
        Some(id)
    }

    pub fn remove_element(&mut self, procs: &mut [Bcp], id: ProcId) {
        if self.head == Some(id) {
            self.remove_head(procs);
            return;
        }
        let mut prev = self.head;
        while let Some(p) = prev {
            if procs[p.0].next == Some(id) {
                let next = procs[id.0].next;
                procs[p.0].next = next;
                if self.tail == Some(id) {
                    self.tail = Some(p);
                }
                procs[id.0].next = None;
                procs[id.0].list_tag = ListTag::Off;
                return;
            }
            prev = procs[p.0].next;
        }
    }
}

impl Default for BcpList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn procs() -> [Bcp; 4] {
        [Bcp::unused(0), Bcp::unused(1), Bcp::unused(2), Bcp::unused(3)]
    }

    #[test]
    fn insert_tail_preserves_order() {
        let mut procs = procs();
        let mut list = BcpList::new();
        list.insert_tail(&mut procs, ProcId(0), ListTag::Ready);
        list.insert_tail(&mut procs, ProcId(1), ListTag::Ready);
        list.insert_tail(&mut procs, ProcId(2), ListTag::Ready);

        assert_eq!(list.remove_head(&mut procs), Some(ProcId(0)));
        assert_eq!(list.remove_head(&mut procs), Some(ProcId(1)));
        assert_eq!(list.remove_head(&mut procs), Some(ProcId(2)));
        assert_eq!(list.remove_head(&mut procs), None);
    }

    #[test]
    fn remove_element_middle_fixes_links_and_tail() {
        let mut procs = procs();
        let mut list = BcpList::new();
        list.insert_tail(&mut procs, ProcId(0), ListTag::Ready);
        list.insert_tail(&mut procs, ProcId(1), ListTag::Ready);
        list.insert_tail(&mut procs, ProcId(2), ListTag::Ready);

        list.remove_element(&mut procs, ProcId(1));
        assert_eq!(list.remove_head(&mut procs), Some(ProcId(0)));
        assert_eq!(list.remove_head(&mut procs), Some(ProcId(2)));
        assert!(list.is_empty());
    }

    #[test]
    fn remove_element_tail_updates_tail_pointer() {
        let mut procs = procs();
        let mut list = BcpList::new();
        list.insert_tail(&mut procs, ProcId(0), ListTag::Ready);
        list.insert_tail(&mut procs, ProcId(1), ListTag::Ready);

        list.remove_element(&mut procs, ProcId(1));
        list.insert_tail(&mut procs, ProcId(2), ListTag::Ready);

        assert_eq!(list.remove_head(&mut procs), Some(ProcId(0)));
        assert_eq!(list.remove_head(&mut procs), Some(ProcId(2)));
    }

    #[test]
    fn remove_element_absent_is_a_no_op() {
        let mut procs = procs();
        let mut list = BcpList::new();
        list.insert_tail(&mut procs, ProcId(0), ListTag::Ready);

        list.remove_element(&mut procs, ProcId(3));
        assert_eq!(list.head, Some(ProcId(0)));
    }
}
