//! Списочные узлы: sort list, val list, outptr list, selupd list, method sig.

use super::regu::{PosDescr, ReguVariableList, ReguVarlistList};
use super::{invalid, Link, Text};
use crate::codec::{DbValue, Hfid, ListId, Oid};
use crate::xasl::error::XtsResult;
use crate::xasl::sink::{Node, Sink};
use crate::xasl::visited::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum SortOrder {
    #[default]
    Asc = 1,
    Desc = 2,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SortList {
    pub next: Link<SortList>,
    pub pos_descr: PosDescr,
    pub s_order: SortOrder,
    /// NULLS FIRST / LAST.
    pub s_nulls: i32,
}

impl Node for SortList {
    const KIND: NodeKind = NodeKind::SortList;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.link(&self.next)?;
        self.pos_descr.process(s);
        s.int(self.s_order as i32);
        s.int(self.s_nulls);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SortedListId {
    pub sorted: bool,
    pub list_id: Link<ListId>,
}

impl Node for SortedListId {
    const KIND: NodeKind = NodeKind::SortedListId;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.flag(self.sorted);
        s.link(&self.list_id)
    }
}

/// VAL_LIST: val_cnt + смещение каждого значения.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValList {
    pub vals: Vec<Link<DbValue>>,
}

impl Node for ValList {
    const KIND: NodeKind = NodeKind::ValList;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.int(self.vals.len() as i32);
        for v in &self.vals {
            s.link(v)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutptrList {
    pub valptrp: Link<ReguVariableList>,
}

impl OutptrList {
    pub fn valptr_cnt(&self) -> usize {
        self.valptrp.as_ref().map_or(0, |l| l.items.len())
    }
}

impl Node for OutptrList {
    const KIND: NodeKind = NodeKind::OutptrList;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.int(self.valptr_cnt() as i32);
        s.regu_list(&self.valptrp)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelupdList {
    pub class_oid: Oid,
    pub class_hfid: Hfid,
    pub select_list: Link<ReguVarlistList>,
    pub wait_msecs: i32,
    pub next: Link<SelupdList>,
}

impl Node for SelupdList {
    const KIND: NodeKind = NodeKind::SelupdList;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.oid(&self.class_oid);
        s.hfid(&self.class_hfid);
        let size = self.select_list.as_ref().map_or(0, |l| l.lists.len());
        s.int(size as i32);
        s.int(self.wait_msecs);
        s.varlist_list(&self.select_list)?;
        s.link(&self.next)
    }
}

// ----------------------------------------------------------------------------
// Method signatures
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodSigList {
    pub method_sig: Link<MethodSig>,
}

impl MethodSigList {
    pub fn no_methods(&self) -> usize {
        let mut n = 0;
        let mut cur = self.method_sig.as_deref();
        while let Some(sig) = cur {
            n += 1;
            cur = sig.next.as_deref();
        }
        n
    }
}

impl Node for MethodSigList {
    const KIND: NodeKind = NodeKind::MethodSigList;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.int(self.no_methods() as i32);
        s.link(&self.method_sig)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub method_name: Text,
    pub class_name: Option<Text>,
    pub method_type: i32,
    /// Позиции аргументов; [0] - target, далее по одному на аргумент.
    pub method_arg_pos: Vec<i32>,
    pub next: Link<MethodSig>,
}

impl Node for MethodSig {
    const KIND: NodeKind = NodeKind::MethodSig;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        if self.method_arg_pos.is_empty() {
            return invalid("method signature without target position");
        }
        s.string(Some(&self.method_name))?;
        s.string(self.class_name.as_deref())?;
        s.int(self.method_type);
        s.int(self.method_arg_pos.len() as i32 - 1);
        for &p in &self.method_arg_pos {
            s.int(p);
        }
        s.link(&self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{OR_INT_SIZE, OR_OID_SIZE, OR_HFID_SIZE};
    use crate::xasl::nodes::link;
    use crate::xasl::sink::sizeof_node;

    #[test]
    fn method_sig_list_counts_chain() {
        let tail = MethodSig {
            method_name: "b".into(),
            class_name: None,
            method_type: 0,
            method_arg_pos: vec![0],
            next: None,
        };
        let head = MethodSig {
            method_name: "a".into(),
            class_name: Some("c".into()),
            method_type: 1,
            method_arg_pos: vec![0, 1, 2],
            next: link(tail),
        };
        // name + class + type + no_args + 3 positions + next
        assert_eq!(sizeof_node(&head).unwrap(), 8 * OR_INT_SIZE);
        let list = MethodSigList {
            method_sig: link(head),
        };
        assert_eq!(list.no_methods(), 2);
    }

    #[test]
    fn selupd_fixed_part() {
        let s = SelupdList::default();
        assert_eq!(
            sizeof_node(&s).unwrap(),
            OR_OID_SIZE + OR_HFID_SIZE + 4 * OR_INT_SIZE
        );
    }
}
