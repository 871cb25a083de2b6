//! XASL_NODE: корень плана и узлы подзапросов.

use super::lists::{OutptrList, SelupdList, SortList, ValList};
use super::pred::PredExpr;
use super::procs::ProcNode;
use super::regu::ReguVariable;
use super::spec::AccessSpec;
use super::{Link, Text};
use crate::codec::{DbValue, ListId, Oid};
use crate::consts::EMPTY_QUERY_ALIAS;
use crate::xasl::error::XtsResult;
use crate::xasl::sink::{Node, Sink};
use crate::xasl::visited::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ProcType {
    Union = 0,
    Difference = 1,
    Intersection = 2,
    ObjFetch = 3,
    BuildList = 4,
    BuildValue = 5,
    Scan = 6,
    MergeList = 7,
    Update = 8,
    Delete = 9,
    Insert = 10,
    ConnectBy = 11,
    Do = 12,
    Merge = 13,
    BuildSchema = 14,
}

/// В поток идёт только xasl_flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XaslNodeHeader {
    pub xasl_flag: i32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XaslNode {
    pub header: XaslNodeHeader,
    pub flag: i32,
    pub list_id: Link<ListId>,
    pub after_iscan_list: Link<SortList>,
    pub orderby_list: Link<SortList>,
    pub ordbynum_pred: Link<PredExpr>,
    pub ordbynum_val: Link<DbValue>,
    pub orderby_limit: Link<ReguVariable>,
    pub ordbynum_flag: i32,
    pub limit_row_count: Link<ReguVariable>,
    pub single_tuple: Link<ValList>,
    pub is_single_tuple: bool,
    pub option: i32,
    pub outptr_list: Link<OutptrList>,
    pub selected_upd_list: Link<SelupdList>,
    pub spec_list: Vec<AccessSpec>,
    pub merge_spec: Vec<AccessSpec>,
    pub val_list: Link<ValList>,
    pub merge_val_list: Link<ValList>,
    pub aptr_list: Link<XaslNode>,
    pub bptr_list: Link<XaslNode>,
    pub dptr_list: Link<XaslNode>,
    pub after_join_pred: Link<PredExpr>,
    pub if_pred: Link<PredExpr>,
    pub instnum_pred: Link<PredExpr>,
    pub instnum_val: Link<DbValue>,
    pub save_instnum_val: Link<DbValue>,
    pub instnum_flag: i32,
    pub fptr_list: Link<XaslNode>,
    pub scan_ptr: Link<XaslNode>,
    pub connect_by_ptr: Link<XaslNode>,
    pub level_val: Link<DbValue>,
    pub level_regu: Link<ReguVariable>,
    pub isleaf_val: Link<DbValue>,
    pub isleaf_regu: Link<ReguVariable>,
    pub iscycle_val: Link<DbValue>,
    pub iscycle_regu: Link<ReguVariable>,
    pub curr_spec: Vec<AccessSpec>,
    pub next_scan_on: bool,
    pub next_scan_block_on: bool,
    pub cat_fetched: i32,
    pub scan_op_type: i32,
    pub upd_del_class_cnt: i32,
    pub mvcc_reev_extra_cls_cnt: i32,
    pub proc: ProcNode,
    pub projected_size: i32,
    pub cardinality: f64,
    pub iscan_oid_order: bool,
    pub query_alias: Option<Text>,
    pub next: Link<XaslNode>,

    // Данные заголовка потока; в тело узла не пишутся.
    pub dbval_cnt: i32,
    pub creator_oid: Oid,
    pub class_oid_list: Vec<Oid>,
    pub repr_id_list: Vec<i32>,
}

impl XaslNode {
    pub fn new(proc: ProcNode) -> Self {
        Self {
            proc,
            ..Default::default()
        }
    }

    pub fn proc_type(&self) -> ProcType {
        self.proc.proc_type()
    }
}

fn specs<'t, S: Sink<'t>>(v: &'t [AccessSpec], s: &mut S) -> XtsResult<()> {
    s.int(v.len() as i32);
    s.inline_array(v)
}

impl Node for XaslNode {
    const KIND: NodeKind = NodeKind::XaslNode;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.int(self.header.xasl_flag);
        s.int(self.proc_type() as i32);
        s.int(self.flag);
        s.link(&self.list_id)?;
        s.link(&self.after_iscan_list)?;
        s.link(&self.orderby_list)?;
        s.link(&self.ordbynum_pred)?;
        s.link(&self.ordbynum_val)?;
        s.link(&self.orderby_limit)?;
        s.int(self.ordbynum_flag);
        s.link(&self.limit_row_count)?;
        s.link(&self.single_tuple)?;
        s.flag(self.is_single_tuple);
        s.int(self.option);
        s.link(&self.outptr_list)?;
        s.link(&self.selected_upd_list)?;
        specs(&self.spec_list, s)?;
        specs(&self.merge_spec, s)?;
        s.link(&self.val_list)?;
        s.link(&self.merge_val_list)?;
        s.link(&self.aptr_list)?;
        s.link(&self.bptr_list)?;
        s.link(&self.dptr_list)?;
        s.link(&self.after_join_pred)?;
        s.link(&self.if_pred)?;
        s.link(&self.instnum_pred)?;
        s.link(&self.instnum_val)?;
        s.link(&self.save_instnum_val)?;
        s.int(self.instnum_flag);
        s.link(&self.fptr_list)?;
        s.link(&self.scan_ptr)?;
        s.link(&self.connect_by_ptr)?;
        s.link(&self.level_val)?;
        s.link(&self.level_regu)?;
        s.link(&self.isleaf_val)?;
        s.link(&self.isleaf_regu)?;
        s.link(&self.iscycle_val)?;
        s.link(&self.iscycle_regu)?;
        specs(&self.curr_spec, s)?;
        s.flag(self.next_scan_on);
        s.flag(self.next_scan_block_on);
        s.int(self.cat_fetched);
        s.int(self.scan_op_type);
        s.int(self.upd_del_class_cnt);
        s.int(self.mvcc_reev_extra_cls_cnt);

        self.proc.process(s)?;

        s.int(self.projected_size);
        s.double(self.cardinality);
        s.flag(self.iscan_oid_order);
        s.string(Some(self.query_alias.as_deref().unwrap_or(EMPTY_QUERY_ALIAS)))?;
        s.link(&self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::OR_INT_SIZE;
    use crate::xasl::nodes::{link, SetOpProc};
    use crate::xasl::sink::sizeof_node;

    // 52 четырёхбайтовых поля + cardinality (double)
    const SCAN_NODE_SIZE: usize = 54 * OR_INT_SIZE;

    #[test]
    fn scan_node_fixed_size() {
        assert_eq!(sizeof_node(&XaslNode::default()).unwrap(), SCAN_NODE_SIZE);
        assert_eq!(XaslNode::default().proc_type(), ProcType::Scan);
    }

    #[test]
    fn union_adds_two_offsets() {
        let n = XaslNode::new(ProcNode::Union(SetOpProc {
            left: link(XaslNode::default()),
            right: None,
        }));
        assert_eq!(sizeof_node(&n).unwrap(), SCAN_NODE_SIZE + 2 * OR_INT_SIZE);
    }
}
