//! Proc-узлы: полезная нагрузка XASL-узла, зависящая от его типа.

use super::lists::{OutptrList, SortList, ValList};
use super::plan::{ProcType, XaslNode};
use super::pred::PredExpr;
use super::regu::{Aggregate, AnalyticEval, Arith, ReguVariable, ReguVariableList};
use super::spec::AccessSpec;
use super::{invalid, CacheAttrinfo, Link};
use crate::codec::{DbValue, Hfid, ListId, Oid};
use crate::xasl::error::XtsResult;
use crate::xasl::sink::{Node, Sink};
use crate::xasl::visited::NodeKind;

/// UNION / DIFFERENCE / INTERSECTION.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetOpProc {
    pub left: Link<XaslNode>,
    pub right: Link<XaslNode>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchProc {
    pub arg: Link<DbValue>,
    pub fetch_res: bool,
    pub set_pred: Link<PredExpr>,
    pub ql_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuildListProc {
    pub eptr_list: Link<XaslNode>,
    pub groupby_list: Link<SortList>,
    pub after_groupby_list: Link<SortList>,
    pub push_list_id: Link<ListId>,
    pub g_outptr_list: Link<OutptrList>,
    pub g_regu_list: Link<ReguVariableList>,
    pub g_val_list: Link<ValList>,
    pub g_having_pred: Link<PredExpr>,
    pub g_grbynum_pred: Link<PredExpr>,
    pub g_grbynum_val: Link<DbValue>,
    pub g_hash_eligible: bool,
    pub g_output_first_tuple: bool,
    pub g_hkey_size: i32,
    pub g_hk_scan_regu_list: Link<ReguVariableList>,
    pub g_hk_sort_regu_list: Link<ReguVariableList>,
    pub g_scan_regu_list: Link<ReguVariableList>,
    pub g_func_count: i32,
    pub g_grbynum_flag: i32,
    pub g_with_rollup: bool,
    pub g_agg_list: Link<Aggregate>,
    pub g_outarith_list: Link<Arith>,
    pub a_eval_list: Link<AnalyticEval>,
    pub a_regu_list: Link<ReguVariableList>,
    pub a_outptr_list: Link<OutptrList>,
    pub a_outptr_list_ex: Link<OutptrList>,
    pub a_outptr_list_interm: Link<OutptrList>,
    pub a_val_list: Link<ValList>,
    pub a_instnum_pred: Link<PredExpr>,
    pub a_instnum_val: Link<DbValue>,
    pub a_instnum_flag: i32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuildValueProc {
    pub having_pred: Link<PredExpr>,
    pub grbynum_val: Link<DbValue>,
    pub agg_list: Link<Aggregate>,
    pub outarith_list: Link<Arith>,
    pub is_always_false: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum JoinType {
    #[default]
    Inner = 0,
    LeftOuter = 1,
    RightOuter = 2,
    FullOuter = 3,
}

/// QFILE_LIST_MERGE_INFO; пакуется inline в mergelist.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListMergeInfo {
    pub join_type: JoinType,
    pub single_fetch: i32,
    pub ls_outer_column: Vec<i32>,
    pub ls_outer_unique: Vec<i32>,
    pub ls_inner_column: Vec<i32>,
    pub ls_inner_unique: Vec<i32>,
    pub ls_pos_list: Vec<i32>,
    pub ls_outer_inner_list: Vec<i32>,
}

impl ListMergeInfo {
    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        let cols = self.ls_outer_column.len();
        if [&self.ls_outer_unique, &self.ls_inner_column, &self.ls_inner_unique]
            .iter()
            .any(|v| v.len() != cols)
        {
            return invalid("list merge column arrays differ in length");
        }
        if self.ls_outer_inner_list.len() != self.ls_pos_list.len() {
            return invalid("list merge position arrays differ in length");
        }
        s.int(self.join_type as i32);
        s.int(self.single_fetch);
        s.int(cols as i32);
        s.int_array(&self.ls_outer_column)?;
        s.int_array(&self.ls_outer_unique)?;
        s.int_array(&self.ls_inner_column)?;
        s.int_array(&self.ls_inner_unique)?;
        s.int(self.ls_pos_list.len() as i32);
        s.int_array(&self.ls_pos_list)?;
        s.int_array(&self.ls_outer_inner_list)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergeListProc {
    pub outer_xasl: Link<XaslNode>,
    pub outer_spec_list: Vec<AccessSpec>,
    pub outer_val_list: Link<ValList>,
    pub inner_xasl: Link<XaslNode>,
    pub inner_spec_list: Vec<AccessSpec>,
    pub inner_val_list: Link<ValList>,
    pub ls_merge: ListMergeInfo,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectByProc {
    pub start_with_pred: Link<PredExpr>,
    pub after_connect_by_pred: Link<PredExpr>,
    pub input_list_id: Link<ListId>,
    pub start_with_list_id: Link<ListId>,
    pub regu_list_pred: Link<ReguVariableList>,
    pub regu_list_rest: Link<ReguVariableList>,
    pub prior_val_list: Link<ValList>,
    pub prior_outptr_list: Link<OutptrList>,
    pub prior_regu_list_pred: Link<ReguVariableList>,
    pub prior_regu_list_rest: Link<ReguVariableList>,
    pub after_cb_regu_list_pred: Link<ReguVariableList>,
    pub after_cb_regu_list_rest: Link<ReguVariableList>,
    pub single_table_opt: bool,
}

// ----------------------------------------------------------------------------
// UPDATE / DELETE / INSERT / MERGE
// ----------------------------------------------------------------------------

/// Класс (с подклассами), затрагиваемый UPDATE/DELETE. Пакуется inline-массивом.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpddelClassInfo {
    /// По элементу на подкласс (включая сам класс).
    pub class_oid: Vec<Oid>,
    pub class_hfid: Vec<Hfid>,
    pub no_attrs: i32,
    /// `no_attrs` идентификаторов на каждый подкласс подряд.
    pub att_id: Vec<i32>,
    pub needs_pruning: i32,
    pub has_uniques: bool,
    /// LOB-атрибуты по подклассам: количества и сами id. Либо оба, либо ни одного.
    pub no_lob_attrs: Vec<i32>,
    pub lob_attr_ids: Vec<Vec<i32>>,
    pub mvcc_extra_assign_reev: Vec<i32>,
}

impl UpddelClassInfo {
    pub fn no_subclasses(&self) -> usize {
        self.class_oid.len()
    }
}

impl Node for UpddelClassInfo {
    const KIND: NodeKind = NodeKind::UpddelClassInfo;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        let n = self.no_subclasses();
        if self.class_hfid.len() != n {
            return invalid("upddel class info oid/hfid counts differ");
        }
        if self.att_id.len() != self.no_attrs.max(0) as usize * n {
            return invalid("upddel class info attribute table has wrong size");
        }
        if self.no_lob_attrs.is_empty() != self.lob_attr_ids.is_empty() {
            return invalid("upddel class info lob attributes are half present");
        }
        s.int(n as i32);
        s.oid_array(&self.class_oid)?;
        s.hfid_array(&self.class_hfid)?;
        s.int(self.no_attrs);
        s.int_array(&self.att_id)?;
        s.int(self.needs_pruning);
        s.flag(self.has_uniques);
        s.int_array(&self.no_lob_attrs)?;
        s.int_array_table(&self.lob_attr_ids)?;
        s.int(self.mvcc_extra_assign_reev.len() as i32);
        s.int_array(&self.mvcc_extra_assign_reev)
    }
}

/// Присваивание в UPDATE. Пакуется inline-массивом.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateAssignment {
    pub cls_idx: i32,
    pub att_idx: i32,
    pub constant: Link<DbValue>,
    pub regu_var: Link<ReguVariable>,
}

impl Node for UpdateAssignment {
    const KIND: NodeKind = NodeKind::UpdateAssignment;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.int(self.cls_idx);
        s.int(self.att_idx);
        s.link(&self.constant)?;
        s.link(&self.regu_var)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateProc {
    pub classes: Vec<UpddelClassInfo>,
    pub assigns: Vec<UpdateAssignment>,
    pub cons_pred: Link<PredExpr>,
    pub wait_msecs: i32,
    pub no_logging: bool,
    pub release_lock: bool,
    pub no_orderby_keys: i32,
    pub no_assign_reev_classes: i32,
    pub mvcc_reev_classes: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteProc {
    pub classes: Vec<UpddelClassInfo>,
    pub wait_msecs: i32,
    pub no_logging: bool,
    pub release_lock: bool,
    pub mvcc_reev_classes: Vec<i32>,
}

/// ON DUPLICATE KEY UPDATE.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OdkuInfo {
    pub attr_ids: Vec<i32>,
    pub assignments: Vec<UpdateAssignment>,
    pub cons_pred: Link<PredExpr>,
    pub cache_attrinfo: Link<CacheAttrinfo>,
}

impl Node for OdkuInfo {
    const KIND: NodeKind = NodeKind::OdkuInfo;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        if self.attr_ids.len() != self.assignments.len() {
            return invalid("odku attribute ids and assignments differ");
        }
        s.int(self.assignments.len() as i32);
        s.int_array(&self.attr_ids)?;
        s.inline_array(&self.assignments)?;
        s.link(&self.cons_pred)?;
        s.cache_attrinfo(&self.cache_attrinfo)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertProc {
    pub class_oid: Oid,
    pub class_hfid: Hfid,
    pub no_vals: i32,
    pub no_default_expr: i32,
    pub att_id: Vec<i32>,
    pub cons_pred: Link<PredExpr>,
    pub has_uniques: bool,
    pub wait_msecs: i32,
    pub no_logging: bool,
    pub release_lock: bool,
    pub do_replace: bool,
    pub pruning_type: i32,
    pub odku: Link<OdkuInfo>,
    pub valptr_lists: Vec<Link<OutptrList>>,
    pub obj_oid: Link<DbValue>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergeProc {
    pub update_xasl: Link<XaslNode>,
    pub insert_xasl: Link<XaslNode>,
    pub has_delete: bool,
}

// ----------------------------------------------------------------------------
// ProcNode
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ProcNode {
    Union(SetOpProc),
    Difference(SetOpProc),
    Intersection(SetOpProc),
    ObjFetch(FetchProc),
    BuildList(Box<BuildListProc>),
    BuildValue(BuildValueProc),
    #[default]
    Scan,
    MergeList(Box<MergeListProc>),
    Update(UpdateProc),
    Delete(DeleteProc),
    Insert(InsertProc),
    ConnectBy(Box<ConnectByProc>),
    Do,
    Merge(MergeProc),
    BuildSchema,
}

impl ProcNode {
    pub fn proc_type(&self) -> ProcType {
        match self {
            ProcNode::Union(_) => ProcType::Union,
            ProcNode::Difference(_) => ProcType::Difference,
            ProcNode::Intersection(_) => ProcType::Intersection,
            ProcNode::ObjFetch(_) => ProcType::ObjFetch,
            ProcNode::BuildList(_) => ProcType::BuildList,
            ProcNode::BuildValue(_) => ProcType::BuildValue,
            ProcNode::Scan => ProcType::Scan,
            ProcNode::MergeList(_) => ProcType::MergeList,
            ProcNode::Update(_) => ProcType::Update,
            ProcNode::Delete(_) => ProcType::Delete,
            ProcNode::Insert(_) => ProcType::Insert,
            ProcNode::ConnectBy(_) => ProcType::ConnectBy,
            ProcNode::Do => ProcType::Do,
            ProcNode::Merge(_) => ProcType::Merge,
            ProcNode::BuildSchema => ProcType::BuildSchema,
        }
    }

    pub(crate) fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        match self {
            ProcNode::Union(p) | ProcNode::Difference(p) | ProcNode::Intersection(p) => {
                s.link(&p.left)?;
                s.link(&p.right)?;
            }
            ProcNode::ObjFetch(p) => {
                s.link(&p.arg)?;
                s.flag(p.fetch_res);
                s.link(&p.set_pred)?;
                s.flag(p.ql_flag);
            }
            ProcNode::BuildList(p) => build_list(p, s)?,
            ProcNode::BuildValue(p) => {
                s.link(&p.having_pred)?;
                s.link(&p.grbynum_val)?;
                s.link(&p.agg_list)?;
                s.link(&p.outarith_list)?;
                s.flag(p.is_always_false);
            }
            ProcNode::MergeList(p) => {
                s.link(&p.outer_xasl)?;
                s.int(p.outer_spec_list.len() as i32);
                s.inline_array(&p.outer_spec_list)?;
                s.link(&p.outer_val_list)?;
                s.link(&p.inner_xasl)?;
                s.int(p.inner_spec_list.len() as i32);
                s.inline_array(&p.inner_spec_list)?;
                s.link(&p.inner_val_list)?;
                p.ls_merge.process(s)?;
            }
            ProcNode::ConnectBy(p) => {
                s.link(&p.start_with_pred)?;
                s.link(&p.after_connect_by_pred)?;
                s.link(&p.input_list_id)?;
                s.link(&p.start_with_list_id)?;
                s.regu_list(&p.regu_list_pred)?;
                s.regu_list(&p.regu_list_rest)?;
                s.link(&p.prior_val_list)?;
                s.link(&p.prior_outptr_list)?;
                s.regu_list(&p.prior_regu_list_pred)?;
                s.regu_list(&p.prior_regu_list_rest)?;
                s.regu_list(&p.after_cb_regu_list_pred)?;
                s.regu_list(&p.after_cb_regu_list_rest)?;
                s.flag(p.single_table_opt);
            }
            ProcNode::Update(p) => {
                s.int(p.classes.len() as i32);
                s.inline_array(&p.classes)?;
                s.int(p.assigns.len() as i32);
                s.inline_array(&p.assigns)?;
                s.link(&p.cons_pred)?;
                s.int(p.wait_msecs);
                s.flag(p.no_logging);
                s.flag(p.release_lock);
                s.int(p.no_orderby_keys);
                s.int(p.no_assign_reev_classes);
                s.int(p.mvcc_reev_classes.len() as i32);
                s.int_array(&p.mvcc_reev_classes)?;
            }
            ProcNode::Delete(p) => {
                s.int(p.classes.len() as i32);
                s.inline_array(&p.classes)?;
                s.int(p.wait_msecs);
                s.flag(p.no_logging);
                s.flag(p.release_lock);
                s.int(p.mvcc_reev_classes.len() as i32);
                s.int_array(&p.mvcc_reev_classes)?;
            }
            ProcNode::Insert(p) => insert(p, s)?,
            ProcNode::Merge(p) => {
                s.link(&p.update_xasl)?;
                s.link(&p.insert_xasl)?;
                s.flag(p.has_delete);
            }
            ProcNode::Scan | ProcNode::Do | ProcNode::BuildSchema => {}
        }
        Ok(())
    }
}

fn build_list<'t, S: Sink<'t>>(p: &'t BuildListProc, s: &mut S) -> XtsResult<()> {
    s.link(&p.eptr_list)?;
    s.link(&p.groupby_list)?;
    s.link(&p.after_groupby_list)?;
    s.link(&p.push_list_id)?;
    s.link(&p.g_outptr_list)?;
    s.regu_list(&p.g_regu_list)?;
    s.link(&p.g_val_list)?;
    s.link(&p.g_having_pred)?;
    s.link(&p.g_grbynum_pred)?;
    s.link(&p.g_grbynum_val)?;
    s.flag(p.g_hash_eligible);
    s.flag(p.g_output_first_tuple);
    s.int(p.g_hkey_size);
    s.regu_list(&p.g_hk_scan_regu_list)?;
    s.regu_list(&p.g_hk_sort_regu_list)?;
    s.regu_list(&p.g_scan_regu_list)?;
    s.int(p.g_func_count);
    s.int(p.g_grbynum_flag);
    s.flag(p.g_with_rollup);
    s.link(&p.g_agg_list)?;
    s.link(&p.g_outarith_list)?;
    s.link(&p.a_eval_list)?;
    s.regu_list(&p.a_regu_list)?;
    s.link(&p.a_outptr_list)?;
    s.link(&p.a_outptr_list_ex)?;
    s.link(&p.a_outptr_list_interm)?;
    s.link(&p.a_val_list)?;
    s.link(&p.a_instnum_pred)?;
    s.link(&p.a_instnum_val)?;
    s.int(p.a_instnum_flag);
    Ok(())
}

fn insert<'t, S: Sink<'t>>(p: &'t InsertProc, s: &mut S) -> XtsResult<()> {
    s.oid(&p.class_oid);
    s.hfid(&p.class_hfid);
    s.int(p.no_vals);
    s.int(p.no_default_expr);
    s.int_array(&p.att_id)?;
    s.link(&p.cons_pred)?;
    s.flag(p.has_uniques);
    s.int(p.wait_msecs);
    s.flag(p.no_logging);
    s.flag(p.release_lock);
    s.flag(p.do_replace);
    s.int(p.pruning_type);
    s.link(&p.odku)?;
    s.int(p.valptr_lists.len() as i32);
    for l in &p.valptr_lists {
        s.link(l)?;
    }
    s.link(&p.obj_oid)
}
