//! Access spec и всё, что к нему прилагается: index info, key ranges, цели сканирования.
//!
//! Access spec-и пакуются inline-массивом (подряд), поэтому в visited-кэш не попадают.
//! Тип цели (`TargetType`) и вариант полезной нагрузки (`AccessTarget`) хранятся раздельно,
//! как в потоке; рассогласование - InvalidXaslNode.

use super::lists::{MethodSigList, OutptrList};
use super::plan::XaslNode;
use super::pred::PredExpr;
use super::regu::{ReguVariable, ReguVariableList};
use super::{invalid, CacheAttrinfo, Link};
use crate::codec::{Btid, DbValue, Ehid, Hfid, Oid};
use crate::xasl::error::XtsResult;
use crate::xasl::sink::{Node, Sink};
use crate::xasl::visited::NodeKind;

const T_BTID: i32 = 1;
const T_EHID: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TargetType {
    Class = 1,
    ClassAttr = 2,
    List = 3,
    Set = 4,
    Method = 5,
    ReguValList = 6,
    ShowStmt = 7,
}

impl TargetType {
    pub fn from_code(code: i32) -> XtsResult<Self> {
        Ok(match code {
            1 => TargetType::Class,
            2 => TargetType::ClassAttr,
            3 => TargetType::List,
            4 => TargetType::Set,
            5 => TargetType::Method,
            6 => TargetType::ReguValList,
            7 => TargetType::ShowStmt,
            _ => return invalid("access spec target type out of range"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum AccessMethod {
    #[default]
    Sequential = 0,
    Index = 1,
    IndexKeyInfo = 2,
    IndexNodeInfo = 3,
    SequentialRecordInfo = 4,
    SequentialPageScan = 5,
}

impl AccessMethod {
    /// Для последовательных методов индекс в поток не пишется.
    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            AccessMethod::Sequential
                | AccessMethod::SequentialRecordInfo
                | AccessMethod::SequentialPageScan
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum RangeOp {
    #[default]
    NaRange = 0,
    GeLe = 1,
    GeLt = 2,
    GtLe = 3,
    GtLt = 4,
    GeInf = 5,
    GtInf = 6,
    InfLe = 7,
    InfLt = 8,
    InfInf = 9,
    EqNa = 10,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyRange {
    pub range: RangeOp,
    pub key1: Link<ReguVariable>,
    pub key2: Link<ReguVariable>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyInfo {
    pub key_ranges: Vec<KeyRange>,
    pub is_constant: bool,
    pub key_limit_l: Link<ReguVariable>,
    pub key_limit_u: Link<ReguVariable>,
    pub key_limit_reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndxId {
    Btid(Btid),
    Ehid(Ehid),
}

impl Default for IndxId {
    fn default() -> Self {
        IndxId::Btid(Btid::default())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndxInfo {
    pub indx_id: IndxId,
    pub coverage: i32,
    pub range_type: i32,
    pub key_info: KeyInfo,
    pub orderby_desc: i32,
    pub groupby_desc: i32,
    pub use_desc_index: i32,
    pub orderby_skip: i32,
    pub groupby_skip: i32,
    pub use_iss: bool,
    pub ils_prefix_len: i32,
    pub func_idx_col_id: i32,
    /// Диапазон index skip scan; пишется только при `use_iss`.
    pub iss_range: KeyRange,
}

impl Node for IndxInfo {
    const KIND: NodeKind = NodeKind::IndxInfo;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        match &self.indx_id {
            IndxId::Btid(b) => {
                s.int(T_BTID);
                s.btid(b);
            }
            IndxId::Ehid(e) => {
                s.int(T_EHID);
                s.ehid(e);
            }
        }
        s.int(self.coverage);
        s.int(self.range_type);

        let k = &self.key_info;
        s.int(k.key_ranges.len() as i32);
        s.key_ranges(&k.key_ranges)?;
        s.flag(k.is_constant);
        s.link(&k.key_limit_l)?;
        s.link(&k.key_limit_u)?;
        s.flag(k.key_limit_reset);

        s.int(self.orderby_desc);
        s.int(self.groupby_desc);
        s.int(self.use_desc_index);
        s.int(self.orderby_skip);
        s.int(self.groupby_skip);
        s.flag(self.use_iss);
        s.int(self.ils_prefix_len);
        s.int(self.func_idx_col_id);

        if self.use_iss {
            s.int(self.iss_range.range as i32);
            s.link(&self.iss_range.key1)?;
        } else {
            s.int(0);
            s.int(0);
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Цели сканирования
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClsSpec {
    pub hfid: Hfid,
    pub cls_oid: Oid,
    pub cls_regu_list_key: Link<ReguVariableList>,
    pub cls_regu_list_pred: Link<ReguVariableList>,
    pub cls_regu_list_rest: Link<ReguVariableList>,
    pub cls_regu_list_range: Link<ReguVariableList>,
    pub cls_regu_list_last_version: Link<ReguVariableList>,
    pub cls_output_val_list: Link<OutptrList>,
    pub cls_regu_val_list: Link<ReguVariableList>,
    pub attrids_key: Vec<i32>,
    pub cache_key: Link<CacheAttrinfo>,
    pub attrids_pred: Vec<i32>,
    pub cache_pred: Link<CacheAttrinfo>,
    pub attrids_rest: Vec<i32>,
    pub cache_rest: Link<CacheAttrinfo>,
    pub schema_type: i32,
    pub cache_reserved: Vec<Link<DbValue>>,
    pub cls_regu_list_reserved: Link<ReguVariableList>,
    pub attrids_range: Vec<i32>,
    pub cache_range: Link<CacheAttrinfo>,
}

impl ClsSpec {
    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.hfid(&self.hfid);
        s.oid(&self.cls_oid);
        s.regu_list(&self.cls_regu_list_key)?;
        s.regu_list(&self.cls_regu_list_pred)?;
        s.regu_list(&self.cls_regu_list_rest)?;
        s.regu_list(&self.cls_regu_list_range)?;
        s.regu_list(&self.cls_regu_list_last_version)?;
        s.link(&self.cls_output_val_list)?;
        s.regu_list(&self.cls_regu_val_list)?;

        for (ids, cache) in [
            (&self.attrids_key, &self.cache_key),
            (&self.attrids_pred, &self.cache_pred),
            (&self.attrids_rest, &self.cache_rest),
        ] {
            s.int(ids.len() as i32);
            s.int_array(ids)?;
            s.cache_attrinfo(cache)?;
        }

        s.int(self.schema_type);
        s.int(self.cache_reserved.len() as i32);
        s.db_value_array(&self.cache_reserved)?;
        s.regu_list(&self.cls_regu_list_reserved)?;

        s.int(self.attrids_range.len() as i32);
        s.int_array(&self.attrids_range)?;
        s.cache_attrinfo(&self.cache_range)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListSpec {
    pub xasl_node: Link<XaslNode>,
    pub list_regu_list_pred: Link<ReguVariableList>,
    pub list_regu_list_rest: Link<ReguVariableList>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShowStmtSpec {
    pub show_type: i32,
    pub arg_list: Link<ReguVariableList>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetSpec {
    pub set_ptr: Link<ReguVariable>,
    pub set_regu_list: Link<ReguVariableList>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodSpec {
    pub xasl_node: Link<XaslNode>,
    pub method_regu_list: Link<ReguVariableList>,
    pub method_sig_list: Link<MethodSigList>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessTarget {
    Class(ClsSpec),
    List(ListSpec),
    ShowStmt(ShowStmtSpec),
    ReguValList,
    Set(SetSpec),
    Method(MethodSpec),
}

impl AccessTarget {
    fn matches(&self, t: TargetType) -> bool {
        matches!(
            (self, t),
            (AccessTarget::Class(_), TargetType::Class | TargetType::ClassAttr)
                | (AccessTarget::List(_), TargetType::List)
                | (AccessTarget::ShowStmt(_), TargetType::ShowStmt)
                | (AccessTarget::ReguValList, TargetType::ReguValList)
                | (AccessTarget::Set(_), TargetType::Set)
                | (AccessTarget::Method(_), TargetType::Method)
        )
    }

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        match self {
            AccessTarget::Class(c) => c.process(s)?,
            AccessTarget::List(l) => {
                s.link(&l.xasl_node)?;
                s.regu_list(&l.list_regu_list_pred)?;
                s.regu_list(&l.list_regu_list_rest)?;
            }
            AccessTarget::ShowStmt(st) => {
                s.int(st.show_type);
                s.regu_list(&st.arg_list)?;
            }
            AccessTarget::ReguValList => {}
            AccessTarget::Set(st) => {
                s.link(&st.set_ptr)?;
                s.regu_list(&st.set_regu_list)?;
            }
            AccessTarget::Method(m) => {
                s.link(&m.xasl_node)?;
                s.regu_list(&m.method_regu_list)?;
                s.link(&m.method_sig_list)?;
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// ACCESS_SPEC_TYPE
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AccessSpec {
    pub type_: TargetType,
    pub access: AccessMethod,
    pub indexptr: Link<IndxInfo>,
    pub where_key: Link<PredExpr>,
    pub where_pred: Link<PredExpr>,
    pub where_range: Link<PredExpr>,
    pub target: AccessTarget,
    pub grouped_scan: bool,
    pub fixed_scan: bool,
    pub qualified_block: bool,
    pub single_fetch: i32,
    pub pruning_type: i32,
    pub s_dbval: Link<DbValue>,
    pub flags: i32,
}

impl AccessSpec {
    /// Spec с типом, выведенным из цели, и последовательным доступом.
    pub fn new(target: AccessTarget) -> Self {
        let type_ = match &target {
            AccessTarget::Class(_) => TargetType::Class,
            AccessTarget::List(_) => TargetType::List,
            AccessTarget::ShowStmt(_) => TargetType::ShowStmt,
            AccessTarget::ReguValList => TargetType::ReguValList,
            AccessTarget::Set(_) => TargetType::Set,
            AccessTarget::Method(_) => TargetType::Method,
        };
        Self {
            type_,
            access: AccessMethod::Sequential,
            indexptr: None,
            where_key: None,
            where_pred: None,
            where_range: None,
            target,
            grouped_scan: false,
            fixed_scan: false,
            qualified_block: false,
            single_fetch: 0,
            pruning_type: 0,
            s_dbval: None,
            flags: 0,
        }
    }

    pub fn with_index(mut self, access: AccessMethod, indx: Link<IndxInfo>) -> Self {
        self.access = access;
        self.indexptr = indx;
        self
    }
}

impl Node for AccessSpec {
    const KIND: NodeKind = NodeKind::AccessSpec;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        if !self.target.matches(self.type_) {
            return invalid("access spec target does not match its type");
        }
        s.int(self.type_ as i32);
        s.int(self.access as i32);
        if self.access.is_sequential() {
            s.node::<IndxInfo>(None)?;
        } else {
            s.link(&self.indexptr)?;
        }
        s.link(&self.where_key)?;
        s.link(&self.where_pred)?;
        s.link(&self.where_range)?;

        self.target.process(s)?;

        s.flag(self.grouped_scan);
        s.flag(self.fixed_scan);
        s.flag(self.qualified_block);
        s.int(self.single_fetch);
        s.int(self.pruning_type);
        s.link(&self.s_dbval)?;
        s.int(self.flags);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{OR_BTID_SIZE, OR_HFID_SIZE, OR_INT_SIZE, OR_OID_SIZE};
    use crate::xasl::error::XtsError;
    use crate::xasl::nodes::link;
    use crate::xasl::sink::sizeof_node;

    // type, access, indexptr, 3 where, 3 flags, single_fetch, pruning, s_dbval, flags
    const SPEC_COMMON: usize = 13 * OR_INT_SIZE;

    #[test]
    fn target_type_codes_out_of_range_are_invalid() {
        assert_eq!(TargetType::from_code(3).unwrap(), TargetType::List);
        for bad in [0, 8, -1, 42] {
            assert!(matches!(
                TargetType::from_code(bad),
                Err(XtsError::InvalidXaslNode(_))
            ));
        }
    }

    #[test]
    fn list_and_reguval_targets() {
        let list = AccessSpec::new(AccessTarget::List(ListSpec::default()));
        assert_eq!(sizeof_node(&list).unwrap(), SPEC_COMMON + 3 * OR_INT_SIZE);

        let rv = AccessSpec::new(AccessTarget::ReguValList);
        assert_eq!(sizeof_node(&rv).unwrap(), SPEC_COMMON);
    }

    #[test]
    fn class_target_size() {
        let cls = AccessSpec::new(AccessTarget::Class(ClsSpec::default()));
        // hfid, oid, 5 regu lists, outptr, regu_val_list,
        // 3 x (n, ids, cache), schema, n_reserved, reserved, regu_reserved, (n, ids, cache)
        let body = OR_HFID_SIZE + OR_OID_SIZE + 7 * OR_INT_SIZE + 9 * OR_INT_SIZE
            + 4 * OR_INT_SIZE
            + 3 * OR_INT_SIZE;
        assert_eq!(sizeof_node(&cls).unwrap(), SPEC_COMMON + body);
    }

    #[test]
    fn mismatched_target_is_invalid() {
        let mut spec = AccessSpec::new(AccessTarget::Set(SetSpec::default()));
        spec.type_ = TargetType::List;
        assert!(matches!(
            sizeof_node(&spec),
            Err(XtsError::InvalidXaslNode(_))
        ));
    }

    #[test]
    fn indx_info_always_carries_iss_slots() {
        let mut ii = IndxInfo::default();
        // id type + btid, coverage, range_type, key_info (6), 5 desc/skip,
        // use_iss, ils, func_idx, iss (2)
        let expected = OR_INT_SIZE + OR_BTID_SIZE + 2 * OR_INT_SIZE + 6 * OR_INT_SIZE
            + 5 * OR_INT_SIZE
            + 3 * OR_INT_SIZE
            + 2 * OR_INT_SIZE;
        assert_eq!(sizeof_node(&ii).unwrap(), expected);
        ii.use_iss = true;
        ii.iss_range.key1 = link(ReguVariable::new(crate::xasl::nodes::ReguValue::PosValue(1)));
        assert_eq!(sizeof_node(&ii).unwrap(), expected);
    }
}
