//! Regu-переменные и вычисляемые значения: arith, aggregate, function, analytic.

use super::lists::{SortList, SortedListId};
use super::plan::XaslNode;
use super::pred::PredExpr;
use super::{invalid, CacheAttrinfo, Link};
use crate::codec::{Btid, DbType, DbValue, Domain, ListId};
use crate::xasl::error::XtsResult;
use crate::xasl::sink::{Node, Sink};
use crate::xasl::visited::NodeKind;

/// Дискриминант regu-переменной (REGU_DATATYPE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ReguDataType {
    DbVal = 1,
    Constant = 2,
    OrderbyNum = 3,
    InArith = 4,
    OutArith = 5,
    AttrId = 6,
    SharedAttrId = 7,
    ClassAttrId = 8,
    Position = 9,
    ListId = 10,
    PosValue = 11,
    Oid = 12,
    ClassOid = 13,
    Func = 14,
    Aggregate = 15,
    ReguVarList = 16,
    ReguValList = 17,
}

/// Полезная нагрузка regu-переменной. Один вариант может обслуживать
/// несколько дискриминантов (Constant / OrderbyNum, InArith / OutArith, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum ReguValue {
    DbVal(DbValue),
    DbValPtr(Link<DbValue>),
    Arith(Link<Arith>),
    Aggregate(Link<Aggregate>),
    Func(Link<Function>),
    Attr(AttrDescr),
    SrListId(Link<SortedListId>),
    Position(PosDescr),
    PosValue(i32),
    /// OID / CLASSOID: без полезной нагрузки.
    Empty,
    ReguVarList(Link<ReguVariableList>),
    ReguValList(Vec<ReguVariable>),
}

impl ReguValue {
    /// Дискриминант по умолчанию для варианта.
    pub fn default_type(&self) -> ReguDataType {
        match self {
            ReguValue::DbVal(_) => ReguDataType::DbVal,
            ReguValue::DbValPtr(_) => ReguDataType::Constant,
            ReguValue::Arith(_) => ReguDataType::InArith,
            ReguValue::Aggregate(_) => ReguDataType::Aggregate,
            ReguValue::Func(_) => ReguDataType::Func,
            ReguValue::Attr(_) => ReguDataType::AttrId,
            ReguValue::SrListId(_) => ReguDataType::ListId,
            ReguValue::Position(_) => ReguDataType::Position,
            ReguValue::PosValue(_) => ReguDataType::PosValue,
            ReguValue::Empty => ReguDataType::Oid,
            ReguValue::ReguVarList(_) => ReguDataType::ReguVarList,
            ReguValue::ReguValList(_) => ReguDataType::ReguValList,
        }
    }

    fn accepts(&self, t: ReguDataType) -> bool {
        use ReguDataType as T;
        matches!(
            (self, t),
            (ReguValue::DbVal(_), T::DbVal)
                | (ReguValue::DbValPtr(_), T::Constant | T::OrderbyNum)
                | (ReguValue::Arith(_), T::InArith | T::OutArith)
                | (ReguValue::Aggregate(_), T::Aggregate)
                | (ReguValue::Func(_), T::Func)
                | (ReguValue::Attr(_), T::AttrId | T::SharedAttrId | T::ClassAttrId)
                | (ReguValue::SrListId(_), T::ListId)
                | (ReguValue::Position(_), T::Position)
                | (ReguValue::PosValue(_), T::PosValue)
                | (ReguValue::Empty, T::Oid | T::ClassOid)
                | (ReguValue::ReguVarList(_), T::ReguVarList)
                | (ReguValue::ReguValList(_), T::ReguValList)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttrDescr {
    pub id: i32,
    pub type_: DbType,
    pub cache_attrinfo: Link<CacheAttrinfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PosDescr {
    pub pos_no: i32,
    pub domain: Domain,
}

impl PosDescr {
    pub(crate) fn process<'t, S: Sink<'t>>(&self, s: &mut S) {
        s.int(self.pos_no);
        s.domain(&self.domain);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReguVariable {
    pub domain: Domain,
    pub type_: ReguDataType,
    pub flags: i32,
    pub vfetch_to: Link<DbValue>,
    pub xasl: Link<XaslNode>,
    pub value: ReguValue,
}

impl ReguVariable {
    pub fn new(value: ReguValue) -> Self {
        Self {
            domain: Domain::default(),
            type_: value.default_type(),
            flags: 0,
            vfetch_to: None,
            xasl: None,
            value,
        }
    }

    pub fn with_type(mut self, t: ReguDataType) -> Self {
        self.type_ = t;
        self
    }

    pub fn with_domain(mut self, d: Domain) -> Self {
        self.domain = d;
        self
    }

    pub fn with_xasl(mut self, x: Link<XaslNode>) -> Self {
        self.xasl = x;
        self
    }

    /// Только значение (без домена/флагов): используется и для элементов reguval list.
    fn process_value<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        if !self.value.accepts(self.type_) {
            return invalid("regu variable type does not match its value");
        }
        match &self.value {
            ReguValue::ReguVarList(l) => s.regu_list(l)?,
            ReguValue::ReguValList(items) => {
                s.int(items.len() as i32);
                for item in items {
                    match item.type_ {
                        ReguDataType::DbVal | ReguDataType::InArith | ReguDataType::PosValue => {}
                        _ => return invalid("reguval list item of unsupported type"),
                    }
                    s.int(item.type_ as i32);
                    item.process_value(s)?;
                }
            }
            ReguValue::DbVal(v) => s.db_value_inline(v),
            ReguValue::DbValPtr(v) => s.link(v)?,
            ReguValue::Arith(a) => s.link(a)?,
            ReguValue::Aggregate(a) => s.link(a)?,
            ReguValue::Func(f) => s.link(f)?,
            ReguValue::Attr(a) => {
                s.int(a.id);
                s.int(a.type_ as i32);
                s.cache_attrinfo(&a.cache_attrinfo)?;
            }
            ReguValue::SrListId(l) => s.link(l)?,
            ReguValue::Position(p) => p.process(s),
            ReguValue::PosValue(v) => s.int(*v),
            ReguValue::Empty => {}
        }
        Ok(())
    }
}

impl Node for ReguVariable {
    const KIND: NodeKind = NodeKind::ReguVariable;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.domain(&self.domain);
        s.int(self.type_ as i32);
        s.int(self.flags);
        s.link(&self.vfetch_to)?;
        s.link(&self.xasl)?;
        self.process_value(s)
    }
}

/// REGU_VARIABLE_LIST; в потоке - `[count, offsets...]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReguVariableList {
    pub items: Vec<ReguVariable>,
}

impl ReguVariableList {
    pub fn new(items: Vec<ReguVariable>) -> Self {
        Self { items }
    }
}

/// Список списков (selupd).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReguVarlistList {
    pub lists: Vec<Link<ReguVariableList>>,
}

// ----------------------------------------------------------------------------
// Arith
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ArithOp {
    #[default]
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    UnMinus = 4,
    Mod = 5,
    Concat = 6,
    Coalesce = 7,
    Nvl = 8,
    Case = 9,
    Decode = 10,
    Predicate = 11,
    If = 12,
}

impl ArithOp {
    /// Операции, у которых в потоке есть ещё и предикат.
    pub fn has_pred(self) -> bool {
        matches!(
            self,
            ArithOp::Case | ArithOp::Decode | ArithOp::Predicate | ArithOp::If
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arith {
    pub domain: Domain,
    pub value: Link<DbValue>,
    pub opcode: ArithOp,
    pub next: Link<Arith>,
    pub left: Link<ReguVariable>,
    pub right: Link<ReguVariable>,
    pub third: Link<ReguVariable>,
    pub misc_operand: i32,
    pub pred: Link<PredExpr>,
}

impl Node for Arith {
    const KIND: NodeKind = NodeKind::Arith;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.domain(&self.domain);
        s.link(&self.value)?;
        s.int(self.opcode as i32);
        s.link(&self.next)?;
        s.link(&self.left)?;
        s.link(&self.right)?;
        s.link(&self.third)?;
        s.int(self.misc_operand);
        if self.opcode.has_pred() {
            s.link(&self.pred)?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Aggregate / Function / Analytic
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum AggFunction {
    #[default]
    CountStar = 0,
    Count = 1,
    Sum = 2,
    Avg = 3,
    Min = 4,
    Max = 5,
    GroupConcat = 6,
    RowNumber = 7,
    Rank = 8,
    Lead = 9,
    Lag = 10,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub domain: Domain,
    pub acc_value: Link<DbValue>,
    pub acc_value2: Link<DbValue>,
    pub curr_cnt: i32,
    pub next: Link<Aggregate>,
    pub function: AggFunction,
    pub option: i32,
    pub opr_dbtype: DbType,
    /// Операнд упакован внутри агрегата, не по ссылке.
    pub operand: ReguVariable,
    pub list_id: Link<ListId>,
    pub flag_agg_optimize: bool,
    pub btid: Btid,
    pub sort_list: Link<SortList>,
}

impl Aggregate {
    pub fn new(function: AggFunction, operand: ReguVariable) -> Self {
        Self {
            domain: Domain::default(),
            acc_value: None,
            acc_value2: None,
            curr_cnt: 0,
            next: None,
            function,
            option: 0,
            opr_dbtype: DbType::Null,
            operand,
            list_id: None,
            flag_agg_optimize: false,
            btid: Btid::default(),
            sort_list: None,
        }
    }
}

impl Node for Aggregate {
    const KIND: NodeKind = NodeKind::Aggregate;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.domain(&self.domain);
        s.link(&self.acc_value)?;
        s.link(&self.acc_value2)?;
        s.int(self.curr_cnt);
        s.link(&self.next)?;
        s.int(self.function as i32);
        s.int(self.option);
        s.int(self.opr_dbtype as i32);
        self.operand.process(s)?;
        s.link(&self.list_id)?;
        s.flag(self.flag_agg_optimize);
        s.btid(&self.btid);
        s.link(&self.sort_list)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Function {
    pub value: Link<DbValue>,
    pub ftype: i32,
    pub operand: Link<ReguVariableList>,
}

impl Node for Function {
    const KIND: NodeKind = NodeKind::Function;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.link(&self.value)?;
        s.int(self.ftype);
        s.regu_list(&self.operand)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analytic {
    pub domain: Domain,
    pub value: Link<DbValue>,
    pub value2: Link<DbValue>,
    pub out_value: Link<DbValue>,
    pub offset_idx: i32,
    pub default_idx: i32,
    pub next: Link<Analytic>,
    pub function: AggFunction,
    pub option: i32,
    pub opr_dbtype: DbType,
    pub operand: ReguVariable,
    pub list_id: Link<ListId>,
    pub sort_prefix_size: i32,
    pub sort_list_size: i32,
    pub flag: i32,
    pub from_last: bool,
    pub ignore_nulls: bool,
    pub is_const_operand: bool,
}

impl Analytic {
    pub fn new(function: AggFunction, operand: ReguVariable) -> Self {
        Self {
            domain: Domain::default(),
            value: None,
            value2: None,
            out_value: None,
            offset_idx: 0,
            default_idx: 0,
            next: None,
            function,
            option: 0,
            opr_dbtype: DbType::Null,
            operand,
            list_id: None,
            sort_prefix_size: 0,
            sort_list_size: 0,
            flag: 0,
            from_last: false,
            ignore_nulls: false,
            is_const_operand: false,
        }
    }
}

impl Node for Analytic {
    const KIND: NodeKind = NodeKind::Analytic;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.domain(&self.domain);
        s.link(&self.value)?;
        s.link(&self.value2)?;
        s.link(&self.out_value)?;
        s.int(self.offset_idx);
        s.int(self.default_idx);
        s.link(&self.next)?;
        s.int(self.function as i32);
        s.int(self.option);
        s.int(self.opr_dbtype as i32);
        self.operand.process(s)?;
        s.link(&self.list_id)?;
        s.int(self.sort_prefix_size);
        s.int(self.sort_list_size);
        s.int(self.flag);
        s.flag(self.from_last);
        s.flag(self.ignore_nulls);
        s.flag(self.is_const_operand);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalyticEval {
    pub head: Link<Analytic>,
    pub sort_list: Link<SortList>,
    pub next: Link<AnalyticEval>,
}

impl Node for AnalyticEval {
    const KIND: NodeKind = NodeKind::AnalyticEval;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.link(&self.head)?;
        s.link(&self.sort_list)?;
        s.link(&self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::or_packed_db_value_size;
    use crate::consts::OR_INT_SIZE;
    use crate::xasl::error::XtsError;
    use crate::xasl::nodes::link;
    use crate::xasl::sink::sizeof_node;

    // domain (3 int) + type + flags + vfetch_to + xasl
    const REGU_PREFIX: usize = 7 * OR_INT_SIZE;

    #[test]
    fn regu_value_sizes_follow_variant() {
        let v = DbValue::Varchar("x".into());
        let inline = ReguVariable::new(ReguValue::DbVal(v.clone()));
        assert_eq!(
            sizeof_node(&inline).unwrap(),
            REGU_PREFIX + or_packed_db_value_size(&v)
        );

        let ptr = ReguVariable::new(ReguValue::DbValPtr(link(v)));
        assert_eq!(sizeof_node(&ptr).unwrap(), REGU_PREFIX + OR_INT_SIZE);

        let attr = ReguVariable::new(ReguValue::Attr(AttrDescr::default()));
        assert_eq!(sizeof_node(&attr).unwrap(), REGU_PREFIX + 3 * OR_INT_SIZE);

        let oid = ReguVariable::new(ReguValue::Empty).with_type(ReguDataType::ClassOid);
        assert_eq!(sizeof_node(&oid).unwrap(), REGU_PREFIX);
    }

    #[test]
    fn mismatched_regu_type_is_invalid() {
        let r = ReguVariable::new(ReguValue::PosValue(3)).with_type(ReguDataType::InArith);
        assert!(matches!(
            sizeof_node(&r),
            Err(XtsError::InvalidXaslNode(_))
        ));
    }

    #[test]
    fn reguval_list_rejects_unsupported_items() {
        let ok = ReguVariable::new(ReguValue::ReguValList(vec![
            ReguVariable::new(ReguValue::DbVal(DbValue::Int(1))),
            ReguVariable::new(ReguValue::PosValue(2)),
        ]));
        // count + (type + int value) + (type + db value)
        assert_eq!(
            sizeof_node(&ok).unwrap(),
            REGU_PREFIX + OR_INT_SIZE + 2 * OR_INT_SIZE + OR_INT_SIZE + 8
        );

        let bad = ReguVariable::new(ReguValue::ReguValList(vec![ReguVariable::new(
            ReguValue::Func(None),
        )]));
        assert!(sizeof_node(&bad).is_err());
    }

    #[test]
    fn arith_packs_pred_only_for_conditional_ops() {
        let mut a = Arith::default();
        let plain = sizeof_node(&a).unwrap();
        a.opcode = ArithOp::Case;
        assert_eq!(sizeof_node(&a).unwrap(), plain + OR_INT_SIZE);
    }
}
