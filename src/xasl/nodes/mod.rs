//! Модель XASL-дерева и её упаковка.
//!
//! Что здесь:
//! - Link<T> = Option<Arc<T>>: дочерняя ссылка; общий Arc = общее поддерево (DAG),
//!   такой узел попадёт в поток ровно один раз;
//! - по файлу на семейство узлов (plan, procs, spec, pred, regu, lists);
//! - для каждого узла - `impl Node` с порядком полей в потоке.
//!
//! Счётчики (`no_*`, `*_cnt`) не хранятся отдельно: они выводятся из длины
//! векторов, поэтому не могут разойтись с содержимым.

use std::sync::Arc;

use super::error::{XtsError, XtsResult};
use super::sink::{Node, Sink};
use super::visited::NodeKind;
use crate::codec::{or_pack_listid, DbValue, ListId};

pub mod lists;
pub mod plan;
pub mod pred;
pub mod procs;
pub mod regu;
pub mod spec;

pub use lists::{
    MethodSig, MethodSigList, OutptrList, SelupdList, SortList, SortOrder, SortedListId, ValList,
};
pub use plan::{ProcType, XaslNode, XaslNodeHeader};
pub use pred::{BoolOp, EvalTerm, FilterPred, FuncPred, PredExpr, RelOp};
pub use procs::{
    BuildListProc, BuildValueProc, ConnectByProc, DeleteProc, FetchProc, InsertProc, JoinType,
    ListMergeInfo, MergeListProc, MergeProc, OdkuInfo, ProcNode, SetOpProc, UpdateAssignment,
    UpdateProc, UpddelClassInfo,
};
pub use regu::{
    AggFunction, Aggregate, Analytic, AnalyticEval, Arith, ArithOp, AttrDescr, Function,
    PosDescr, ReguDataType, ReguValue, ReguVariable, ReguVariableList, ReguVarlistList,
};
pub use spec::{
    AccessMethod, AccessSpec, AccessTarget, ClsSpec, IndxId, IndxInfo, KeyInfo, KeyRange,
    ListSpec, MethodSpec, RangeOp, SetSpec, ShowStmtSpec, TargetType,
};

/// Дочерняя ссылка узла.
pub type Link<T> = Option<Arc<T>>;

/// Строка, которую можно разделять между узлами (дедуплицируется по адресу).
pub type Text = Arc<str>;

/// Обернуть значение в ссылку.
pub fn link<T>(v: T) -> Link<T> {
    Some(Arc::new(v))
}

pub(crate) fn invalid<T>(what: &'static str) -> XtsResult<T> {
    Err(XtsError::InvalidXaslNode(what))
}

// ----------------------------------------------------------------------------
// Кэш атрибутов кучи
// ----------------------------------------------------------------------------

/// Кэш атрибутов кучи (HEAP_CACHE_ATTRINFO). Сервер заполняет его сам, клиент
/// передаёт только число значений. Один кэш обычно разделяют `cache_pred` скана
/// и атрибутные regu-переменные, которые из него читают: в потоке он один.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheAttrinfo {
    pub num_values: i32,
}

impl Node for CacheAttrinfo {
    const KIND: NodeKind = NodeKind::CacheAttrinfo;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.int(self.num_values);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Узлы из codec: DB_VALUE и LIST_ID
// ----------------------------------------------------------------------------

impl Node for DbValue {
    const KIND: NodeKind = NodeKind::DbValue;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.db_value_inline(self);
        Ok(())
    }
}

impl Node for ListId {
    const KIND: NodeKind = NodeKind::ListId;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        // с клиента на сервер список типов не передаётся
        if !self.type_list.is_empty() {
            return invalid("list id carries a type list");
        }
        or_pack_listid(s, self);
        Ok(())
    }
}
