//! Предикаты: дерево AND/OR, eval terms, NOT; filter pred и func pred.

use super::regu::ReguVariable;
use super::{invalid, CacheAttrinfo, Link};
use crate::codec::DbType;
use crate::xasl::error::XtsResult;
use crate::xasl::sink::{Node, Sink};
use crate::xasl::visited::NodeKind;

const T_PRED: i32 = 1;
const T_EVAL_TERM: i32 = 2;
const T_NOT_TERM: i32 = 3;

const T_COMP_EVAL_TERM: i32 = 1;
const T_ALSM_EVAL_TERM: i32 = 2;
const T_LIKE_EVAL_TERM: i32 = 3;
const T_RLIKE_EVAL_TERM: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum BoolOp {
    #[default]
    And = 1,
    Or = 2,
    Xor = 3,
    Is = 4,
    IsNot = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum RelOp {
    #[default]
    Eq = 1,
    Ne = 2,
    Gt = 3,
    Ge = 4,
    Lt = 5,
    Le = 6,
    Null = 7,
    Exists = 8,
    Like = 9,
    NullsafeEq = 10,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredExpr {
    /// Бинарный узел; правые цепочки одинаковых узлов пакуются в один поток.
    Pred {
        lhs: Link<PredExpr>,
        bool_op: BoolOp,
        rhs: Link<PredExpr>,
    },
    EvalTerm(EvalTerm),
    Not(Link<PredExpr>),
}

impl PredExpr {
    pub fn and(lhs: PredExpr, rhs: PredExpr) -> Self {
        PredExpr::Pred {
            lhs: super::link(lhs),
            bool_op: BoolOp::And,
            rhs: super::link(rhs),
        }
    }

    fn type_code(&self) -> i32 {
        match self {
            PredExpr::Pred { .. } => T_PRED,
            PredExpr::EvalTerm(_) => T_EVAL_TERM,
            PredExpr::Not(_) => T_NOT_TERM,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalTerm {
    Comp {
        lhs: Link<ReguVariable>,
        rhs: Link<ReguVariable>,
        rel_op: RelOp,
        type_: DbType,
    },
    Alsm {
        elem: Link<ReguVariable>,
        elemset: Link<ReguVariable>,
        eq_flag: i32,
        rel_op: RelOp,
        item_type: DbType,
    },
    Like {
        src: Link<ReguVariable>,
        pattern: Link<ReguVariable>,
        esc_char: Link<ReguVariable>,
    },
    Rlike {
        src: Link<ReguVariable>,
        pattern: Link<ReguVariable>,
        case_sensitive: Link<ReguVariable>,
    },
}

impl EvalTerm {
    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        match self {
            EvalTerm::Comp {
                lhs,
                rhs,
                rel_op,
                type_,
            } => {
                s.int(T_COMP_EVAL_TERM);
                s.link(lhs)?;
                s.link(rhs)?;
                s.int(*rel_op as i32);
                s.int(*type_ as i32);
            }
            EvalTerm::Alsm {
                elem,
                elemset,
                eq_flag,
                rel_op,
                item_type,
            } => {
                s.int(T_ALSM_EVAL_TERM);
                s.link(elem)?;
                s.link(elemset)?;
                s.int(*eq_flag);
                s.int(*rel_op as i32);
                s.int(*item_type as i32);
            }
            EvalTerm::Like {
                src,
                pattern,
                esc_char,
            } => {
                s.int(T_LIKE_EVAL_TERM);
                s.link(src)?;
                s.link(pattern)?;
                s.link(esc_char)?;
            }
            EvalTerm::Rlike {
                src,
                pattern,
                case_sensitive,
            } => {
                s.int(T_RLIKE_EVAL_TERM);
                s.link(src)?;
                s.link(pattern)?;
                s.link(case_sensitive)?;
            }
        }
        Ok(())
    }
}

impl Node for PredExpr {
    const KIND: NodeKind = NodeKind::PredExpr;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.int(self.type_code());
        match self {
            PredExpr::Pred { .. } => {
                // правая цепочка PRED-узлов пакуется в этот же узел
                let mut cur = self;
                while let PredExpr::Pred { lhs, bool_op, rhs } = cur {
                    s.link(lhs)?;
                    s.int(*bool_op as i32);
                    let Some(r) = rhs.as_deref() else {
                        return invalid("pred node without rhs");
                    };
                    s.int(r.type_code());
                    if matches!(r, PredExpr::Pred { .. }) {
                        cur = r;
                        continue;
                    }
                    return s.node(Some(r));
                }
                Ok(())
            }
            PredExpr::EvalTerm(et) => et.process(s),
            PredExpr::Not(p) => s.link(p),
        }
    }
}

/// Предикат фильтрованного индекса.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterPred {
    pub pred: Link<PredExpr>,
    pub attr_ids: Vec<i32>,
    pub cache_attrinfo: Link<CacheAttrinfo>,
}

impl Node for FilterPred {
    const KIND: NodeKind = NodeKind::FilterPred;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.link(&self.pred)?;
        s.int(self.attr_ids.len() as i32);
        s.int_array(&self.attr_ids)?;
        s.cache_attrinfo(&self.cache_attrinfo)
    }
}

/// Функция функционального индекса.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FuncPred {
    pub func_regu: Link<ReguVariable>,
    pub cache_attrinfo: Link<CacheAttrinfo>,
}

impl Node for FuncPred {
    const KIND: NodeKind = NodeKind::FuncPred;

    fn process<'t, S: Sink<'t>>(&'t self, s: &mut S) -> XtsResult<()> {
        s.link(&self.func_regu)?;
        s.cache_attrinfo(&self.cache_attrinfo)
    }
}

/// COMP eval term `lhs <rel_op> rhs` над целыми.
pub fn comp(lhs: ReguVariable, rel_op: RelOp, rhs: ReguVariable) -> PredExpr {
    PredExpr::EvalTerm(EvalTerm::Comp {
        lhs: super::link(lhs),
        rhs: super::link(rhs),
        rel_op,
        type_: DbType::Integer,
    })
}
