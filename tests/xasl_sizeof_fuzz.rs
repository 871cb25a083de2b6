use std::sync::Arc;

use anyhow::Result;
use oorandom::Rand64;

use XaslLog::codec::{DbType, DbValue, Oid};
use XaslLog::consts::ALIGN_UNIT;
use XaslLog::xasl::nodes::pred::comp;
use XaslLog::xasl::nodes::{
    link, AccessSpec, AccessTarget, Arith, ArithOp, AttrDescr, CacheAttrinfo, ClsSpec,
    OutptrList, PredExpr, RelOp, ReguDataType, ReguValue, ReguVariable, ReguVariableList, ValList,
    XaslNode,
};
use XaslLog::xasl::{sizeof_node, Flattener, FlattenContext, StreamArena};

const ARITH_OPS: [ArithOp; 6] = [
    ArithOp::Add,
    ArithOp::Mul,
    ArithOp::Concat,
    ArithOp::Coalesce,
    ArithOp::Case,
    ArithOp::If,
];

fn coin(rng: &mut Rand64) -> bool {
    rng.rand_u64() & 1 == 1
}

fn gen_value(rng: &mut Rand64) -> DbValue {
    match rng.rand_range(0..8) {
        0 => DbValue::Null,
        1 => DbValue::Int(rng.rand_i64() as i32),
        2 => DbValue::BigInt(rng.rand_i64()),
        3 => DbValue::Double(rng.rand_float()),
        4 => DbValue::Short(rng.rand_range(0..1000) as i16),
        5 => DbValue::Oid(Oid::new(rng.rand_range(0..1 << 20) as i32, 1, 0)),
        6 => DbValue::Date(rng.rand_range(0..100_000) as i32),
        _ => {
            let n = rng.rand_range(0..40) as usize;
            DbValue::Varchar((0..n).map(|i| (b'a' + (i % 26) as u8) as char).collect())
        }
    }
}

fn pick(rng: &mut Rand64, pool: &[Arc<DbValue>]) -> Arc<DbValue> {
    pool[rng.rand_range(0..pool.len() as u64) as usize].clone()
}

fn gen_regu(rng: &mut Rand64, depth: u32, pool: &[Arc<DbValue>]) -> ReguVariable {
    let choices = if depth == 0 { 4 } else { 7 };
    let value = match rng.rand_range(0..choices) {
        0 => ReguValue::DbVal(gen_value(rng)),
        1 => ReguValue::DbValPtr(Some(pick(rng, pool))),
        2 => ReguValue::PosValue(rng.rand_range(0..64) as i32),
        3 => ReguValue::Attr(AttrDescr {
            id: rng.rand_range(0..16) as i32,
            type_: DbType::Integer,
            cache_attrinfo: if coin(rng) {
                link(CacheAttrinfo::default())
            } else {
                None
            },
        }),
        4 => {
            let opcode = ARITH_OPS[rng.rand_range(0..ARITH_OPS.len() as u64) as usize];
            let pred = opcode
                .has_pred()
                .then(|| gen_pred(rng, depth - 1, pool))
                .map(Arc::new);
            ReguValue::Arith(link(Arith {
                value: Some(pick(rng, pool)),
                opcode,
                left: link(gen_regu(rng, depth - 1, pool)),
                right: coin(rng).then(|| Arc::new(gen_regu(rng, depth - 1, pool))),
                pred,
                ..Default::default()
            }))
        }
        5 => {
            let n = rng.rand_range(0..4) as usize;
            ReguValue::ReguVarList(link(ReguVariableList::new(
                (0..n).map(|_| gen_regu(rng, depth - 1, pool)).collect(),
            )))
        }
        _ => {
            let n = rng.rand_range(1..4) as usize;
            ReguValue::ReguValList(
                (0..n)
                    .map(|_| ReguVariable::new(ReguValue::DbVal(gen_value(rng))))
                    .collect(),
            )
        }
    };
    let mut r = ReguVariable::new(value);
    if coin(rng) {
        r.vfetch_to = Some(pick(rng, pool));
    }
    r
}

fn gen_pred(rng: &mut Rand64, depth: u32, pool: &[Arc<DbValue>]) -> PredExpr {
    let terms = rng.rand_range(1..5);
    let mut p = comp(gen_regu(rng, depth, pool), RelOp::Lt, gen_regu(rng, depth, pool));
    for _ in 1..terms {
        let t = comp(gen_regu(rng, depth, pool), RelOp::Eq, gen_regu(rng, depth, pool));
        p = if coin(rng) {
            PredExpr::and(t, p)
        } else {
            PredExpr::Not(link(PredExpr::and(p, t)))
        };
    }
    p
}

fn gen_plan(rng: &mut Rand64, depth: u32) -> XaslNode {
    let pool: Vec<Arc<DbValue>> = (0..6).map(|_| Arc::new(gen_value(rng))).collect();
    let shared = Arc::new(ReguVariableList::new(
        (0..rng.rand_range(1..5)).map(|_| gen_regu(rng, 2, &pool)).collect(),
    ));

    let mut x = XaslNode::default();
    x.outptr_list = link(OutptrList {
        valptrp: Some(shared.clone()),
    });
    x.val_list = link(ValList {
        vals: (0..rng.rand_range(0..5)).map(|_| Some(pick(rng, &pool))).collect(),
    });
    let mut spec = AccessSpec::new(AccessTarget::Class(ClsSpec {
        cls_oid: Oid::new(rng.rand_range(1..1000) as i32, 0, 0),
        cls_regu_list_pred: Some(shared.clone()),
        cls_regu_list_rest: coin(rng).then(|| shared.clone()),
        attrids_pred: (0..rng.rand_range(0..4) as i32).collect(),
        cache_pred: if coin(rng) {
            link(CacheAttrinfo::default())
        } else {
            None
        },
        ..Default::default()
    }));
    spec.where_pred = link(gen_pred(rng, 2, &pool));
    x.spec_list = vec![spec];
    x.if_pred = coin(rng).then(|| Arc::new(gen_pred(rng, 1, &pool)));
    if depth > 0 {
        let sub = Arc::new(gen_plan(rng, depth - 1));
        x.aptr_list = Some(sub.clone());
        if coin(rng) {
            x.dptr_list = Some(sub);
        }
    }
    x.cardinality = rng.rand_float() * 1000.0;
    x
}

#[test]
fn random_regu_variables_size_equals_packed_bytes() -> Result<()> {
    let mut rng = Rand64::new(0x5eed_0001);
    let pool: Vec<Arc<DbValue>> = (0..8).map(|_| Arc::new(gen_value(&mut rng))).collect();
    for _ in 0..500 {
        let r = gen_regu(&mut rng, 3, &pool);
        let size = sizeof_node(&r)?;
        // save() сверяет посчитанный размер с упакованным и падает с SizeMismatch
        let mut cx = FlattenContext::new()?;
        let off = cx.save(Some(&r))?.expect("non-null");
        assert_eq!(off.get(), cx.header_region());
        assert!(cx.arena().free_offset() >= off.get() + size);
        if matches!(r.type_, ReguDataType::DbVal | ReguDataType::PosValue) && r.vfetch_to.is_none() {
            // листовой узел: ровно один выровненный резерв
            assert_eq!(
                cx.arena().free_offset() - off.get(),
                XaslLog::codec::make_align(size, ALIGN_UNIT)
            );
        }
    }
    Ok(())
}

#[test]
fn random_plans_flatten_deterministically() -> Result<()> {
    let mut rng = Rand64::new(0x5eed_0002);
    let flattener = Flattener::with_initial_capacity(0);
    for _ in 0..60 {
        let plan = gen_plan(&mut rng, 2);
        let a = flattener.map_xasl(&plan)?;
        let b = flattener.map_xasl(&plan)?;
        assert_eq!(a.as_bytes(), b.as_bytes());

        let h = a.header()?;
        assert_eq!(h.body_offset, a.root_offset());
        assert_eq!(h.body_offset + h.body_size as usize, a.len());
        assert_eq!(a.len() % ALIGN_UNIT, 0);
    }
    Ok(())
}

#[test]
fn reserve_is_always_aligned() -> Result<()> {
    let mut rng = Rand64::new(0x5eed_0003);
    let mut arena = StreamArena::new();
    for size in [0usize, 1, 7, 8, 9] {
        assert_eq!(arena.reserve(size)? % ALIGN_UNIT, 0);
    }
    for _ in 0..2000 {
        let size = rng.rand_range(0..300) as usize;
        let off = arena.reserve(size)?;
        assert_eq!(off % ALIGN_UNIT, 0);
        assert_eq!(arena.free_offset() % ALIGN_UNIT, 0);
    }
    assert!(arena.allocated() >= arena.free_offset());
    Ok(())
}
