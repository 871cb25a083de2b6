use std::sync::Arc;

use anyhow::Result;

use XaslLog::codec::{make_align, or_packed_db_value_size, DbValue, Oid, OrReader};
use XaslLog::consts::ALIGN_UNIT;
use XaslLog::xasl::nodes::pred::comp;
use XaslLog::xasl::nodes::{
    link, AccessSpec, AccessTarget, AttrDescr, CacheAttrinfo, ClsSpec, FilterPred, OutptrList,
    RelOp, ReguValue, ReguVariable, ReguVariableList, TargetType, ValList, XaslNode,
};
use XaslLog::xasl::{
    map_filter_pred_to_stream, map_xasl_to_stream, sizeof_node, FlattenContext, XtsError,
};

// Смещения полей в упакованном XASL-узле.
const XASL_OUTPTR_LIST_AT: usize = 14 * 4;
const XASL_VAL_LIST_AT: usize = 20 * 4;

fn int_at(bytes: &[u8], pos: usize) -> i32 {
    OrReader::at(bytes, pos).get_int().unwrap()
}

fn shared_regu() -> Arc<ReguVariableList> {
    Arc::new(ReguVariableList::new(vec![
        ReguVariable::new(ReguValue::DbVal(DbValue::Int(1))),
        ReguVariable::new(ReguValue::PosValue(2)),
        ReguVariable::new(ReguValue::DbVal(DbValue::Varchar("abc".into()))),
    ]))
}

#[test]
fn single_db_value_fills_one_aligned_slot() -> Result<()> {
    let v = DbValue::BigInt(1 << 40);
    let mut cx = FlattenContext::new()?;
    let off = cx.save(Some(&v))?.expect("non-null save");
    assert_eq!(off.get(), ALIGN_UNIT);
    assert_eq!(
        cx.arena().free_offset() - cx.header_region(),
        make_align(or_packed_db_value_size(&v), ALIGN_UNIT)
    );
    Ok(())
}

#[test]
fn shared_regu_list_is_written_once() -> Result<()> {
    let regu = shared_regu();

    let mut next = XaslNode::default();
    next.outptr_list = link(OutptrList {
        valptrp: Some(regu.clone()),
    });
    let mut root = XaslNode::default();
    root.outptr_list = link(OutptrList {
        valptrp: Some(regu.clone()),
    });
    root.next = link(next);

    let s = map_xasl_to_stream(&root)?;
    let bytes = s.as_bytes();
    let root_off = s.root_offset();

    // next - последнее поле узла
    let root_size = sizeof_node(&root)?;
    let next_off = int_at(bytes, root_off + root_size - 4) as usize;
    assert!(next_off > root_off);

    let out_a = int_at(bytes, root_off + XASL_OUTPTR_LIST_AT) as usize;
    let out_b = int_at(bytes, next_off + XASL_OUTPTR_LIST_AT) as usize;
    assert_ne!(out_a, out_b, "outptr lists are distinct nodes");
    assert_eq!(int_at(bytes, out_a), 3);
    assert_eq!(int_at(bytes, out_b), 3);

    let list_a = int_at(bytes, out_a + 4);
    let list_b = int_at(bytes, out_b + 4);
    assert!(list_a > 0);
    assert_eq!(list_a, list_b, "shared regu list decodes to one offset");
    assert_eq!(int_at(bytes, list_a as usize), 3);

    // та же форма без разделения: список пишется дважды
    let mut next2 = XaslNode::default();
    next2.outptr_list = link(OutptrList {
        valptrp: Some(Arc::new((*regu).clone())),
    });
    let mut root2 = XaslNode::default();
    root2.outptr_list = link(OutptrList {
        valptrp: Some(regu),
    });
    root2.next = link(next2);
    let s2 = map_xasl_to_stream(&root2)?;
    assert!(s2.len() > s.len());
    assert!(s2.distinct_nodes() > s.distinct_nodes());
    Ok(())
}

#[test]
fn shared_value_in_val_list_has_one_offset() -> Result<()> {
    let v = Arc::new(DbValue::Double(0.5));
    let mut root = XaslNode::default();
    root.val_list = link(ValList {
        vals: vec![Some(v.clone()), None, Some(v)],
    });
    let s = map_xasl_to_stream(&root)?;
    let bytes = s.as_bytes();
    let vl = int_at(bytes, s.root_offset() + XASL_VAL_LIST_AT) as usize;
    assert_eq!(int_at(bytes, vl), 3);
    let a = int_at(bytes, vl + 4);
    assert_eq!(int_at(bytes, vl + 8), 0);
    let c = int_at(bytes, vl + 12);
    assert!(a > 0);
    assert_eq!(a, c);
    assert_eq!(a as usize % ALIGN_UNIT, 0);
    Ok(())
}

#[test]
fn access_spec_with_wrong_type_fails_whole_flatten() -> Result<()> {
    let mut spec = AccessSpec::new(AccessTarget::Class(ClsSpec::default()));
    spec.type_ = TargetType::List;
    let mut root = XaslNode::default();
    root.spec_list = vec![spec];

    match map_xasl_to_stream(&root) {
        Err(e @ XtsError::InvalidXaslNode(_)) => assert_ne!(e.code(), 0),
        other => panic!("expected InvalidXaslNode, got {:?}", other.map(|s| s.len())),
    }
    assert!(TargetType::from_code(99).is_err());
    Ok(())
}

#[test]
fn header_round_trips_through_parser() -> Result<()> {
    let mut root = XaslNode::default();
    root.dbval_cnt = 2;
    root.creator_oid = Oid::new(9, 3, 1);
    root.class_oid_list = vec![Oid::new(100, 0, 0), Oid::new(101, 0, 0), Oid::new(102, 0, 0)];
    root.repr_id_list = vec![4, 5, 6];
    root.query_alias = Some("q1".into());

    let s = map_xasl_to_stream(&root)?;
    let h = s.header()?;
    assert_eq!(h.dbval_cnt, 2);
    assert_eq!(h.creator_oid, root.creator_oid);
    assert_eq!(h.class_oid_list, root.class_oid_list);
    assert_eq!(h.repr_id_list, root.repr_id_list);
    assert_eq!(h.body_offset, s.root_offset());
    assert_eq!(h.body_offset + h.body_size as usize, s.len());
    assert_eq!(h.body(s.as_bytes()).len(), h.body_size as usize);
    Ok(())
}

#[test]
fn filter_pred_stream_has_no_plan_header() -> Result<()> {
    let f = FilterPred {
        pred: link(comp(
            ReguVariable::new(ReguValue::PosValue(0)),
            RelOp::Ge,
            ReguVariable::new(ReguValue::DbVal(DbValue::Int(10))),
        )),
        attr_ids: vec![1, 2],
        cache_attrinfo: link(CacheAttrinfo::default()),
    };
    let s = map_filter_pred_to_stream(&f)?;
    let h = s.header()?;
    assert_eq!(h.header_size, 0);
    assert!(h.class_oid_list.is_empty());
    assert_eq!(h.body_offset, ALIGN_UNIT);
    assert_eq!(s.root_offset(), ALIGN_UNIT);
    assert!(h.body_size as usize >= sizeof_node(&f)?);
    Ok(())
}

#[test]
fn scan_and_attr_share_one_attr_cache() -> Result<()> {
    let cache = Arc::new(CacheAttrinfo::default());
    let attr = |id| {
        ReguVariable::new(ReguValue::Attr(AttrDescr {
            id,
            type_: Default::default(),
            cache_attrinfo: Some(cache.clone()),
        }))
    };
    let pred_list = Arc::new(ReguVariableList::new(vec![attr(1), attr(2)]));
    let spec = AccessSpec::new(AccessTarget::Class(ClsSpec {
        cls_regu_list_pred: Some(pred_list.clone()),
        attrids_pred: vec![1, 2],
        cache_pred: Some(cache.clone()),
        cache_rest: link(CacheAttrinfo::default()),
        ..Default::default()
    }));

    let mut cx = FlattenContext::new()?;
    cx.save(Some(&spec))?;
    let used = cx.arena().free_offset();

    // повторные save - попадания в кэш, поток не растёт
    let cache_off = cx.save(Some(cache.as_ref()))?.expect("cache saved").get();
    let list_off = cx
        .save_regu_variable_list(Some(pred_list.as_ref()))?
        .expect("list saved")
        .get();
    assert_eq!(cx.arena().free_offset(), used);

    let bytes = cx.arena().as_bytes();
    assert_eq!(int_at(bytes, list_off), 2);
    for (i, item) in pred_list.items.iter().enumerate() {
        let item_off = int_at(bytes, list_off + 4 * (i + 1)) as usize;
        // ссылка на кэш - последнее поле атрибутной regu-переменной
        let attr_cache = int_at(bytes, item_off + sizeof_node(item)? - 4) as usize;
        assert_eq!(attr_cache, cache_off, "attr {i} points at the shared cache");
    }
    assert_eq!(int_at(bytes, cache_off), 0);
    Ok(())
}
