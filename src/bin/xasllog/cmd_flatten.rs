use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use XaslLog::codec::{Btid, DbType, DbValue, Domain, Oid, Vfid};
use XaslLog::metrics;
use XaslLog::xasl::nodes::{
    link, AccessMethod, AccessSpec, AccessTarget, AttrDescr, BuildListProc, CacheAttrinfo,
    ClsSpec, EvalTerm, IndxId, IndxInfo, OutptrList, PredExpr, ProcNode, RelOp, ReguValue,
    ReguVariable, ReguVariableList, ValList, XaslNode,
};
use XaslLog::xasl::Flattener;
use XaslLog::XaslLogConfig;

#[derive(Serialize)]
struct FlattenReport {
    stream_bytes: usize,
    header_size: i32,
    dbval_cnt: i32,
    creator_oid: String,
    class_oids: Vec<String>,
    repr_ids: Vec<i32>,
    body_offset: usize,
    body_size: i32,
    root_offset: usize,
    distinct_nodes: usize,
    nodes_saved: u64,
    dedup_hits: u64,
    dedup_ratio: f64,
}

fn oid_str(o: &Oid) -> String {
    format!("{}|{}|{}", o.pageid, o.slotid, o.volid)
}

/// Пример плана: BUILDLIST над классом; val list, outptr list и class spec
/// делят одни и те же DB-значения и regu-список, подзапрос висит на двух ссылках.
fn sample_plan() -> XaslNode {
    let vals: Vec<Arc<DbValue>> = vec![
        Arc::new(DbValue::Int(7)),
        Arc::new(DbValue::Varchar("arrow".into())),
        Arc::new(DbValue::Double(2.5)),
    ];
    let regu = Arc::new(ReguVariableList::new(
        vals.iter()
            .map(|v| {
                let r = ReguVariable::new(ReguValue::DbValPtr(Some(v.clone())));
                match v.as_ref() {
                    DbValue::Varchar(_) => r.with_domain(Domain::varchar(64, 0)),
                    _ => r,
                }
            })
            .collect(),
    ));

    // предикат скана и атрибут в WHERE читают один кэш
    let pred_cache = Arc::new(CacheAttrinfo::default());
    let attr = link(ReguVariable::new(ReguValue::Attr(AttrDescr {
        id: 1,
        type_: DbType::Integer,
        cache_attrinfo: Some(pred_cache.clone()),
    })));
    let konst = link(ReguVariable::new(ReguValue::DbValPtr(Some(vals[0].clone()))));
    let where_pred = PredExpr::and(
        PredExpr::EvalTerm(EvalTerm::Comp {
            lhs: attr.clone(),
            rhs: konst.clone(),
            rel_op: RelOp::Gt,
            type_: DbType::Integer,
        }),
        PredExpr::Not(link(PredExpr::EvalTerm(EvalTerm::Comp {
            lhs: attr,
            rhs: konst,
            rel_op: RelOp::Null,
            type_: DbType::Integer,
        }))),
    );

    let class_oid = Oid::new(100, 0, 0);
    let mut spec = AccessSpec::new(AccessTarget::Class(ClsSpec {
        cls_oid: class_oid,
        cls_regu_list_pred: Some(regu.clone()),
        cls_regu_list_rest: Some(regu.clone()),
        attrids_pred: vec![1],
        cache_pred: Some(pred_cache),
        attrids_rest: vec![1, 2, 3],
        cache_rest: link(CacheAttrinfo::default()),
        ..Default::default()
    }));
    spec.where_pred = link(where_pred);
    let btid = Btid {
        vfid: Vfid { fileid: 31, volid: 0 },
        root_pageid: 2,
    };
    let spec = spec.with_index(
        AccessMethod::Index,
        link(IndxInfo {
            indx_id: IndxId::Btid(btid),
            ..Default::default()
        }),
    );

    let mut sub = XaslNode::default();
    sub.query_alias = Some("sub".into());
    sub.val_list = link(ValList {
        vals: vec![Some(vals[1].clone())],
    });
    let sub = Arc::new(sub);
    // значение лимита берётся из подзапроса
    let sub_ref = ReguVariable::new(ReguValue::DbValPtr(Some(vals[2].clone())))
        .with_xasl(Some(sub.clone()));

    let mut root = XaslNode::new(ProcNode::BuildList(Box::new(BuildListProc {
        g_val_list: link(ValList {
            vals: vals.iter().cloned().map(Some).collect(),
        }),
        ..Default::default()
    })));
    root.outptr_list = link(OutptrList {
        valptrp: Some(regu),
    });
    root.limit_row_count = link(sub_ref);
    root.val_list = link(ValList {
        vals: vals.iter().cloned().map(Some).collect(),
    });
    root.spec_list = vec![spec];
    root.aptr_list = Some(sub.clone());
    root.dptr_list = Some(sub);
    root.query_alias = Some("flatten-demo".into());
    root.dbval_cnt = vals.len() as i32;
    root.creator_oid = Oid::new(5, 1, 0);
    root.class_oid_list = vec![class_oid];
    root.repr_id_list = vec![1];
    root
}

pub fn exec(json: bool) -> Result<()> {
    let cfg = XaslLogConfig::from_env();
    let plan = sample_plan();

    metrics::reset();
    let stream = Flattener::new(&cfg)
        .map_xasl(&plan)
        .context("flatten sample plan")?;
    let hdr = stream.header().context("parse stream header")?;
    let m = metrics::snapshot();

    let report = FlattenReport {
        stream_bytes: stream.len(),
        header_size: hdr.header_size,
        dbval_cnt: hdr.dbval_cnt,
        creator_oid: oid_str(&hdr.creator_oid),
        class_oids: hdr.class_oid_list.iter().map(oid_str).collect(),
        repr_ids: hdr.repr_id_list.clone(),
        body_offset: hdr.body_offset,
        body_size: hdr.body_size,
        root_offset: stream.root_offset(),
        distinct_nodes: stream.distinct_nodes(),
        nodes_saved: m.xasl_nodes_saved,
        dedup_hits: m.xasl_dedup_hits,
        dedup_ratio: m.dedup_ratio(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("XASL stream:");
    println!("  bytes          = {}", report.stream_bytes);
    println!("  header_size    = {}", report.header_size);
    println!("  dbval_cnt      = {}", report.dbval_cnt);
    println!("  creator_oid    = {}", report.creator_oid);
    println!("  class_oids     = {:?}", report.class_oids);
    println!("  repr_ids       = {:?}", report.repr_ids);
    println!("  body           = {} bytes at {}", report.body_size, report.body_offset);
    println!("  root_offset    = {}", report.root_offset);
    println!("Dedup:");
    println!("  distinct_nodes = {}", report.distinct_nodes);
    println!("  nodes_saved    = {}", report.nodes_saved);
    println!("  dedup_hits     = {}", report.dedup_hits);
    println!("  dedup_ratio    = {:.2}", report.dedup_ratio);
    Ok(())
}
