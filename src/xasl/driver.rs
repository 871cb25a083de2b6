//! Верхний уровень flatten: заголовок потока + корень.
//!
//! Формат потока:
//!   [int header_size][int dbval_cnt][OID creator_oid][int n]
//!   [OID class_oid_list[n]][int repr_id_list[n]][int body_size][pad to 8][body...]
//!
//! Для filter/func pred header_size = 0 и между ним и body_size ничего нет.
//! Смещения внутри тела считаются от начала потока; корень лежит сразу за
//! областью заголовка.

use log::{debug, warn};

use super::context::FlattenContext;
use super::error::{XtsError, XtsResult};
use super::nodes::{FilterPred, FuncPred, XaslNode};
use super::sink::Node;
use crate::codec::{make_align, or_pack_int, or_pack_oid, CodecError, Oid, OrReader};
use crate::config::XaslLogConfig;
use crate::consts::{ALIGN_UNIT, OR_INT_SIZE, OR_OID_SIZE};
use crate::metrics::record_xasl_flatten;

/// Готовый поток. Владеет байтами; освобождается вместе со значением.
#[derive(Debug, Clone)]
pub struct XaslStream {
    bytes: Vec<u8>,
    root_offset: usize,
    nodes: usize,
}

impl XaslStream {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Смещение корня от начала потока (= размер области заголовка).
    pub fn root_offset(&self) -> usize {
        self.root_offset
    }

    /// Сколько различных узлов попало в visited-кэш.
    pub fn distinct_nodes(&self) -> usize {
        self.nodes
    }

    pub fn header(&self) -> XtsResult<XaslStreamHeader> {
        XaslStreamHeader::parse(&self.bytes)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Разобранный заголовок потока.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XaslStreamHeader {
    pub header_size: i32,
    pub dbval_cnt: i32,
    pub creator_oid: Oid,
    pub class_oid_list: Vec<Oid>,
    pub repr_id_list: Vec<i32>,
    pub body_size: i32,
    /// Начало тела (выровненный конец заголовка).
    pub body_offset: usize,
}

impl XaslStreamHeader {
    pub fn parse(bytes: &[u8]) -> XtsResult<Self> {
        let mut r = OrReader::new(bytes);
        let header_size = r.get_int()?;
        let mut h = XaslStreamHeader {
            header_size,
            ..Default::default()
        };
        if header_size != 0 {
            h.dbval_cnt = r.get_int()?;
            h.creator_oid = r.get_oid()?;
            let n = r.get_int()?;
            if n < 0 || header_size as usize != stream_header_size(n as usize) {
                return Err(CodecError::BadTag {
                    what: "stream header size",
                    tag: header_size,
                }
                .into());
            }
            for _ in 0..n {
                h.class_oid_list.push(r.get_oid()?);
            }
            for _ in 0..n {
                h.repr_id_list.push(r.get_int()?);
            }
        }
        h.body_size = r.get_int()?;
        h.body_offset = make_align(r.position(), ALIGN_UNIT);
        if h.body_size < 0 || bytes.len() < h.body_offset + h.body_size as usize {
            return Err(CodecError::Truncated {
                need: h.body_size.max(0) as usize,
                at: h.body_offset,
                len: bytes.len(),
            }
            .into());
        }
        Ok(h)
    }

    pub fn body<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        &bytes[self.body_offset..self.body_offset + self.body_size as usize]
    }
}

fn stream_header_size(n: usize) -> usize {
    OR_INT_SIZE + OR_OID_SIZE + OR_INT_SIZE + n * (OR_OID_SIZE + OR_INT_SIZE)
}

/// Поля заголовка, известные до обхода.
struct HeaderFields<'a> {
    dbval_cnt: i32,
    creator_oid: Oid,
    class_oid_list: &'a [Oid],
    repr_id_list: &'a [i32],
}

/// Flatten-драйвер. Каждый вызов создаёт свой `FlattenContext`, поэтому
/// один экземпляр можно звать из нескольких потоков.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flattener {
    initial_capacity: usize,
}

impl Flattener {
    pub fn new(cfg: &XaslLogConfig) -> Self {
        Self {
            initial_capacity: cfg.xasl_stream_initial,
        }
    }

    pub fn with_initial_capacity(initial_capacity: usize) -> Self {
        Self { initial_capacity }
    }

    pub fn map_xasl(&self, root: &XaslNode) -> XtsResult<XaslStream> {
        if root.class_oid_list.len() != root.repr_id_list.len() {
            return Err(XtsError::InvalidXaslNode(
                "class oid list and repr id list differ in length",
            ));
        }
        let fields = HeaderFields {
            dbval_cnt: root.dbval_cnt,
            creator_oid: root.creator_oid,
            class_oid_list: &root.class_oid_list,
            repr_id_list: &root.repr_id_list,
        };
        self.run("xasl", Some(&fields), root)
    }

    pub fn map_filter_pred(&self, pred: &FilterPred) -> XtsResult<XaslStream> {
        self.run("filter pred", None, pred)
    }

    pub fn map_func_pred(&self, func: &FuncPred) -> XtsResult<XaslStream> {
        self.run("func pred", None, func)
    }

    fn run<N: Node>(
        &self,
        what: &str,
        fields: Option<&HeaderFields<'_>>,
        root: &N,
    ) -> XtsResult<XaslStream> {
        let res = self.flatten(fields, root);
        match &res {
            Ok(s) => {
                record_xasl_flatten(true, s.len());
                debug!(
                    "{} flattened: {} bytes, {} distinct nodes",
                    what,
                    s.len(),
                    s.distinct_nodes()
                );
            }
            Err(e) => {
                record_xasl_flatten(false, 0);
                warn!("{} flatten failed: {} (code {})", what, e, e.code());
            }
        }
        res
    }

    fn flatten<N: Node>(
        &self,
        fields: Option<&HeaderFields<'_>>,
        root: &N,
    ) -> XtsResult<XaslStream> {
        let header_size = fields.map_or(0, |f| stream_header_size(f.class_oid_list.len()));
        let region = make_align(OR_INT_SIZE + header_size + OR_INT_SIZE, ALIGN_UNIT);

        let mut cx = FlattenContext::with_header(self.initial_capacity, region)?;
        let root_offset = cx.save(Some(root))?.map(|o| o.get()).unwrap_or(0);
        debug_assert_eq!(root_offset, cx.header_region());

        let body_size = cx.arena().free_offset() - cx.header_region();
        let body_size = i32::try_from(body_size).map_err(|_| XtsError::StreamTooLarge(body_size))?;

        let mut hdr = Vec::with_capacity(region);
        or_pack_int(&mut hdr, header_size as i32);
        if let Some(f) = fields {
            or_pack_int(&mut hdr, f.dbval_cnt);
            or_pack_oid(&mut hdr, &f.creator_oid);
            or_pack_int(&mut hdr, f.class_oid_list.len() as i32);
            for oid in f.class_oid_list {
                or_pack_oid(&mut hdr, oid);
            }
            for &repr in f.repr_id_list {
                or_pack_int(&mut hdr, repr);
            }
        }
        or_pack_int(&mut hdr, body_size);
        debug_assert!(hdr.len() <= region);

        let nodes = cx.visited_len();
        let mut arena = cx.into_arena();
        arena.write_at(0, &hdr);
        Ok(XaslStream {
            bytes: arena.into_bytes(),
            root_offset,
            nodes,
        })
    }
}

/// Flatten плана запроса с настройками по умолчанию.
pub fn map_xasl_to_stream(root: &XaslNode) -> XtsResult<XaslStream> {
    Flattener::default().map_xasl(root)
}

pub fn map_filter_pred_to_stream(pred: &FilterPred) -> XtsResult<XaslStream> {
    Flattener::default().map_filter_pred(pred)
}

pub fn map_func_pred_to_stream(func: &FuncPred) -> XtsResult<XaslStream> {
    Flattener::default().map_func_pred(func)
}
