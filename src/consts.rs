//! Общие константы форматов (XASL stream, codec, log pages, prior list).

// -------- XASL stream --------
/// Единица выравнивания резервирования в арене (размер самого крупного скаляра).
pub const ALIGN_UNIT: usize = 8;
/// Минимальный шаг роста арены (OFFSETS_PER_BLOCK * sizeof(int)).
pub const OFFSETS_PER_BLOCK: usize = 4096;
pub const STREAM_EXPANSION_UNIT: usize = OFFSETS_PER_BLOCK * 4;

// Visited-pointer cache geometry.
pub const MAX_PTR_BLOCKS: usize = 256;
pub const START_PTR_PER_BLOCK: usize = 15;
/// Хэш адреса: (addr / WORD_BITS) % MAX_PTR_BLOCKS.
pub const WORD_BITS: usize = usize::BITS as usize;

/// Строка, которая пакуется вместо отсутствующего query alias.
pub const EMPTY_QUERY_ALIAS: &str = "*** EMPTY QUERY ***";

// -------- Codec (or_pack_*) sizes --------
pub const OR_INT_SIZE: usize = 4;
pub const OR_BIGINT_SIZE: usize = 8;
pub const OR_DOUBLE_SIZE: usize = 8;
pub const OR_OID_SIZE: usize = 8; // [pageid i32][slotid i16][volid i16]
pub const OR_VPID_SIZE: usize = 8; // [pageid i32][volid i16][pad2]
pub const OR_VFID_SIZE: usize = 8; // [fileid i32][volid i16][pad2]
pub const OR_HFID_SIZE: usize = 12; // [vfid 8][hpgid i32]
pub const OR_BTID_SIZE: usize = 12; // [vfid 8][root_pageid i32]
pub const OR_EHID_SIZE: usize = 12; // [vfid 8][pageid i32]
pub const OR_LSA_SIZE: usize = 8; // [pageid:48][offset:16]
/// [query_id i64][tuple_cnt i64][page_cnt i32][first_vpid 8][last_vpid 8][last_offset i32]
/// [lasttpl_len i32][temp_vfid 8][type_cnt i32] = 56
pub const OR_LIST_ID_SIZE: usize = 56;

// -------- Log pages --------
/// Заголовок лог-страницы: [logical_pageid i64][offset i16][flags i16][checksum u32].
pub const LOG_HDRPAGE_SIZE: usize = 16;
pub const LOG_HDRPAGE_FLAG_ENCRYPTED: u16 = 0x1;
pub const LOG_DEFAULT_PAGE_SIZE: usize = 16 * 1024;
/// Допустимые размеры страницы: смещение в LSA - i16.
pub const LOG_PAGE_SIZE_MIN: usize = 512;
pub const LOG_PAGE_SIZE_MAX: usize = 32 * 1024;
/// Выравнивание внутри лог-области.
pub const LOG_ALIGN: usize = 8;
/// [prev_tranlsa 8][back_lsa 8][forw_lsa 8][trid i32][type i32]
pub const LOG_RECORD_HEADER_SIZE: usize = 32;
/// Учётный размер узла prior-списка (bookkeeping, не физический).
pub const PRIOR_NODE_OVERHEAD: usize = 96;

/// Признак сжатой длины (MAKE_ZIP_LEN / ZIP_CHECK / GET_ZIP_LEN).
pub const ZIP_LEN_FLAG: u32 = 0x8000_0000;
pub const LOG_ZIP_MIN_SIZE_DEFAULT: usize = 255;

// -------- Log volume --------
pub const LOG_VOLUME_FILE: &str = "log_active";
pub const LOG_LOCK_FILE: &str = "LOCK";
pub const LOG_VOLUME_MAGIC: &[u8; 8] = b"XLLOG001";
/// [magic8][page_size u32][npages u32][first_pageid i64][end_lsa 8]
pub const LOG_VOLUME_HDR_SIZE: usize = 32;

/// Системная транзакция (recovery/vacuum workers).
pub const LOG_SYSTEM_TRANID: i32 = 0;
