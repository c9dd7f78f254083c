//! Property-based tests for the lexical layer and the dynamic round trip.
//!
//! Generated inputs stay inside what each context can carry: spaces and
//! aliases use printable ASCII plus whitespace, values take any text.

use kat::escape::{escape, is_legal, unescape, Context};
use kat::{
    decode_data, encode, to_string, to_string_pretty, BufferPool, Chain, Data, Flow, Options,
    PoolConfig,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn legal_bytes(ctx: Context) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..32)
        .prop_map(move |bytes| bytes.into_iter().filter(|&b| is_legal(ctx, b)).collect())
}

proptest! {
    #[test]
    fn prop_value_escape_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let escaped = escape(Context::Value, &bytes);
        prop_assert_eq!(unescape(&escaped).unwrap(), bytes);
    }

    #[test]
    fn prop_alias_escape_roundtrip(bytes in legal_bytes(Context::Alias)) {
        let escaped = escape(Context::Alias, &bytes);
        prop_assert!(escaped.iter().all(|&b| b > 0x20 && b < 0x80));
        prop_assert_eq!(unescape(&escaped).unwrap(), bytes);
    }

    #[test]
    fn prop_space_escape_roundtrip(bytes in legal_bytes(Context::Space)) {
        let escaped = escape(Context::Space, &bytes);
        prop_assert!(escaped.iter().all(|&b| b > 0x20 && b < 0x80));
        prop_assert_eq!(unescape(&escaped).unwrap(), bytes);
    }

    #[test]
    fn prop_space_survives_the_writer(space in "[A-Za-z][A-Za-z0-9 ()^._-]{0,15}") {
        let mut flow = Flow::new(Options::new());
        flow.add_space(&space).unwrap();
        flow.open_scalar().unwrap();
        flow.close_scalar().unwrap();
        let text = flow.finish().unwrap();
        let head = &text.as_bytes()[..text.len() - 2];
        prop_assert_eq!(unescape(head).unwrap(), space.as_bytes());
    }

    #[test]
    fn prop_escaped_value_has_no_bare_delimiter(text in "\\PC*") {
        let escaped = escape(Context::Value, text.as_bytes());
        let mut iter = escaped.iter();
        while let Some(&b) = iter.next() {
            if b == b'^' {
                iter.next();
            } else {
                prop_assert!(b != b'(' && b != b')');
            }
        }
    }

    #[test]
    fn prop_integer_parse_matches_display(n in any::<i64>()) {
        let chain = Chain::from(n.to_string().as_str());
        prop_assert_eq!(chain.to_i64(), Some(n));
        let padded = Chain::from(format!("  {n}\n").as_str());
        prop_assert_eq!(padded.to_i64(), Some(n));
    }

    #[test]
    fn prop_pool_honours_limit(size in 0usize..4096) {
        let config = PoolConfig { size: 4, limit: 8, scale: 256, depth: 2 };
        let pool = BufferPool::new(config.clone()).unwrap();
        match pool.acquire(size) {
            Ok(buf) => {
                prop_assert!(size < config.max_bytes());
                prop_assert!(buf.capacity() >= size);
                prop_assert!(pool.retained() <= config.size * config.depth);
            }
            Err(err) => {
                prop_assert!(size >= config.max_bytes());
                prop_assert!(err.is_resource_limit());
            }
        }
    }

    #[test]
    fn prop_text_map_roundtrip(
        map in prop::collection::btree_map("[a-zA-Z0-9 _()^-]{0,12}", "\\PC*", 0..8)
    ) {
        let text = to_string(&map).unwrap();
        let data = decode_data(&text).unwrap();
        let decoded = data.as_map().unwrap();
        prop_assert_eq!(decoded.len(), map.len());
        for (key, value) in &map {
            prop_assert_eq!(decoded.get(key).and_then(Data::as_str), Some(value.as_str()));
        }
    }

    #[test]
    fn prop_int_list_roundtrip(items in prop::collection::vec(any::<i64>(), 0..16)) {
        let data = Data::List(items.into_iter().map(Data::Int).collect());
        let text = encode(&data).unwrap();
        prop_assert_eq!(decode_data(&text).unwrap(), data);
    }

    #[test]
    fn prop_pretty_decodes_like_compact(
        map in prop::collection::btree_map("[a-z]{1,8}", prop::collection::vec(any::<i32>(), 0..4), 0..6)
    ) {
        let nested: BTreeMap<String, BTreeMap<String, Vec<i32>>> =
            BTreeMap::from([("inner".to_string(), map)]);
        let compact = decode_data(&to_string(&nested).unwrap()).unwrap();
        let pretty = decode_data(&to_string_pretty(&nested).unwrap()).unwrap();
        prop_assert_eq!(compact, pretty);
    }
}
