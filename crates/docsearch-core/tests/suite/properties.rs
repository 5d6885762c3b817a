use docsearch_core::{
    normalize_query, Entry, ShardBuilder, ShardId, ShardLayout, ShardRegistry, Target, TargetKind,
};
use proptest::prelude::*;

fn target() -> Target {
    Target {
        scope: None,
        locator: "../index.html".into(),
        kind: TargetKind::Member,
        external: false,
    }
}

fn layout_strategy() -> impl Strategy<Value = ShardLayout> {
    let pool: Vec<char> = ('!'..='~').filter(|c| !c.is_ascii_uppercase()).collect();
    proptest::collection::btree_set(prop::sample::select(pool), 1..20)
        .prop_map(|set| ShardLayout::new(set).expect("sorted unique lowercase buckets"))
}

proptest! {
    #[test]
    fn every_char_routes_to_exactly_one_existing_shard(c in any::<char>()) {
        let registry = ShardRegistry::default();
        let id = registry.shard_id_for(c);
        prop_assert!((id.index() as usize) < registry.shard_count());
        prop_assert_eq!(registry.shard_id_for(c), id);
    }

    #[test]
    fn routing_is_total_for_arbitrary_layouts(layout in layout_strategy(), c in any::<char>()) {
        let registry = ShardRegistry::new(layout);
        let id = registry.shard_id_for(c);
        prop_assert!(registry.layout().bucket(id).is_some());
    }

    #[test]
    fn bucket_characters_route_to_themselves(layout in layout_strategy()) {
        let registry = ShardRegistry::new(layout.clone());
        for (idx, &bucket) in layout.buckets().iter().enumerate() {
            prop_assert_eq!(registry.shard_id_for(bucket), ShardId::new(idx as u32));
        }
    }

    #[test]
    fn key_routing_depends_only_on_first_char(first in "[a-z0-9_~]", a in "[a-z]{0,8}", b in "[a-z]{0,8}") {
        let registry = ShardRegistry::default();
        let ka = format!("{first}{a}");
        let kb = format!("{first}{b}");
        prop_assert_eq!(registry.shard_for_key(&ka), registry.shard_for_key(&kb));
    }

    #[test]
    fn query_normalisation_is_idempotent(raw in "\\PC{0,24}") {
        let once = normalize_query(&raw);
        prop_assert_eq!(normalize_query(&once), once.clone());
        prop_assert!(!once.starts_with(' ') && !once.ends_with(' '));
        prop_assert!(!once.contains("  "));
    }

    #[test]
    fn built_shards_are_strictly_sorted(keys in proptest::collection::vec("[a-z]{1,6}", 0..40)) {
        let mut builder = ShardBuilder::new(ShardId::new(0));
        for key in &keys {
            builder.push(Entry::new(key.clone(), key.clone(), vec![target()]).unwrap());
        }
        let shard = builder.finish();
        for pair in shard.entries().windows(2) {
            prop_assert!(pair[0].key() < pair[1].key());
        }
        let unique: std::collections::BTreeSet<_> = keys.iter().collect();
        prop_assert_eq!(shard.len(), unique.len());
    }
}
