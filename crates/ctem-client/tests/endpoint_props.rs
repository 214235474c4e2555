//! Property tests for the endpoint builder

use ctem_client::endpoint::{self, build};
use ctem_model::{
    AssetGroupFilters, AssetGroups, Criticality, Environment, NumericRange, QueryParams,
    ResourceFilter,
};
use proptest::prelude::*;

fn environment() -> impl Strategy<Value = Environment> {
    prop_oneof![
        Just(Environment::Production),
        Just(Environment::Staging),
        Just(Environment::Development),
        Just(Environment::Testing),
    ]
}

fn criticality() -> impl Strategy<Value = Criticality> {
    prop_oneof![
        Just(Criticality::Critical),
        Just(Criticality::High),
        Just(Criticality::Medium),
        Just(Criticality::Low),
    ]
}

fn filters() -> impl Strategy<Value = AssetGroupFilters> {
    (
        proptest::option::of("[a-z ]{0,12}"),
        proptest::collection::vec(environment(), 0..3),
        proptest::collection::vec(criticality(), 0..3),
        proptest::option::of(0.0f64..100.0),
        proptest::option::of(1u32..20),
    )
        .prop_map(|(search, environment, criticality, min, page)| AssetGroupFilters {
            search,
            environment,
            criticality,
            risk_score: NumericRange { min, max: None },
            page: ctem_model::PageRequest {
                page,
                per_page: None,
            },
            sort: None,
        })
}

proptest! {
    #[test]
    fn insertion_order_does_not_change_url(
        pairs in proptest::collection::btree_map("[a-z_]{1,8}", "[a-z0-9,]{1,8}", 0..8)
    ) {
        let forward: QueryParams = pairs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let backward: QueryParams = pairs.iter().rev().map(|(k, v)| (k.clone(), v.clone())).collect();
        prop_assert_eq!(build("/api/v1/x", Some(&forward)), build("/api/v1/x", Some(&backward)));
    }

    #[test]
    fn equal_filters_give_equal_urls(f in filters()) {
        let copy = f.clone();
        prop_assert_eq!(
            endpoint::list::<AssetGroups>(Some(&f)),
            endpoint::list::<AssetGroups>(Some(&copy))
        );
    }

    #[test]
    fn absent_fields_never_serialize(f in filters()) {
        let url = endpoint::list::<AssetGroups>(Some(&f));
        let blank_search = f.search.as_deref().map_or(true, |s| s.trim().is_empty());

        prop_assert!(!url.contains("=&"));
        prop_assert!(!url.ends_with('='));
        prop_assert_eq!(url.contains("search="), !blank_search);
        prop_assert_eq!(url.contains("environment="), !f.environment.is_empty());
        prop_assert_eq!(url.contains("criticality="), !f.criticality.is_empty());
        prop_assert!(!url.contains("risk_score_max="));
        prop_assert!(!url.contains("per_page="));
        prop_assert_eq!(url.contains('?'), !f.query_params().is_empty());
    }
}
