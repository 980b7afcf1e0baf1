use chrono::Utc;
use ranking_cache::{CacheKey, CacheOperations, InMemoryCache};
use std::collections::HashSet;
use std::sync::Arc;
use travel_ranking::{
    models::{
        Amenity, Capacity, Category, DataQuality, Dimension, Entity, EntityKind, FeatureVector,
        PopularityScope, PopularitySnapshot, Price, RatingAggregate, Setting, UserProfile,
        UserSegment,
    },
    services::{
        popularity::PopularityEngine,
        vectorize, CacheTtls, InteractionEvent, InteractionKind, LogPublisher, PopularityCache,
        RecommendationPipeline, RecommendationRequest, RecommendationService,
        RecommendationStrategy, SearchContext,
    },
    ConfigStore, RankingConfig,
};
use uuid::Uuid;

const CATEGORIES: [Category; 5] = [
    Category::Hotel,
    Category::Resort,
    Category::Hostel,
    Category::Villa,
    Category::City,
];

const AMENITIES: [Amenity; 8] = [
    Amenity::Pool,
    Amenity::Gym,
    Amenity::FineDining,
    Amenity::MuseumNearby,
    Amenity::FamilyRooms,
    Amenity::Hiking,
    Amenity::Bar,
    Amenity::PublicTransport,
];

/// Deterministic varied catalog
fn catalog(size: usize) -> Vec<Entity> {
    (0..size)
        .map(|i| {
            let category = CATEGORIES[i % CATEGORIES.len()];
            let mut entity = Entity::new(format!("entity-{:03}", i), EntityKind::Accommodation, category);
            entity.amenities = AMENITIES
                .iter()
                .enumerate()
                .filter(|(bit, _)| (i >> (bit % 4)) & 1 == 1 || (i + bit) % 5 == 0)
                .map(|(_, amenity)| *amenity)
                .collect();
            entity.price = Some(Price {
                amount: 40.0 + (i as f32 * 37.0) % 400.0,
                currency: "EUR".to_string(),
            });
            entity.rating = Some(RatingAggregate {
                average: 5.0 + (i % 10) as f32 * 0.5,
                scale: 10.0,
                review_count: (i as u32 * 53) % 1500,
            });
            entity.star_rating = Some((i % 6) as u8);
            entity.capacity = Some(Capacity {
                max_guests: 1 + (i % 8) as u32,
                rooms: None,
            });
            entity.location.setting = Some(match i % 3 {
                0 => Setting::Urban,
                1 => Setting::Coastal,
                _ => Setting::Rural,
            });
            entity
        })
        .collect()
}

fn reference_hotel() -> Entity {
    let mut entity = Entity::new("reference", EntityKind::Accommodation, Category::Hotel);
    entity.amenities = [Amenity::Pool, Amenity::Gym, Amenity::FineDining]
        .into_iter()
        .collect();
    entity.price = Some(Price {
        amount: 75.0,
        currency: "EUR".to_string(),
    });
    entity.rating = Some(RatingAggregate {
        average: 8.5,
        scale: 10.0,
        review_count: 200,
    });
    entity
}

fn profile(completeness: f32, vector: Option<FeatureVector>) -> UserProfile {
    UserProfile {
        segment: Some(UserSegment::LuxuryTraveler),
        preference_vector: vector,
        data_quality: DataQuality::new(completeness, 90.0),
        onboarding_completed: true,
        ..UserProfile::new(Uuid::new_v4())
    }
}

fn global_popularity(entities: &[Entity], config: &RankingConfig) -> PopularitySnapshot {
    let now = Utc::now();
    let batch = PopularityEngine::new(config.popularity.clone()).compute_all(entities, now);
    PopularitySnapshot::new(PopularityScope::Global, now, batch.scores)
}

fn pipeline() -> RecommendationPipeline {
    let store = ConfigStore::new(RankingConfig::standard()).unwrap();
    RecommendationPipeline::new(store.snapshot())
}

#[test]
fn test_reference_hotel_scenario() {
    let config = RankingConfig::standard();
    let hotel = reference_hotel();
    let vector = vectorize(&hotel, &config.vectorization).unwrap();

    assert!((vector.get(Dimension::Climate) - 0.3).abs() < 1e-3);
    assert!((vector.get(Dimension::Activity) - 0.3).abs() < 1e-3);
    assert!((vector.get(Dimension::Budget) - 0.5).abs() < 1e-3);
    assert!((vector.get(Dimension::Gastronomy) - 0.3).abs() < 1e-3);

    let user = profile(95.0, Some(vector));
    let candidates = vec![hotel];
    let popularity = global_popularity(&candidates, &config);

    let outcome = pipeline()
        .recommend(RecommendationRequest {
            profile: &user,
            candidates: &candidates,
            popularity: &popularity,
            limit: Some(5),
        })
        .unwrap();

    assert_eq!(outcome.path, RecommendationStrategy::Personalized);
    assert_eq!(outcome.items.len(), 1);
    assert!((outcome.items[0].breakdown.similarity - 1.0).abs() < 1e-5);
    assert_eq!(outcome.items[0].rank, Some(1));
}

#[test]
fn test_all_vectors_bounded() {
    let config = RankingConfig::standard();
    for entity in catalog(120) {
        let vector = vectorize(&entity, &config.vectorization).unwrap();
        assert_eq!(vector.as_array().len(), 8);
        assert!(
            vector.as_array().iter().all(|v| (0.0..=1.0).contains(v)),
            "{} out of bounds: {:?}",
            entity.id,
            vector
        );
    }
}

#[test]
fn test_low_completeness_routes_to_popularity_only() {
    let config = RankingConfig::standard();
    let candidates = catalog(40);
    let popularity = global_popularity(&candidates, &config);
    let user = profile(10.0, Some(FeatureVector::new([0.7; 8])));

    let outcome = pipeline()
        .recommend(RecommendationRequest {
            profile: &user,
            candidates: &candidates,
            popularity: &popularity,
            limit: Some(10),
        })
        .unwrap();

    assert_eq!(outcome.path, RecommendationStrategy::PopularityOnly);
    assert_eq!(outcome.items.len(), 10);
    assert!(outcome.items.iter().all(|i| i.breakdown.similarity == 0.0));
}

#[test]
fn test_output_contract_holds_on_every_path() {
    let config = RankingConfig::standard();
    let candidates = catalog(60);
    let popularity = global_popularity(&candidates, &config);
    let vector = FeatureVector::new([0.4, 0.6, 0.5, 0.3, 0.2, 0.7, 0.8, 0.5]);

    for (completeness, limit) in [(5.0, 20), (50.0, 100), (80.0, 7), (100.0, 0)] {
        let mut user = profile(completeness, Some(vector));
        user.onboarding_completed = completeness < 90.0;

        let outcome = pipeline()
            .recommend(RecommendationRequest {
                profile: &user,
                candidates: &candidates,
                popularity: &popularity,
                limit: Some(limit),
            })
            .unwrap();

        assert!(outcome.items.len() <= limit.min(candidates.len()));
        let ids: HashSet<_> = outcome.items.iter().map(|i| i.id()).collect();
        assert_eq!(ids.len(), outcome.items.len());

        for (position, item) in outcome.items.iter().enumerate() {
            assert!((0.0..=1.0).contains(&item.final_score()));
            assert!((0.0..=1.0).contains(&item.confidence));
            assert_eq!(item.rank, Some(position + 1));
            assert!(item.reasons.len() <= 3);
        }
    }
}

#[test]
fn test_pure_relevance_config_keeps_score_order() {
    let mut config = RankingConfig::standard();
    config.diversity.lambda = 1.0;
    let store = ConfigStore::new(config.clone()).unwrap();
    let candidates = catalog(30);
    let popularity = global_popularity(&candidates, &config);
    let user = profile(100.0, Some(FeatureVector::new([0.5, 0.2, 0.9, 0.1, 0.3, 0.6, 0.4, 0.8])));

    let outcome = RecommendationPipeline::new(store.snapshot())
        .recommend(RecommendationRequest {
            profile: &user,
            candidates: &candidates,
            popularity: &popularity,
            limit: Some(30),
        })
        .unwrap();

    let mut sorted = outcome.items.clone();
    sorted.sort_by(|a, b| a.ranking_cmp(b));
    let expected: Vec<_> = sorted.iter().map(|i| i.id()).collect();
    let actual: Vec<_> = outcome.items.iter().map(|i| i.id()).collect();
    assert_eq!(actual, expected);
}

fn service(
    backend: Arc<InMemoryCache>,
    store: Arc<ConfigStore>,
) -> RecommendationService<InMemoryCache> {
    RecommendationService::new(
        Arc::clone(&backend),
        store,
        PopularityCache::new(backend, 600),
        Arc::new(LogPublisher),
        CacheTtls::default(),
    )
}

#[tokio::test]
async fn test_service_caches_vectors_and_responses() {
    let backend = Arc::new(InMemoryCache::new());
    let store = Arc::new(ConfigStore::new(RankingConfig::standard()).unwrap());
    let service = service(Arc::clone(&backend), Arc::clone(&store));

    let candidates = catalog(25);
    let user = profile(90.0, Some(FeatureVector::new([0.6; 8])));
    let context = SearchContext {
        destination: Some("Lisbon".to_string()),
        guests: Some(2),
        limit: Some(10),
        ..Default::default()
    };

    let first = service.recommend(&user, &candidates, &context).await.unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.config_version, 1);

    let response_key = CacheKey::recommendations(user.user_id, &context.cache_hash());
    assert!(backend.exists(&response_key).await.unwrap());
    assert!(backend
        .exists(&CacheKey::entity_vector("entity-000"))
        .await
        .unwrap());

    let second = service.recommend(&user, &candidates, &context).await.unwrap();
    assert_eq!(first, second);

    assert_eq!(service.invalidate_user(user.user_id).await.unwrap(), 1);
    assert!(!backend.exists(&response_key).await.unwrap());
}

#[tokio::test]
async fn test_config_update_applies_to_next_run_only() {
    let backend = Arc::new(InMemoryCache::new());
    let store = Arc::new(ConfigStore::new(RankingConfig::standard()).unwrap());
    let service = service(Arc::clone(&backend), Arc::clone(&store));

    let candidates = catalog(15);
    let user = profile(90.0, Some(FeatureVector::new([0.3; 8])));
    let context = SearchContext::default();

    let before = service.recommend(&user, &candidates, &context).await.unwrap();

    let mut updated = RankingConfig::standard();
    updated.scoring.similarity = 0.1;
    store.update(updated).unwrap();

    let after = service.recommend(&user, &candidates, &context).await.unwrap();
    assert_eq!(before.config_version, 1);
    assert_eq!(after.config_version, 2);
}

#[tokio::test]
async fn test_processes_with_different_configs_share_one_cache_safely() {
    let backend = Arc::new(InMemoryCache::new());
    let standard = Arc::new(ConfigStore::new(RankingConfig::standard()).unwrap());

    let mut tuned = RankingConfig::standard();
    tuned.scoring.similarity = 0.0;
    tuned.scoring.popularity = 0.0;
    tuned.scoring.quality = 1.0;
    tuned.vectorization.budget.market_average_price = 300.0;
    let tuned_store = Arc::new(ConfigStore::new(tuned).unwrap());

    // Both stores start at version 1, as separate processes would
    assert_eq!(standard.snapshot().version, tuned_store.snapshot().version);

    let candidates = catalog(20);
    let user = profile(90.0, Some(FeatureVector::new([0.5; 8])));
    let context = SearchContext::default();

    let first = service(Arc::clone(&backend), standard)
        .recommend(&user, &candidates, &context)
        .await
        .unwrap();
    let shared = service(Arc::clone(&backend), Arc::clone(&tuned_store))
        .recommend(&user, &candidates, &context)
        .await
        .unwrap();
    let isolated = service(Arc::new(InMemoryCache::new()), tuned_store)
        .recommend(&user, &candidates, &context)
        .await
        .unwrap();

    assert_ne!(shared, first);
    assert_eq!(shared, isolated);
}

#[tokio::test]
async fn test_cached_response_requires_same_candidates_and_profile() {
    let backend = Arc::new(InMemoryCache::new());
    let store = Arc::new(ConfigStore::new(RankingConfig::standard()).unwrap());
    let service = service(backend, store);
    let context = SearchContext::default();
    let mut user = profile(90.0, Some(FeatureVector::new([0.5; 8])));

    let mut old = catalog(2);
    old[0].id = "old-1".to_string();
    old[1].id = "old-2".to_string();
    let mut new = catalog(1);
    new[0].id = "new-1".to_string();

    let first = service.recommend(&user, &old, &context).await.unwrap();
    assert_eq!(first.items.len(), 2);

    let second = service.recommend(&user, &new, &context).await.unwrap();
    let ids: Vec<&str> = second.items.iter().map(|i| i.id()).collect();
    assert_eq!(ids, ["new-1"]);

    assert_eq!(second.path, RecommendationStrategy::Personalized);
    user.data_quality = DataQuality::new(10.0, 90.0);
    let third = service.recommend(&user, &new, &context).await.unwrap();
    assert_eq!(third.path, RecommendationStrategy::PopularityOnly);
}

#[tokio::test]
async fn test_changed_entity_content_is_revectorized() {
    let backend = Arc::new(InMemoryCache::new());
    let store = Arc::new(ConfigStore::new(RankingConfig::standard()).unwrap());
    let service = service(backend, store);
    let user = profile(90.0, Some(FeatureVector::new([0.5; 8])));

    let mut hotel = reference_hotel();
    hotel.amenities.clear();
    let bare = service
        .recommend(&user, std::slice::from_ref(&hotel), &SearchContext::default())
        .await
        .unwrap();
    assert_eq!(bare.items[0].vector.get(Dimension::Climate), 0.0);

    let equipped = service
        .recommend(&user, &[reference_hotel()], &SearchContext::default())
        .await
        .unwrap();
    assert!(equipped.items[0].vector.get(Dimension::Climate) > 0.0);
}

#[tokio::test]
async fn test_refreshed_popularity_is_served_from_cache() {
    let backend = Arc::new(InMemoryCache::new());
    let config = RankingConfig::standard();
    let popularity_cache = PopularityCache::new(Arc::clone(&backend), 600);
    let candidates = catalog(12);
    let now = Utc::now();

    let batch = PopularityEngine::new(config.popularity.clone()).compute_all(&candidates, now);
    popularity_cache
        .refresh(&batch, &config.segment_boosts, now)
        .await
        .unwrap();

    // Empty candidate list: a miss would produce an empty snapshot
    let snapshot = popularity_cache
        .get_or_compute(
            PopularityScope::Segment(UserSegment::LuxuryTraveler),
            &[],
            &config.popularity,
            &config.segment_boosts,
            now,
        )
        .await;
    assert_eq!(snapshot.len(), batch.scores.len());
}

#[tokio::test]
async fn test_feedback_is_fire_and_forget() {
    let backend = Arc::new(InMemoryCache::new());
    let store = Arc::new(ConfigStore::new(RankingConfig::standard()).unwrap());
    let service = service(backend, store);

    let event = InteractionEvent::new(Uuid::new_v4(), "entity-001", InteractionKind::Book)
        .with_position(1, RecommendationStrategy::Personalized);
    assert!(service.record_interaction(event).await.is_ok());
}
