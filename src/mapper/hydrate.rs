// src/mapper/hydrate.rs
// DOCUMENTATION: Row to aggregate reconstruction
// PURPOSE: Pure reducer that groups flat rows by owning key and stitches
// them back into nested Place aggregates

use std::collections::HashMap;
use uuid::Uuid;

use super::rows::{
    CategoryTypeRow, OpeningPeriodRow, PhotoAttributionRow, PhotoReferenceRow, PlaceRowSet,
    ProviderPlaceRow, RecommendationRow, ResolvedPhotoRow, ReviewRow, UserPhotoRow,
};
use crate::models::{
    GeoPoint, OpeningPeriod, Photo, PhotoUrl, Place, ProviderPlace, Recommendation, Review,
    UserPhoto,
};

impl From<&ReviewRow> for Review {
    fn from(row: &ReviewRow) -> Self {
        Review {
            rating: row.rating,
            text: row.text.clone(),
            time: row.time,
            author_name: row.author_name.clone(),
            author_url: row.author_url.clone(),
            author_photo_url: row.author_photo_url.clone(),
            language: row.language.clone(),
        }
    }
}

impl From<&OpeningPeriodRow> for OpeningPeriod {
    fn from(row: &OpeningPeriodRow) -> Self {
        OpeningPeriod {
            open_day: row.open_day,
            open_time: row.open_time.clone(),
            close_day: row.close_day,
            close_time: row.close_time.clone(),
        }
    }
}

impl From<ResolvedPhotoRow> for PhotoUrl {
    fn from(row: ResolvedPhotoRow) -> Self {
        PhotoUrl {
            url: row.url,
            width: row.width,
            height: row.height,
        }
    }
}

fn group_by<T, F>(rows: Vec<T>, key: F) -> HashMap<Uuid, Vec<T>>
where
    F: Fn(&T) -> Uuid,
{
    let mut groups: HashMap<Uuid, Vec<T>> = HashMap::new();
    for row in rows {
        groups.entry(key(&row)).or_default().push(row);
    }
    groups
}

/// Reconstruct nested aggregates, one per place row, in place row order
/// DOCUMENTATION:
/// - categories sorted by order_num, photos by position
/// - resolved URLs sorted by width: first is `small`, last is `large`
/// - reviews sorted by (time, author), periods by (day, time)
/// - like_count is left at 0; counts are merged separately
pub fn hydrate(set: PlaceRowSet) -> Vec<Place> {
    let PlaceRowSet {
        places,
        provider_places,
        children,
        user_photos,
        recommendations,
    } = set;

    let mut categories = group_by(children.category_types, |r: &CategoryTypeRow| {
        r.provider_place_id
    });
    let mut references = group_by(children.photo_references, |r: &PhotoReferenceRow| {
        r.provider_place_id
    });
    let mut attributions = group_by(children.photo_attributions, |r: &PhotoAttributionRow| {
        r.photo_reference_id
    });
    let mut resolved = group_by(children.resolved_photos, |r: &ResolvedPhotoRow| {
        r.photo_reference_id
    });
    let mut reviews = group_by(children.reviews, |r: &ReviewRow| r.provider_place_id);
    let mut periods = group_by(children.opening_periods, |r: &OpeningPeriodRow| {
        r.provider_place_id
    });
    let mut user_photos = group_by(user_photos, |r: &UserPhotoRow| r.place_id);
    let mut recommendations = group_by(recommendations, |r: &RecommendationRow| r.place_id);

    let mut providers: HashMap<Uuid, ProviderPlaceRow> = provider_places
        .into_iter()
        .map(|p| (p.place_id, p))
        .collect();

    places
        .into_iter()
        .map(|place| {
            let provider = providers.remove(&place.id).map(|row| {
                let mut types = categories.remove(&row.id).unwrap_or_default();
                types.sort_by_key(|c| c.order_num);

                let mut photo_rows = references.remove(&row.id).unwrap_or_default();
                photo_rows.sort_by_key(|r| r.position);
                let photos = photo_rows
                    .into_iter()
                    .map(|reference| {
                        let mut attribution_rows =
                            attributions.remove(&reference.id).unwrap_or_default();
                        attribution_rows.sort_by_key(|a| a.position);
                        let attributions = attribution_rows
                            .into_iter()
                            .map(|a| a.html_attribution)
                            .collect();

                        let mut urls = resolved.remove(&reference.id).unwrap_or_default();
                        urls.sort_by_key(|u| (u.width, u.height));
                        let small = urls.first().cloned().map(PhotoUrl::from);
                        let large = urls.pop().map(PhotoUrl::from);

                        Photo {
                            reference: reference.reference,
                            width: reference.width,
                            height: reference.height,
                            attributions,
                            small,
                            large,
                        }
                    })
                    .collect();

                let mut place_reviews: Vec<Review> = reviews
                    .remove(&row.id)
                    .unwrap_or_default()
                    .iter()
                    .map(Review::from)
                    .collect();
                place_reviews.sort_by(|a, b| {
                    a.time
                        .cmp(&b.time)
                        .then_with(|| a.author_name.cmp(&b.author_name))
                });

                let mut opening_periods: Vec<OpeningPeriod> = periods
                    .remove(&row.id)
                    .unwrap_or_default()
                    .iter()
                    .map(OpeningPeriod::from)
                    .collect();
                opening_periods.sort_by(|a, b| {
                    (a.open_day, &a.open_time, a.close_day, &a.close_time).cmp(&(
                        b.open_day,
                        &b.open_time,
                        b.close_day,
                        &b.close_time,
                    ))
                });

                ProviderPlace {
                    id: row.id,
                    external_id: row.external_id,
                    name: row.name,
                    location: GeoPoint::new(row.lat, row.lon),
                    price_level: row.price_level,
                    rating: row.rating,
                    rating_count: row.rating_count,
                    formatted_address: row.formatted_address,
                    types: types.into_iter().map(|c| c.type_name).collect(),
                    photos,
                    reviews: place_reviews,
                    opening_periods,
                }
            });

            let mut place_photos = user_photos.remove(&place.id).unwrap_or_default();
            place_photos.sort_by_key(|p| p.created_at);
            let mut place_recommendations = recommendations.remove(&place.id).unwrap_or_default();
            place_recommendations.sort_by_key(|r| r.created_at);

            Place {
                id: place.id,
                name: place.name,
                like_count: 0,
                created_at: place.created_at,
                provider,
                user_photos: place_photos
                    .into_iter()
                    .map(|p| UserPhoto {
                        id: p.id,
                        user_id: p.user_id,
                        url: p.url,
                        created_at: p.created_at,
                    })
                    .collect(),
                recommendations: place_recommendations
                    .into_iter()
                    .map(|r| Recommendation {
                        id: r.id,
                        user_id: r.user_id,
                        text: r.text,
                        created_at: r.created_at,
                    })
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::rows::{ChildRows, PlaceRow};
    use chrono::{TimeZone, Utc};

    fn single_place() -> (PlaceRowSet, Uuid, Uuid) {
        let place_id = Uuid::new_v4();
        let provider_id = Uuid::new_v4();
        let reference_id = Uuid::new_v4();

        let set = PlaceRowSet {
            places: vec![PlaceRow {
                id: place_id,
                name: "Casa Montal".to_string(),
                created_at: Utc::now(),
            }],
            provider_places: vec![ProviderPlaceRow {
                id: provider_id,
                place_id,
                external_id: "ChIJ-montal".to_string(),
                name: "Casa Montal".to_string(),
                lat: 41.654,
                lon: -0.879,
                price_level: Some(3),
                rating: Some(4.6),
                rating_count: Some(230),
                formatted_address: None,
            }],
            children: ChildRows {
                category_types: vec![
                    CategoryTypeRow {
                        id: Uuid::new_v4(),
                        provider_place_id: provider_id,
                        type_name: "food".to_string(),
                        order_num: 1,
                    },
                    CategoryTypeRow {
                        id: Uuid::new_v4(),
                        provider_place_id: provider_id,
                        type_name: "restaurant".to_string(),
                        order_num: 0,
                    },
                ],
                photo_references: vec![PhotoReferenceRow {
                    id: reference_id,
                    provider_place_id: provider_id,
                    reference: "ref-montal".to_string(),
                    width: 2000,
                    height: 1500,
                    position: 0,
                }],
                photo_attributions: vec![
                    PhotoAttributionRow {
                        id: Uuid::new_v4(),
                        photo_reference_id: reference_id,
                        html_attribution: "<a>Jorge</a>".to_string(),
                        position: 1,
                    },
                    PhotoAttributionRow {
                        id: Uuid::new_v4(),
                        photo_reference_id: reference_id,
                        html_attribution: "<a>Pilar</a>".to_string(),
                        position: 0,
                    },
                ],
                resolved_photos: vec![
                    ResolvedPhotoRow {
                        id: Uuid::new_v4(),
                        photo_reference_id: reference_id,
                        width: 1000,
                        height: 750,
                        url: "large.jpg".to_string(),
                    },
                    ResolvedPhotoRow {
                        id: Uuid::new_v4(),
                        photo_reference_id: reference_id,
                        width: 400,
                        height: 300,
                        url: "small.jpg".to_string(),
                    },
                ],
                reviews: vec![
                    ReviewRow {
                        id: Uuid::new_v4(),
                        provider_place_id: provider_id,
                        rating: 5,
                        text: None,
                        time: Utc.timestamp_opt(1_700_000_500, 0).unwrap(),
                        author_name: "Pilar".to_string(),
                        author_url: None,
                        author_photo_url: None,
                        language: None,
                    },
                    ReviewRow {
                        id: Uuid::new_v4(),
                        provider_place_id: provider_id,
                        rating: 3,
                        text: None,
                        time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                        author_name: "Jorge".to_string(),
                        author_url: None,
                        author_photo_url: None,
                        language: None,
                    },
                ],
                ..ChildRows::default()
            },
            ..PlaceRowSet::default()
        };

        (set, place_id, provider_id)
    }

    #[test]
    fn test_hydrate_orders_children() {
        let (set, place_id, provider_id) = single_place();
        let places = hydrate(set);

        assert_eq!(places.len(), 1);
        assert_eq!(places[0].id, place_id);
        assert_eq!(places[0].like_count, 0);

        let provider = places[0].provider.as_ref().unwrap();
        assert_eq!(provider.id, provider_id);
        assert_eq!(provider.types, vec!["restaurant", "food"]);
        assert_eq!(provider.reviews[0].author_name, "Jorge");
        assert_eq!(provider.reviews[1].author_name, "Pilar");
        assert_eq!(
            provider.photos[0].attributions,
            vec!["<a>Pilar</a>", "<a>Jorge</a>"]
        );
    }

    #[test]
    fn test_hydrate_selects_small_and_large() {
        let (set, _, _) = single_place();
        let places = hydrate(set);
        let photo = &places[0].provider.as_ref().unwrap().photos[0];

        assert_eq!(photo.small.as_ref().unwrap().width, 400);
        assert_eq!(photo.large.as_ref().unwrap().width, 1000);
    }

    #[test]
    fn test_hydrate_single_resolved_is_both_sizes() {
        let (mut set, _, _) = single_place();
        set.children.resolved_photos.truncate(1);
        let places = hydrate(set);
        let photo = &places[0].provider.as_ref().unwrap().photos[0];

        assert_eq!(photo.small, photo.large);
        assert_eq!(photo.small.as_ref().unwrap().url, "large.jpg");
    }

    #[test]
    fn test_hydrate_place_without_provider() {
        let (mut set, _, _) = single_place();
        set.provider_places.clear();
        let places = hydrate(set);

        assert_eq!(places.len(), 1);
        assert!(places[0].provider.is_none());
    }
}
