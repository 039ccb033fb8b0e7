// src/mapper/flatten.rs
// DOCUMENTATION: Aggregate to row conversion
// PURPOSE: Turn provider data into per-table rows and plan which child rows
// are missing from what is already stored (content-addressed dedup)

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::rows::{
    CategoryTypeRow, ChildRows, OpeningPeriodRow, PhotoAttributionRow, PhotoReferenceRow,
    PlaceRow, PlaceRowSet, ProviderPlaceRow, RecommendationRow, ResolvedPhotoRow, ReviewRow,
    UserPhotoRow,
};
use crate::errors::PlacesError;
use crate::models::{
    NewRecommendation, NewUserPhoto, OpeningPeriod, PhotoData, ProviderPlaceData,
    ResolvedPhotoData, Review,
};

/// Rows for one newly discovered place
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlaceRows {
    pub place: PlaceRow,
    pub provider: ProviderPlaceRow,
    pub children: ChildRows,
}

impl From<NewPlaceRows> for PlaceRowSet {
    fn from(rows: NewPlaceRows) -> Self {
        PlaceRowSet {
            places: vec![rows.place],
            provider_places: vec![rows.provider],
            children: rows.children,
            ..PlaceRowSet::default()
        }
    }
}

/// Flatten a provider place into fresh rows with generated identifiers
pub fn flatten_new_place(data: &ProviderPlaceData, now: DateTime<Utc>) -> NewPlaceRows {
    let place = PlaceRow {
        id: Uuid::new_v4(),
        name: data.name.clone(),
        created_at: now,
    };

    let provider = ProviderPlaceRow {
        id: Uuid::new_v4(),
        place_id: place.id,
        external_id: data.external_id.clone(),
        name: data.name.clone(),
        lat: data.location.lat,
        lon: data.location.lon,
        price_level: data.price_level,
        rating: data.rating,
        rating_count: data.rating_count,
        formatted_address: data.formatted_address.clone(),
    };

    let (detail_photos, reviews, periods) = match &data.detail {
        Some(detail) => (
            detail.photos.as_slice(),
            detail.reviews.as_slice(),
            detail.opening_periods.as_slice(),
        ),
        None => (&[][..], &[][..], &[][..]),
    };

    let photos = merge_photo_sources(&data.photos, detail_photos);

    let mut children = ChildRows {
        category_types: category_rows(provider.id, &data.types),
        ..ChildRows::default()
    };
    children.extend(plan_child_rows(
        provider.id,
        &ChildRows::default(),
        &photos,
        reviews,
        periods,
    ));

    NewPlaceRows {
        place,
        provider,
        children,
    }
}

/// Category rows tagged with their 0-based provider order
/// DOCUMENTATION: Repeated categories keep their first position
pub fn category_rows(provider_place_id: Uuid, types: &[String]) -> Vec<CategoryTypeRow> {
    let mut seen = HashSet::new();

    types
        .iter()
        .filter(|t| seen.insert(*t))
        .enumerate()
        .map(|(i, t)| CategoryTypeRow {
            id: Uuid::new_v4(),
            provider_place_id,
            type_name: t.clone(),
            order_num: i as i32,
        })
        .collect()
}

/// Merge the search and detail photo lists
/// DOCUMENTATION: Deduplicated by reference string, first occurrence wins
/// (search list first). Attributions and resolved URLs of later duplicates
/// are folded into the surviving entry.
pub fn merge_photo_sources(search: &[PhotoData], detail: &[PhotoData]) -> Vec<PhotoData> {
    let mut merged: Vec<PhotoData> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for photo in search.iter().chain(detail.iter()) {
        let position = match index.get(&photo.reference) {
            Some(&position) => position,
            None => {
                index.insert(photo.reference.clone(), merged.len());
                merged.push(PhotoData {
                    html_attributions: Vec::new(),
                    resolved: Vec::new(),
                    ..photo.clone()
                });
                merged.len() - 1
            }
        };

        let entry = &mut merged[position];
        for attribution in &photo.html_attributions {
            if !entry.html_attributions.contains(attribution) {
                entry.html_attributions.push(attribution.clone());
            }
        }
        for url in &photo.resolved {
            if !entry
                .resolved
                .iter()
                .any(|u| u.width == url.width && u.height == url.height)
            {
                entry.resolved.push(url.clone());
            }
        }
    }

    merged
}

/// Plan the child rows missing from `existing`
/// DOCUMENTATION: Keys per kind: photo reference by reference string,
/// attribution by (reference, text), resolved photo by (reference, width,
/// height), review by (author name, time), opening period by all four fields.
/// New photo references continue after the highest stored position, and new
/// attributions after the highest stored position of their reference.
pub fn plan_child_rows(
    provider_place_id: Uuid,
    existing: &ChildRows,
    photos: &[PhotoData],
    reviews: &[Review],
    periods: &[OpeningPeriod],
) -> ChildRows {
    let mut planned = ChildRows::default();

    let mut reference_ids: HashMap<String, Uuid> = existing
        .photo_references
        .iter()
        .filter(|r| r.provider_place_id == provider_place_id)
        .map(|r| (r.reference.clone(), r.id))
        .collect();
    let mut next_position = existing
        .photo_references
        .iter()
        .filter(|r| r.provider_place_id == provider_place_id)
        .map(|r| r.position + 1)
        .max()
        .unwrap_or(0);

    let mut attribution_keys: HashSet<(Uuid, String)> = existing
        .photo_attributions
        .iter()
        .map(|a| (a.photo_reference_id, a.html_attribution.clone()))
        .collect();
    let mut next_attribution: HashMap<Uuid, i32> = HashMap::new();
    for attribution in &existing.photo_attributions {
        let next = next_attribution
            .entry(attribution.photo_reference_id)
            .or_insert(0);
        *next = (*next).max(attribution.position + 1);
    }
    let mut resolved_keys: HashSet<(Uuid, i32, i32)> = existing
        .resolved_photos
        .iter()
        .map(|r| (r.photo_reference_id, r.width, r.height))
        .collect();

    for photo in photos {
        let reference_id = match reference_ids.get(&photo.reference) {
            Some(id) => *id,
            None => {
                let row = PhotoReferenceRow {
                    id: Uuid::new_v4(),
                    provider_place_id,
                    reference: photo.reference.clone(),
                    width: photo.width,
                    height: photo.height,
                    position: next_position,
                };
                next_position += 1;
                reference_ids.insert(row.reference.clone(), row.id);
                let id = row.id;
                planned.photo_references.push(row);
                id
            }
        };

        for attribution in &photo.html_attributions {
            if attribution_keys.insert((reference_id, attribution.clone())) {
                let next = next_attribution.entry(reference_id).or_insert(0);
                planned.photo_attributions.push(PhotoAttributionRow {
                    id: Uuid::new_v4(),
                    photo_reference_id: reference_id,
                    html_attribution: attribution.clone(),
                    position: *next,
                });
                *next += 1;
            }
        }

        for url in &photo.resolved {
            if resolved_keys.insert((reference_id, url.width, url.height)) {
                planned.resolved_photos.push(ResolvedPhotoRow {
                    id: Uuid::new_v4(),
                    photo_reference_id: reference_id,
                    width: url.width,
                    height: url.height,
                    url: url.url.clone(),
                });
            }
        }
    }

    let mut review_keys: HashSet<(String, DateTime<Utc>)> = existing
        .reviews
        .iter()
        .filter(|r| r.provider_place_id == provider_place_id)
        .map(|r| (r.author_name.clone(), r.time))
        .collect();
    for review in reviews {
        if review_keys.insert((review.author_name.clone(), review.time)) {
            planned.reviews.push(review_row(provider_place_id, review));
        }
    }

    let mut period_keys: HashSet<OpeningPeriod> = existing
        .opening_periods
        .iter()
        .filter(|p| p.provider_place_id == provider_place_id)
        .map(OpeningPeriod::from)
        .collect();
    for period in periods {
        if period_keys.insert(period.clone()) {
            planned
                .opening_periods
                .push(period_row(provider_place_id, period));
        }
    }

    planned
}

/// Plan resolved photo rows for references the place already owns
/// DOCUMENTATION: Fails when the place has no photo reference at all, or
/// when a photo addresses a reference the place does not own. Sizes already
/// stored for a reference are skipped.
pub fn plan_resolved_photos(
    existing: &ChildRows,
    photos: &[ResolvedPhotoData],
) -> Result<Vec<ResolvedPhotoRow>, PlacesError> {
    if existing.photo_references.is_empty() {
        return Err(PlacesError::ValidationError(
            "place has no photo references to resolve".to_string(),
        ));
    }

    let reference_ids: HashMap<&str, Uuid> = existing
        .photo_references
        .iter()
        .map(|r| (r.reference.as_str(), r.id))
        .collect();
    let mut keys: HashSet<(Uuid, i32, i32)> = existing
        .resolved_photos
        .iter()
        .map(|r| (r.photo_reference_id, r.width, r.height))
        .collect();

    let mut planned = Vec::new();
    for photo in photos {
        let reference_id = reference_ids
            .get(photo.reference.as_str())
            .copied()
            .ok_or_else(|| {
                PlacesError::ValidationError(format!(
                    "unknown photo reference: {}",
                    photo.reference
                ))
            })?;

        if keys.insert((reference_id, photo.width, photo.height)) {
            planned.push(ResolvedPhotoRow {
                id: Uuid::new_v4(),
                photo_reference_id: reference_id,
                width: photo.width,
                height: photo.height,
                url: photo.url.clone(),
            });
        }
    }

    Ok(planned)
}

fn review_row(provider_place_id: Uuid, review: &Review) -> ReviewRow {
    ReviewRow {
        id: Uuid::new_v4(),
        provider_place_id,
        rating: review.rating,
        text: review.text.clone(),
        time: review.time,
        author_name: review.author_name.clone(),
        author_url: review.author_url.clone(),
        author_photo_url: review.author_photo_url.clone(),
        language: review.language.clone(),
    }
}

fn period_row(provider_place_id: Uuid, period: &OpeningPeriod) -> OpeningPeriodRow {
    OpeningPeriodRow {
        id: Uuid::new_v4(),
        provider_place_id,
        open_day: period.open_day,
        close_day: period.close_day,
        open_time: period.open_time.clone(),
        close_time: period.close_time.clone(),
    }
}

pub fn user_photo_row(place_id: Uuid, photo: &NewUserPhoto, now: DateTime<Utc>) -> UserPhotoRow {
    UserPhotoRow {
        id: Uuid::new_v4(),
        place_id,
        user_id: photo.user_id,
        url: photo.url.clone(),
        created_at: now,
    }
}

pub fn recommendation_row(
    place_id: Uuid,
    recommendation: &NewRecommendation,
    now: DateTime<Utc>,
) -> RecommendationRow {
    RecommendationRow {
        id: Uuid::new_v4(),
        place_id,
        user_id: recommendation.user_id,
        text: recommendation.text.clone(),
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, PhotoUrl, PlaceDetail};
    use chrono::TimeZone;

    fn photo(reference: &str, attributions: &[&str]) -> PhotoData {
        PhotoData {
            reference: reference.to_string(),
            width: 4032,
            height: 3024,
            html_attributions: attributions.iter().map(|a| a.to_string()).collect(),
            resolved: Vec::new(),
        }
    }

    fn review(author: &str, secs: i64) -> Review {
        Review {
            rating: 4,
            text: Some("Buen vermut".to_string()),
            time: Utc.timestamp_opt(secs, 0).unwrap(),
            author_name: author.to_string(),
            author_url: None,
            author_photo_url: None,
            language: Some("es".to_string()),
        }
    }

    fn period(day: i16) -> OpeningPeriod {
        OpeningPeriod {
            open_day: day,
            open_time: "1200".to_string(),
            close_day: day,
            close_time: "2330".to_string(),
        }
    }

    fn data() -> ProviderPlaceData {
        ProviderPlaceData {
            external_id: "ChIJ-bar-tolo".to_string(),
            name: "Bar Tolo".to_string(),
            location: GeoPoint::new(41.6488, -0.8891),
            price_level: Some(2),
            rating: Some(4.4),
            rating_count: Some(812),
            formatted_address: Some("Calle Mayor 1, Zaragoza".to_string()),
            types: vec!["bar".to_string(), "restaurant".to_string(), "bar".to_string()],
            photos: vec![photo("ref-1", &["Ana"])],
            detail: Some(PlaceDetail {
                photos: vec![photo("ref-1", &["Ana", "Luis"]), photo("ref-2", &[])],
                reviews: vec![review("Marta", 1_700_000_000)],
                opening_periods: vec![period(5)],
            }),
        }
    }

    #[test]
    fn test_merge_photo_sources_dedups_by_reference() {
        let merged = merge_photo_sources(
            &[photo("ref-1", &["Ana"])],
            &[photo("ref-1", &["Ana", "Luis"]), photo("ref-2", &[])],
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].reference, "ref-1");
        assert_eq!(merged[0].html_attributions, vec!["Ana", "Luis"]);
        assert_eq!(merged[1].reference, "ref-2");
    }

    #[test]
    fn test_flatten_new_place() {
        let rows = flatten_new_place(&data(), Utc::now());

        assert_eq!(rows.provider.place_id, rows.place.id);
        assert_eq!(rows.provider.external_id, "ChIJ-bar-tolo");

        let types: Vec<(&str, i32)> = rows
            .children
            .category_types
            .iter()
            .map(|c| (c.type_name.as_str(), c.order_num))
            .collect();
        assert_eq!(types, vec![("bar", 0), ("restaurant", 1)]);

        assert_eq!(rows.children.photo_references.len(), 2);
        assert_eq!(rows.children.photo_references[1].position, 1);
        assert_eq!(rows.children.photo_attributions.len(), 2);
        assert_eq!(rows.children.reviews.len(), 1);
        assert_eq!(rows.children.opening_periods.len(), 1);
    }

    #[test]
    fn test_plan_child_rows_skips_stored_keys() {
        let provider_id = Uuid::new_v4();
        let photos = vec![photo("ref-1", &["Ana"])];
        let reviews = vec![review("Marta", 1_700_000_000)];
        let periods = vec![period(1), period(2)];

        let first = plan_child_rows(provider_id, &ChildRows::default(), &photos, &reviews, &periods);
        assert_eq!(first.len(), 5);

        let second = plan_child_rows(provider_id, &first, &photos, &reviews, &periods);
        assert!(second.is_empty());

        let more = vec![photo("ref-1", &["Ana"]), photo("ref-9", &[])];
        let third = plan_child_rows(
            provider_id,
            &first,
            &more,
            &[review("Marta", 1_700_000_001)],
            &periods,
        );
        assert_eq!(third.photo_references.len(), 1);
        assert_eq!(third.photo_references[0].position, 1);
        assert_eq!(third.reviews.len(), 1);
        assert!(third.opening_periods.is_empty());
    }

    #[test]
    fn test_plan_child_rows_appends_attributions_in_order() {
        let provider_id = Uuid::new_v4();
        let first = plan_child_rows(
            provider_id,
            &ChildRows::default(),
            &[photo("ref-1", &["Luis", "Ana"])],
            &[],
            &[],
        );
        let positions: Vec<(&str, i32)> = first
            .photo_attributions
            .iter()
            .map(|a| (a.html_attribution.as_str(), a.position))
            .collect();
        assert_eq!(positions, vec![("Luis", 0), ("Ana", 1)]);

        let second = plan_child_rows(
            provider_id,
            &first,
            &[photo("ref-1", &["Ana", "Zoe", "Luis"])],
            &[],
            &[],
        );
        assert_eq!(second.photo_attributions.len(), 1);
        assert_eq!(second.photo_attributions[0].html_attribution, "Zoe");
        assert_eq!(second.photo_attributions[0].position, 2);
    }

    #[test]
    fn test_plan_resolved_photos() {
        let provider_id = Uuid::new_v4();
        let mut stored = plan_child_rows(
            provider_id,
            &ChildRows::default(),
            &[photo("ref-1", &[])],
            &[],
            &[],
        );
        stored.resolved_photos.push(ResolvedPhotoRow {
            id: Uuid::new_v4(),
            photo_reference_id: stored.photo_references[0].id,
            width: 400,
            height: 300,
            url: "https://cdn.example.com/ref-1-400.jpg".to_string(),
        });

        let input = vec![
            ResolvedPhotoData {
                reference: "ref-1".to_string(),
                url: "https://cdn.example.com/ref-1-400.jpg".to_string(),
                width: 400,
                height: 300,
            },
            ResolvedPhotoData {
                reference: "ref-1".to_string(),
                url: "https://cdn.example.com/ref-1-1000.jpg".to_string(),
                width: 1000,
                height: 750,
            },
        ];
        let planned = plan_resolved_photos(&stored, &input).unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].width, 1000);

        let unknown = vec![ResolvedPhotoData {
            reference: "ref-x".to_string(),
            ..input[0].clone()
        }];
        assert!(matches!(
            plan_resolved_photos(&stored, &unknown),
            Err(PlacesError::ValidationError(_))
        ));
        assert!(matches!(
            plan_resolved_photos(&ChildRows::default(), &input),
            Err(PlacesError::ValidationError(_))
        ));
    }

    #[test]
    fn test_merge_keeps_resolved_sizes_once() {
        let mut search = photo("ref-1", &[]);
        search.resolved.push(PhotoUrl {
            url: "a".to_string(),
            width: 400,
            height: 300,
        });
        let detail = search.clone();

        let merged = merge_photo_sources(&[search], &[detail]);
        assert_eq!(merged[0].resolved.len(), 1);
    }
}
