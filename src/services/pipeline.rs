// src/services/pipeline.rs
// DOCUMENTATION: Write pipeline applied before mapping
// PURPOSE: Ordered normalization and validation steps given to the stores at
// construction time

use std::collections::HashSet;
use validator::Validate;

use crate::errors::PlacesError;
use crate::models::{PlaceDetail, ProviderPlaceData, ResolvedPhotoData};

/// A single pipeline step
pub trait WriteStep: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply_place(&self, place: &mut ProviderPlaceData) -> Result<(), PlacesError>;

    fn apply_detail(&self, detail: &mut PlaceDetail) -> Result<(), PlacesError>;
}

/// Trims text fields and drops empty or repeated categories
pub struct TrimText;

impl TrimText {
    fn trim(value: &mut String) {
        let trimmed = value.trim();
        if trimmed.len() != value.len() {
            *value = trimmed.to_string();
        }
    }
}

impl WriteStep for TrimText {
    fn name(&self) -> &'static str {
        "trim_text"
    }

    fn apply_place(&self, place: &mut ProviderPlaceData) -> Result<(), PlacesError> {
        Self::trim(&mut place.external_id);
        Self::trim(&mut place.name);

        if let Some(address) = place.formatted_address.as_mut() {
            Self::trim(address);
        }
        if place
            .formatted_address
            .as_deref()
            .map_or(false, str::is_empty)
        {
            place.formatted_address = None;
        }

        let mut seen = HashSet::new();
        let types = std::mem::take(&mut place.types);
        place.types = types
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();

        for photo in &mut place.photos {
            Self::trim(&mut photo.reference);
        }

        if let Some(detail) = place.detail.as_mut() {
            self.apply_detail(detail)?;
        }

        Ok(())
    }

    fn apply_detail(&self, detail: &mut PlaceDetail) -> Result<(), PlacesError> {
        for photo in &mut detail.photos {
            Self::trim(&mut photo.reference);
        }
        for review in &mut detail.reviews {
            Self::trim(&mut review.author_name);
        }
        Ok(())
    }
}

/// Field-level checks through the `validator` derives
pub struct ValidateInput;

impl WriteStep for ValidateInput {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn apply_place(&self, place: &mut ProviderPlaceData) -> Result<(), PlacesError> {
        place.validate().map_err(|e| {
            PlacesError::ValidationError(format!("place {}: {}", place.external_id, e))
        })
    }

    fn apply_detail(&self, detail: &mut PlaceDetail) -> Result<(), PlacesError> {
        detail
            .validate()
            .map_err(|e| PlacesError::ValidationError(format!("detail: {}", e)))
    }
}

/// Ordered list of write steps
pub struct WritePipeline {
    steps: Vec<Box<dyn WriteStep>>,
}

impl WritePipeline {
    pub fn new(steps: Vec<Box<dyn WriteStep>>) -> Self {
        Self { steps }
    }

    /// Trim, then validate
    pub fn standard() -> Self {
        Self::new(vec![Box::new(TrimText), Box::new(ValidateInput)])
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step over a batch
    /// DOCUMENTATION: Stops at the first failing place. Repeated external ids
    /// collapse to their first occurrence.
    pub fn prepare_batch(
        &self,
        places: Vec<ProviderPlaceData>,
    ) -> Result<Vec<ProviderPlaceData>, PlacesError> {
        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(places.len());

        for mut place in places {
            for step in &self.steps {
                step.apply_place(&mut place)?;
            }
            if seen.insert(place.external_id.clone()) {
                prepared.push(place);
            } else {
                log::debug!("Dropping repeated external id {} from batch", place.external_id);
            }
        }

        Ok(prepared)
    }

    pub fn prepare_detail(&self, mut detail: PlaceDetail) -> Result<PlaceDetail, PlacesError> {
        for step in &self.steps {
            step.apply_detail(&mut detail)?;
        }
        Ok(detail)
    }

    /// Resolved photos are matched to stored references, so the reference
    /// is trimmed the same way `TrimText` trims photo data
    pub fn prepare_photos(
        &self,
        mut photos: Vec<ResolvedPhotoData>,
    ) -> Result<Vec<ResolvedPhotoData>, PlacesError> {
        for photo in &mut photos {
            TrimText::trim(&mut photo.reference);
            photo.validate().map_err(|e| {
                PlacesError::ValidationError(format!("photo {}: {}", photo.reference, e))
            })?;
        }
        Ok(photos)
    }
}

impl Default for WritePipeline {
    fn default() -> Self {
        Self::standard()
    }
}
