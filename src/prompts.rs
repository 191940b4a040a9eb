//! Interactive point prompts
//!
//! Points are stored in original-image pixel space and only mapped into
//! model space when the decoder inputs are built.

use crate::{
    error::{CutoutError, Result},
    types::{Original, Size},
    utils::ResizeLongestSide,
};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Pixel coordinate in original-image space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromptPoint {
    pub x: i32,
    pub y: i32,
}

impl PromptPoint {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for PromptPoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Integer category attached to a prompt point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptLabel(pub i32);

impl PromptLabel {
    pub const BACKGROUND: Self = Self(0);
    pub const FOREGROUND: Self = Self(1);

    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl From<i32> for PromptLabel {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Decoder-ready prompts, batch dimension of 1 included
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformedPrompts {
    /// Flattened `(1, n, 2)` coordinates as `x, y` pairs in resized space
    pub coords: Vec<f32>,
    /// Flattened `(1, n)` labels
    pub labels: Vec<f32>,
}

impl TransformedPrompts {
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.labels.len()
    }

    /// Coordinates as a `(1, n, 2)` array
    pub fn coords_array(&self) -> Result<Array3<f32>> {
        Array3::from_shape_vec((1, self.num_points(), 2), self.coords.clone())
            .map_err(|e| CutoutError::invalid_tensor(format!("prompt coordinates: {}", e)))
    }

    /// Labels as a `(1, n)` array
    pub fn labels_array(&self) -> Result<Array2<f32>> {
        Array2::from_shape_vec((1, self.num_points()), self.labels.clone())
            .map_err(|e| CutoutError::invalid_tensor(format!("prompt labels: {}", e)))
    }
}

/// Ordered point/label prompts with LIFO undo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptState {
    points: Vec<PromptPoint>,
    labels: Vec<PromptLabel>,
}

impl PromptState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a prompt
    ///
    /// # Errors
    /// Returns `CutoutError::PromptMismatch` if the sequences are out of sync
    pub fn add(&mut self, point: PromptPoint, label: PromptLabel) -> Result<()> {
        self.points.push(point);
        self.labels.push(label);
        self.check_aligned()
    }

    /// Remove the most recent prompt
    ///
    /// # Errors
    /// - `CutoutError::EmptyPrompts` when nothing is stored
    /// - `CutoutError::PromptMismatch` if the sequences are out of sync
    pub fn pop(&mut self) -> Result<(PromptPoint, PromptLabel)> {
        if self.points.is_empty() || self.labels.is_empty() {
            return Err(CutoutError::EmptyPrompts);
        }
        let point = self.points.pop();
        let label = self.labels.pop();
        self.check_aligned()?;
        match (point, label) {
            (Some(point), Some(label)) => Ok((point, label)),
            _ => Err(CutoutError::EmptyPrompts),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn points(&self) -> &[PromptPoint] {
        &self.points
    }

    #[must_use]
    pub fn labels(&self) -> &[PromptLabel] {
        &self.labels
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.labels.clear();
    }

    /// Map stored points into resized space for the decoder
    ///
    /// # Errors
    /// Returns `CutoutError::PromptMismatch` if the sequences are out of sync
    pub fn transform(
        &self,
        resizer: &ResizeLongestSide,
        original_size: Size<Original>,
    ) -> Result<TransformedPrompts> {
        self.check_aligned()?;

        let raw: Vec<(f32, f32)> = self
            .points
            .iter()
            .map(|p| (p.x as f32, p.y as f32))
            .collect();
        let coords = resizer
            .apply_coords(&raw, original_size)
            .into_iter()
            .flat_map(|(x, y)| [x, y])
            .collect();
        let labels = self.labels.iter().map(|l| l.value() as f32).collect();

        Ok(TransformedPrompts { coords, labels })
    }

    fn check_aligned(&self) -> Result<()> {
        if self.points.len() == self.labels.len() {
            Ok(())
        } else {
            Err(CutoutError::PromptMismatch {
                points: self.points.len(),
                labels: self.labels.len(),
            })
        }
    }
}
