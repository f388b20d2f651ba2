//! Geometry value objects describing OCR output.
//!
//! All coordinates are normalized to the page size, each value in [0, 1].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A normalized point on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A normalized bounding box: (x0, top, x1, bottom).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormBBox {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
}

impl NormBBox {
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self { x0, top, x1, bottom }
    }

    /// Build a bbox from a 4-vertex bounding poly (top-left, top-right,
    /// bottom-right, bottom-left).
    pub fn from_bounding_poly(poly: &BoundingPoly) -> Result<Self> {
        if poly.normalized_vertices.len() != 4 {
            return Err(Error::Geometry(
                "bounding poly must have 4 vertices for bbox conversion".into(),
            ));
        }

        let top_left = poly.normalized_vertices[0];
        let bottom_right = poly.normalized_vertices[2];

        Ok(Self {
            x0: top_left.x,
            top: top_left.y,
            x1: bottom_right.x,
            bottom: bottom_right.y,
        })
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn centroid(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.top + self.bottom) / 2.0)
    }

    /// Area of the intersection with another bbox, 0.0 when disjoint.
    pub fn intersection_area(&self, other: &NormBBox) -> f32 {
        let overlap_x0 = self.x0.max(other.x0);
        let overlap_x1 = self.x1.min(other.x1);
        if overlap_x0 >= overlap_x1 {
            return 0.0;
        }

        let overlap_top = self.top.max(other.top);
        let overlap_bottom = self.bottom.min(other.bottom);
        if overlap_top >= overlap_bottom {
            return 0.0;
        }

        (overlap_x1 - overlap_x0) * (overlap_bottom - overlap_top)
    }

    /// Smallest bbox covering both `self` and `other`.
    pub fn union(&self, other: &NormBBox) -> NormBBox {
        NormBBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Combine multiple bboxes into their union.
    pub fn combine<I: IntoIterator<Item = NormBBox>>(bboxes: I) -> Result<NormBBox> {
        let mut iter = bboxes.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| Error::Geometry("must provide at least one bounding box".into()))?;
        Ok(iter.fold(first, |acc, b| acc.union(&b)))
    }
}

/// A normalized bounding polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingPoly {
    pub normalized_vertices: Vec<Point>,
}

impl BoundingPoly {
    pub fn new(normalized_vertices: Vec<Point>) -> Self {
        Self { normalized_vertices }
    }

    fn quad(&self) -> Result<[Point; 4]> {
        match self.normalized_vertices.as_slice() {
            [a, b, c, d] => Ok([*a, *b, *c, *d]),
            _ => Err(Error::Geometry("bounding poly must have 4 vertices".into())),
        }
    }

    /// Skew angle in degrees of the top edge from perfectly horizontal.
    pub fn skew_angle(&self) -> Result<f32> {
        let [top_left, top_right, _, _] = self.quad()?;

        let vertical = top_left.y - top_right.y;
        let horizontal = top_right.x - top_left.x;

        if horizontal == 0.0 {
            return Ok(if vertical > 0.0 { 90.0 } else { -90.0 });
        }

        Ok((vertical / horizontal).atan().to_degrees())
    }

    /// Centroid of the polygon vertices.
    pub fn centroid(&self) -> Result<Point> {
        let [a, b, c, d] = self.quad()?;
        Ok(Point::new(
            (a.x + b.x + c.x + d.x) / 4.0,
            (a.y + b.y + c.y + d.y) / 4.0,
        ))
    }

    /// The vertex to rotate around when deskewing, chosen by skew direction.
    pub fn rotation_point(&self) -> Result<Point> {
        let [top_left, top_right, _, bottom_left] = self.quad()?;

        // When the top right sits lower in normalized space, anchor the
        // rotation at the bottom left; otherwise at the top right.
        if top_right.y > top_left.y {
            Ok(bottom_left)
        } else {
            Ok(top_right)
        }
    }

    /// Rotate the polygon by `angle_degrees` around the given point.
    pub fn rotated_around(&self, angle_degrees: f32, rotation_point: Point) -> Result<BoundingPoly> {
        let _ = self.quad()?;
        let angle = angle_degrees.to_radians();
        let (sin, cos) = angle.sin_cos();

        let vertices = self
            .normalized_vertices
            .iter()
            .map(|v| {
                let tx = v.x - rotation_point.x;
                let ty = v.y - rotation_point.y;
                Point::new(
                    tx * cos - ty * sin + rotation_point.x,
                    tx * sin + ty * cos + rotation_point.y,
                )
            })
            .collect();

        Ok(BoundingPoly::new(vertices))
    }
}

/// Bounding box plus optional source polygon for an OCR element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub bounding_box: NormBBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_poly: Option<BoundingPoly>,
}

impl Geometry {
    pub fn new(bounding_box: NormBBox) -> Self {
        Self {
            bounding_box,
            bounding_poly: None,
        }
    }

    pub fn with_poly(bounding_box: NormBBox, bounding_poly: BoundingPoly) -> Self {
        Self {
            bounding_box,
            bounding_poly: Some(bounding_poly),
        }
    }

    /// Rotate the geometry to zero skew. Requires a bounding poly.
    pub fn deskewed(&self) -> Result<Geometry> {
        let poly = self
            .bounding_poly
            .as_ref()
            .ok_or_else(|| Error::Geometry("bounding poly required to deskew".into()))?;

        let skew = poly.skew_angle()?;
        let pivot = poly.rotation_point()?;
        let rotated = poly.rotated_around(skew, pivot)?;
        let bbox = NormBBox::from_bounding_poly(&rotated)?;

        Ok(Geometry::with_poly(bbox, rotated))
    }
}

/// Granularity of an OCR text segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockLevel {
    Word,
    Line,
    Block,
    Paragraph,
}

/// Reading direction reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

/// A single block of OCR text with its normalized geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub level: BlockLevel,
    pub geometry: Geometry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, level: BlockLevel, geometry: Geometry) -> Self {
        Self {
            text: text.into(),
            level,
            geometry,
            direction: None,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn bounding_box(&self) -> &NormBBox {
        &self.geometry.bounding_box
    }

    pub fn has_vertices(&self) -> bool {
        self.geometry.bounding_poly.is_some()
    }
}
