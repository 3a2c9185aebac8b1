//! Volume shapes and the pure math over them.
//!
//! Every predicate here is defensive: an invalid volume contains nothing and intersects
//! nothing. Rejecting invalid volumes is the job of [`Volume::validate`], called before a
//! volume is handed to a zone.

use serde::{Deserialize, Serialize};

use crate::config::WorldBounds;
use crate::error::GeometryError;

/// A closed region of one world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "kebab-case")]
pub enum Volume {
    /// Axis-aligned box, inclusive on every face.
    Cuboid {
        min_x: f64,
        min_y: f64,
        min_z: f64,
        max_x: f64,
        max_y: f64,
        max_z: f64,
    },
    Sphere { x: f64, y: f64, z: f64, radius: f64 },
    /// Vertical cylinder around (x, z) spanning `min_y..=max_y`.
    Cylinder {
        x: f64,
        z: f64,
        min_y: f64,
        max_y: f64,
        radius: f64,
    },
    /// Everything between two heights; horizontally unbounded.
    Slab { min_y: f64, max_y: f64 },
}

/// Axis-aligned bounds of a volume. Horizontal extents may be infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    #[must_use]
    pub fn is_horizontally_bounded(&self) -> bool {
        [self.min[0], self.max[0], self.min[2], self.max[2]]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl Volume {
    /// Box from two arbitrary corners — auto-sorts min/max.
    #[must_use]
    pub fn cuboid(a: [f64; 3], b: [f64; 3]) -> Self {
        Self::Cuboid {
            min_x: a[0].min(b[0]),
            min_y: a[1].min(b[1]),
            min_z: a[2].min(b[2]),
            max_x: a[0].max(b[0]),
            max_y: a[1].max(b[1]),
            max_z: a[2].max(b[2]),
        }
    }

    #[must_use]
    pub const fn sphere(center: [f64; 3], radius: f64) -> Self {
        Self::Sphere {
            x: center[0],
            y: center[1],
            z: center[2],
            radius,
        }
    }

    /// Cylinder standing on `base`, `height` blocks tall (a negative height grows downwards).
    #[must_use]
    pub fn cylinder(base: [f64; 3], height: f64, radius: f64) -> Self {
        let top = base[1] + height;
        Self::Cylinder {
            x: base[0],
            z: base[2],
            min_y: base[1].min(top),
            max_y: base[1].max(top),
            radius,
        }
    }

    #[must_use]
    pub fn slab(y1: f64, y2: f64) -> Self {
        Self::Slab {
            min_y: y1.min(y2),
            max_y: y1.max(y2),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Cuboid { .. } => "cuboid",
            Self::Sphere { .. } => "sphere",
            Self::Cylinder { .. } => "cylinder",
            Self::Slab { .. } => "slab",
        }
    }

    fn check(&self) -> Result<(), GeometryError> {
        let finite = |vals: &[f64]| vals.iter().all(|v| v.is_finite());
        match *self {
            Self::Cuboid {
                min_x,
                min_y,
                min_z,
                max_x,
                max_y,
                max_z,
            } => {
                if !finite(&[min_x, min_y, min_z, max_x, max_y, max_z]) {
                    return Err(GeometryError::NonFinite);
                }
                if min_x >= max_x || min_y >= max_y || min_z >= max_z {
                    return Err(GeometryError::Degenerate("cuboid min must be below max on every axis"));
                }
            }
            Self::Sphere { x, y, z, radius } => {
                if !finite(&[x, y, z, radius]) {
                    return Err(GeometryError::NonFinite);
                }
                if radius <= 0.0 {
                    return Err(GeometryError::Degenerate("sphere radius must be positive"));
                }
            }
            Self::Cylinder {
                x,
                z,
                min_y,
                max_y,
                radius,
            } => {
                if !finite(&[x, z, min_y, max_y, radius]) {
                    return Err(GeometryError::NonFinite);
                }
                if radius <= 0.0 {
                    return Err(GeometryError::Degenerate("cylinder radius must be positive"));
                }
                if min_y >= max_y {
                    return Err(GeometryError::Degenerate("cylinder must have a height"));
                }
            }
            Self::Slab { min_y, max_y } => {
                if !finite(&[min_y, max_y]) {
                    return Err(GeometryError::NonFinite);
                }
                if min_y >= max_y {
                    return Err(GeometryError::Degenerate("slab min_y must be below max_y"));
                }
            }
        }
        Ok(())
    }

    /// Structural validity: finite, non-degenerate extents.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }

    /// Validity plus "reaches into the world at all".
    pub fn validate(&self, world: &WorldBounds) -> Result<(), GeometryError> {
        self.check()?;
        let world_box = Aabb {
            min: [-world.radius, world.min_y, -world.radius],
            max: [world.radius, world.max_y, world.radius],
        };
        if !self.bounds().overlaps(&world_box) {
            return Err(GeometryError::OutsideWorld);
        }
        Ok(())
    }

    #[must_use]
    pub fn bounds(&self) -> Aabb {
        match *self {
            Self::Cuboid {
                min_x,
                min_y,
                min_z,
                max_x,
                max_y,
                max_z,
            } => Aabb {
                min: [min_x, min_y, min_z],
                max: [max_x, max_y, max_z],
            },
            Self::Sphere { x, y, z, radius } => Aabb {
                min: [x - radius, y - radius, z - radius],
                max: [x + radius, y + radius, z + radius],
            },
            Self::Cylinder {
                x,
                z,
                min_y,
                max_y,
                radius,
            } => Aabb {
                min: [x - radius, min_y, z - radius],
                max: [x + radius, max_y, z + radius],
            },
            Self::Slab { min_y, max_y } => Aabb {
                min: [f64::NEG_INFINITY, min_y, f64::NEG_INFINITY],
                max: [f64::INFINITY, max_y, f64::INFINITY],
            },
        }
    }

    /// Returns true if the point is inside this volume (boundaries included).
    #[must_use]
    pub fn contains(&self, px: f64, py: f64, pz: f64) -> bool {
        if !self.is_valid() {
            return false;
        }
        match *self {
            Self::Cuboid {
                min_x,
                min_y,
                min_z,
                max_x,
                max_y,
                max_z,
            } => {
                px >= min_x && px <= max_x && py >= min_y && py <= max_y && pz >= min_z && pz <= max_z
            }
            Self::Sphere { x, y, z, radius } => {
                let (dx, dy, dz) = (px - x, py - y, pz - z);
                dx * dx + dy * dy + dz * dz <= radius * radius
            }
            Self::Cylinder {
                x,
                z,
                min_y,
                max_y,
                radius,
            } => {
                let (dx, dz) = (px - x, pz - z);
                py >= min_y && py <= max_y && dx * dx + dz * dz <= radius * radius
            }
            Self::Slab { min_y, max_y } => py >= min_y && py <= max_y,
        }
    }

    /// Whether two volumes share at least one point.
    ///
    /// Exact for box/box, box/sphere, box/cylinder, sphere/sphere, cylinder/cylinder and anything
    /// against a slab. Sphere/cylinder is approximated by the sphere's bounding column, which
    /// may report an overlap that is not there but never misses one.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        if !self.bounds().overlaps(&other.bounds()) {
            return false;
        }
        match (*self, *other) {
            // Shared height band (bounds check) and the slab covers every column of it.
            (Self::Slab { .. }, _) | (_, Self::Slab { .. }) => true,
            (Self::Cuboid { .. }, Self::Cuboid { .. }) => true,
            (Self::Sphere { x, y, z, radius }, cuboid @ Self::Cuboid { .. })
            | (cuboid @ Self::Cuboid { .. }, Self::Sphere { x, y, z, radius }) => {
                let b = cuboid.bounds();
                let dx = x - x.clamp(b.min[0], b.max[0]);
                let dy = y - y.clamp(b.min[1], b.max[1]);
                let dz = z - z.clamp(b.min[2], b.max[2]);
                dx * dx + dy * dy + dz * dz <= radius * radius
            }
            (Self::Cylinder { x, z, radius, .. }, cuboid @ Self::Cuboid { .. })
            | (cuboid @ Self::Cuboid { .. }, Self::Cylinder { x, z, radius, .. }) => {
                // Heights overlap (bounds check), so only the horizontal disc vs rectangle remains.
                let b = cuboid.bounds();
                let dx = x - x.clamp(b.min[0], b.max[0]);
                let dz = z - z.clamp(b.min[2], b.max[2]);
                dx * dx + dz * dz <= radius * radius
            }
            (
                Self::Sphere {
                    x: ax,
                    y: ay,
                    z: az,
                    radius: ar,
                },
                Self::Sphere {
                    x: bx,
                    y: by,
                    z: bz,
                    radius: br,
                },
            ) => {
                let (dx, dy, dz) = (ax - bx, ay - by, az - bz);
                let reach = ar + br;
                dx * dx + dy * dy + dz * dz <= reach * reach
            }
            (
                Self::Cylinder {
                    x: ax,
                    z: az,
                    radius: ar,
                    ..
                },
                Self::Cylinder {
                    x: bx,
                    z: bz,
                    radius: br,
                    ..
                },
            )
            | (
                Self::Sphere {
                    x: ax,
                    z: az,
                    radius: ar,
                    ..
                },
                Self::Cylinder {
                    x: bx,
                    z: bz,
                    radius: br,
                    ..
                },
            )
            | (
                Self::Cylinder {
                    x: ax,
                    z: az,
                    radius: ar,
                    ..
                },
                Self::Sphere {
                    x: bx,
                    z: bz,
                    radius: br,
                    ..
                },
            ) => {
                let (dx, dz) = (ax - bx, az - bz);
                let reach = ar + br;
                dx * dx + dz * dz <= reach * reach
            }
        }
    }

    /// Lowest and highest y the volume reaches.
    #[must_use]
    pub fn height_range(&self) -> (f64, f64) {
        let b = self.bounds();
        (b.min[1], b.max[1])
    }
}
