//! Selection wand state: per-player pos1/pos2 for defining zone volumes.

use std::collections::HashMap;

use realmguard_types::PlayerId;

use crate::config::WorldBounds;
use crate::error::SelectionError;
use crate::geometry::Volume;

/// Integer block coordinates, as clicked with the wand.
pub type BlockPos = [i32; 3];

/// Volume shape built from the two selected positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Box spanning both blocks.
    Cuboid,
    /// Centred on pos1, reaching pos2.
    Sphere,
    /// Vertical cylinder around pos1, radius to pos2 horizontally, covering both heights.
    Cylinder,
    /// Every block between the two heights.
    Slab,
}

#[derive(Debug, Clone)]
struct Selection {
    domain: String,
    pos1: Option<BlockPos>,
    pos2: Option<BlockPos>,
}

/// Per-player selection (pos1, pos2) per domain.
#[derive(Debug, Default)]
pub struct SelectionStore {
    selections: HashMap<PlayerId, Selection>,
}

fn center(pos: BlockPos) -> [f64; 3] {
    pos.map(|c| f64::from(c) + 0.5)
}

impl SelectionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pos1 or pos2. Switching domain clears the other position.
    pub fn set_pos(&mut self, player: PlayerId, domain: &str, pos: BlockPos, is_first: bool) {
        let entry = self.selections.entry(player).or_insert_with(|| Selection {
            domain: domain.to_owned(),
            pos1: None,
            pos2: None,
        });
        if entry.domain != domain {
            *entry = Selection {
                domain: domain.to_owned(),
                pos1: None,
                pos2: None,
            };
        }
        if is_first {
            entry.pos1 = Some(pos);
        } else {
            entry.pos2 = Some(pos);
        }
    }

    /// Domain and both positions, if the selection is complete.
    #[must_use]
    pub fn get(&self, player: &PlayerId) -> Option<(&str, BlockPos, BlockPos)> {
        let selection = self.selections.get(player)?;
        Some((selection.domain.as_str(), selection.pos1?, selection.pos2?))
    }

    pub fn clear(&mut self, player: &PlayerId) {
        self.selections.remove(player);
    }

    /// Turn the player's selection into a volume that fits `world`.
    pub fn build(
        &self,
        player: &PlayerId,
        shape: Shape,
        world: &WorldBounds,
    ) -> Result<(String, Volume), SelectionError> {
        let (domain, pos1, pos2) = self.get(player).ok_or(SelectionError::Incomplete)?;
        let low = |axis: usize| f64::from(pos1[axis].min(pos2[axis]));
        let high = |axis: usize| f64::from(pos1[axis].max(pos2[axis])) + 1.0;
        let volume = match shape {
            Shape::Cuboid => Volume::cuboid([low(0), low(1), low(2)], [high(0), high(1), high(2)]),
            Shape::Sphere => {
                let (a, b) = (center(pos1), center(pos2));
                let radius = ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt();
                Volume::sphere(a, radius)
            }
            Shape::Cylinder => {
                let (a, b) = (center(pos1), center(pos2));
                let radius = (a[0] - b[0]).hypot(a[2] - b[2]);
                Volume::cylinder([a[0], low(1), a[2]], high(1) - low(1), radius)
            }
            Shape::Slab => Volume::slab(low(1), high(1)),
        };
        volume.validate(world)?;
        Ok((domain.to_owned(), volume))
    }
}
