//! Lazy command generators. Each call to [`CommandGenerator::commands`] starts a fresh,
//! finite sequence, so a generator can be replayed for dry runs and benchmarks.

use crate::command::encoder::CommandOrigin;
use thiserror::Error;

pub const DEFAULT_PYRAMID_BLOCK: &str = "glowstone";
pub const DEFAULT_CENSUS_RADIUS: u32 = 30;

/// Largest pyramid any generator will expand.
pub const MAX_PYRAMID_SIZE: u32 = 4096;
pub const MAX_CENSUS_RADIUS: u32 = 512;
pub const MAX_CENSUS_DEPTH: u32 = 1024;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("size {size} exceeds the limit of {limit}")]
    SizeExceeded { size: u32, limit: u32 },
    #[error("census radius {radius} exceeds the limit of {limit}")]
    RadiusExceeded { radius: u32, limit: u32 },
}

pub trait CommandGenerator {
    type Commands: Iterator<Item = String>;

    fn origin(&self) -> CommandOrigin;

    /// Starts a fresh sequence, or refuses a size whose expansion is out of bounds.
    fn commands(&self, size: u32) -> Result<Self::Commands, GeneratorError>;
}

/// Hollow square pyramid outline centred on the triggering player.
#[derive(Clone, Debug)]
pub struct PyramidGenerator {
    block: String,
}

impl Default for PyramidGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_PYRAMID_BLOCK)
    }
}

impl PyramidGenerator {
    pub fn new(block: impl Into<String>) -> Self {
        Self {
            block: block.into(),
        }
    }

    /// Number of commands a pyramid of `size` expands to: `4 * (size + 1)^2`, or `None`
    /// when that does not fit in a `u64`.
    pub fn command_count(size: u32) -> Option<u64> {
        let edge = u64::from(size) + 1;
        edge.checked_mul(edge)?.checked_mul(4)
    }
}

impl CommandGenerator for PyramidGenerator {
    type Commands = PyramidCommands;

    fn origin(&self) -> CommandOrigin {
        CommandOrigin::Pyramid
    }

    fn commands(&self, size: u32) -> Result<PyramidCommands, GeneratorError> {
        let remaining = Self::command_count(size)
            .filter(|_| size <= MAX_PYRAMID_SIZE)
            .ok_or(GeneratorError::SizeExceeded {
                size,
                limit: MAX_PYRAMID_SIZE,
            })?;
        let size = i64::from(size);
        Ok(PyramidCommands {
            block: self.block.clone(),
            size,
            layer: 0,
            offset: -size,
            face: 0,
            remaining,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PyramidCommands {
    block: String,
    size: i64,
    layer: i64,
    offset: i64,
    face: u8,
    remaining: u64,
}

impl Iterator for PyramidCommands {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.remaining == 0 {
            return None;
        }

        let side = self.size - self.layer;
        let (x, y) = (self.offset, self.layer);
        let block = &self.block;
        let command = match self.face {
            0 => format!("setblock ~{x} ~{y} ~{} {block}", -side),
            1 => format!("setblock ~{x} ~{y} ~{side} {block}"),
            2 => format!("setblock ~{} ~{y} ~{x} {block}", -side),
            _ => format!("setblock ~{side} ~{y} ~{x} {block}"),
        };

        self.face += 1;
        if self.face == 4 {
            self.face = 0;
            self.offset += 1;
            if self.offset > side {
                self.layer += 1;
                self.offset = -(self.size - self.layer);
            }
        }
        self.remaining -= 1;
        Some(command)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

/// Scans a cube below the player with `testforblock`, one layer per unit of depth.
#[derive(Clone, Debug)]
pub struct BlockCensusGenerator {
    radius: u32,
}

impl Default for BlockCensusGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CENSUS_RADIUS)
    }
}

impl BlockCensusGenerator {
    pub fn new(radius: u32) -> Self {
        Self { radius }
    }

    pub fn command_count(&self, depth: u32) -> Option<u64> {
        let edge = u64::from(self.radius).checked_mul(2)?.checked_add(1)?;
        edge.checked_mul(edge)?.checked_mul(u64::from(depth))
    }
}

impl CommandGenerator for BlockCensusGenerator {
    type Commands = CensusCommands;

    fn origin(&self) -> CommandOrigin {
        CommandOrigin::Census
    }

    fn commands(&self, depth: u32) -> Result<CensusCommands, GeneratorError> {
        if self.radius > MAX_CENSUS_RADIUS {
            return Err(GeneratorError::RadiusExceeded {
                radius: self.radius,
                limit: MAX_CENSUS_RADIUS,
            });
        }
        let remaining = self
            .command_count(depth)
            .filter(|_| depth <= MAX_CENSUS_DEPTH)
            .ok_or(GeneratorError::SizeExceeded {
                size: depth,
                limit: MAX_CENSUS_DEPTH,
            })?;
        let radius = i64::from(self.radius);
        Ok(CensusCommands {
            radius,
            y: 0,
            x: -radius,
            z: -radius,
            remaining,
        })
    }
}

#[derive(Clone, Debug)]
pub struct CensusCommands {
    radius: i64,
    y: i64,
    x: i64,
    z: i64,
    remaining: u64,
}

impl Iterator for CensusCommands {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.remaining == 0 {
            return None;
        }

        let command = format!("testforblock ~{} ~{} ~{} air", self.x, self.y, self.z);

        self.z += 1;
        if self.z > self.radius {
            self.z = -self.radius;
            self.x += 1;
            if self.x > self.radius {
                self.x = -self.radius;
                self.y -= 1;
            }
        }
        self.remaining -= 1;
        Some(command)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_zero_pyramid_is_a_single_block_four_times() {
        let commands: Vec<_> = PyramidGenerator::default().commands(0).unwrap().collect();
        assert_eq!(
            commands,
            vec![
                "setblock ~0 ~0 ~0 glowstone",
                "setblock ~0 ~0 ~0 glowstone",
                "setblock ~0 ~0 ~0 glowstone",
                "setblock ~0 ~0 ~0 glowstone",
            ]
        );
    }

    #[test]
    fn pyramid_counts_follow_layer_rings() {
        let generator = PyramidGenerator::default();
        assert_eq!(generator.commands(2).unwrap().count(), 36);
        assert_eq!(generator.commands(1).unwrap().count(), 16);
        for size in 0..12 {
            let expected: u64 = (0..=size).map(|y| 4 * (2 * (size - y) + 1)).sum();
            assert_eq!(generator.commands(size as u32).unwrap().count() as u64, expected);
            assert_eq!(PyramidGenerator::command_count(size as u32), Some(expected));
        }
    }

    #[test]
    fn pyramid_base_layer_visits_each_face() {
        let generator = PyramidGenerator::new("stone");
        let commands: Vec<_> = generator.commands(1).unwrap().take(4).collect();
        assert_eq!(
            commands,
            vec![
                "setblock ~-1 ~0 ~-1 stone",
                "setblock ~-1 ~0 ~1 stone",
                "setblock ~-1 ~0 ~-1 stone",
                "setblock ~1 ~0 ~-1 stone",
            ]
        );
    }

    #[test]
    fn pyramid_layers_climb_to_the_apex() {
        let commands: Vec<_> = PyramidGenerator::default().commands(2).unwrap().collect();
        assert!(commands[..20].iter().all(|cmd| cmd.contains(" ~0 ")));
        assert!(commands[20..32].iter().all(|cmd| cmd.contains(" ~1 ")));
        assert_eq!(commands[32..].len(), 4);
        assert!(commands[32..]
            .iter()
            .all(|cmd| cmd == "setblock ~0 ~2 ~0 glowstone"));
    }

    #[test]
    fn pyramid_sequence_is_restartable() {
        let generator = PyramidGenerator::default();
        let first: Vec<_> = generator.commands(3).unwrap().collect();
        let second: Vec<_> = generator.commands(3).unwrap().collect();
        assert_eq!(first, second);

        let mut partial = generator.commands(3).unwrap();
        assert_eq!(partial.size_hint(), (64, Some(64)));
        partial.next();
        assert_eq!(partial.clone().count(), 63);
    }

    #[test]
    fn census_scans_downwards_layer_by_layer() {
        let generator = BlockCensusGenerator::new(1);
        let commands: Vec<_> = generator.commands(2).unwrap().collect();
        assert_eq!(commands.len(), 18);
        assert_eq!(commands[0], "testforblock ~-1 ~0 ~-1 air");
        assert_eq!(commands[8], "testforblock ~1 ~0 ~1 air");
        assert_eq!(commands[9], "testforblock ~-1 ~-1 ~-1 air");
        assert_eq!(commands[17], "testforblock ~1 ~-1 ~1 air");
        assert_eq!(generator.command_count(2), Some(18));
    }

    #[test]
    fn census_of_zero_depth_is_empty() {
        assert_eq!(BlockCensusGenerator::default().commands(0).unwrap().count(), 0);
    }

    #[test]
    fn largest_pyramid_is_accepted_and_larger_is_refused() {
        let generator = PyramidGenerator::default();
        let largest = generator.commands(MAX_PYRAMID_SIZE).unwrap();
        let expected = 4 * u64::from(MAX_PYRAMID_SIZE + 1).pow(2);
        assert_eq!(largest.size_hint().0 as u64, expected);

        assert_eq!(
            generator.commands(MAX_PYRAMID_SIZE + 1).unwrap_err(),
            GeneratorError::SizeExceeded {
                size: MAX_PYRAMID_SIZE + 1,
                limit: MAX_PYRAMID_SIZE,
            }
        );
        assert!(generator.commands(u32::MAX).is_err());
        assert_eq!(PyramidGenerator::command_count(u32::MAX), None);
    }

    #[test]
    fn census_bounds_refuse_oversized_sweeps() {
        let largest = BlockCensusGenerator::new(MAX_CENSUS_RADIUS);
        let edge = u64::from(2 * MAX_CENSUS_RADIUS + 1);
        assert_eq!(
            largest.commands(MAX_CENSUS_DEPTH).unwrap().size_hint().1,
            Some((u64::from(MAX_CENSUS_DEPTH) * edge * edge) as usize)
        );
        assert!(largest.commands(MAX_CENSUS_DEPTH + 1).is_err());

        let too_wide = BlockCensusGenerator::new(u32::MAX);
        assert_eq!(too_wide.command_count(u32::MAX), None);
        assert!(matches!(
            too_wide.commands(1),
            Err(GeneratorError::RadiusExceeded { .. })
        ));
    }
}
