use std::{cmp, iter::FusedIterator, num::NonZeroU32};

use nalgebra::{Point2, Vector2};

use crate::geometry::{ScreenBlock, ScreenPoint, ScreenSize};

/// Blocks are half open, `max` is excluded.
pub trait ScreenBlockExt {
    fn from_size(size: ScreenSize) -> Self;
    fn is_empty(&self) -> bool;
    fn area(&self) -> u32;
    fn contains_point(&self, p: &ScreenPoint) -> bool;
    fn internal_points(&self) -> InternalPoints;
    fn spiral_chunks(&self, chunk_size: u32) -> SpiralChunks;

    /// Order in which tiles of the image are rendered, spiraling out from the center.
    fn tile_ordering(&self, tile_size: NonZeroU32) -> Vec<ScreenBlock>;
}

impl ScreenBlockExt for ScreenBlock {
    fn from_size(size: ScreenSize) -> Self {
        ScreenBlock::new(ScreenPoint::origin(), ScreenPoint::from(size))
    }

    fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    fn area(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.width() * self.height()
        }
    }

    fn contains_point(&self, p: &ScreenPoint) -> bool {
        self.min.x <= p.x && p.x < self.max.x && self.min.y <= p.y && p.y < self.max.y
    }

    /// Create an iterator over coordinates (x, y) pairs inside the block,
    /// in C order (x changes first, then y)
    fn internal_points(&self) -> InternalPoints {
        if self.is_empty() {
            InternalPoints::empty()
        } else {
            InternalPoints {
                min_x: self.min.x,
                max: self.max,

                cursor: self.min,
            }
        }
    }

    /// Create an iterator over sub blocks in (roughly) spiral order, starting in the middle of the block.
    /// Chunks are chunk_size * chunk_size large, except on the bottom and right side of the
    /// block, where they may be clipped if chunk size doesn't evenly divide block size.
    /// Chunk size must be non zero.
    fn spiral_chunks(&self, chunk_size: u32) -> SpiralChunks {
        assert!(chunk_size > 0);

        if self.is_empty() {
            return SpiralChunks::empty();
        }

        let size = self.size().map(|x| x.div_ceil(chunk_size) as i32);
        let cursor = Point2::new(size.x / 2, size.y / 2);

        let dx = 2 * cursor.y - size.y;
        debug_assert!(dx == 0 || dx == -1);
        let direction = Vector2::new(dx, -1 - dx);

        SpiralChunks {
            block: *self,

            chunk_size,
            size,
            cursor,
            direction,

            segment: 2,
            segment_remaining: 1,
            remaining: (size.x * size.y) as u32,
        }
    }

    fn tile_ordering(&self, tile_size: NonZeroU32) -> Vec<ScreenBlock> {
        self.spiral_chunks(tile_size.get()).collect()
    }
}

#[derive(Copy, Clone, Debug)]
pub struct InternalPoints {
    min_x: u32,
    max: ScreenPoint,

    cursor: ScreenPoint,
}

impl InternalPoints {
    // Construct an iterator over internal points that returns no points
    fn empty() -> Self {
        InternalPoints {
            min_x: 1,
            max: ScreenPoint::origin(),

            cursor: ScreenPoint::origin(),
        }
    }
}

impl Iterator for InternalPoints {
    type Item = ScreenPoint;

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.y >= self.max.y {
            return None;
        }

        let ret = self.cursor;

        debug_assert!(self.cursor.x < self.max.x);
        self.cursor.x += 1;
        if self.cursor.x >= self.max.x {
            self.cursor.x = self.min_x;
            self.cursor.y += 1;
        }

        Some(ret)
    }
}

impl ExactSizeIterator for InternalPoints {
    fn len(&self) -> usize {
        if self.cursor.y >= self.max.y {
            0
        } else {
            let whole_rows =
                ScreenBlock::new(ScreenPoint::new(self.min_x, self.cursor.y + 1), self.max);
            let current_row = ScreenBlock::new(
                self.cursor,
                ScreenPoint::new(self.max.x, self.cursor.y + 1),
            );
            (whole_rows.area() + current_row.area()) as usize
        }
    }
}

impl FusedIterator for InternalPoints {}

/// Iterator over (mostly) square blocks within a rectangular box in spiral order.
/// Cursor, size and direction are in units of chunks.
#[derive(Copy, Clone, Debug)]
pub struct SpiralChunks {
    block: ScreenBlock,

    chunk_size: u32,
    size: Vector2<i32>,
    cursor: Point2<i32>,
    direction: Vector2<i32>,

    segment: u32,
    segment_remaining: i32,
    remaining: u32,
}

impl SpiralChunks {
    /// Constructs an iterator that returns no blocks.
    fn empty() -> SpiralChunks {
        SpiralChunks {
            block: ScreenBlock::new(ScreenPoint::origin(), ScreenPoint::origin()),

            chunk_size: 0,
            size: Vector2::zeros(),
            cursor: Point2::origin(),
            direction: Vector2::new(1, 0),

            segment: 0,
            segment_remaining: 0,
            remaining: 0,
        }
    }

    /// Moves to next segment of the spiral (turns 90 degrees and calculates new segment length).
    fn next_segment(&mut self) {
        self.direction = Vector2::new(self.direction.y, -self.direction.x);
        self.segment += 1;
        self.segment_remaining = (self.segment / 2) as i32;
    }

    fn cursor_inside(&self, cursor: &Point2<i32>) -> bool {
        0 <= cursor.x && cursor.x < self.size.x && 0 <= cursor.y && cursor.y < self.size.y
    }

    /// Returns a new screen block that corresponds to the current iterator position.
    fn current_block(&self) -> ScreenBlock {
        let min = self.block.min + self.cursor.coords.map(|x| x as u32) * self.chunk_size;
        let max = min + Vector2::repeat(self.chunk_size);
        let ret = ScreenBlock::new(
            min,
            ScreenPoint::new(
                cmp::min(self.block.max.x, max.x),
                cmp::min(self.block.max.y, max.y),
            ),
        );
        debug_assert!(!ret.is_empty());
        ret
    }
}

impl Iterator for SpiralChunks {
    type Item = ScreenBlock;

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let ret = self.current_block();

        if self.segment_remaining == 0 {
            self.next_segment();
        }

        let new_cursor = self.cursor + self.direction;
        self.segment_remaining -= 1;

        if self.cursor_inside(&new_cursor) {
            self.cursor = new_cursor;
        } else {
            // Got outside of the area.
            // Turn, skip the whole next segment (it would be outside the area anyway)
            // and turn again to the next segment, which is inside.
            // segment_remaining is wrong after this, but we only get here again
            // once it would matter.
            self.next_segment();
            self.cursor += self.direction * self.segment_remaining;
            self.next_segment();
        }

        self.remaining -= 1;

        Some(ret)
    }
}

impl ExactSizeIterator for SpiralChunks {
    fn len(&self) -> usize {
        self.remaining as usize
    }
}

impl FusedIterator for SpiralChunks {}
