use twinbrot_core::INTERIOR;

use crate::tile::Tile;

/// One byte per pixel: 255 marks interior points, `0..=254` escape speed.
///
/// This is what backends produce and what the surface caches, so colour
/// changes can be reapplied without recomputing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayField {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayField {
    /// A field with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    pub fn from_data(width: u32, height: u32, data: Vec<u8>) -> crate::Result<Self> {
        if data.len() != width as usize * height as usize {
            return Err(crate::RenderError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Escape-speed values only, skipping the interior marker.
    pub fn escaped_values(&self) -> impl Iterator<Item = u8> + '_ {
        self.data.iter().copied().filter(|&v| v != INTERIOR)
    }

    /// Copy a tile's samples into place.
    pub fn blit_tile(&mut self, tile: &Tile, tile_data: &[u8]) {
        debug_assert_eq!(tile_data.len(), tile.pixel_count());
        let stride = self.width as usize;
        let tw = tile.width as usize;
        for row in 0..tile.height as usize {
            let dst = (tile.y as usize + row) * stride + tile.x as usize;
            let src = row * tw;
            self.data[dst..dst + tw].copy_from_slice(&tile_data[src..src + tw]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blit_tile_writes_correct_region() {
        let mut field = GrayField::filled(8, 8, 0);
        let tile = Tile {
            x: 2,
            y: 1,
            width: 3,
            height: 2,
        };
        field.blit_tile(&tile, &[9; 6]);
        assert_eq!(field.get(2, 1), 9);
        assert_eq!(field.get(4, 2), 9);
        assert_eq!(field.get(5, 2), 0);
        assert_eq!(field.get(2, 3), 0);
    }

    #[test]
    fn length_is_checked() {
        assert!(GrayField::from_data(4, 4, vec![0; 15]).is_err());
        assert!(GrayField::from_data(4, 4, vec![0; 16]).is_ok());
    }

    #[test]
    fn escaped_values_skip_interior() {
        let field = GrayField::from_data(2, 2, vec![0, 255, 17, 255]).unwrap();
        assert_eq!(field.escaped_values().collect::<Vec<_>>(), vec![0, 17]);
    }
}
