use crate::error::{Error, Result};

/// Row-major flat grid. No per-cell objects, f32 friendly.
/// Bounded topology: cells past an edge do not exist.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    pub data: Vec<T>,
    pub w: usize,
    pub h: usize,
}

/// Elevation samples, one per cell.
pub type ElevationGrid = Grid<f32>;

/// Smallest accepted dimension: at least one interior cell.
pub const MIN_DIM: usize = 3;

impl<T: Copy + Default> Grid<T> {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            data: vec![T::default(); w * h],
            w,
            h,
        }
    }

    pub fn filled(w: usize, h: usize, v: T) -> Self {
        Self {
            data: vec![v; w * h],
            w,
            h,
        }
    }

    /// Wrap an existing row-major buffer.
    pub fn from_vec(w: usize, h: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != w * h {
            return Err(Error::InvalidInputShape {
                width: w,
                height: h,
                reason: format!("buffer holds {} samples, expected {}", data.len(), w * h),
            });
        }
        Ok(Self { data, w, h })
    }

    /// Build from rows (`rows[y][x]`), handy for small literal maps.
    pub fn from_rows(rows: &[&[T]]) -> Result<Self> {
        let h = rows.len();
        let w = rows.first().map_or(0, |r| r.len());
        if let Some(bad) = rows.iter().find(|r| r.len() != w) {
            return Err(Error::InvalidInputShape {
                width: w,
                height: h,
                reason: format!("ragged rows: {} vs {}", bad.len(), w),
            });
        }
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Ok(Self { data, w, h })
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.w && y < self.h);
        y * self.w + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: T) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    #[inline]
    pub fn is_border(&self, x: usize, y: usize) -> bool {
        x == 0 || y == 0 || x == self.w - 1 || y == self.h - 1
    }
}

/// Reject grids the traversal cannot work on: fewer than 3 cells along
/// either axis, or more cells than a `u32` count can hold.
pub fn check_shape(w: usize, h: usize) -> Result<()> {
    if w < MIN_DIM || h < MIN_DIM {
        return Err(Error::InvalidInputShape {
            width: w,
            height: h,
            reason: format!("both dimensions must be at least {MIN_DIM}"),
        });
    }
    if w.checked_mul(h).is_none_or(|n| n > u32::MAX as usize) {
        return Err(Error::InvalidInputShape {
            width: w,
            height: h,
            reason: "cell count does not fit in 32 bits".into(),
        });
    }
    Ok(())
}

/// Cardinal directions in child-mask bit order: W, N, E, S.
pub const DIRS4: [(i32, i32); 4] = [(-1, 0), (0, -1), (1, 0), (0, 1)];

/// Neighbour of `(x, y)` in direction `d` (index into `DIRS4`), if inside the grid.
#[inline]
pub fn step(x: usize, y: usize, d: usize, w: usize, h: usize) -> Option<(usize, usize)> {
    let (dx, dy) = DIRS4[d];
    let nx = x as i32 + dx;
    let ny = y as i32 + dy;
    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
        return None;
    }
    Some((nx as usize, ny as usize))
}

/// 4-connected neighbors, clipped at the edges.
pub fn neighbors4(x: usize, y: usize, w: usize, h: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..4).filter_map(move |d| step(x, y, d, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_has_two_neighbors() {
        let n: Vec<_> = neighbors4(0, 0, 4, 3).collect();
        assert_eq!(n, vec![(1, 0), (0, 1)]);
        assert_eq!(neighbors4(1, 1, 4, 3).count(), 4);
        assert_eq!(neighbors4(3, 2, 4, 3).count(), 2);
    }

    #[test]
    fn step_follows_bit_order() {
        assert_eq!(step(1, 1, 0, 3, 3), Some((0, 1)));
        assert_eq!(step(1, 1, 1, 3, 3), Some((1, 0)));
        assert_eq!(step(1, 1, 2, 3, 3), Some((2, 1)));
        assert_eq!(step(1, 1, 3, 3, 3), Some((1, 2)));
        assert_eq!(step(2, 2, 2, 3, 3), None);
    }

    #[test]
    fn shape_limits() {
        assert!(check_shape(3, 3).is_ok());
        assert!(matches!(check_shape(2, 5), Err(Error::InvalidInputShape { .. })));
        assert!(matches!(check_shape(5, 0), Err(Error::InvalidInputShape { .. })));
    }

    #[test]
    fn from_rows_is_row_major() {
        let g = Grid::from_rows(&[&[1, 2, 3][..], &[4, 5, 6][..]]).unwrap();
        assert_eq!((g.w, g.h), (3, 2));
        assert_eq!(g.get(2, 1), 6);
        assert!(Grid::from_rows(&[&[1, 2][..], &[3][..]]).is_err());
        assert!(Grid::<u8>::from_vec(2, 2, vec![0; 3]).is_err());
    }
}
