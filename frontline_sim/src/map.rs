use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use sim_schema::{PlayerId, TileRef};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TileFlags: u8 {
        const LAND = 0b0001;
        const OCEAN = 0b0010;
        const FALLOUT = 0b0100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terrain {
    Land,
    Ocean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn center(&self) -> (u32, u32) {
        ((self.min_x + self.max_x) / 2, (self.min_y + self.max_y) / 2)
    }
}

/// Tile grid with terrain, elevation, ownership and fallout per cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMap {
    width: u32,
    height: u32,
    flags: Vec<TileFlags>,
    elevation: Vec<u8>,
    owners: Vec<Option<PlayerId>>,
    land_tiles: usize,
    fallout_land_tiles: usize,
}

impl GameMap {
    pub fn from_fn<F>(width: u32, height: u32, mut terrain: F) -> Self
    where
        F: FnMut(u32, u32) -> (Terrain, u8),
    {
        let size = (width * height) as usize;
        let mut flags = Vec::with_capacity(size);
        let mut elevation = Vec::with_capacity(size);
        let mut land_tiles = 0;
        for y in 0..height {
            for x in 0..width {
                let (kind, height_value) = terrain(x, y);
                match kind {
                    Terrain::Land => {
                        land_tiles += 1;
                        flags.push(TileFlags::LAND);
                    }
                    Terrain::Ocean => flags.push(TileFlags::OCEAN),
                }
                elevation.push(height_value);
            }
        }
        Self {
            width,
            height,
            flags,
            elevation,
            owners: vec![None; size],
            land_tiles,
            fallout_land_tiles: 0,
        }
    }

    /// All-land map with flat elevation.
    pub fn plains(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| (Terrain::Land, 0))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_count(&self) -> usize {
        self.flags.len()
    }

    pub fn is_valid_coord(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width) && y < i64::from(self.height)
    }

    pub fn ref_at(&self, x: i64, y: i64) -> Option<TileRef> {
        if !self.is_valid_coord(x, y) {
            return None;
        }
        Some(TileRef(y as u32 * self.width + x as u32))
    }

    pub fn x(&self, tile: TileRef) -> u32 {
        tile.0 % self.width
    }

    pub fn y(&self, tile: TileRef) -> u32 {
        tile.0 / self.width
    }

    pub fn manhattan(&self, a: TileRef, b: TileRef) -> u32 {
        self.x(a).abs_diff(self.x(b)) + self.y(a).abs_diff(self.y(b))
    }

    pub fn euclidean_sq(&self, a: TileRef, b: TileRef) -> u64 {
        let dx = u64::from(self.x(a).abs_diff(self.x(b)));
        let dy = u64::from(self.y(a).abs_diff(self.y(b)));
        dx * dx + dy * dy
    }

    pub fn euclidean(&self, a: TileRef, b: TileRef) -> f64 {
        (self.euclidean_sq(a, b) as f64).sqrt()
    }

    /// Four-neighbourhood in fixed order: up, left, right, down.
    pub fn neighbors(&self, tile: TileRef) -> impl Iterator<Item = TileRef> + '_ {
        let x = i64::from(self.x(tile));
        let y = i64::from(self.y(tile));
        [(x, y - 1), (x - 1, y), (x + 1, y), (x, y + 1)]
            .into_iter()
            .filter_map(move |(nx, ny)| self.ref_at(nx, ny))
    }

    fn flags(&self, tile: TileRef) -> TileFlags {
        self.flags
            .get(tile.0 as usize)
            .copied()
            .unwrap_or(TileFlags::empty())
    }

    pub fn is_land(&self, tile: TileRef) -> bool {
        self.flags(tile).contains(TileFlags::LAND)
    }

    pub fn is_ocean(&self, tile: TileRef) -> bool {
        self.flags(tile).contains(TileFlags::OCEAN)
    }

    /// Land tile touching the ocean.
    pub fn is_ocean_shore(&self, tile: TileRef) -> bool {
        self.is_land(tile) && self.neighbors(tile).any(|n| self.is_ocean(n))
    }

    pub fn has_fallout(&self, tile: TileRef) -> bool {
        self.flags(tile).contains(TileFlags::FALLOUT)
    }

    pub(crate) fn set_fallout(&mut self, tile: TileRef, fallout: bool) {
        let Some(flags) = self.flags.get_mut(tile.0 as usize) else {
            return;
        };
        if flags.contains(TileFlags::LAND) && flags.contains(TileFlags::FALLOUT) != fallout {
            if fallout {
                self.fallout_land_tiles += 1;
            } else {
                self.fallout_land_tiles -= 1;
            }
        }
        flags.set(TileFlags::FALLOUT, fallout);
    }

    pub fn elevation(&self, tile: TileRef) -> u8 {
        self.elevation.get(tile.0 as usize).copied().unwrap_or(0)
    }

    pub fn owner(&self, tile: TileRef) -> Option<PlayerId> {
        self.owners.get(tile.0 as usize).copied().flatten()
    }

    pub fn has_owner(&self, tile: TileRef) -> bool {
        self.owner(tile).is_some()
    }

    pub(crate) fn set_owner(&mut self, tile: TileRef, owner: Option<PlayerId>) {
        if let Some(slot) = self.owners.get_mut(tile.0 as usize) {
            *slot = owner;
        }
    }

    pub fn num_land_tiles(&self) -> usize {
        self.land_tiles
    }

    /// Land tiles carrying fallout; kept current by `set_fallout`.
    pub fn num_fallout_tiles(&self) -> usize {
        self.fallout_land_tiles
    }

    /// Tiles within `radius` manhattan distance of `center`, in index order.
    pub fn tiles_within_manhattan(&self, center: TileRef, radius: u32) -> Vec<TileRef> {
        let cx = i64::from(self.x(center));
        let cy = i64::from(self.y(center));
        let r = i64::from(radius);
        let mut tiles = Vec::new();
        for y in (cy - r)..=(cy + r) {
            let span = r - (y - cy).abs();
            for x in (cx - span)..=(cx + span) {
                if let Some(tile) = self.ref_at(x, y) {
                    tiles.push(tile);
                }
            }
        }
        tiles
    }

    pub fn bounding_box<I>(&self, tiles: I) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = TileRef>,
    {
        let mut bounds: Option<BoundingBox> = None;
        for tile in tiles {
            let (x, y) = (self.x(tile), self.y(tile));
            bounds = Some(match bounds {
                None => BoundingBox {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                },
                Some(b) => BoundingBox {
                    min_x: b.min_x.min(x),
                    min_y: b.min_y.min(y),
                    max_x: b.max_x.max(x),
                    max_y: b.max_y.max(y),
                },
            });
        }
        bounds
    }

    /// Closest candidate to `target` by manhattan distance; ties keep the
    /// earliest candidate.
    pub fn closest_tile<I>(&self, candidates: I, target: TileRef) -> Option<(TileRef, u32)>
    where
        I: IntoIterator<Item = TileRef>,
    {
        let mut best: Option<(TileRef, u32)> = None;
        for tile in candidates {
            let distance = self.manhattan(tile, target);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((tile, distance));
            }
        }
        best
    }

    /// Closest pair `(a, b)` across the two sets by manhattan distance.
    pub fn closest_two_tiles(&self, from: &[TileRef], to: &[TileRef]) -> Option<(TileRef, TileRef)> {
        let mut best: Option<(TileRef, TileRef, u32)> = None;
        for &a in from {
            for &b in to {
                let distance = self.manhattan(a, b);
                if best.map_or(true, |(_, _, d)| distance < d) {
                    best = Some((a, b, distance));
                }
            }
        }
        best.map(|(a, b, _)| (a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn island() -> GameMap {
        GameMap::from_fn(10, 10, |x, y| {
            if (2..8).contains(&x) && (2..8).contains(&y) {
                (Terrain::Land, if x == 5 && y == 5 { 250 } else { 10 })
            } else {
                (Terrain::Ocean, 0)
            }
        })
    }

    #[test]
    fn coordinates_and_distances() {
        let map = island();
        let a = map.ref_at(2, 3).expect("valid");
        let b = map.ref_at(5, 7).expect("valid");
        assert_eq!((map.x(a), map.y(a)), (2, 3));
        assert_eq!(map.manhattan(a, b), 7);
        assert_eq!(map.euclidean_sq(a, b), 25);
        assert!(map.ref_at(-1, 0).is_none());
        assert!(map.ref_at(10, 0).is_none());
    }

    #[test]
    fn shore_detection_and_land_count() {
        let map = island();
        assert_eq!(map.num_land_tiles(), 36);
        let edge = map.ref_at(2, 4).expect("valid");
        let inland = map.ref_at(4, 4).expect("valid");
        assert!(map.is_ocean_shore(edge));
        assert!(!map.is_ocean_shore(inland));
        assert_eq!(map.elevation(map.ref_at(5, 5).expect("valid")), 250);
    }

    #[test]
    fn manhattan_ball_matches_distance() {
        let map = GameMap::plains(20, 20);
        let center = map.ref_at(10, 10).expect("valid");
        let ball = map.tiles_within_manhattan(center, 3);
        assert_eq!(ball.len(), 25);
        assert!(ball.iter().all(|&t| map.manhattan(t, center) <= 3));
        let corner = map.ref_at(0, 0).expect("valid");
        assert_eq!(map.tiles_within_manhattan(corner, 1).len(), 3);
    }

    #[test]
    fn fallout_counts_only_land() {
        let mut map = island();
        let land = map.ref_at(3, 3).expect("valid");
        let sea = map.ref_at(0, 0).expect("valid");
        map.set_fallout(land, true);
        map.set_fallout(sea, true);
        assert_eq!(map.num_fallout_tiles(), 1);
        map.set_fallout(land, true);
        assert_eq!(map.num_fallout_tiles(), 1, "repeat strikes count once");
        map.set_fallout(land, false);
        assert_eq!(map.num_fallout_tiles(), 0);
    }

    #[test]
    fn bounding_box_spans_the_given_tiles() {
        let map = island();
        assert_eq!(map.bounding_box(std::iter::empty::<TileRef>()), None);
        let tiles = [(3, 6), (7, 2), (5, 4)].map(|(x, y)| map.ref_at(x, y).expect("tile"));
        let bounds = map.bounding_box(tiles).expect("bounds");
        assert_eq!(
            bounds,
            BoundingBox {
                min_x: 3,
                min_y: 2,
                max_x: 7,
                max_y: 6,
            }
        );
        assert_eq!(bounds.center(), (5, 4));
    }
}
