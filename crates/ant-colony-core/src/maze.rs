use crate::config::{ObstacleLayout, SimConfig};
use crate::obstacle::Obstacle;
use rand::Rng;

/// Carving grid for a recursive-backtracker maze. `true` cells are wall.
#[derive(Clone, Debug)]
pub struct MazeGrid {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl MazeGrid {
    /// Grids narrower than this in either dimension produce no walls.
    pub const MIN_DIMENSION: usize = 5;

    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![true; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_wall(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.width + x]
    }

    fn set(&mut self, x: usize, y: usize, wall: bool) {
        self.cells[y * self.width + x] = wall;
    }

    /// Carve passages from `start` with an explicit-stack backtracker.
    pub fn carve<R: Rng + ?Sized>(&mut self, rng: &mut R, start: (usize, usize)) {
        let mut stack = vec![start];
        self.set(start.0, start.1, false);
        let mut candidates = Vec::with_capacity(4);
        while let Some(&(x, y)) = stack.last() {
            candidates.clear();
            for (dx, dy) in [(0isize, -2isize), (0, 2), (-2, 0), (2, 0)] {
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                let inside = nx > 0
                    && ny > 0
                    && nx < self.width as isize - 1
                    && ny < self.height as isize - 1;
                if inside && self.is_wall(nx as usize, ny as usize) {
                    candidates.push((nx as usize, ny as usize));
                }
            }
            if candidates.is_empty() {
                stack.pop();
                continue;
            }
            let (nx, ny) = candidates[rng.random_range(0..candidates.len())];
            self.set((x + nx) / 2, (y + ny) / 2, false);
            self.set(nx, ny, false);
            stack.push((nx, ny));
        }
    }

    /// Knock out `count` random interior cells, sometimes with their neighbours.
    pub fn add_extra_passages<R: Rng + ?Sized>(&mut self, rng: &mut R, count: usize) {
        if self.width < Self::MIN_DIMENSION || self.height < Self::MIN_DIMENSION {
            return;
        }
        for _ in 0..count {
            let x = rng.random_range(2..=self.width - 3);
            let y = rng.random_range(2..=self.height - 3);
            self.set(x, y, false);
            if rng.random_bool(0.5) {
                for (nx, ny) in [(x, y + 1), (x, y - 1), (x + 1, y), (x - 1, y)] {
                    if nx > 0 && ny > 0 && nx < self.width - 1 && ny < self.height - 1 {
                        self.set(nx, ny, false);
                    }
                }
            }
        }
    }

    /// Clear interior cells within `radius` (Euclidean, in cells) of `center`.
    pub fn clear_area(&mut self, center: (usize, usize), radius: usize) {
        let (cx, cy) = center;
        let y_range = cy.saturating_sub(radius).max(1)..(cy + radius + 1).min(self.height - 1);
        for y in y_range {
            let x_range = cx.saturating_sub(radius).max(1)..(cx + radius + 1).min(self.width - 1);
            for x in x_range {
                let dx = x as f64 - cx as f64;
                let dy = y as f64 - cy as f64;
                if dx.hypot(dy) <= radius as f64 {
                    self.set(x, y, false);
                }
            }
        }
    }

    /// Clear the two outermost rings so the perimeter is always walkable.
    pub fn clear_perimeter(&mut self) {
        for x in 0..self.width {
            for y in [0, 1, self.height - 2, self.height - 1] {
                self.set(x, y, false);
            }
        }
        for y in 0..self.height {
            for x in [0, 1, self.width - 2, self.width - 1] {
                self.set(x, y, false);
            }
        }
    }

    /// Merge wall cells into rectangles: widest run first, then extend down.
    pub fn to_obstacles(&self, offset: [f64; 2], cell_size: f64) -> Vec<Obstacle> {
        let mut visited = vec![false; self.cells.len()];
        let mut out = Vec::new();
        let free = |x: usize, y: usize, visited: &[bool]| {
            self.is_wall(x, y) && !visited[y * self.width + x]
        };
        for y in 0..self.height {
            for x in 0..self.width {
                if !free(x, y, &visited) {
                    continue;
                }
                let mut run = 0;
                while x + run < self.width && free(x + run, y, &visited) {
                    run += 1;
                }
                let mut rows = 1;
                while y + rows < self.height && (0..run).all(|dx| free(x + dx, y + rows, &visited)) {
                    rows += 1;
                }
                for vy in y..y + rows {
                    for vx in x..x + run {
                        visited[vy * self.width + vx] = true;
                    }
                }
                out.push(Obstacle::new(
                    offset[0] + x as f64 * cell_size,
                    offset[1] + y as f64 * cell_size,
                    run as f64 * cell_size,
                    rows as f64 * cell_size,
                ));
            }
        }
        out
    }
}

/// Build the obstacle layout for a world described by `config`.
pub fn generate_obstacles<R: Rng + ?Sized>(config: &SimConfig, rng: &mut R) -> Vec<Obstacle> {
    match config.obstacle_layout {
        ObstacleLayout::Empty => Vec::new(),
        ObstacleLayout::Maze => generate_maze(config, rng),
    }
}

fn generate_maze<R: Rng + ?Sized>(config: &SimConfig, rng: &mut R) -> Vec<Obstacle> {
    let cell = config.maze_cell_size;
    let odd = |n: usize| if n % 2 == 0 { n.saturating_sub(1) } else { n };
    let grid_w = odd((config.world_width / cell) as usize);
    let grid_h = odd((config.world_height / cell) as usize);
    if grid_w < MazeGrid::MIN_DIMENSION || grid_h < MazeGrid::MIN_DIMENSION {
        return Vec::new();
    }

    let mut grid = MazeGrid::new(grid_w, grid_h);
    let center = (grid_w / 2, grid_h / 2);
    let start = (center.0 | 1, center.1 | 1);
    grid.carve(rng, start);
    grid.clear_area(center, config.maze_clear_radius_cells);
    let extra = ((grid_w * grid_h) as f64 * config.maze_extra_passage_ratio) as usize;
    grid.add_extra_passages(rng, extra);
    grid.clear_perimeter();

    // Centre the grid so its middle cell sits on home.
    let offset = [
        (config.world_width - grid_w as f64 * cell) * 0.5,
        (config.world_height - grid_h as f64 * cell) * 0.5,
    ];
    grid.to_obstacles(offset, cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obstacle::ObstacleSet;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn maze(seed: u64) -> Vec<Obstacle> {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        generate_obstacles(&SimConfig::default(), &mut rng)
    }

    #[test]
    fn maze_is_deterministic_for_fixed_seed() {
        assert_eq!(maze(3), maze(3));
        assert!(!maze(3).is_empty());
    }

    #[test]
    fn maze_keeps_home_and_perimeter_clear() {
        let cfg = SimConfig::default();
        let home = cfg.home();
        let set = ObstacleSet::new(maze(11));
        let clear = cfg.maze_cell_size * 2.4;
        assert!(!set.is_colliding(home, clear));
        let margin = 2.0 * cfg.maze_cell_size;
        for o in set.obstacles() {
            assert!(o.x >= margin && o.y >= margin, "{o:?}");
            assert!(o.x + o.width <= cfg.world_width - margin + 1e-9, "{o:?}");
            assert!(o.y + o.height <= cfg.world_height - margin + 1e-9, "{o:?}");
        }
    }

    #[test]
    fn merged_rectangles_cover_each_wall_cell_once() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let mut grid = MazeGrid::new(11, 9);
        grid.carve(&mut rng, (5, 5));
        let walls = (0..9)
            .flat_map(|y| (0..11).map(move |x| (x, y)))
            .filter(|&(x, y)| grid.is_wall(x, y))
            .count();
        let area: f64 = grid
            .to_obstacles([0.0, 0.0], 1.0)
            .iter()
            .map(|o| o.width * o.height)
            .sum();
        assert_eq!(area as usize, walls);
    }

    #[test]
    fn tiny_world_has_no_maze() {
        let cfg = SimConfig {
            world_width: 200.0,
            world_height: 200.0,
            ..SimConfig::default()
        };
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        assert!(generate_obstacles(&cfg, &mut rng).is_empty());
    }

    #[test]
    fn empty_layout_has_no_walls() {
        let cfg = SimConfig {
            obstacle_layout: ObstacleLayout::Empty,
            ..SimConfig::default()
        };
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        assert!(generate_obstacles(&cfg, &mut rng).is_empty());
    }
}
