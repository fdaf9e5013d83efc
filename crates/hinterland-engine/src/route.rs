//! Scripted player movement.

use hinterland_common::WorldCoord;

/// Walks the player through a looping list of waypoints.
#[derive(Debug, Clone)]
pub struct RouteWalker {
    waypoints: Vec<WorldCoord>,
    next: usize,
    x: f64,
    y: f64,
}

impl RouteWalker {
    /// Starts at the first waypoint, heading for the second.
    pub fn new(route: &[[i64; 2]]) -> Self {
        let waypoints: Vec<WorldCoord> = if route.is_empty() {
            vec![WorldCoord::new(0, 0)]
        } else {
            route.iter().map(|&[x, y]| WorldCoord::new(x, y)).collect()
        };
        let start = waypoints[0];
        Self {
            next: 1 % waypoints.len(),
            x: start.x as f64,
            y: start.y as f64,
            waypoints,
        }
    }

    /// Current position, rounded down to whole pixels.
    pub fn position(&self) -> WorldCoord {
        WorldCoord::new(self.x.floor() as i64, self.y.floor() as i64)
    }

    /// Moves `distance` pixels along the route, turning at waypoints.
    pub fn advance(&mut self, distance: f64) -> WorldCoord {
        let mut remaining = distance.max(0.0);
        // A route with a single point, or of zero length, never moves.
        let mut stalled = 0;
        while remaining > 0.0 && stalled < self.waypoints.len() {
            let target = self.waypoints[self.next];
            let dx = target.x as f64 - self.x;
            let dy = target.y as f64 - self.y;
            let gap = dx.hypot(dy);

            if gap <= remaining {
                self.x = target.x as f64;
                self.y = target.y as f64;
                remaining -= gap;
                self.next = (self.next + 1) % self.waypoints.len();
                stalled = if gap == 0.0 { stalled + 1 } else { 0 };
            } else {
                self.x += dx / gap * remaining;
                self.y += dy / gap * remaining;
                remaining = 0.0;
            }
        }
        self.position()
    }
}
