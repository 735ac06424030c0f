use std::fmt;

/// Fixed spatial dimension (2D).
pub const DIM: usize = 2;

/// Half of the box a particle was packed into at t = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Origin side encoded in the low bit of a particle id (even = left, odd = right).
    #[inline]
    pub fn from_id(id: i32) -> Self {
        if id & 1 == 0 {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Deterministic id of the `index`-th particle packed on this side.
    #[inline]
    pub fn particle_id(self, index: usize) -> i32 {
        let base = 2 * index as i32;
        match self {
            Side::Left => base,
            Side::Right => base + 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// A disc particle in D=2. All particles of an experiment share radius and (unit) mass,
/// which live on `ExperimentSettings`, so the value itself is just kinematics.
///
/// Fields:
/// - `id`: stable identifier; `id & 1` is the origin side
/// - `r`: position vector [x, y]
/// - `v`: velocity vector [vx, vy]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Stable particle identifier.
    pub id: i32,
    /// Position (x, y).
    pub r: [f64; DIM],
    /// Velocity (vx, vy).
    pub v: [f64; DIM],
}

impl Particle {
    pub fn new(id: i32, r: [f64; DIM], v: [f64; DIM]) -> Self {
        Self { id, r, v }
    }

    /// Side of the box this particle was packed into.
    #[inline]
    pub fn origin(&self) -> Side {
        Side::from_id(self.id)
    }

    /// Copy of this particle moved to `r`.
    #[inline]
    #[must_use]
    pub fn with_position(self, r: [f64; DIM]) -> Self {
        Self { r, ..self }
    }

    /// Copy of this particle with velocity `v`.
    #[inline]
    #[must_use]
    pub fn with_velocity(self, v: [f64; DIM]) -> Self {
        Self { v, ..self }
    }

    /// Speed |v|.
    #[inline]
    pub fn speed(&self) -> f64 {
        self.v[0].hypot(self.v[1])
    }

    /// Kinetic energy for unit mass: 1/2 |v|^2.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        let vsq: f64 = self.v.iter().map(|&c| c * c).sum();
        0.5 * vsq
    }

    /// Squared center distance to `other`.
    #[inline]
    pub fn distance_sq(&self, other: &Particle) -> f64 {
        let dx = self.r[0] - other.r[0];
        let dy = self.r[1] - other.r[1];
        dx * dx + dy * dy
    }

    /// True when the two discs of radius `radius` intersect.
    #[inline]
    pub fn overlaps(&self, other: &Particle, radius: f64) -> bool {
        self.distance_sq(other) < 4.0 * radius * radius
    }

    /// True when the relative velocity along the line of centers is closing.
    #[inline]
    pub fn approaches(&self, other: &Particle) -> bool {
        let dr = [self.r[0] - other.r[0], self.r[1] - other.r[1]];
        let dv = [self.v[0] - other.v[0], self.v[1] - other.v[1]];
        dr[0] * dv[0] + dr[1] * dv[1] < 0.0
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.r.iter().chain(self.v.iter()).all(|x| x.is_finite())
    }
}

impl fmt::Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Particle (id: {:6}, pos: ({:6.2}; {:6.2}), velocity: ({:6.2}; {:6.2}))",
            self.id, self.r[0], self.r[1], self.v[0], self.v[1]
        )
    }
}
