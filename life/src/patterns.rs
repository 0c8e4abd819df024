/// Classic Game of Life patterns, usable as an alternative to random seeding

#[derive(Debug, PartialEq, Eq)]
pub struct Pattern {
    pub name: &'static str,
    /// Live cells as (x, y) offsets from the pattern's top-left corner.
    pub cells: &'static [(usize, usize)],
}

impl Pattern {
    /// Size of the pattern's bounding box.
    pub fn extent(&self) -> (usize, usize) {
        self.cells
            .iter()
            .fold((0, 0), |(w, h), &(x, y)| (w.max(x + 1), h.max(y + 1)))
    }

    /// Top-left corner that centres the pattern on a `width` x `height`
    /// grid. Patterns larger than the grid are anchored at the origin.
    pub fn centred_origin(&self, width: usize, height: usize) -> (usize, usize) {
        let (w, h) = self.extent();
        (width.saturating_sub(w) / 2, height.saturating_sub(h) / 2)
    }
}

/// Still life
pub const BLOCK: Pattern = Pattern {
    name: "block",
    cells: &[(0, 0), (1, 0), (0, 1), (1, 1)],
};

/// Period 2
pub const BLINKER: Pattern = Pattern {
    name: "blinker",
    // ***
    cells: &[(0, 0), (1, 0), (2, 0)],
};

/// Period 2
pub const TOAD: Pattern = Pattern {
    name: "toad",
    //  ***
    // ***
    cells: &[
        (1, 0), (2, 0), (3, 0),
        (0, 1), (1, 1), (2, 1),
    ],
};

/// Period 2
pub const BEACON: Pattern = Pattern {
    name: "beacon",
    // **
    // *
    //    *
    //   **
    cells: &[
        (0, 0), (1, 0),
        (0, 1),
        (3, 2),
        (2, 3), (3, 3),
    ],
};

/// Travels one cell diagonally (down and right) every 4 generations
pub const GLIDER: Pattern = Pattern {
    name: "glider",
    //  *
    //   *
    // ***
    cells: &[
        (1, 0),
        (2, 1),
        (0, 2), (1, 2), (2, 2),
    ],
};

/// Lightweight spaceship, travels horizontally two cells every 4 generations
pub const LWSS: Pattern = Pattern {
    name: "lwss",
    // *  *
    //     *
    // *   *
    //  ****
    cells: &[
        (0, 0), (3, 0),
        (4, 1),
        (0, 2), (4, 2),
        (1, 3), (2, 3), (3, 3), (4, 3),
    ],
};

/// Period 3
pub const PULSAR: Pattern = Pattern {
    name: "pulsar",
    cells: &[
        (2, 0), (3, 0), (4, 0), (8, 0), (9, 0), (10, 0),
        (0, 2), (5, 2), (7, 2), (12, 2),
        (0, 3), (5, 3), (7, 3), (12, 3),
        (0, 4), (5, 4), (7, 4), (12, 4),
        (2, 5), (3, 5), (4, 5), (8, 5), (9, 5), (10, 5),
        (2, 7), (3, 7), (4, 7), (8, 7), (9, 7), (10, 7),
        (0, 8), (5, 8), (7, 8), (12, 8),
        (0, 9), (5, 9), (7, 9), (12, 9),
        (0, 10), (5, 10), (7, 10), (12, 10),
        (2, 12), (3, 12), (4, 12), (8, 12), (9, 12), (10, 12),
    ],
};

pub const PATTERNS: &[Pattern] = &[BLOCK, BLINKER, TOAD, BEACON, GLIDER, LWSS, PULSAR];

/// Look a pattern up by name, ignoring case.
pub fn find(name: &str) -> Option<&'static Pattern> {
    PATTERNS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}
