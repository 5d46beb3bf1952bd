//! Geometry for the tiled set of a desktop.
//!
//! Everything here is a pure function of the ordered window list and the
//! desktop's tunables. Rectangles are outer cells: they include the border,
//! which the caller subtracts when it configures the window.

/// Smallest width or height a resize action may leave a tiled window with.
pub const MIN_WINDOW_SIZE: i32 = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayoutMode {
    #[default]
    Tile,
    Monocycle,
    Bstack,
    Grid,
}

impl LayoutMode {
    /// Position in the status feed's layout table.
    pub fn index(self) -> usize {
        match self {
            LayoutMode::Tile => 0,
            LayoutMode::Monocycle => 1,
            LayoutMode::Bstack => 2,
            LayoutMode::Grid => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowGeometry {
    pub x_coordinate: i32,
    pub y_coordinate: i32,
    pub width: i32,
    pub height: i32,
}

impl WindowGeometry {
    pub const fn new(x_coordinate: i32, y_coordinate: i32, width: i32, height: i32) -> Self {
        Self {
            x_coordinate,
            y_coordinate,
            width,
            height,
        }
    }

    /// Inner size once a border of `border` pixels is drawn around the cell.
    pub fn inner(self, border: u32) -> (u32, u32) {
        let border = border as i32 * 2;
        (
            (self.width - border).max(1) as u32,
            (self.height - border).max(1) as u32,
        )
    }

    pub fn right(self) -> i32 {
        self.x_coordinate + self.width
    }

    pub fn bottom(self) -> i32 {
        self.y_coordinate + self.height
    }

    pub fn intersects(self, other: WindowGeometry) -> bool {
        self.x_coordinate < other.right()
            && other.x_coordinate < self.right()
            && self.y_coordinate < other.bottom()
            && other.y_coordinate < self.bottom()
    }

    pub fn contains(self, other: WindowGeometry) -> bool {
        other.x_coordinate >= self.x_coordinate
            && other.y_coordinate >= self.y_coordinate
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LayoutParams {
    /// Usable screen area (panel already excluded).
    pub area: WindowGeometry,
    pub mode: LayoutMode,
    pub master_size: i32,
    pub growth: i32,
}

pub fn clamp(value: i32, min: i32, max: i32) -> i32 {
    if min > max {
        return (min + max) / 2;
    }
    value.max(min).min(max)
}

/// Master size bounded so both the master and the stack keep
/// [`MIN_WINDOW_SIZE`] along `total`.
pub fn clamp_master(master_size: i32, total: i32) -> i32 {
    clamp(master_size, MIN_WINDOW_SIZE, total - MIN_WINDOW_SIZE)
}

/// Master dimension for `mode`: BSTACK splits vertically, the others
/// horizontally.
pub fn master_extent(mode: LayoutMode, area: WindowGeometry) -> i32 {
    match mode {
        LayoutMode::Bstack => area.height,
        _ => area.width,
    }
}

/// Growth bounded so every cell it touches keeps [`MIN_WINDOW_SIZE`].
pub fn clamp_growth(mode: LayoutMode, area: WindowGeometry, count: usize, growth: i32) -> i32 {
    match mode {
        LayoutMode::Tile | LayoutMode::Monocycle => {
            clamp_stack_growth(growth, area.height, count.saturating_sub(1))
        }
        LayoutMode::Bstack => clamp_stack_growth(growth, area.width, count.saturating_sub(1)),
        LayoutMode::Grid if (3..=4).contains(&count) => {
            let half = area.height / 2;
            if half <= MIN_WINDOW_SIZE {
                return 0;
            }
            clamp(growth, MIN_WINDOW_SIZE - half, area.height - half - MIN_WINDOW_SIZE)
        }
        LayoutMode::Grid => 0,
    }
}

fn clamp_stack_growth(growth: i32, total: i32, stacked: usize) -> i32 {
    if stacked < 2 {
        return 0;
    }
    let stacked = stacked as i32;
    let base = total / stacked;
    if base <= MIN_WINDOW_SIZE {
        return 0;
    }
    // The last cell absorbs rounding, which can cost it up to stacked - 2 pixels.
    let upper = ((base - MIN_WINDOW_SIZE - (stacked - 2)) * (stacked - 1)).max(0);
    clamp(growth, MIN_WINDOW_SIZE - base, upper)
}

/// Assigns a cell to every window, in list order.
pub fn arrange<W: Copy>(windows: &[W], params: &LayoutParams) -> Vec<(W, WindowGeometry)> {
    let area = params.area;
    let cells = match windows.len() {
        0 => Vec::new(),
        1 => vec![area],
        count => match params.mode {
            LayoutMode::Monocycle => vec![area; count],
            LayoutMode::Tile => tile(area, count, params),
            LayoutMode::Bstack => bstack(area, count, params),
            LayoutMode::Grid => grid(area, count, params),
        },
    };

    windows.iter().copied().zip(cells).collect()
}

/// Splits `total` into `stacked` runs: the first grows by `growth`, the rest
/// shrink by `growth / (stacked - 1)` and the last absorbs the remainder.
fn stack_runs(total: i32, stacked: i32, growth: i32) -> Vec<i32> {
    let base = total / stacked;
    let mut runs = Vec::with_capacity(stacked as usize);
    if stacked == 1 {
        runs.push(total);
        return runs;
    }

    let shrink = growth / (stacked - 1);
    runs.push(base + growth);
    for _ in 2..stacked {
        runs.push(base - shrink);
    }
    let used: i32 = runs.iter().sum();
    runs.push(total - used);
    runs
}

fn tile(area: WindowGeometry, count: usize, params: &LayoutParams) -> Vec<WindowGeometry> {
    let master = clamp_master(params.master_size, area.width);
    let growth = clamp_growth(LayoutMode::Tile, area, count, params.growth);
    let stack_x = area.x_coordinate + master;
    let stack_width = area.width - master;

    let mut cells = vec![WindowGeometry::new(
        area.x_coordinate,
        area.y_coordinate,
        master,
        area.height,
    )];
    let mut y = area.y_coordinate;
    for height in stack_runs(area.height, count as i32 - 1, growth) {
        cells.push(WindowGeometry::new(stack_x, y, stack_width, height));
        y += height;
    }
    cells
}

fn bstack(area: WindowGeometry, count: usize, params: &LayoutParams) -> Vec<WindowGeometry> {
    let master = clamp_master(params.master_size, area.height);
    let growth = clamp_growth(LayoutMode::Bstack, area, count, params.growth);
    let stack_y = area.y_coordinate + master;
    let stack_height = area.height - master;

    let mut cells = vec![WindowGeometry::new(
        area.x_coordinate,
        area.y_coordinate,
        area.width,
        master,
    )];
    let mut x = area.x_coordinate;
    for width in stack_runs(area.width, count as i32 - 1, growth) {
        cells.push(WindowGeometry::new(x, stack_y, width, stack_height));
        x += width;
    }
    cells
}

fn grid(area: WindowGeometry, count: usize, params: &LayoutParams) -> Vec<WindowGeometry> {
    if count <= 4 {
        return grid_two_columns(area, count, params);
    }

    let columns = 3;
    let rows = count.div_ceil(columns) as i32;
    let column_width = area.width / columns as i32;
    let row_height = area.height / rows;

    (0..count)
        .map(|index| {
            let row = (index / columns) as i32;
            let column = (index % columns) as i32;
            let x = column * column_width;
            let width = if index == count - 1 || column == columns as i32 - 1 {
                area.width - x
            } else {
                column_width
            };
            let height = if row == rows - 1 {
                area.height - row * row_height
            } else {
                row_height
            };
            WindowGeometry::new(
                area.x_coordinate + x,
                area.y_coordinate + row * row_height,
                width,
                height,
            )
        })
        .collect()
}

fn grid_two_columns(area: WindowGeometry, count: usize, params: &LayoutParams) -> Vec<WindowGeometry> {
    let master = clamp_master(params.master_size, area.width);
    let right_x = area.x_coordinate + master;
    let right_width = area.width - master;

    if count == 2 {
        return vec![
            WindowGeometry::new(area.x_coordinate, area.y_coordinate, master, area.height),
            WindowGeometry::new(right_x, area.y_coordinate, right_width, area.height),
        ];
    }

    let growth = clamp_growth(LayoutMode::Grid, area, count, params.growth);
    let top = area.height / 2 + growth;
    let bottom = area.height - top;
    let lower_y = area.y_coordinate + top;

    let mut cells = vec![
        WindowGeometry::new(area.x_coordinate, area.y_coordinate, master, top),
        WindowGeometry::new(right_x, area.y_coordinate, right_width, top),
    ];
    if count == 3 {
        cells.push(WindowGeometry::new(area.x_coordinate, lower_y, area.width, bottom));
    } else {
        cells.push(WindowGeometry::new(area.x_coordinate, lower_y, master, bottom));
        cells.push(WindowGeometry::new(right_x, lower_y, right_width, bottom));
    }
    cells
}
