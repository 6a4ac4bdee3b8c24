//! Terminal rendering of the filter state.
//!
//! Draws the bounded region as a character grid with one colored
//! marker per tracked quantity and a coarse covariance box scaled from
//! the diagonal entries only (not a full covariance ellipse, same
//! simplification as the covariance rectangles in the key). Consumes
//! read-only snapshots; never touches the core.

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

use crate::filters::wall_kf::FilterSnapshot;
use crate::types::Vec2;

pub const TRUE_COLOR: Color = Color::Red;
pub const PREDICTED_COLOR: Color = Color::Blue;
pub const MEASUREMENT_COLOR: Color = Color::Yellow;
pub const CORRECTED_COLOR: Color = Color::Green;
const GRID_COLOR: Color = Color::DarkGrey;

const KEY_LINES: [(&str, Color); 4] = [
    ("True state", TRUE_COLOR),
    ("Prediction pre-measurement", PREDICTED_COLOR),
    ("Measurement", MEASUREMENT_COLOR),
    ("Final prediction and covariance box", CORRECTED_COLOR),
];

pub struct Display {
    cols: u16,
    rows: u16,
    walls: Vec2,
}

impl Display {
    pub fn new(walls: Vec2, cols: u16, rows: u16) -> Self {
        Self {
            cols: cols.max(2),
            rows: rows.max(2),
            walls,
        }
    }

    /// Size the grid from the current terminal, keeping the last row
    /// free for the status line.
    pub fn fit_terminal(walls: Vec2) -> io::Result<Self> {
        let (cols, rows) = crossterm::terminal::size()?;
        Ok(Self::new(walls, cols, rows.saturating_sub(1)))
    }

    /// Map world coordinates to a terminal cell. The y axis is
    /// inverted (terminal row 0 is the top wall) and positions outside
    /// the region are clamped onto the frame.
    fn to_cell(&self, x: f64, y: f64) -> (u16, u16) {
        let col = (x / self.walls.x * f64::from(self.cols - 1)).round();
        let row = ((self.walls.y - y) / self.walls.y * f64::from(self.rows - 1)).round();
        (
            col.clamp(0.0, f64::from(self.cols - 1)) as u16,
            row.clamp(0.0, f64::from(self.rows - 1)) as u16,
        )
    }

    fn cells_per_unit(&self) -> (f64, f64) {
        (
            f64::from(self.cols - 1) / self.walls.x,
            f64::from(self.rows - 1) / self.walls.y,
        )
    }

    fn draw_grid(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, SetForegroundColor(GRID_COLOR))?;
        // Dots at every integer world coordinate
        let mut gy = 0.0;
        while gy <= self.walls.y {
            let mut gx = 0.0;
            while gx <= self.walls.x {
                let (col, row) = self.to_cell(gx, gy);
                queue!(out, MoveTo(col, row), Print('·'))?;
                gx += 1.0;
            }
            gy += 1.0;
        }
        Ok(())
    }

    fn draw_marker(
        &self,
        out: &mut impl Write,
        x: f64,
        y: f64,
        color: Color,
        glyph: char,
    ) -> io::Result<()> {
        let (col, row) = self.to_cell(x, y);
        queue!(out, MoveTo(col, row), SetForegroundColor(color), Print(glyph))
    }

    /// Axis-aligned box around (x, y) whose half extents are the
    /// covariance diagonal entries in world units.
    fn draw_cov_box(
        &self,
        out: &mut impl Write,
        x: f64,
        y: f64,
        cov: &[[f64; 2]; 2],
        color: Color,
    ) -> io::Result<()> {
        let (cpu_x, cpu_y) = self.cells_per_unit();
        let half_w = (cov[0][0] * cpu_x).round() as i32;
        let half_h = (cov[1][1] * cpu_y).round() as i32;
        // A degenerate covariance draws nothing, like a zero-size rect
        if half_w <= 0 || half_h <= 0 {
            return Ok(());
        }
        let (col, row) = self.to_cell(x, y);
        let (col, row) = (i32::from(col), i32::from(row));

        queue!(out, SetForegroundColor(color))?;
        for dc in -half_w..=half_w {
            for dr in -half_h..=half_h {
                let on_edge = dc.abs() == half_w || dr.abs() == half_h;
                if !on_edge {
                    continue;
                }
                let (c, r) = (col + dc, row + dr);
                if c < 0 || r < 0 || c >= i32::from(self.cols) || r >= i32::from(self.rows) {
                    continue;
                }
                let glyph = if dc.abs() == half_w && dr.abs() == half_h {
                    '+'
                } else if dr.abs() == half_h {
                    '-'
                } else {
                    '|'
                };
                queue!(out, MoveTo(c as u16, r as u16), Print(glyph))?;
            }
        }
        Ok(())
    }

    fn draw_key(&self, out: &mut impl Write) -> io::Result<()> {
        for (idx, (label, color)) in KEY_LINES.iter().enumerate() {
            queue!(
                out,
                MoveTo(1, idx as u16),
                SetForegroundColor(*color),
                Print(*label)
            )?;
        }
        Ok(())
    }

    /// Render one frame from a snapshot.
    pub fn draw(&self, out: &mut impl Write, snapshot: &FilterSnapshot) -> io::Result<()> {
        queue!(out, Clear(ClearType::All))?;
        self.draw_grid(out)?;
        self.draw_key(out)?;

        // Pre-measurement belief and its covariance box
        let (px, py) = snapshot.predicted_mean;
        self.draw_cov_box(out, px, py, &snapshot.predicted_covariance, PREDICTED_COLOR)?;
        self.draw_marker(out, px, py, PREDICTED_COLOR, '▪')?;

        // Measurement, shown at the position it implies (walls - z)
        let (zx, zy) = snapshot.measurement;
        self.draw_marker(
            out,
            self.walls.x - zx,
            self.walls.y - zy,
            MEASUREMENT_COLOR,
            '▪',
        )?;

        // Corrected belief and its covariance box
        let (cx, cy) = snapshot.corrected_mean;
        self.draw_cov_box(out, cx, cy, &snapshot.corrected_covariance, CORRECTED_COLOR)?;
        self.draw_marker(out, cx, cy, CORRECTED_COLOR, '█')?;

        // Ground truth on top
        let (tx, ty) = snapshot.true_position;
        self.draw_marker(out, tx, ty, TRUE_COLOR, '█')?;

        // Status line under the grid
        queue!(
            out,
            MoveTo(0, self.rows),
            ResetColor,
            Print(format!(
                "step {} | truth ({:.2}, {:.2}) | estimate ({:.2}, {:.2}) | trace {:.3} | Enter: step  s: save  q: quit",
                snapshot.step,
                tx,
                ty,
                cx,
                cy,
                snapshot.covariance_trace,
            ))
        )?;
        out.flush()
    }
}
