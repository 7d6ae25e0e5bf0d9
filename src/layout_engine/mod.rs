//! The tiling engine.
//!
//! Windows on a space form a horizontal strip of columns. `tile_space` picks
//! an anchor window, places it against the canvas according to the policy
//! flags, then propagates columns outward to both sides. The engine is
//! stateless apart from the x-position memo it writes back into the store;
//! it returns a move batch for the caller to apply through the transport.

use tracing::{trace, warn};

use crate::common::config::LayoutSettings;
use crate::host::{WindowRef, live_id};
use crate::model::state::StateStore;
use crate::sys::geometry::{FRAME_EPSILON, Frame};
use crate::sys::screen::SpaceId;
use crate::sys::transport::MoveOp;
use crate::sys::window_server::{WindowId, pid_t};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn horizontal(&self) -> bool { matches!(self, Direction::Left | Direction::Right) }
}

/// Focus history feeding the scroll-direction inference.
#[derive(Clone, Copy, Debug, Default)]
pub struct FocusContext {
    /// The window tiling anchors on, when it belongs to the space.
    pub focused: Option<WindowId>,
    /// The window focused immediately before `focused`.
    pub prior_focused: Option<WindowId>,
}

pub enum TileOutcome {
    /// Nothing on the space; no-op.
    Empty,
    /// No anchor could be resolved; the caller should rescan.
    AnchorMissing,
    Tiled(Vec<MoveOp>),
}

/// The tiling canvas: screen frame minus per-side gaps and the external bar.
pub fn canvas(settings: &LayoutSettings, screen: &Frame) -> Frame {
    let gaps = &settings.gaps;
    let bar = &settings.external_bar;
    screen.inset(
        gaps.top + bar.top,
        gaps.bottom + bar.bottom,
        gaps.left,
        gaps.right,
    )
}

fn window_pid(window: &WindowRef) -> Option<(WindowId, pid_t)> {
    Some((window.id().ok()?, window.pid().ok()?))
}

/// The left edge of a column: the memoized x of its first live window,
/// falling back to the window's current frame.
fn column_x(state: &StateStore, space: SpaceId, column: &[WindowRef]) -> Option<f64> {
    let first = column.first()?;
    let wid = live_id(first)?;
    state
        .x_position(space, wid)
        .or_else(|| first.frame().ok().map(|f| f.x))
}

fn column_width(column: &[WindowRef]) -> Option<f64> {
    column.first().and_then(|w| w.frame().ok()).map(|f| f.w)
}

/// The column to anchor on when the focused window is elsewhere: the one
/// whose x is smallest but still on screen, else the closest one hanging off
/// the left edge.
pub fn first_visible_column(state: &StateStore, space: SpaceId, screen: &Frame) -> Option<usize> {
    let mut best_on_screen: Option<(usize, f64)> = None;
    let mut best_off_screen: Option<(usize, f64)> = None;
    for (idx, column) in state.columns(space).iter().enumerate() {
        let Some(x) = column_x(state, space, column) else {
            continue;
        };
        if x >= screen.x {
            if best_on_screen.is_none_or(|(_, best)| x < best) {
                best_on_screen = Some((idx, x));
            }
        } else if best_off_screen.is_none_or(|(_, best)| x > best) {
            best_off_screen = Some((idx, x));
        }
    }
    best_on_screen.or(best_off_screen).map(|(idx, _)| idx)
}

struct ColumnPlan<'a> {
    windows: &'a [WindowRef],
    /// Left edge, or the right edge when `right_anchored`.
    x_edge: f64,
    right_anchored: bool,
    width: Option<f64>,
    uniform_height: Option<f64>,
    /// Explicit height for one window (the anchor keeps its own height).
    height_for: Option<(WindowId, f64)>,
}

/// Stack one column's windows top to bottom inside `[y, y2]`, expanding the
/// last window to fill. Returns the width used so the caller can advance.
fn tile_column(
    plan: ColumnPlan<'_>,
    y: f64,
    y2: f64,
    gap_y: f64,
    hidden: impl Fn(WindowId) -> bool,
    ops: &mut Vec<MoveOp>,
) -> f64 {
    let width = plan
        .width
        .or_else(|| column_width(plan.windows))
        .unwrap_or(0.0)
        .max(1.0);
    let x = if plan.right_anchored { plan.x_edge - width } else { plan.x_edge };

    let live: Vec<(WindowId, pid_t, &WindowRef)> = plan
        .windows
        .iter()
        .filter_map(|w| window_pid(w).map(|(wid, pid)| (wid, pid, w)))
        .filter(|(wid, ..)| !hidden(*wid))
        .collect();
    let mut cursor = y;
    for (pos, (wid, pid, window)) in live.iter().enumerate() {
        let last = pos + 1 == live.len();
        let mut h = if last {
            (y2 - cursor).max(1.0)
        } else {
            let wanted = match plan.height_for {
                Some((special, special_h)) if special == *wid => special_h,
                _ => plan
                    .uniform_height
                    .or_else(|| window.frame().ok().map(|f| f.h))
                    .unwrap_or(y2 - cursor),
            };
            wanted.max(1.0)
        };
        if cursor + h > y2 {
            h = (y2 - cursor).max(1.0);
        }
        ops.push(MoveOp::place(*wid, *pid, Frame::new(x, cursor, width, h)));
        cursor += h + gap_y;
    }
    width
}

/// Lay out every column of `space` on `screen`.
pub fn tile_space(
    state: &mut StateStore,
    settings: &LayoutSettings,
    screen: &Frame,
    space: SpaceId,
    focus: &FocusContext,
    equalize_cols: &[usize],
) -> TileOutcome {
    if state.column_count(space) == 0 {
        return TileOutcome::Empty;
    }
    let canvas = canvas(settings, screen);
    let gaps = settings.gaps;

    // Anchor: the focused window when it is tiled on this space, else the
    // leftmost on-screen column's first row.
    let anchor_idx = focus
        .focused
        .filter(|wid| !state.is_floating(*wid))
        .and_then(|wid| state.window_index(wid))
        .filter(|idx| idx.space == space)
        .map(|idx| (idx.col, idx.row));
    let (anchor_col, anchor_row) = match anchor_idx {
        Some(at) => at,
        None => match first_visible_column(state, space, screen) {
            Some(col) => (col, 0),
            None => return TileOutcome::AnchorMissing,
        },
    };
    let Some(anchor) = state.window_at(space, anchor_col, anchor_row) else {
        return TileOutcome::AnchorMissing;
    };
    let Some(anchor_wid) = live_id(&anchor) else {
        return TileOutcome::AnchorMissing;
    };
    let Ok(anchor_frame) = anchor.frame() else {
        warn!(wid = %anchor_wid, "anchor frame unreadable");
        return TileOutcome::AnchorMissing;
    };
    let anchor_frame = anchor_frame.clamp_size_to(&canvas);

    let num_cols = state.column_count(space);
    let anchor_x = if settings.right_anchor_last && anchor_col + 1 == num_cols && num_cols > 1 {
        canvas.x2() - anchor_frame.w
    } else if anchor_col > 0 && settings.sticky_pairs {
        let prior_col = focus
            .prior_focused
            .and_then(|wid| state.window_index(wid))
            .filter(|idx| idx.space == space)
            .map(|idx| idx.col);
        let scrolled_left = prior_col.is_some_and(|col| col > anchor_col)
            || state
                .x_position(space, anchor_wid)
                .is_some_and(|x| (x - canvas.x).abs() < FRAME_EPSILON);
        if scrolled_left {
            canvas.x
        } else {
            // Sticky pair: keep the left neighbor on screen when both fit.
            let left_w = state
                .column(space, anchor_col - 1)
                .and_then(column_width)
                .unwrap_or(canvas.w);
            if left_w + gaps.left + anchor_frame.w <= canvas.w {
                canvas.x + left_w + gaps.left
            } else {
                canvas.x
            }
        }
    } else {
        canvas.x
    };

    trace!(?space, anchor = %anchor_wid, anchor_col, anchor_x, "tiling");

    let mut ops = Vec::new();
    let mut col_xs: Vec<(usize, f64)> = Vec::with_capacity(num_cols);
    let hidden = |wid: WindowId| state.is_hidden(wid) || state.is_floating(wid);

    // The anchor's own column. Alone it fills the canvas; stacked, the other
    // rows split the leftover height evenly.
    let anchor_column = state.column(space, anchor_col).unwrap_or(&[]).to_vec();
    let anchor_width = {
        let rows = anchor_column.len();
        let (uniform_height, height_for) = if equalize_cols.contains(&anchor_col) {
            (Some(even_height(canvas.h, rows, gaps.bottom)), None)
        } else if rows <= 1 {
            (Some(canvas.h), None)
        } else {
            let others = (rows - 1) as f64;
            let leftover =
                (canvas.h - anchor_frame.h - (rows - 1) as f64 * gaps.bottom).max(1.0);
            (Some(leftover / others), Some((anchor_wid, anchor_frame.h)))
        };
        tile_column(
            ColumnPlan {
                windows: &anchor_column,
                x_edge: anchor_x,
                right_anchored: false,
                width: Some(anchor_frame.w),
                uniform_height,
                height_for,
            },
            canvas.y,
            canvas.y2(),
            gaps.bottom,
            hidden,
            &mut ops,
        )
    };
    col_xs.push((anchor_col, anchor_x));

    // Propagate right. A column pushed past the canvas clips at its right
    // edge, still visible and clickable.
    let mut x = anchor_x + anchor_width + gaps.right;
    for col_idx in anchor_col + 1..num_cols {
        let column = state.column(space, col_idx).unwrap_or(&[]).to_vec();
        let col_x = x.min(canvas.x2());
        let uniform_height =
            equalize_cols.contains(&col_idx).then(|| even_height(canvas.h, column.len(), gaps.bottom));
        let width = tile_column(
            ColumnPlan {
                windows: &column,
                x_edge: col_x,
                right_anchored: false,
                width: None,
                uniform_height,
                height_for: None,
            },
            canvas.y,
            canvas.y2(),
            gaps.bottom,
            hidden,
            &mut ops,
        );
        col_xs.push((col_idx, col_x));
        x = col_x + width + gaps.right;
    }

    // Propagate left, mirrored.
    let mut x2 = anchor_x - gaps.left;
    for col_idx in (0..anchor_col).rev() {
        let column = state.column(space, col_idx).unwrap_or(&[]).to_vec();
        let col_x2 = x2.max(canvas.x);
        let uniform_height =
            equalize_cols.contains(&col_idx).then(|| even_height(canvas.h, column.len(), gaps.bottom));
        let width = tile_column(
            ColumnPlan {
                windows: &column,
                x_edge: col_x2,
                right_anchored: true,
                width: None,
                uniform_height,
                height_for: None,
            },
            canvas.y,
            canvas.y2(),
            gaps.bottom,
            hidden,
            &mut ops,
        );
        col_xs.push((col_idx, col_x2 - width));
        x2 = col_x2 - width - gaps.left;
    }

    // Memoize every column's left edge so scroll state survives retiles and
    // workspace switches.
    for (col_idx, col_x) in col_xs {
        let wids: Vec<WindowId> = state
            .column(space, col_idx)
            .unwrap_or(&[])
            .iter()
            .filter_map(live_id)
            .collect();
        for wid in wids {
            state.set_x_position(space, wid, col_x);
        }
    }

    TileOutcome::Tiled(ops)
}

/// Even row height for a column of `rows` windows inside a canvas of height
/// `canvas_h`; the remainder is absorbed by the last row when applied.
fn even_height(canvas_h: f64, rows: usize, gap_y: f64) -> f64 {
    if rows == 0 {
        return canvas_h;
    }
    ((canvas_h - (rows - 1) as f64 * gap_y) / rows as f64).max(1.0)
}
