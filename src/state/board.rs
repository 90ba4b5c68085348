//! Board geometry.
//!
//! Turns the server's board definition into an immutable [`BoardLayout`]:
//! cells in index order, a visual center per cell and a ladder/snake index.
//!
//! # Numbering
//!
//! Rows are numbered from the bottom and every row counts left to right
//! (no alternating direction):
//!
//! ```text
//!  row_from_top 0 │ 91  92  93 ... 100
//!                 │ ...
//!  row_from_top 9 │  1   2   3 ...  10
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::BoardError;

/// What landing on a cell triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpecialType {
    #[default]
    None,
    Dice,
    Item,
    Message,
}

impl SpecialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Dice => "dice",
            Self::Item => "item",
            Self::Message => "message",
        }
    }
}

/// One cell as supplied by the board service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellDefinition {
    pub index: u32,
    #[serde(default)]
    pub row: i32,
    #[serde(default)]
    pub col: i32,
    #[serde(default)]
    pub is_dark: bool,
    #[serde(default)]
    pub special_type: SpecialType,
    #[serde(default)]
    pub is_start: bool,
    #[serde(default)]
    pub is_final: bool,
}

/// One ladder or snake as supplied by the board service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDefinition {
    pub start_index: u32,
    pub end_index: u32,
    pub is_ladder: bool,
}

/// Board definition as received from the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDefinition {
    pub rows: i32,
    pub columns: i32,
    #[serde(default)]
    pub cells: Vec<CellDefinition>,
    #[serde(default)]
    pub links: Vec<LinkDefinition>,
}

impl BoardDefinition {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// A built cell. `row` counts from the top, `col` from the left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardCell {
    pub index: u32,
    pub row: u32,
    pub col: u32,
    pub is_dark: bool,
    pub special_type: SpecialType,
    pub is_start: bool,
    pub is_final: bool,
}

impl BoardCell {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "index": self.index,
            "row": self.row,
            "col": self.col,
            "is_dark": self.is_dark,
            "special_type": self.special_type.as_str(),
            "is_start": self.is_start,
            "is_final": self.is_final
        })
    }
}

/// A directed jump from one cell to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLink {
    pub start_index: u32,
    pub end_index: u32,
    pub is_ladder: bool,
}

impl BoardLink {
    pub fn is_snake(&self) -> bool {
        !self.is_ladder
    }
}

/// A point in grid units. `x` grows to the right, `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VisualPoint {
    pub x: f32,
    pub y: f32,
}

impl VisualPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Linear interpolation, `t` clamped to `[0, 1]`.
    pub fn lerp(self, to: VisualPoint, t: f32) -> VisualPoint {
        let t = t.clamp(0.0, 1.0);
        VisualPoint {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

/// Index of the cell at a grid position.
///
/// Expects `row_from_top < rows` and `rows * columns` to fit in a `u32`;
/// [`BoardGeometryBuilder::build`] checks both before calling it.
pub fn cell_index_at(rows: u32, columns: u32, row_from_top: u32, col_from_left: u32) -> u32 {
    let row_from_bottom = rows - 1 - row_from_top;
    row_from_bottom * columns + col_from_left + 1
}

/// Immutable board for one session.
#[derive(Debug, Clone)]
pub struct BoardLayout {
    rows: u32,
    columns: u32,
    /// Sorted by index; `cells[i].index == i + 1`
    cells: Vec<BoardCell>,
    centers: HashMap<u32, VisualPoint>,
    links: HashMap<u32, BoardLink>,
    start_cell_index: u32,
    final_cell_index: u32,
}

impl BoardLayout {
    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[BoardCell] {
        &self.cells
    }

    pub fn cell(&self, index: u32) -> Option<&BoardCell> {
        let slot = usize::try_from(index).ok()?.checked_sub(1)?;
        self.cells.get(slot)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.cell(index).is_some()
    }

    pub fn center(&self, index: u32) -> Option<VisualPoint> {
        self.centers.get(&index).copied()
    }

    /// The link starting at `index`, if any.
    pub fn link_from(&self, index: u32) -> Option<&BoardLink> {
        self.links.get(&index)
    }

    pub fn links(&self) -> impl Iterator<Item = &BoardLink> {
        self.links.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn start_cell_index(&self) -> u32 {
        self.start_cell_index
    }

    pub fn final_cell_index(&self) -> u32 {
        self.final_cell_index
    }

    pub fn is_final(&self, index: u32) -> bool {
        index == self.final_cell_index
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut links: Vec<&BoardLink> = self.links.values().collect();
        links.sort_by_key(|l| l.start_index);

        serde_json::json!({
            "rows": self.rows,
            "columns": self.columns,
            "start_cell_index": self.start_cell_index,
            "final_cell_index": self.final_cell_index,
            "cells": self.cells.iter().map(|c| {
                let mut obj = c.to_json();
                if let Some(p) = self.centers.get(&c.index) {
                    obj["center"] = serde_json::json!({"x": p.x, "y": p.y});
                }
                obj
            }).collect::<Vec<_>>(),
            "links": links.iter().map(|l| serde_json::json!({
                "start_index": l.start_index,
                "end_index": l.end_index,
                "is_ladder": l.is_ladder
            })).collect::<Vec<_>>()
        })
    }
}

/// Builds [`BoardLayout`]s. Holds only presentation tunables.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardGeometryBuilder {
    vertical_adjust: f32,
}

impl BoardGeometryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_vertical_adjust(mut self, vertical_adjust: f32) -> Self {
        self.vertical_adjust = vertical_adjust;
        self
    }

    pub fn build(&self, definition: &BoardDefinition) -> Result<BoardLayout, BoardError> {
        let (rows, columns) = match (
            u32::try_from(definition.rows),
            u32::try_from(definition.columns),
        ) {
            (Ok(r), Ok(c)) if r > 0 && c > 0 => (r, c),
            _ => {
                return Err(BoardError::Malformed(format!(
                    "rows and columns must be positive, got {}x{}",
                    definition.rows, definition.columns
                )))
            }
        };

        if definition.cells.is_empty() {
            return Err(BoardError::Malformed("board has no cells".to_string()));
        }

        let mut by_index: HashMap<u32, &CellDefinition> = HashMap::new();
        for cell in &definition.cells {
            if by_index.contains_key(&cell.index) {
                tracing::debug!(index = cell.index, "Duplicate cell definition ignored");
                continue;
            }
            by_index.insert(cell.index, cell);
        }

        let total = rows.checked_mul(columns).ok_or_else(|| {
            BoardError::Malformed(format!("board of {}x{} cells is too large", rows, columns))
        })?;

        // Fewer distinct on-board cells than grid positions means one is
        // missing; the search ends within `on_board + 1` steps.
        let on_board = by_index.keys().filter(|&&i| i >= 1 && i <= total).count();
        if on_board < total as usize {
            if let Some(missing) = (1..=total).find(|i| !by_index.contains_key(i)) {
                return Err(BoardError::MissingCell(missing));
            }
        }

        let capacity = total as usize;
        let mut cells = Vec::with_capacity(capacity);
        let mut centers = HashMap::with_capacity(capacity);

        for row in 0..rows {
            for col in 0..columns {
                let index = cell_index_at(rows, columns, row, col);
                let def = by_index
                    .get(&index)
                    .ok_or(BoardError::MissingCell(index))?;

                cells.push(BoardCell {
                    index,
                    row,
                    col,
                    is_dark: def.is_dark,
                    special_type: def.special_type,
                    is_start: def.is_start,
                    is_final: def.is_final,
                });
                centers.insert(
                    index,
                    VisualPoint::new(
                        col as f32 + 0.5,
                        row as f32 + 0.5 - self.vertical_adjust,
                    ),
                );
            }
        }
        cells.sort_by_key(|c| c.index);

        let start_cell_index = cells
            .iter()
            .find(|c| c.is_start)
            .map(|c| c.index)
            .unwrap_or(1);
        let final_cell_index = cells
            .iter()
            .rev()
            .find(|c| c.is_final)
            .map(|c| c.index)
            .unwrap_or(capacity as u32);

        let links = resolve_links(&definition.links, capacity as u32);

        tracing::debug!(
            rows,
            columns,
            links = links.len(),
            start_cell_index,
            "Built board layout"
        );

        Ok(BoardLayout {
            rows,
            columns,
            cells,
            centers,
            links,
            start_cell_index,
            final_cell_index,
        })
    }
}

/// First link seen for a start index wins; later duplicates are dropped.
fn resolve_links(defs: &[LinkDefinition], cell_count: u32) -> HashMap<u32, BoardLink> {
    let on_board = |i: u32| (1..=cell_count).contains(&i);
    let mut links = HashMap::new();

    for def in defs {
        if !on_board(def.start_index) || !on_board(def.end_index) {
            tracing::warn!(
                start_index = def.start_index,
                end_index = def.end_index,
                "Link points off the board, dropped"
            );
            continue;
        }
        if links.contains_key(&def.start_index) {
            tracing::debug!(
                start_index = def.start_index,
                end_index = def.end_index,
                "Duplicate link start, keeping the first"
            );
            continue;
        }
        links.insert(
            def.start_index,
            BoardLink {
                start_index: def.start_index,
                end_index: def.end_index,
                is_ladder: def.is_ladder,
            },
        );
    }

    links
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;

    pub(crate) fn square_definition(rows: i32, columns: i32, links: Vec<LinkDefinition>) -> BoardDefinition {
        let cells = (1..=(rows * columns) as u32)
            .map(|index| CellDefinition {
                index,
                row: 0,
                col: 0,
                is_dark: index % 2 == 0,
                special_type: SpecialType::None,
                is_start: false,
                is_final: false,
            })
            .collect();
        BoardDefinition {
            rows,
            columns,
            cells,
            links,
        }
    }

    pub(crate) fn snake(start_index: u32, end_index: u32) -> LinkDefinition {
        LinkDefinition {
            start_index,
            end_index,
            is_ladder: false,
        }
    }

    pub(crate) fn ladder(start_index: u32, end_index: u32) -> LinkDefinition {
        LinkDefinition {
            start_index,
            end_index,
            is_ladder: true,
        }
    }

    #[test]
    fn test_cell_count_and_uniqueness() {
        for (rows, columns) in [(1, 1), (3, 4), (10, 10), (7, 2)] {
            let layout = BoardGeometryBuilder::new()
                .build(&square_definition(rows, columns, vec![]))
                .unwrap();
            let expected = (rows * columns) as usize;
            assert_eq!(layout.cell_count(), expected);

            let indices: HashSet<u32> = layout.cells().iter().map(|c| c.index).collect();
            assert_eq!(indices.len(), expected);
            assert_eq!(indices, (1..=expected as u32).collect());
        }
    }

    #[test]
    fn test_corner_indices() {
        let layout = BoardGeometryBuilder::new()
            .build(&square_definition(10, 10, vec![]))
            .unwrap();

        assert_eq!(cell_index_at(10, 10, 9, 0), 1);
        assert_eq!(cell_index_at(10, 10, 0, 9), 100);

        let bottom_left = layout.cell(1).unwrap();
        assert_eq!((bottom_left.row, bottom_left.col), (9, 0));
        let top_right = layout.cell(100).unwrap();
        assert_eq!((top_right.row, top_right.col), (0, 9));
    }

    #[test]
    fn test_rows_do_not_alternate() {
        // Second row from the bottom still runs left to right.
        assert_eq!(cell_index_at(10, 10, 8, 0), 11);
        assert_eq!(cell_index_at(10, 10, 8, 9), 20);
    }

    #[test]
    fn test_malformed_definitions() {
        let builder = BoardGeometryBuilder::new();

        let zero_rows = BoardDefinition {
            rows: 0,
            ..square_definition(1, 1, vec![])
        };
        assert!(matches!(builder.build(&zero_rows), Err(BoardError::Malformed(_))));

        let negative_columns = BoardDefinition {
            columns: -3,
            ..square_definition(1, 1, vec![])
        };
        assert!(matches!(
            builder.build(&negative_columns),
            Err(BoardError::Malformed(_))
        ));

        let no_cells = BoardDefinition {
            rows: 2,
            columns: 2,
            cells: vec![],
            links: vec![],
        };
        assert!(matches!(builder.build(&no_cells), Err(BoardError::Malformed(_))));
    }

    #[test]
    fn test_missing_cell() {
        let mut def = square_definition(3, 3, vec![]);
        def.cells.retain(|c| c.index != 5);

        assert_eq!(
            BoardGeometryBuilder::new().build(&def).unwrap_err(),
            BoardError::MissingCell(5)
        );
    }

    #[test]
    fn test_oversized_board_rejected_before_building() {
        let builder = BoardGeometryBuilder::new();

        // 60_000 x 60_000 fits in a u32 but only one cell is defined.
        let sparse = BoardDefinition {
            rows: 60_000,
            columns: 60_000,
            ..square_definition(1, 1, vec![])
        };
        assert_eq!(builder.build(&sparse).unwrap_err(), BoardError::MissingCell(2));

        let overflowing = BoardDefinition {
            rows: 100_000,
            columns: 100_000,
            ..square_definition(1, 1, vec![])
        };
        assert!(matches!(
            builder.build(&overflowing),
            Err(BoardError::Malformed(_))
        ));
    }

    #[test]
    fn test_visual_centers() {
        let layout = BoardGeometryBuilder::new()
            .with_vertical_adjust(0.25)
            .build(&square_definition(10, 10, vec![]))
            .unwrap();

        // Index 1 sits at row 9, col 0.
        assert_eq!(layout.center(1), Some(VisualPoint::new(0.5, 9.25)));
        // Index 100 sits at row 0, col 9.
        assert_eq!(layout.center(100), Some(VisualPoint::new(9.5, 0.25)));
        assert_eq!(layout.center(101), None);
    }

    #[test]
    fn test_start_and_final_defaults() {
        let layout = BoardGeometryBuilder::new()
            .build(&square_definition(4, 4, vec![]))
            .unwrap();
        assert_eq!(layout.start_cell_index(), 1);
        assert_eq!(layout.final_cell_index(), 16);
    }

    #[test]
    fn test_flagged_start_and_final() {
        let mut def = square_definition(4, 4, vec![]);
        for cell in &mut def.cells {
            cell.is_start = cell.index == 3;
            cell.is_final = cell.index == 15;
        }
        let layout = BoardGeometryBuilder::new().build(&def).unwrap();
        assert_eq!(layout.start_cell_index(), 3);
        assert_eq!(layout.final_cell_index(), 15);
        assert!(layout.is_final(15));
    }

    #[test]
    fn test_duplicate_link_first_wins() {
        let def = square_definition(10, 10, vec![snake(17, 4), ladder(17, 60), ladder(3, 22)]);
        let layout = BoardGeometryBuilder::new().build(&def).unwrap();

        let link = layout.link_from(17).unwrap();
        assert_eq!(link.end_index, 4);
        assert!(link.is_snake());
        assert_eq!(layout.link_count(), 2);
    }

    #[test]
    fn test_off_board_links_dropped() {
        let def = square_definition(3, 3, vec![ladder(2, 40), snake(0, 1), ladder(4, 8)]);
        let layout = BoardGeometryBuilder::new().build(&def).unwrap();

        assert_eq!(layout.link_count(), 1);
        assert!(layout.link_from(4).is_some());
    }

    #[test]
    fn test_definition_from_json() {
        let raw = r#"{
            "rows": 1,
            "columns": 2,
            "cells": [
                {"index": 1, "row": 0, "col": 0, "isDark": true, "specialType": "none", "isStart": true, "isFinal": false},
                {"index": 2, "row": 0, "col": 1, "isDark": false, "specialType": "item", "isStart": false, "isFinal": true}
            ],
            "links": [{"startIndex": 1, "endIndex": 2, "isLadder": true}]
        }"#;
        let def = BoardDefinition::from_json_str(raw).unwrap();
        let layout = BoardGeometryBuilder::new().build(&def).unwrap();

        assert_eq!(layout.cell(2).unwrap().special_type, SpecialType::Item);
        assert!(layout.cell(1).unwrap().is_dark);
        assert_eq!(layout.link_from(1).unwrap().end_index, 2);
        assert_eq!(layout.to_json()["cells"][1]["special_type"], "item");
    }
}
