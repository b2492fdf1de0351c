//! Bypass diode placement over a module's cell sequence.
//!
//! A placement `(anode, cathode)` puts one diode across cells
//! `anode..=cathode`. Placements in a module never overlap or nest. Edits
//! happen in two steps, mirroring how a diode is drawn: [`BypassLayout::place_anode`]
//! opens a pending placement, [`BypassLayout::place_cathode`] closes it. Every
//! rejected edit leaves the layout untouched.

use crate::error::{PvError, Result};

/// One bypass diode spanning an inclusive run of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BypassPlacement {
    /// First covered cell (diode anode side)
    pub anode: usize,
    /// Last covered cell (diode cathode side)
    pub cathode: usize,
}

impl BypassPlacement {
    /// Whether `cell` lies under this diode.
    pub fn covers(&self, cell: usize) -> bool {
        self.anode <= cell && cell <= self.cathode
    }

    /// Number of cells bridged.
    pub fn span(&self) -> usize {
        self.cathode - self.anode + 1
    }
}

/// Per-cell view of a layout: whether an anode and/or cathode sits on the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellMarker {
    pub anode: bool,
    pub cathode: bool,
}

/// Validated set of bypass placements for a module of fixed length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassLayout {
    cell_count: usize,
    /// Sorted by anode
    placements: Vec<BypassPlacement>,
    pending_anode: Option<usize>,
}

impl BypassLayout {
    /// Empty layout for a module of `cell_count` cells.
    pub fn new(cell_count: usize) -> Self {
        Self {
            cell_count,
            placements: Vec::new(),
            pending_anode: None,
        }
    }

    /// Build from a list of `(anode, cathode)` spans.
    pub fn from_spans(cell_count: usize, spans: &[(usize, usize)]) -> Result<Self> {
        let mut layout = Self::new(cell_count);
        for &(anode, cathode) in spans {
            layout.insert(anode, cathode)?;
        }
        Ok(layout)
    }

    /// Build from per-cell markers.
    ///
    /// An empty slice means "no bypass diodes". Any other length must equal
    /// `cell_count`.
    pub fn from_markers(cell_count: usize, markers: &[CellMarker]) -> Result<Self> {
        let mut layout = Self::new(cell_count);
        if markers.is_empty() {
            return Ok(layout);
        }
        if markers.len() != cell_count {
            return Err(PvError::DimensionMismatch {
                expected: cell_count,
                actual: markers.len(),
            });
        }

        for (cell, marker) in markers.iter().enumerate() {
            if marker.anode {
                layout.place_anode(cell)?;
            }
            if marker.cathode {
                layout.place_cathode(cell)?;
            }
        }
        if let Some(anode) = layout.pending_anode {
            return Err(PvError::bypass(anode, "anode has no matching cathode"));
        }
        Ok(layout)
    }

    /// Per-cell markers, one entry per cell.
    pub fn to_markers(&self) -> Vec<CellMarker> {
        let mut markers = vec![CellMarker::default(); self.cell_count];
        for p in &self.placements {
            markers[p.anode].anode = true;
            markers[p.cathode].cathode = true;
        }
        markers
    }

    /// Open a placement at `anode`.
    ///
    /// Rejected when the cell is already bridged. Replaces any earlier
    /// pending anode.
    pub fn place_anode(&mut self, anode: usize) -> Result<()> {
        self.check_index(anode)?;
        if self.covering(anode).is_some() {
            return Err(PvError::bypass(anode, "cell is already bypassed"));
        }
        self.pending_anode = Some(anode);
        Ok(())
    }

    /// Close the pending placement at `cathode`.
    ///
    /// The cathode must not precede the anode, and the span must not touch
    /// any existing placement. On rejection the pending anode is kept.
    pub fn place_cathode(&mut self, cathode: usize) -> Result<BypassPlacement> {
        self.check_index(cathode)?;
        let anode = self
            .pending_anode
            .ok_or_else(|| PvError::bypass(cathode, "no anode placed for this cathode"))?;

        if cathode < anode {
            return Err(PvError::bypass(cathode, format!("cathode precedes anode at cell {}", anode)));
        }
        let candidate = BypassPlacement { anode, cathode };
        if let Some(existing) = self
            .placements
            .iter()
            .find(|p| candidate.covers(p.anode) || p.covers(cathode))
        {
            return Err(PvError::bypass(
                cathode,
                format!(
                    "span {}..={} overlaps bypass {}..={}",
                    anode, cathode, existing.anode, existing.cathode
                ),
            ));
        }

        let at = self.placements.partition_point(|p| p.anode < anode);
        self.placements.insert(at, candidate);
        self.pending_anode = None;
        Ok(candidate)
    }

    /// Place a complete diode in one step. Nothing changes on rejection.
    ///
    /// A pending anode survives unless the new span bridges its cell.
    pub fn insert(&mut self, anode: usize, cathode: usize) -> Result<BypassPlacement> {
        let saved = self.pending_anode;
        let result = self.place_anode(anode).and_then(|_| self.place_cathode(cathode));
        self.pending_anode = match &result {
            Ok(placed) => saved.filter(|&cell| !placed.covers(cell)),
            Err(_) => saved,
        };
        result
    }

    /// Remove the diode bridging `cell`, if any.
    pub fn remove_covering(&mut self, cell: usize) -> Option<BypassPlacement> {
        let idx = self.covering(cell)?;
        Some(self.placements.remove(idx))
    }

    /// Drop a pending anode.
    pub fn cancel_pending(&mut self) {
        self.pending_anode = None;
    }

    /// Anode awaiting its cathode.
    pub fn pending_anode(&self) -> Option<usize> {
        self.pending_anode
    }

    /// Index of the placement bridging `cell`.
    pub fn covering(&self, cell: usize) -> Option<usize> {
        self.placements.iter().position(|p| p.covers(cell))
    }

    /// Completed placements in cell order.
    pub fn placements(&self) -> &[BypassPlacement] {
        &self.placements
    }

    /// Module length this layout was built for.
    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Number of completed placements.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Copy with only completed placements.
    pub(crate) fn settled(&self) -> Self {
        Self {
            cell_count: self.cell_count,
            placements: self.placements.clone(),
            pending_anode: None,
        }
    }

    fn check_index(&self, cell: usize) -> Result<()> {
        if cell >= self.cell_count {
            return Err(PvError::out_of_range("cell", cell, self.cell_count));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anode_inside_existing_span_rejected() {
        let mut layout = BypassLayout::new(10);
        layout.place_anode(2).unwrap();
        layout.place_cathode(5).unwrap();

        let err = layout.place_anode(4).unwrap_err();
        assert!(err.is_topology());
        assert_eq!(layout.placements(), &[BypassPlacement { anode: 2, cathode: 5 }]);
        assert_eq!(layout.pending_anode(), None);
    }

    #[test]
    fn test_cathode_before_anode_rejected() {
        let mut layout = BypassLayout::new(10);
        layout.place_anode(6).unwrap();
        assert!(layout.place_cathode(3).is_err());
        assert_eq!(layout.pending_anode(), Some(6));
        assert!(layout.is_empty());
    }

    #[test]
    fn test_enclosing_span_rejected() {
        let mut layout = BypassLayout::from_spans(12, &[(4, 6)]).unwrap();
        layout.place_anode(1).unwrap();
        assert!(layout.place_cathode(9).is_err());
        assert!(layout.place_cathode(5).is_err());
        layout.place_cathode(3).unwrap();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.placements()[0], BypassPlacement { anode: 1, cathode: 3 });
    }

    #[test]
    fn test_single_cell_bypass() {
        let layout = BypassLayout::from_spans(4, &[(2, 2)]).unwrap();
        assert_eq!(layout.placements()[0].span(), 1);
        let markers = layout.to_markers();
        assert!(markers[2].anode && markers[2].cathode);
    }

    #[test]
    fn test_insert_is_atomic() {
        let mut layout = BypassLayout::from_spans(10, &[(0, 3)]).unwrap();
        layout.place_anode(8).unwrap();
        assert!(layout.insert(5, 2).is_err());
        assert_eq!(layout.pending_anode(), Some(8));
        assert_eq!(layout.len(), 1);
    }

    #[test]
    fn test_insert_keeps_unrelated_pending_anode() {
        let mut layout = BypassLayout::new(10);
        layout.place_anode(8).unwrap();
        layout.insert(0, 3).unwrap();
        assert_eq!(layout.pending_anode(), Some(8));

        // A span over the pending cell consumes it
        layout.place_anode(5).unwrap();
        layout.insert(4, 6).unwrap();
        assert_eq!(layout.pending_anode(), None);
        assert_eq!(layout.len(), 2);
    }

    #[test]
    fn test_cancel_pending_anode() {
        let mut layout = BypassLayout::new(6);
        layout.place_anode(2).unwrap();
        layout.cancel_pending();
        assert_eq!(layout.pending_anode(), None);
        assert!(layout.place_cathode(4).is_err());
        assert!(layout.is_empty());
    }

    #[test]
    fn test_markers_round_trip_and_dimension_check() {
        let layout = BypassLayout::from_spans(6, &[(0, 2), (3, 5)]).unwrap();
        let markers = layout.to_markers();
        assert_eq!(BypassLayout::from_markers(6, &markers).unwrap(), layout);

        let err = BypassLayout::from_markers(6, &markers[..4]).unwrap_err();
        assert!(matches!(err, PvError::DimensionMismatch { expected: 6, actual: 4 }));
        assert!(BypassLayout::from_markers(6, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_remove_by_covered_cell() {
        let mut layout = BypassLayout::from_spans(8, &[(1, 4)]).unwrap();
        assert_eq!(layout.remove_covering(0), None);
        assert_eq!(layout.remove_covering(3), Some(BypassPlacement { anode: 1, cathode: 4 }));
        assert!(layout.is_empty());
        assert!(layout.place_anode(2).is_ok());
    }

    #[test]
    fn test_out_of_range_cell() {
        let mut layout = BypassLayout::new(4);
        assert!(matches!(layout.place_anode(4), Err(PvError::OutOfRange { .. })));
    }
}
