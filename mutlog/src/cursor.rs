//! A named reader position over the checkpoint list.

/// Name of the cursor that gates snapshot reclamation for durability.
pub const PERSISTENCE_CURSOR: &str = "persistence";

/// A cursor's position: which snapshot (by stable id, since the checkpoint
/// list's front can be GC'd and its contents can be collapsed — an index
/// into the list would not survive either) and which arena slot within it.
/// `position = None` means "before the first item of this snapshot".
#[derive(Debug, Clone)]
pub struct Cursor {
    name: String,
    snapshot_id: u64,
    position: Option<usize>,
    pending_count: usize,
    from_beginning_on_collapse: bool,
}

impl Cursor {
    pub fn new(
        name: impl Into<String>,
        snapshot_id: u64,
        position: Option<usize>,
        from_beginning_on_collapse: bool,
    ) -> Cursor {
        Cursor {
            name: name.into(),
            snapshot_id,
            position,
            pending_count: 0,
            from_beginning_on_collapse,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_persistence(&self) -> bool {
        self.name == PERSISTENCE_CURSOR
    }

    pub fn snapshot_id(&self) -> u64 {
        self.snapshot_id
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn pending_count(&self) -> usize {
        self.pending_count
    }

    pub fn from_beginning_on_collapse(&self) -> bool {
        self.from_beginning_on_collapse
    }

    pub(crate) fn set_pending_count(&mut self, count: usize) {
        self.pending_count = count;
    }

    pub(crate) fn move_to(&mut self, snapshot_id: u64, position: Option<usize>) {
        self.snapshot_id = snapshot_id;
        self.position = position;
    }

    pub(crate) fn advance_within_snapshot(&mut self, position: usize) {
        self.position = Some(position);
    }
}
