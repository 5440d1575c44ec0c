/// Generation bookkeeping for one kind of fetch.
///
/// Every request is stamped with a fresh generation. A response is applied
/// only if it was issued after the last invalidation and is newer than the
/// last response applied, so late replies from a previous view (or an older
/// poll overtaken by a newer one) are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchTracker {
    issued: u64,
    floor: u64,
    applied: u64,
}

impl FetchTracker {
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Discard everything currently in flight.
    pub fn invalidate(&mut self) {
        self.floor = self.issued + 1;
    }

    pub fn accept(&mut self, generation: u64) -> bool {
        if generation < self.floor || generation <= self.applied || generation > self.issued {
            return false;
        }
        self.applied = generation;
        true
    }

    pub fn latest(&self) -> u64 {
        self.issued
    }
}

/// Trackers for every fetch the widget issues.
#[derive(Debug, Clone, Default)]
pub struct Generations {
    pub search: FetchTracker,
    pub directory: FetchTracker,
    pub history: FetchTracker,
    pub unread: FetchTracker,
    pub incoming: FetchTracker,
    pub documents: FetchTracker,
}

impl Generations {
    pub fn invalidate_all(&mut self) {
        self.search.invalidate();
        self.directory.invalidate();
        self.history.invalidate();
        self.unread.invalidate();
        self.incoming.invalidate();
        self.documents.invalidate();
    }
}
