/// The observable status of a query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryStatus {
    /// Constructed but not yet configured.
    Uninitialized,
    /// Configured and ready to submit.
    Initialized,
    /// A submission is running.
    InProgress,
    /// The last submission wrote results but did not exhaust the
    /// selected cells; the query must be resubmitted to continue.
    Incomplete,
    /// All selected cells have been produced.
    Completed,
    /// A planning or I/O error left the query unusable; only
    /// finalization is legal.
    Failed,
}

impl QueryStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, QueryStatus::Completed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryStatus::Completed | QueryStatus::Failed)
    }
}
