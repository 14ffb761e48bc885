/// Process exit codes of `vendorsync`.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    /// The run finished but some operations were skipped or some steps failed.
    pub const COMPLETED_WITH_FAILURES: i32 = 1;
    /// Nothing was changed: dirty workspace, bad input or configuration.
    pub const PRECONDITION_FAILURE: i32 = 2;
    pub const ABORTED: i32 = 3;
}
