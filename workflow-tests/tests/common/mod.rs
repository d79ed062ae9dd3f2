/// Shared setup for workflow tests.
pub fn setup() {
    workflow_tests::init_tracing();
}
