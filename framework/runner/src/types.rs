/// Recommended error type for your benchmark `main` function and any shared code that you write
/// for collaborators. Compatible with `?` on every error type the runner produces.
pub type ServingBenchResult<T> = anyhow::Result<T>;
