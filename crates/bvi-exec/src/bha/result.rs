use bvi_core::{CoreError, ports::DocumentStore};
use bvi_model::{BhaFunc, BhaFuncResult, ScanFile};
use tracing::trace;

/// Store every scanned function and its matches; returns the number of functions stored.
pub(crate) async fn save_results(
    store: &dyn DocumentStore,
    task_id: &str,
    files: &[ScanFile],
) -> Result<usize, CoreError> {
    let mut stored = 0;
    for file in files {
        for func in &file.funcs {
            let func_id = store
                .insert_func(&BhaFunc::from_scan(task_id, file, func))
                .await?;
            stored += 1;

            if func.results.is_empty() {
                continue;
            }
            let results: Vec<_> = func
                .results
                .iter()
                .map(|m| BhaFuncResult::from_match(task_id, &func_id, m))
                .collect();
            store.insert_func_results(&results).await?;
            trace!(%task_id, %func_id, matches = results.len(), "function results stored");
        }
    }
    Ok(stored)
}
