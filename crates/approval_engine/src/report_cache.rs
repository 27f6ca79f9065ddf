//! Request-scoped cache of license scan reports.
//!
//! One cache lives for the handling of one event. Several merge requests
//! usually share a target branch pipeline, so its report is fetched once.

use std::collections::HashMap;
use std::sync::Arc;

use policy_config::ProjectId;
use repository_client::{LicenseScanReport, PipelineId, ScanReportProvider};
use tracing::debug;

use crate::{EngineResult, MergeRequest};

#[cfg(test)]
#[path = "report_cache_tests.rs"]
mod tests;

#[derive(Debug, Default)]
pub struct ReportCache {
    reports: HashMap<PipelineId, Option<Arc<LicenseScanReport>>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// License report of a pipeline, `None` when it produced no license
    /// results. Missing reports are cached too.
    pub async fn license_report(
        &mut self,
        provider: &dyn ScanReportProvider,
        project: ProjectId,
        pipeline: PipelineId,
    ) -> EngineResult<Option<Arc<LicenseScanReport>>> {
        if let Some(cached) = self.reports.get(&pipeline) {
            return Ok(cached.clone());
        }

        debug!(pipeline_id = pipeline.value(), "Fetching license scan report");
        let report = provider.license_report(project, pipeline).await?.map(Arc::new);
        self.reports.insert(pipeline, report.clone());
        Ok(report)
    }

    /// Baseline report of the merge request's target branch.
    ///
    /// Comes from the latest finished target branch pipeline. A pipeline that
    /// has not completed, or has no license results, counts as an empty report.
    pub async fn target_branch_report(
        &mut self,
        provider: &dyn ScanReportProvider,
        mr: &MergeRequest,
    ) -> EngineResult<Arc<LicenseScanReport>> {
        let pipeline = match &mr.target_branch_pipeline {
            Some(pipeline) if pipeline.status.is_complete() => pipeline,
            Some(pipeline) => {
                debug!(
                    merge_request_id = mr.id.value(),
                    pipeline_id = pipeline.id.value(),
                    status = %pipeline.status.group(),
                    "Target branch pipeline not complete, using empty report"
                );
                return Ok(Arc::new(LicenseScanReport::empty()));
            }
            None => return Ok(Arc::new(LicenseScanReport::empty())),
        };

        Ok(self
            .license_report(provider, mr.project_id(), pipeline.id)
            .await?
            .unwrap_or_else(|| Arc::new(LicenseScanReport::empty())))
    }
}
