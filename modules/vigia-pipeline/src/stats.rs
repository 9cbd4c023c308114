//! Whole-run rollup for the full-pipeline command.

use crate::queue::QueueReport;
use crate::stages::download::DownloadReport;
use crate::stages::enrich::EnrichReport;
use crate::stages::extract::ExtractReport;
use crate::stages::ingest::IngestReport;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub ingest: IngestReport,
    pub download: DownloadReport,
    pub extract: ExtractReport,
    pub enrich: EnrichReport,
    pub queue: Option<QueueReport>,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Pipeline Run Complete ===")?;
        writeln!(f, "Entries fetched:    {}", self.ingest.fetched)?;
        writeln!(f, "New sources:        {}", self.ingest.new_sources)?;
        writeln!(f, "Queued downloads:   {}", self.ingest.queued)?;
        writeln!(f, "Downloaded:         {}", self.download.downloaded)?;
        writeln!(f, "Download failures:  {}", self.download.failed)?;
        writeln!(f, "Events created:     {}", self.extract.created)?;
        writeln!(f, "Events updated:     {}", self.extract.updated)?;
        writeln!(f, "Sources skipped:    {}", self.extract.skipped)?;
        writeln!(f, "Linked to incident: {}", self.enrich.linked)?;
        writeln!(f, "Incidents created:  {}", self.enrich.created)?;
        writeln!(f, "Left unlinked:      {}", self.enrich.skipped)?;
        if let Some(queue) = &self.queue {
            writeln!(f, "Queue jobs:         {} ({} failed)", queue.executed, queue.failed)?;
        }
        Ok(())
    }
}
