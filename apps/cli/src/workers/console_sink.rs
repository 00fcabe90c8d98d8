use std::sync::Arc;

use console::style;
use formcheck_core::{
    FormQuality, Phase, format_analysis_summary,
    events::{
        AnalysisApplied, AnalysisRejected, EnrichedEvent, EventBus, HistorySaved, RejectReason,
        SessionChanged, WorkerFailed, downcast_ref, to_json,
    },
    feedback::compose_feedback,
    workers::{InputSpec, SubscriptionSpec, Worker},
};

/// Prints session events to the terminal, either styled or as JSON lines.
pub struct ConsoleSinkWorker {
    json: bool,
    last_summary: Option<String>,
}

impl ConsoleSinkWorker {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            last_summary: None,
        }
    }

    fn print_applied(&mut self, applied: &AnalysisApplied) {
        let summary = format_analysis_summary(&applied.analysis);
        if self.last_summary.as_deref() == Some(summary.as_str()) {
            return;
        }

        let line = match FormQuality::for_analysis(&applied.analysis) {
            FormQuality::Good => style(&summary).green(),
            FormQuality::NeedsImprovement => style(&summary).yellow(),
            FormQuality::Bad => style(&summary).red(),
        };
        println!("{} {}", style(format!("#{}", applied.generation)).dim(), line);
        for item in compose_feedback(&applied.analysis.feedback) {
            println!("    {} {}", item.sentiment.icon(), style(item.text).dim());
        }
        self.last_summary = Some(summary);
    }

    fn print_rejected(rejected: &AnalysisRejected) {
        let message = rejected.message.as_deref().unwrap_or_default();
        match rejected.reason {
            RejectReason::Stale | RejectReason::NotStreaming => {}
            RejectReason::Malformed => println!(
                "{} {}",
                style("·").dim(),
                style(format!("Detection discarded: {}", message)).dim()
            ),
            RejectReason::Transient | RejectReason::Service => println!(
                "{} {}",
                style("!").yellow().bold(),
                style(format!("Analysis failed: {}", message)).yellow()
            ),
        }
    }

    fn print_session(changed: &SessionChanged) {
        let phase = match changed.phase {
            Phase::Streaming => style("▶ Streaming").green().bold(),
            Phase::Paused => style("⏸ Paused").yellow().bold(),
            Phase::Idle => style("■ Stopped").dim().bold(),
        };
        println!("{} {}", phase, style(changed.connection.describe()).dim());
        if let Some(error) = &changed.error {
            println!("{} {}", style("Error:").red().bold(), error);
        }
    }

    fn print_saved(saved: &HistorySaved) {
        println!(
            "{} Saved #{} at {} ({:.0}%) {}",
            style("✓").green().bold(),
            saved.entry_id,
            saved.timestamp,
            saved.score,
            style(format!("[{} in history]", saved.history_len)).dim()
        );
    }
}

impl Worker for ConsoleSinkWorker {
    const SUBSCRIBER_ID: &'static str = "cli.console_sink";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![
                InputSpec::latest(AnalysisApplied::EVENT_TYPE),
                InputSpec::fifo(AnalysisRejected::EVENT_TYPE, 16),
                InputSpec::fifo(SessionChanged::EVENT_TYPE, 8),
                InputSpec::fifo(HistorySaved::EVENT_TYPE, 8),
                InputSpec::fifo(WorkerFailed::EVENT_TYPE, 4),
            ],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, _bus: &EventBus) -> anyhow::Result<()> {
        if self.json {
            println!("{}", to_json(event.event.as_ref())?);
            return Ok(());
        }

        if let Some(applied) = downcast_ref::<AnalysisApplied>(&event.event) {
            self.print_applied(applied);
        } else if let Some(rejected) = downcast_ref::<AnalysisRejected>(&event.event) {
            Self::print_rejected(rejected);
        } else if let Some(changed) = downcast_ref::<SessionChanged>(&event.event) {
            Self::print_session(changed);
        } else if let Some(saved) = downcast_ref::<HistorySaved>(&event.event) {
            Self::print_saved(saved);
        } else if let Some(failed) = downcast_ref::<WorkerFailed>(&event.event) {
            eprintln!(
                "{} {}: {}",
                style("Worker failed").red().bold(),
                failed.stage,
                failed.message
            );
        } else {
            anyhow::bail!("unexpected event_type={}", event.event.event_type());
        }
        Ok(())
    }
}
