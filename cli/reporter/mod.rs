use std::time::{Duration, Instant};
use strata_core::events::event::*;
use strata_core::events::{EventChannel, EventConsumer};
use strata_core::{RunOutcome, RunReport, RunStatus};
use tracing::debug;

trait Reporter {
    /// Returns `true` once the run is over.
    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Noop => false,
            Event::CacheEvent(e) => {
                self.on_cache_event(e);
                false
            }
            Event::RuleEvent(e) => {
                self.on_rule_event(e);
                false
            }
            Event::WorkflowEvent(e) => self.on_workflow_event(e),
        }
    }

    fn on_cache_event(&mut self, _event: CacheEvent) {}
    fn on_rule_event(&mut self, _event: RuleEvent) {}
    fn on_workflow_event(&mut self, _event: WorkflowEvent) -> bool {
        false
    }
}

/// Prints a line per finished rule while a run is going.
pub struct StatusReporter {
    event_consumer: EventConsumer,
    started: Instant,
    total: usize,
    finished: usize,
}

impl StatusReporter {
    pub fn new(event_channel: &EventChannel) -> StatusReporter {
        StatusReporter {
            event_consumer: event_channel.consumer(),
            started: Instant::now(),
            total: 0,
            finished: 0,
        }
    }

    pub async fn run(mut self) {
        loop {
            self.event_consumer.fetch();
            match self.event_consumer.pop() {
                Some(event) => {
                    debug!("{:?}", event);
                    if self.handle_event(event) {
                        break;
                    }
                }
                None => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
    }
}

impl Reporter for StatusReporter {
    fn on_rule_event(&mut self, event: RuleEvent) {
        match event {
            RuleEvent::RuleExecuting { rule, image } => {
                let dim = console::Style::new().dim();
                let line = match image {
                    Some(image) => format!("{:>12} {} (in {})", "Running", rule, image),
                    None => format!("{:>12} {}", "Running", rule),
                };
                println!("{}", dim.apply_to(line));
            }
            RuleEvent::RuleCompleted {
                rule,
                status,
                detail,
            } => {
                self.finished += 1;
                println!(
                    "{:>12} {} [{}/{}] {}",
                    status_style(status).apply_to(status.to_string()),
                    rule,
                    self.finished,
                    self.total,
                    console::Style::new().dim().apply_to(detail.to_string()),
                );
            }
            RuleEvent::RuleStarted { .. } => (),
        }
    }

    fn on_cache_event(&mut self, event: CacheEvent) {
        if let CacheEvent::CacheWarning { tier, message } = event {
            let yellow = console::Style::new().yellow();
            println!(
                "{:>12} {} cache: {}",
                yellow.apply_to("Warning"),
                tier,
                message
            );
        }
    }

    fn on_workflow_event(&mut self, event: WorkflowEvent) -> bool {
        match event {
            WorkflowEvent::RunStarted { at, rule_count } => {
                self.started = at;
                self.total = rule_count;
                false
            }
            WorkflowEvent::Cancelled => {
                let red_bold = console::Style::new().red().bold();
                println!("{:>12}", red_bold.apply_to("Cancelled"));
                false
            }
            WorkflowEvent::RunCompleted(t1) => {
                debug!(
                    "Run took {}",
                    humantime::format_duration(t1.saturating_duration_since(self.started))
                );
                true
            }
        }
    }
}

fn status_style(status: RunStatus) -> console::Style {
    match status {
        RunStatus::Ok => console::Style::new().green().bold(),
        RunStatus::Cached | RunStatus::UpToDate => console::Style::new().blue(),
        RunStatus::Error | RunStatus::ExecError | RunStatus::MissingOutputError => {
            console::Style::new().red().bold()
        }
    }
}

/// Prints the final table of rule statuses.
pub fn print_summary(report: &RunReport) {
    println!();
    for rule in &report.rules {
        println!(
            "  {:<20} {:<40} {:>10}  {}",
            status_style(rule.status).apply_to(rule.status.to_string()),
            rule.id.to_string(),
            humantime::format_duration(round_to_millis(rule.duration)).to_string(),
            rule.detail,
        );
    }
    for id in &report.not_run {
        println!("  {:<20} {}", "-", id);
    }

    let total = humantime::format_duration(round_to_millis(report.duration));
    let line = match report.outcome {
        RunOutcome::Success => console::Style::new().green().bold().apply_to(format!(
            "Finished {} rules in {} ({} ran, {} cached, {} up to date)",
            report.rules.len(),
            total,
            report.count(RunStatus::Ok),
            report.count(RunStatus::Cached),
            report.count(RunStatus::UpToDate),
        )),
        RunOutcome::Failure => console::Style::new().red().bold().apply_to(format!(
            "Failed in {} ({} of {} rules failed)",
            total,
            report.failures().count(),
            report.rules.len() + report.not_run.len(),
        )),
        RunOutcome::Cancelled => console::Style::new()
            .red()
            .bold()
            .apply_to(format!("Cancelled after {}", total)),
    };
    println!();
    println!("{}", line);
}

fn round_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}
