use crate::infra::Portal;
use chrono::Utc;
use clap::Args;
use mortgage_portal::config::AppConfig;
use mortgage_portal::error::AppError;
use mortgage_portal::lending::applications::{
    ApplicationFilter, ApplicationRequest, ApplicationServiceError, ApplicationStatus,
    DecisionOutcome, DecisionRequest, Principal,
};
use mortgage_portal::lending::events::{DeliveryOutcome, RecordingObserver, StreamMode};
use serde::Serialize;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Make the primary stream refuse every send so events take the fallback queue.
    #[arg(long)]
    pub(crate) fail_primary: bool,
    /// Make the fallback queue refuse every message.
    #[arg(long)]
    pub(crate) fail_fallback: bool,
    /// Accept primary sends but reject every acknowledgement.
    #[arg(long, conflicts_with = "fail_primary")]
    pub(crate) reject_acks: bool,
    /// Number of officers racing to decide the same application.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub(crate) officers: u16,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            fail_primary: false,
            fail_fallback: false,
            reject_acks: false,
            officers: 4,
        }
    }
}

/// Counts reported at the end of a demo run.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DemoSummary {
    pub(crate) decisions_won: usize,
    pub(crate) decisions_refused: usize,
    pub(crate) approved_listed: usize,
    pub(crate) acknowledged: usize,
    pub(crate) rejected: usize,
    pub(crate) fell_back: usize,
    pub(crate) lost: usize,
    pub(crate) elapsed_ms: i64,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let summary = run_scenario(&args, &config).await?;

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("\nSummary:\n{json}"),
        Err(err) => println!("\nSummary unavailable: {err}"),
    }
    Ok(())
}

pub(crate) async fn run_scenario(
    args: &DemoArgs,
    config: &AppConfig,
) -> Result<DemoSummary, AppError> {
    let started = Utc::now();
    let observer = Arc::new(RecordingObserver::default());
    let portal = Portal::assemble(&config.events, observer.clone());

    if args.fail_primary {
        portal.stream.set_mode(StreamMode::Unavailable);
    } else if args.reject_acks {
        portal.stream.set_mode(StreamMode::RejectAcknowledgements);
    }
    portal.queue.set_available(!args.fail_fallback);

    println!("Mortgage portal demo (topic {})", config.events.topic);

    let applicant_a = Principal::applicant("applicant-a").with_national_id("NID-A");
    let applicant_b = Principal::applicant("applicant-b").with_national_id("NID-B");

    let created = portal.lifecycle.create(
        ApplicationRequest {
            amount: 100_000,
            term_months: 240,
        },
        &applicant_a,
    )?;
    println!(
        "- {} submitted {} -> {} (amount {}, {} months)",
        applicant_a.id,
        created.id,
        created.status.label(),
        created.amount,
        created.term_months
    );

    let second = portal.lifecycle.create(
        ApplicationRequest {
            amount: 240_000,
            term_months: 360,
        },
        &applicant_b,
    )?;
    println!("- {} submitted {}", applicant_b.id, second.id);

    match portal.lifecycle.get(&created.id, &applicant_b) {
        Err(ApplicationServiceError::AccessDenied(denied)) => {
            println!("- {} reading {} -> {}", applicant_b.id, created.id, denied)
        }
        Ok(_) => println!("- {} unexpectedly read {}", applicant_b.id, created.id),
        Err(err) => return Err(err.into()),
    }

    let decisions = Arc::clone(&portal.decisions);
    let id = created.id;
    let results = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..args.officers)
            .map(|n| {
                let decisions = &decisions;
                scope.spawn(move || {
                    let officer = Principal::officer(format!("officer-{n}"));
                    let outcome = decisions.decide(
                        &id,
                        DecisionRequest::new(DecisionOutcome::Approved, "ok"),
                        &officer,
                    );
                    (officer, outcome)
                })
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .collect::<Vec<_>>()
    });

    let mut summary = DemoSummary::default();
    for (officer, outcome) in results {
        match outcome {
            Ok(decision) => {
                summary.decisions_won += 1;
                println!(
                    "- {} decided {} -> {:?}",
                    officer.id, decision.application_id, decision.outcome
                );
            }
            Err(ApplicationServiceError::AlreadyDecided(_)) => summary.decisions_refused += 1,
            Err(err) => return Err(err.into()),
        }
    }
    println!(
        "- {} officer(s) raced: {} won, {} refused as already decided",
        args.officers, summary.decisions_won, summary.decisions_refused
    );

    let officer = Principal::officer("officer-o");
    let approved = portal.lifecycle.list(
        &ApplicationFilter::with_status(ApplicationStatus::Approved),
        &officer,
    )?;
    summary.approved_listed = approved.len();
    println!("- {} listed {} approved application(s)", officer.id, approved.len());

    portal.publisher.settled().await;

    for report in observer.reports() {
        match report.outcome {
            DeliveryOutcome::Acknowledged(_) => summary.acknowledged += 1,
            DeliveryOutcome::Rejected(_) => summary.rejected += 1,
            DeliveryOutcome::FellBack { .. } => summary.fell_back += 1,
        }
    }
    summary.lost = observer.failures().len();
    summary.elapsed_ms = (Utc::now() - started).num_milliseconds();

    println!(
        "- events: {} on stream, {} on queue {}, {} lost",
        portal.stream.len(),
        portal.queue.messages(&config.events.fallback_destination).len(),
        config.events.fallback_destination,
        summary.lost
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mortgage_portal::config::{
        AppEnvironment, EventsConfig, LogFormat, ServerConfig, TelemetryConfig,
    };

    fn config() -> AppConfig {
        AppConfig {
            environment: AppEnvironment::Test,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            telemetry: TelemetryConfig {
                log_level: "warn".to_string(),
                format: LogFormat::Compact,
            },
            events: EventsConfig::default(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn healthy_transports_acknowledge_every_event() {
        let summary = run_scenario(&DemoArgs::default(), &config())
            .await
            .expect("scenario runs");

        assert_eq!(summary.decisions_won, 1);
        assert_eq!(summary.decisions_refused, 3);
        assert_eq!(summary.approved_listed, 1);
        assert_eq!(summary.acknowledged, 3);
        assert_eq!(summary.fell_back + summary.rejected + summary.lost, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn primary_outage_falls_back() {
        let args = DemoArgs {
            fail_primary: true,
            ..DemoArgs::default()
        };
        let summary = run_scenario(&args, &config()).await.expect("scenario runs");

        assert_eq!(summary.fell_back, 3);
        assert_eq!(summary.acknowledged, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn double_outage_still_completes_business_flow() {
        let args = DemoArgs {
            fail_primary: true,
            fail_fallback: true,
            officers: 2,
            ..DemoArgs::default()
        };
        let summary = run_scenario(&args, &config()).await.expect("scenario runs");

        assert_eq!(summary.decisions_won, 1);
        assert_eq!(summary.decisions_refused, 1);
        assert_eq!(summary.approved_listed, 1);
        assert_eq!(summary.lost, 3);
    }
}
