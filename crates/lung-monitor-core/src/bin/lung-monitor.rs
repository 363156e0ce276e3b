//! Lung Monitor CLI
//!
//! Operator tool for the clinical API.
//!
//! Usage:
//!   lung-monitor watch [--patient <id>]
//!   lung-monitor add-patient --name <name> --age <age> --gender <gender>
//!   lung-monitor submit --patient <id> --image <file>

use std::path::PathBuf;

use anyhow::{bail, Context};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use lung_monitor_core::logging::init_tracing;
use lung_monitor_core::surface::{active_alerts, classify, latest};
use lung_monitor_core::{
    AssetResolver, ClientConfig, ClinicalQueries, DiagnosticWorkflow, MonitorSession, PatientId,
};

#[derive(Parser)]
#[command(name = "lung-monitor")]
#[command(version)]
#[command(about = "Watch and update the lung monitoring dashboard from a terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./lung-monitor.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream roster, facility stats and vitals as they change
    Watch {
        /// Also follow this patient's vitals and reports
        #[arg(short, long)]
        patient: Option<i64>,
    },

    /// Register a new patient
    AddPatient {
        #[arg(long)]
        name: String,

        #[arg(long)]
        age: u32,

        #[arg(long)]
        gender: String,
    },

    /// Upload a chest X-ray and print the diagnosis
    Submit {
        #[arg(short, long)]
        patient: i64,

        /// PNG, JPEG, BMP or WebP image
        #[arg(short, long)]
        image: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let queries = ClinicalQueries::connect(&config)?;
    let resolver = config.asset_resolver();

    match cli.command {
        Commands::Watch { patient } => watch(queries, &resolver, patient.map(PatientId)).await,
        Commands::AddPatient { name, age, gender } => {
            let patient = queries.register_patient(&name, age, &gender).await?;
            println!(
                "Created patient {} ({}, {}, {})",
                patient.id, patient.name, patient.age, patient.gender
            );
            Ok(())
        }
        Commands::Submit { patient, image } => {
            submit(queries, &resolver, PatientId(patient), image).await
        }
    }
}

async fn watch(
    queries: ClinicalQueries,
    resolver: &AssetResolver,
    patient: Option<PatientId>,
) -> anyhow::Result<()> {
    let mut session = MonitorSession::new(queries);
    session.select_patient(patient);

    loop {
        let changed = tokio::select! {
            _ = session.changed() => true,
            _ = tokio::signal::ctrl_c() => false,
        };
        if !changed {
            break;
        }
        print_session(&session, resolver);
    }
    Ok(())
}

fn print_session(session: &MonitorSession, resolver: &AssetResolver) {
    if let Some(stats) = session.stats().value {
        println!(
            "patients={} reports={} pneumonia={} devices={}",
            stats.total_patients, stats.total_reports, stats.pneumonia_count, stats.active_devices
        );
    }

    if let Some(recent) = session.recent_vitals().value {
        for sample in active_alerts(recent.as_slice()) {
            println!(
                "ALERT patient={} spo2={:.1} temp={:.1} hr={} at {}",
                sample.patient_id, sample.spo2, sample.temperature, sample.heart_rate, sample.recorded_at
            );
        }
    }

    let vitals = session.vitals();
    if let Some(feed) = vitals.value {
        if let Some(sample) = latest(feed.history.as_slice()) {
            println!(
                "{}: spo2={:.1}% temp={:.1}°C hr={} {}",
                feed.patient.name,
                sample.spo2,
                sample.temperature,
                sample.heart_rate,
                if sample.alert { "ALERT" } else { "normal" }
            );
        }
    }
    if let Some(error) = vitals.error {
        eprintln!("vitals unavailable: {}", error);
    }

    if let Some(report) = session.active_report() {
        let c = classify(&report);
        println!(
            "latest report #{}: {} ({}) severity: {}",
            report.id, report.prediction, report.confidence, c.severity
        );
        print_download(resolver, report.id);
    }
}

fn print_download(resolver: &AssetResolver, report_id: i64) {
    match resolver.report_download(report_id) {
        Ok(url) => println!("PDF: {}", url),
        Err(e) => eprintln!("no download link for report #{}: {}", report_id, e),
    }
}

async fn submit(
    queries: ClinicalQueries,
    resolver: &AssetResolver,
    patient: PatientId,
    image: PathBuf,
) -> anyhow::Result<()> {
    let roster = queries.gateway().list_patients().await?;
    let bytes = tokio::fs::read(&image)
        .await
        .with_context(|| format!("reading {:?}", image))?;
    let file_name = image
        .file_name()
        .and_then(|n| n.to_str())
        .context("image path has no file name")?
        .to_string();

    let workflow = DiagnosticWorkflow::new(queries);
    workflow.choose_patient(patient, &roster)?;
    workflow.stage_file(Bytes::from(bytes), &file_name)?;

    let Some(action) = workflow.submit_action() else {
        bail!("nothing to submit");
    };
    let submission = workflow.submit(action).await?;
    let c = classify(&submission.report);
    println!(
        "Report #{}: {} ({}) severity: {}",
        submission.report.id, submission.report.prediction, submission.report.confidence, c.severity
    );
    if let Some(heatmap) = submission.heatmap {
        println!("Heat map: {}", heatmap);
    }
    print_download(resolver, submission.report.id);
    Ok(())
}
