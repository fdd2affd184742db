use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bloodwork_client::CohereClient;
use bloodwork_core::{
    EhrStore, ExtractionScheduler, PageProcessor, PatientAnalyzer, PipelineConfig, ReportService,
    StructuredExtractor, lab_trends,
};
use bloodwork_store::JsonFileStore;

#[derive(Parser)]
#[command(
    name = "bloodwork",
    version,
    about = "Turn OCR'd lab reports into structured patient records"
)]
struct Cli {
    /// Path to the EHR database file
    #[arg(long, global = true, env = "BLOODWORK_EHR_DB", default_value = "ehr_database.json")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a structured report from page-delimited OCR text
    Extract {
        /// Text file with `--- Page N ---` delimiters
        #[arg(short, long)]
        input: PathBuf,

        /// Merge the report into this patient's record
        #[arg(short, long)]
        patient_id: Option<String>,

        /// Write the report JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List stored patients
    Patients,

    /// Print a patient's full record
    Show {
        #[arg(short, long)]
        patient_id: String,
    },

    /// Show the tracked lab values over time for a patient
    Trends {
        #[arg(short, long)]
        patient_id: String,
    },

    /// Generate a Markdown analysis of a patient's lab history
    Analyze {
        #[arg(short, long)]
        patient_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bloodwork=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = JsonFileStore::new(&cli.db);

    match cli.command {
        Commands::Extract {
            input,
            patient_id,
            output,
        } => {
            let config = PipelineConfig::from_env()?;
            cmd_extract(&config, store, &input, patient_id.as_deref(), output.as_deref()).await?;
        }
        Commands::Patients => cmd_patients(&store).await?,
        Commands::Show { patient_id } => cmd_show(&store, &patient_id).await?,
        Commands::Trends { patient_id } => cmd_trends(&store, &patient_id).await?,
        Commands::Analyze { patient_id } => {
            let config = PipelineConfig::from_env()?;
            cmd_analyze(&config, &store, &patient_id).await?;
        }
    }

    Ok(())
}

fn cohere_client(config: &PipelineConfig) -> Result<CohereClient> {
    let client = CohereClient::with_base_url(&config.base_url)?.with_timeout(config.request_timeout)?;
    Ok(client)
}

async fn cmd_extract(
    config: &PipelineConfig,
    store: JsonFileStore,
    input: &Path,
    patient_id: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let raw_text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read report text: {}", input.display()))?;

    let keys = config.key_manager()?;
    let workers = keys.len();
    let extractor =
        StructuredExtractor::new(cohere_client(config)?, keys, config.extraction_settings());
    let processor = PageProcessor::new(extractor, config.retry.clone());
    let service = ReportService::new(ExtractionScheduler::new(processor, workers), store);

    tracing::info!(keys = workers, model = %config.model, "Extracting {}", input.display());

    let progress = |completed: usize, total: usize| {
        tracing::info!("Processed {completed}/{total} pages");
    };

    let outcome = match patient_id {
        Some(patient_id) => {
            let (outcome, record) = service.ingest(patient_id, &raw_text, progress).await?;
            eprintln!(
                "Stored report for {patient_id} ({} report(s) on record)",
                record.reports.len()
            );
            outcome
        }
        None => service.extract(&raw_text, progress).await?,
    };

    if !outcome.failed_pages.is_empty() {
        eprintln!(
            "Warning: {} of {} page(s) could not be extracted: {:?}",
            outcome.failed_pages.len(),
            outcome.total_pages,
            outcome.failed_pages
        );
    }

    let json = serde_json::to_string_pretty(&outcome.report)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

async fn cmd_patients(store: &JsonFileStore) -> Result<()> {
    let patients = store.list_patients().await?;

    if patients.is_empty() {
        println!("No patients found in {}", store.path().display());
        return Ok(());
    }

    for patient in &patients {
        let last = patient
            .last_report_on
            .map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} (reports: {}, last: {})",
            patient.patient_id, patient.name, patient.report_count, last
        );
    }

    println!("\nTotal: {} patients", patients.len());

    Ok(())
}

async fn cmd_show(store: &JsonFileStore, patient_id: &str) -> Result<()> {
    let record = load_patient(store, patient_id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn cmd_trends(store: &JsonFileStore, patient_id: &str) -> Result<()> {
    let record = load_patient(store, patient_id).await?;
    let trends = lab_trends(&record);

    if trends.is_empty() {
        println!("No tracked lab values for {patient_id}");
        return Ok(());
    }

    for series in &trends {
        println!(
            "{} / {} (normal {}-{})",
            series.category, series.test, series.range.low, series.range.high
        );
        for point in &series.points {
            let flag = if point.in_range { "" } else { "  OUT OF RANGE" };
            println!(
                "  {}  {}{}",
                point.date.format("%Y-%m-%d"),
                point.value,
                flag
            );
        }
    }

    Ok(())
}

async fn cmd_analyze(config: &PipelineConfig, store: &JsonFileStore, patient_id: &str) -> Result<()> {
    let record = load_patient(store, patient_id).await?;
    let analyzer =
        PatientAnalyzer::new(cohere_client(config)?, config.key_manager()?, config.model.clone());

    println!("{}", analyzer.analyze(&record).await);

    Ok(())
}

async fn load_patient(
    store: &JsonFileStore,
    patient_id: &str,
) -> Result<bloodwork_core::PatientRecord> {
    store
        .get_patient(patient_id)
        .await?
        .with_context(|| format!("No record for patient {patient_id}"))
}
