use crate::infra::{load_manifest, load_pipeline_config, parse_loan_amount, InMemoryRunRepository};
use clap::Args;
use mortgage_intake::error::AppError;
use mortgage_intake::workflows::mortgage::{
    CannedDocumentService, MortgageIntakeService, PipelineRun,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AssessArgs {
    /// CSV manifest with `document_type,path,mime_type` rows
    #[arg(long)]
    pub(crate) manifest: PathBuf,
    /// CSV of canned service answers (`document_type,field,value,confidence`)
    #[arg(long)]
    pub(crate) answers: PathBuf,
    /// Requested loan amount
    #[arg(long, value_parser = parse_loan_amount)]
    pub(crate) loan_amount: f64,
    /// Pipeline rules JSON (defaults to the built-in rules)
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    /// Only check document completeness; skip extraction and scoring
    #[arg(long)]
    pub(crate) check_only: bool,
    /// Print the public status payload as JSON instead of the text report
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_assess(args: AssessArgs) -> Result<(), AppError> {
    let AssessArgs {
        manifest,
        answers,
        loan_amount,
        config,
        check_only,
        json,
    } = args;

    let submission = load_manifest(&manifest, loan_amount)?;
    let documents = CannedDocumentService::from_path(&answers)?;
    let service = MortgageIntakeService::new(
        Arc::new(InMemoryRunRepository::default()),
        Arc::new(documents),
        load_pipeline_config(config.as_deref())?,
    );

    let run = if check_only {
        service.check(submission).await?
    } else {
        service.submit(submission).await?
    };

    if json {
        match serde_json::to_string_pretty(&run.status_view()) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("Status payload unavailable: {err}"),
        }
        return Ok(());
    }

    if run.decision.is_some() {
        let artifact = service.report(&run.run_id)?;
        println!("{}", String::from_utf8_lossy(&artifact.bytes));
    } else {
        render_outcome(&run);
    }
    Ok(())
}

/// Summary for runs that stopped before a decision.
pub(crate) fn render_outcome(run: &PipelineRun) {
    let view = run.status_view();
    println!(
        "- Run {} -> {} (stage {})",
        view.run_id,
        view.status,
        view.stage.label()
    );
    if !view.missing_documents.is_empty() {
        let missing: Vec<_> = view
            .missing_documents
            .iter()
            .map(|document_type| document_type.label())
            .collect();
        println!("  Missing documents: {}", missing.join(", "));
    }
    for error in &view.errors {
        println!("  - {error}");
    }
    if let Some(validation) = &run.validation {
        for check in validation.checks.values() {
            let status = match (check.present, check.is_complete()) {
                (false, _) => "missing",
                (true, true) => "complete",
                (true, false) => "incomplete",
            };
            println!("  {}: {status}", check.document_type.label());
            for field in &check.missing_fields {
                println!("    missing field {field}");
            }
        }
    }
}
