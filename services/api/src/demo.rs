use crate::assess::render_outcome;
use crate::infra::{parse_loan_amount, InMemoryRunRepository};
use chrono::{SecondsFormat, Utc};
use clap::{Args, ValueEnum};
use mortgage_intake::error::AppError;
use mortgage_intake::workflows::mortgage::{
    fields, CannedDocumentService, DocumentType, DocumentUpload, MortgageIntakeService,
    PipelineConfig, PipelineConfigHandle, PipelineRun, RetryPolicy, ServiceError, Submission,
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Scenario {
    /// Bank statement never uploaded
    MissingDocument,
    /// Complete file from a strong applicant
    StrongApplicant,
    /// Payslip extraction keeps failing
    ServiceOutage,
    /// Payslip and bank statement disagree on income
    ConflictingIncome,
}

impl Scenario {
    const ALL: [Scenario; 4] = [
        Scenario::MissingDocument,
        Scenario::StrongApplicant,
        Scenario::ServiceOutage,
        Scenario::ConflictingIncome,
    ];

    fn title(self) -> &'static str {
        match self {
            Scenario::MissingDocument => "Missing bank statement",
            Scenario::StrongApplicant => "Strong applicant",
            Scenario::ServiceOutage => "Document service outage on the payslip",
            Scenario::ConflictingIncome => "Conflicting income sources",
        }
    }

    fn documents(self) -> CannedDocumentService {
        match self {
            Scenario::MissingDocument | Scenario::StrongApplicant => strong_applicant_answers(),
            Scenario::ServiceOutage => strong_applicant_answers().failing_queries(
                DocumentType::Payslip,
                ServiceError::Unavailable("ocr backend timed out".to_string()),
            ),
            Scenario::ConflictingIncome => strong_applicant_answers()
                .with_answer(DocumentType::Payslip, fields::MONTHLY_INCOME, "4,800", 0.6)
                .with_answer(DocumentType::BankStatement, fields::MONTHLY_INCOME, "5,000", 0.9),
        }
    }

    fn uploads(self) -> Vec<DocumentType> {
        DocumentType::ordered()
            .into_iter()
            .filter(|document_type| {
                self != Scenario::MissingDocument || *document_type != DocumentType::BankStatement
            })
            .collect()
    }
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Run a single scenario instead of all four
    #[arg(long, value_enum)]
    pub(crate) scenario: Option<Scenario>,
    /// Requested loan amount for every scenario
    #[arg(long, value_parser = parse_loan_amount, default_value = "150000")]
    pub(crate) loan_amount: f64,
    /// Print the public status payload after each scenario
    #[arg(long)]
    pub(crate) show_payload: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        scenario,
        loan_amount,
        show_payload,
    } = args;

    let scenarios = match scenario {
        Some(scenario) => vec![scenario],
        None => Scenario::ALL.to_vec(),
    };

    println!(
        "Mortgage intake demo ({})",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    for scenario in scenarios {
        println!("\n== {} ==", scenario.title());
        let run = run_scenario(scenario, loan_amount).await?;
        render_run(&run);
        if show_payload {
            match serde_json::to_string_pretty(&run.status_view()) {
                Ok(json) => println!("  Public status payload:\n{}", json),
                Err(err) => println!("  Public status payload unavailable: {}", err),
            }
        }
    }

    Ok(())
}

pub(crate) async fn run_scenario(scenario: Scenario, loan_amount: f64) -> Result<PipelineRun, AppError> {
    let service = MortgageIntakeService::new(
        Arc::new(InMemoryRunRepository::default()),
        Arc::new(scenario.documents()),
        PipelineConfigHandle::new(demo_config()),
    );
    let submission = scenario
        .uploads()
        .into_iter()
        .fold(Submission::new(loan_amount), |submission, document_type| {
            submission.with_upload(sample_upload(document_type))
        });

    Ok(service.submit(submission).await?)
}

fn render_run(run: &PipelineRun) {
    let Some(decision) = &run.decision else {
        render_outcome(run);
        return;
    };

    println!(
        "- Run {} -> {} (score {:.1})",
        run.run_id,
        decision.decision.label(),
        decision.overall_score
    );
    for factor in &decision.factor_scores {
        println!(
            "    - {}: {:.1} ({})",
            factor.dimension.label(),
            factor.score,
            factor.rationale
        );
    }
    if let Some(record) = &run.applicant {
        for note in record.notes() {
            println!("  Discrepancy: {note}");
        }
    }
    println!("  Justification: {}", decision.justification);
}

/// Same applicant across scenarios: credit 720, income 5,000, debt 1,000, collateral 300,000.
fn strong_applicant_answers() -> CannedDocumentService {
    CannedDocumentService::new()
        .with_answer(DocumentType::Identity, fields::FULL_NAME, "Dana Reyes", 0.95)
        .with_answer(DocumentType::Identity, fields::DATE_OF_BIRTH, "14 March 1988", 0.9)
        .with_answer(DocumentType::Identity, fields::ADDRESS, "12 Elm Street, Springfield", 0.9)
        .with_answer(DocumentType::Payslip, fields::FULL_NAME, "Dana Reyes", 0.9)
        .with_answer(DocumentType::Payslip, fields::MONTHLY_INCOME, "$5,000.00", 0.8)
        .with_answer(DocumentType::Payslip, fields::EMPLOYMENT_YEARS, "4", 0.85)
        .with_answer(DocumentType::Payslip, fields::EMPLOYER_NAME, "Acme Logistics", 0.9)
        .with_answer(DocumentType::BankStatement, fields::MONTHLY_INCOME, "5,000", 0.9)
        .with_answer(DocumentType::BankStatement, fields::EXISTING_DEBT, "1,000", 0.85)
        .with_answer(DocumentType::BankStatement, fields::TOTAL_ASSETS, "40,000", 0.9)
        .with_answer(DocumentType::PropertyAppraisal, fields::COLLATERAL_VALUE, "300,000", 0.95)
        .with_answer(DocumentType::CreditReport, fields::CREDIT_SCORE, "720", 0.99)
}

fn sample_upload(document_type: DocumentType) -> DocumentUpload {
    let (file_name, mime_type) = match document_type {
        DocumentType::Identity => ("passport.jpg", "image/jpeg"),
        DocumentType::Payslip => ("payslip-2024-05.pdf", "application/pdf"),
        DocumentType::BankStatement => ("statement-2024-05.pdf", "application/pdf"),
        DocumentType::PropertyAppraisal => ("appraisal.pdf", "application/pdf"),
        DocumentType::CreditReport => ("credit-report.png", "image/png"),
    };
    DocumentUpload::new(document_type, file_name, mime_type, b"sanitized sample".to_vec())
        .with_page_count(1)
}

/// Short backoff so the outage scenario finishes promptly.
fn demo_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy {
            initial_backoff_ms: 10,
            max_backoff_ms: 40,
            ..RetryPolicy::default()
        },
        ..PipelineConfig::default()
    }
}
