use crate::{Cli, Command};
use anyhow::{Context, Result};
use docqa::{IngestReport, PromptProfile, QueryResponse, QueryService, RagConfig, RagLibrary};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(cli: Cli) -> Result<()> {
    let config = RagConfig::from_env().context("failed to read configuration")?;
    let config = cli.apply_overrides(config)?;
    let library = RagLibrary::new(&config)?;

    match cli.command {
        Command::Ingest { file } => {
            let report = ingest(&library, &file).await?;
            println!("{}", render_ingest(&report));
        }
        Command::Query {
            query,
            profile,
            json,
            ..
        } => {
            let service = library.query_service.with_profile(profile);
            let response = service.query(&query.join(" ")).await?;
            print_response(&service, &response, profile, json)?;
        }
        Command::Testcases { request, json, .. } => {
            let service = library.query_service;
            let response = service.generate_test_cases(&request.join(" ")).await?;
            print_response(&service, &response, PromptProfile::SapTestCases, json)?;
        }
        Command::Session { file, testcases } => {
            let profile = if testcases {
                PromptProfile::SapTestCases
            } else {
                PromptProfile::General
            };
            let report = ingest(&library, &file).await?;
            println!("{}", render_ingest(&report));
            log::info!("Starting interactive session ({} profile)", profile);
            session(&library.query_service.with_profile(profile), profile).await?;
        }
    }

    Ok(())
}

async fn ingest(library: &RagLibrary, file: &Path) -> Result<IngestReport> {
    log::info!("Ingesting {}", file.display());
    library
        .ingest_service
        .ingest_file(file)
        .await
        .with_context(|| format!("failed to ingest {}", file.display()))
}

/// Reads one query per line until EOF or `exit`.
async fn session(service: &QueryService, profile: PromptProfile) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("Enter your query: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        match service.query(query).await {
            Ok(response) => print_response(service, &response, profile, false)?,
            // A failed query should not end the session.
            Err(e) => log::error!("Error occurred: {}", e),
        }
    }

    log::info!("Session ended");
    Ok(())
}

fn render_ingest(report: &IngestReport) -> String {
    format!(
        "{}\n{}: {} chunk(s) indexed",
        report.message, report.source, report.chunks
    )
}

fn render_response(model: &str, response: &QueryResponse, profile: PromptProfile) -> String {
    let mut out = match profile {
        PromptProfile::SapTestCases => format!("{} Response:\n\n{}", model, response.response),
        PromptProfile::General => response.response.clone(),
    };

    if !response.citations.is_empty() {
        out.push_str("\n\nSources:");
        for citation in &response.citations {
            out.push_str(&format!(
                "\n- {} (score {:.2})",
                citation.document, citation.confidence_score
            ));
        }
    }
    out
}

fn print_response(
    service: &QueryService,
    response: &QueryResponse,
    profile: PromptProfile,
    json: bool,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
    } else {
        println!("{}", render_response(service.chat_model_name(), response, profile));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa::Citation;

    fn response() -> QueryResponse {
        QueryResponse {
            status: "success".to_string(),
            response: "TC-01 Post goods receipt".to_string(),
            citations: vec![Citation {
                document: "brd.pdf".to_string(),
                text_excerpt: "Goods receipt...".to_string(),
                confidence_score: 0.876,
            }],
            processing_time_ms: 12,
        }
    }

    #[test]
    fn test_case_output_names_the_model() {
        let text = render_response("gpt-4o-mini", &response(), PromptProfile::SapTestCases);
        assert!(text.starts_with("gpt-4o-mini Response:\n\nTC-01 Post goods receipt"));
        assert!(text.ends_with("- brd.pdf (score 0.88)"));
    }

    #[test]
    fn general_output_is_the_answer_and_sources() {
        let mut plain = response();
        plain.citations.clear();
        assert_eq!(
            render_response("gpt-4o-mini", &plain, PromptProfile::General),
            "TC-01 Post goods receipt"
        );
    }

    #[test]
    fn ingest_summary_leads_with_the_success_message() {
        let report = IngestReport {
            source: "brd.docx".to_string(),
            documents: 1,
            chunks: 7,
            message: "Document processed successfully!".to_string(),
        };
        assert_eq!(
            render_ingest(&report),
            "Document processed successfully!\nbrd.docx: 7 chunk(s) indexed"
        );
    }
}
