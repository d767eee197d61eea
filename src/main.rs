use clap::Parser;
use colored::*;

use teampulse_highlight::cli::{self, Args};
use teampulse_highlight::render::{render_terminal, RenderSegment};
use teampulse_highlight::stream::AnalysisClient;
use teampulse_highlight::{web, AnalysisSession, HighlightError};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.no_color {
        colored::control::set_override(false);
    }

    if args.web {
        if let Err(e) = web::serve(args.port, &args).await {
            eprintln!("{} {}", "server error:".bright_red(), e);
            std::process::exit(1);
        }
        return;
    }

    if let Err(e) = run(&args).await {
        eprintln!("{} {}", "error:".bright_red(), e);
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> Result<(), HighlightError> {
    let source = cli::load_text(&args.text)?;
    let mut session = AnalysisSession::new(source);
    session.client_label = Some(args.client.clone());

    let segments = if let Some(path) = &args.annotations {
        // Offline mode: one batch from a file, no backend round trip.
        let batch = cli::load_annotations(path)?;
        session.add_annotations(&batch)
    } else if let Some(backend) = &args.backend {
        let client = AnalysisClient::new(backend.clone());
        client.stream_analysis(&mut session).await?
    } else {
        return Err(HighlightError::Backend(
            "nothing to do: pass --annotations FILE for offline mode or --backend URL to stream".into(),
        ));
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&segments)?);
    } else {
        print_report(&session, &segments);
    }

    Ok(())
}

fn print_report(session: &AnalysisSession, segments: &[RenderSegment]) {
    println!("{}", render_terminal(segments));
    println!();
    let spans = session.reconciled().len();
    println!(
        "{}",
        format!(
            "  {} spans | {} resolved | {} dropped | {} batches",
            spans,
            session.resolved_count(),
            session.dropped_count(),
            session.batch_count()
        )
        .bright_black()
    );
}
