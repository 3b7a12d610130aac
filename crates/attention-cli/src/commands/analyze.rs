use std::path::PathBuf;

use attention_core::{AnalysisRun, Pipeline, RawEvent, WellbeingSignal};
use clap::Args;

use super::{read_json, InputArgs};

#[derive(Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// JSON array of well-being observations
    #[arg(long)]
    pub wellbeing: Option<PathBuf>,
}

pub fn run(args: AnalyzeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.input.load_config()?;
    let window = args.input.window(&config)?;
    let raw: Vec<RawEvent> = read_json(&args.input.events)?;
    let wellbeing: Vec<WellbeingSignal> = match &args.wellbeing {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    tracing::debug!(events = raw.len(), wellbeing = wellbeing.len(), "loaded inputs");

    let pipeline = Pipeline::new(config)?;
    let run = pipeline.run(&raw, &wellbeing, window);

    if args.input.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_report(&run);
    }
    Ok(())
}

fn print_report(run: &AnalysisRun) {
    println!("Window: {} .. {}", run.window.start, run.window.end);
    println!(
        "Events: {}  Scheduled: {}",
        run.events.len(),
        run.summary.total_scheduled
    );

    println!("\nAllocation:");
    for (domain, duration) in &run.summary.per_domain {
        println!(
            "  {:<14} {:>10}  {:>5.1}%",
            domain.as_str(),
            duration.to_string(),
            run.summary.share(domain) * 100.0
        );
    }

    println!("\nPatterns ({}):", run.patterns.len());
    for pattern in &run.patterns {
        println!(
            "  [{}] {} (coef {:.2}, p {:.4}, n {})",
            pattern.direction,
            pattern.description,
            pattern.confidence.coefficient,
            pattern.confidence.p_value,
            pattern.support
        );
    }

    println!("\nInsights ({}):", run.insights.len());
    for insight in &run.insights {
        println!("  {} (n {})", insight.description, insight.support);
    }

    println!("\nRecommendations ({}):", run.recommendations.len());
    for (i, rec) in run.recommendations.iter().enumerate() {
        println!("  {}. {} (priority {:.1})", i + 1, rec.action, rec.priority_score);
        println!("     based on: {}", rec.rationale.join(", "));
    }

    let d = run.diagnostics.summary();
    println!("\nDiagnostics:");
    println!(
        "  dropped {}  duplicates {}  cancelled {}  ambiguous {}  unclassified {}",
        d.dropped, d.duplicates, d.cancelled, d.ambiguous, d.unclassified
    );
    println!(
        "  periods without data {}  insufficient data {}  suppressed {}",
        d.periods_without_data, d.insufficient_data, d.suppressed
    );
}
