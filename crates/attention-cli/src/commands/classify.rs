use attention_core::{Pipeline, RawEvent};
use clap::Args;

use super::{read_json, InputArgs};

#[derive(Args)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

pub fn run(args: ClassifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.input.load_config()?;
    let window = args.input.window(&config)?;
    let raw: Vec<RawEvent> = read_json(&args.input.events)?;

    let pipeline = Pipeline::new(config)?;
    let run = pipeline.classify(&raw, window);

    if args.input.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(());
    }

    for classified in &run.events {
        let event = &classified.event;
        let flag = if classified.ambiguous { " (ambiguous)" } else { "" };
        println!(
            "{}  {:<12} {}{}",
            event.start.format("%Y-%m-%d %H:%M"),
            classified.primary_domain.as_str(),
            event.title,
            flag
        );
    }
    let stats = &run.diagnostics.classification;
    println!(
        "\n{} events, {} ambiguous, {} unclassified, {} dropped",
        run.events.len(),
        stats.ambiguous,
        stats.unclassified,
        run.diagnostics.normalization.malformed.len()
    );
    Ok(())
}
