use safelens::{ModerationConfig, Moderator};
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <image> [config.json] [out.json]", args[0]);
        std::process::exit(2);
    }

    let config = match args.get(2) {
        Some(path) => ModerationConfig::from_json_file(Path::new(path))?,
        None => ModerationConfig::default(),
    };
    let moderator = Moderator::new(config);
    let bytes = std::fs::read(&args[1])?;
    let verdict = moderator.moderate(&bytes, &args[1]);

    for c in &verdict.categories {
        println!(
            "{:<8} {:.3}{}",
            c.category.name(),
            c.confidence,
            if c.flagged { "  FLAGGED" } else { "" }
        );
    }
    println!("safe: {}", verdict.safe);

    if let Some(out_path) = args.get(3) {
        let json = serde_json::to_string_pretty(&verdict)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
