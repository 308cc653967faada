use clap::{Arg, ArgAction, Command};
use colored::Colorize;
use std::error::Error;
use unfurl::{log_failure, log_summary_card, setup_logging, LogConfig, Unfurler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let matches = Command::new("unfurl")
        .about("Print the link-preview summary of one or more pages")
        .arg(Arg::new("urls").required(true).num_args(1..))
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print each summary as JSON"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log fallback decisions to the console"),
        )
        .get_matches();

    if matches.get_flag("verbose") {
        setup_logging(LogConfig {
            log_level: "unfurl=debug".into(),
            file_output: false,
            ..Default::default()
        })?;
    }

    let unfurler = Unfurler::new();
    let as_json = matches.get_flag("json");

    for url in matches.get_many::<String>("urls").into_iter().flatten() {
        match unfurler.get(url).await {
            Ok(summary) if as_json => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(summary) => {
                log_summary_card(&summary);

                println!("\n{}", "Page Summary".bold().blue());
                println!("{}", "---------------".blue());
                println!("{}: {}", "URL".bold(), summary.url);

                if let Some(title) = &summary.title {
                    println!("{}: {}", "Title".bold(), title);
                }

                if let Some(description) = &summary.description {
                    println!("{}: {}", "Description".bold(), description);
                }

                for image in &summary.images {
                    println!("{}: {}", "Image".bold(), image);
                }

                if let Some(site_name) = summary.site_name() {
                    println!("{}: {}", "Site Name".bold(), site_name);
                }

                println!("{}: {}", "Meta keys".bold(), summary.meta.len());
            }
            Err(e) => {
                log_failure(url, &e);
                eprintln!("{}: {} - {}", "Error".bold().red(), url, e);
            }
        }
    }

    Ok(())
}
