use std::time::Duration;

use clap::{Parser, Subcommand};

use cloudsec_gate::probe::{overall, CheckReport, ProbeClient, Verdict};

#[derive(Parser)]
#[command(name = "cloudsec-probe")]
#[command(about = "Fire test requests at a demo server and grade its hardening", long_about = None)]
struct Cli {
    /// Base URL of the server under test.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server answers /health
    Health,
    /// Fetch the index and time it
    Basic,
    /// Probe /secure with missing, wrong, default and (optionally) a real key
    Secure {
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Send a burst of requests and look for 429s
    RateLimit {
        #[arg(short, long, default_value_t = 110)]
        requests: usize,
        /// Pause between requests in milliseconds
        #[arg(long, default_value_t = 10)]
        pause_ms: u64,
    },
    /// Grade security response headers
    Headers,
    /// Check whether an untrusted origin is granted access
    Cors {
        #[arg(short, long, default_value = "http://evil.example")]
        origin: String,
    },
    /// Run every probe except the rate-limit burst
    All {
        #[arg(short, long)]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = ProbeClient::new(&cli.url)?;

    let reports: Vec<CheckReport> = match cli.command {
        Commands::Health => vec![client.health().await],
        Commands::Basic => vec![client.basic().await],
        Commands::Secure { key } => vec![client.secure(key.as_deref()).await],
        Commands::RateLimit { requests, pause_ms } => {
            vec![client.rate_limit(requests, Duration::from_millis(pause_ms)).await]
        }
        Commands::Headers => vec![client.headers().await],
        Commands::Cors { origin } => vec![client.cors(&origin).await],
        Commands::All { key } => vec![
            client.health().await,
            client.basic().await,
            client.headers().await,
            client.cors("http://evil.example").await,
            client.secure(key.as_deref()).await,
        ],
    };

    println!("Target: {}", cli.url);
    for report in &reports {
        println!("{report}");
    }

    let verdict = overall(&reports);
    println!("Overall: {verdict}");
    if verdict == Verdict::Fail {
        std::process::exit(1);
    }
    Ok(())
}
