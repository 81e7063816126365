use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName};

use apostille_site::config::{load_config, SiteConfig};
use apostille_site::consent::{ConsentMachine, ConsentRecord};
use apostille_site::security::{Nonce, SecurityPolicy};

/// Response headers worth inspecting on a deployed page.
const SECURITY_HEADERS: &[&str] = &[
    "content-security-policy",
    "content-security-policy-report-only",
    "reporting-endpoints",
    "strict-transport-security",
    "x-content-type-options",
    "referrer-policy",
    "permissions-policy",
    "x-frame-options",
    "cross-origin-resource-policy",
    "cache-control",
];

#[derive(Parser)]
#[command(name = "site-cli")]
#[command(about = "Inspection CLI for the apostille site", long_about = None)]
struct Cli {
    /// Site configuration. Defaults are used when absent.
    #[arg(short, long, global = true, env = "SITE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the security headers the configuration produces
    Csp {
        /// Use this nonce instead of a fresh one
        #[arg(long)]
        nonce: Option<String>,
    },
    /// Fetch a page and show its security headers
    Headers {
        #[arg(short, long, default_value = "http://localhost:8080/")]
        url: String,
    },
    /// Decode a consent cookie value
    Cookie { value: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SiteConfig::default(),
    };

    match cli.command {
        Commands::Csp { nonce } => {
            let nonce = match nonce {
                Some(raw) => Nonce::parse(&raw)?,
                None => Nonce::generate(),
            };
            let policy = SecurityPolicy::from_config(&config.security, &config.site);
            for (name, value) in policy.headers(&nonce) {
                println!("{}: {}", name, value.to_str()?);
            }
        }
        Commands::Headers { url } => {
            let res = reqwest::get(&url).await?;
            println!("{} {}", res.status(), url);
            print_security_headers(res.headers());
        }
        Commands::Cookie { value } => {
            let record = match ConsentRecord::decode(&value) {
                Ok(record) => record,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            };
            println!("{}", serde_json::to_string_pretty(&record)?);

            let now = chrono::Utc::now().timestamp_millis();
            if record.version != config.consent.version {
                println!(
                    "status: ignored (version {} != {})",
                    record.version, config.consent.version
                );
            } else if record.is_expired(now, config.consent.ttl_days) {
                println!("status: expired (ttl {} days)", config.consent.ttl_days);
            } else {
                let (machine, _) = ConsentMachine::initial(Some(&record), false);
                println!("status: valid, consent {}", machine.state().as_str());
            }
        }
    }

    Ok(())
}

fn print_security_headers(headers: &HeaderMap) {
    for &name in SECURITY_HEADERS {
        let name = HeaderName::from_static(name);
        match headers.get(&name).and_then(|v| v.to_str().ok()) {
            Some(value) => println!("{name}: {value}"),
            None => println!("{name}: (missing)"),
        }
    }
}
