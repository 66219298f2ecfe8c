//! ohmytasks - Self-hosted gateway for the Oh My Tasks task manager
//!
//! A small gateway that fronts the upstream task API with token auth,
//! payload normalization and a short-lived cache, plus CLI helpers for the
//! voice capture flow.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ohmytasks::api;
use ohmytasks::cache::TaskCache;
use ohmytasks::client::{TaskSource, UpstreamClient};
use ohmytasks::config::{self, Config};
use ohmytasks::voice::{Language, parse_transcript};

#[derive(Parser)]
#[command(name = "ohmytasks")]
#[command(about = "Self-hosted gateway for the Oh My Tasks task manager")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Generate a new API token
    Token {
        /// Name/label for the token
        #[arg(short, long)]
        name: Option<String>,

        /// List all configured tokens
        #[arg(long)]
        list: bool,

        /// Revoke a token by name
        #[arg(long)]
        revoke: Option<String>,

        /// Config file path (for list/revoke operations)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Initialize a new config file
    Init {
        /// Output path for config file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a voice transcript into a task draft (prints JSON)
    Parse {
        /// Transcript language tag (en, fr, fr-FR, ...)
        #[arg(short, long, default_value = "en")]
        language: String,

        /// The transcript text
        transcript: Vec<String>,
    },

    /// Fetch and print a user's task list through the client
    Fetch {
        /// Owner email
        #[arg(short, long)]
        email: String,

        /// Bypass the cache and force a live read
        #[arg(long)]
        no_cache: bool,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ohmytasks=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port, bind } => {
            let mut cfg = if let Some(path) = config {
                Config::load_from(&path)?
            } else {
                Config::load()?
            };

            // Override with CLI args
            if let Some(p) = port {
                cfg.server.port = p;
            }
            if let Some(b) = bind {
                cfg.server.bind = b;
            }

            run_server(cfg).await
        }

        Commands::Token {
            name,
            list,
            revoke,
            config,
        } => {
            let config_path = if let Some(path) = config {
                path
            } else {
                Config::default_path()?
            };

            // List tokens
            if list {
                if !config_path.exists() {
                    println!("No config file found at {}", config_path.display());
                    println!("Run 'ohmytasks init' to create one.");
                    return Ok(());
                }

                let cfg = Config::load_from(&config_path)?;
                if cfg.tokens.is_empty() {
                    println!("No tokens configured.");
                    println!("Generate one with: ohmytasks token --name <client-name>");
                } else {
                    println!("Configured tokens:");
                    println!();
                    for token in &cfg.tokens {
                        // Show truncated hash (first 20 chars)
                        let hash_preview = if token.token_hash.len() > 20 {
                            format!("{}...", &token.token_hash[..20])
                        } else {
                            token.token_hash.clone()
                        };
                        println!("  {} - {}", token.name, hash_preview);
                    }
                }
                return Ok(());
            }

            // Revoke token
            if let Some(token_name) = revoke {
                if !config_path.exists() {
                    println!("No config file found at {}", config_path.display());
                    return Ok(());
                }

                let mut cfg = Config::load_from(&config_path)?;
                let original_len = cfg.tokens.len();
                cfg.tokens.retain(|t| t.name != token_name);

                if cfg.tokens.len() == original_len {
                    println!("Token '{}' not found.", token_name);
                } else {
                    cfg.save_to(&config_path)?;
                    println!("Revoked token '{}'.", token_name);
                }
                return Ok(());
            }

            // Generate new token
            let token = generate_token();
            let label = name.unwrap_or_else(|| "default".to_string());
            let token_hash = config::hash_token(&token)?;

            if config_path.exists() {
                let mut cfg = Config::load_from(&config_path)?;

                // Check if token name already exists
                if cfg.tokens.iter().any(|t| t.name == label) {
                    println!(
                        "Token '{}' already exists. Use --revoke first to replace it.",
                        label
                    );
                    return Ok(());
                }

                cfg.tokens.push(config::TokenConfig {
                    name: label.clone(),
                    token_hash,
                });
                cfg.save_to(&config_path)?;

                println!("✅ Generated API token for '{}'\n", label);
            } else {
                println!("Generated API token for '{}':\n", label);
                println!("Add this to your gateway's config.toml:\n");
                println!("  [[tokens]]");
                println!("  name = \"{}\"", label);
                println!("  token_hash = \"{}\"\n", token_hash);
            }

            println!("Token: {}\n", token);
            println!("Clients send it as a Bearer header, e.g.:");
            println!(
                "  curl -H 'Authorization: Bearer {}' http://YOUR_SERVER:3000/api/tasks?email=you@example.com",
                token
            );
            println!();
            println!("⚠️  Save this token now - it cannot be retrieved later!");

            Ok(())
        }

        Commands::Init { output } => {
            let path = output.unwrap_or_else(|| PathBuf::from("config.toml"));
            let cfg = Config::default();
            cfg.save_to(&path)?;

            println!("Created config file: {}", path.display());
            println!();
            println!("Next steps:");
            println!("  1. Set [upstream] endpoint and api_key in {}", path.display());
            println!("  2. Generate a token: ohmytasks token --name my-client");
            println!(
                "  3. Start the gateway: ohmytasks serve --config {}",
                path.display()
            );

            Ok(())
        }

        Commands::Parse {
            language,
            transcript,
        } => {
            let text = transcript.join(" ");
            let draft = parse_transcript(&text, Language::from_tag(&language));
            println!("{}", serde_json::to_string_pretty(&draft)?);
            Ok(())
        }

        Commands::Fetch {
            email,
            no_cache,
            config,
        } => {
            let cfg = if let Some(path) = config {
                Config::load_from(&path)?
            } else {
                Config::load()?
            };
            cfg.ensure_upstream()?;

            let cache = if cfg.cache.enabled {
                TaskCache::open_default(&cfg.cache.path)
            } else {
                TaskCache::disabled()
            };
            let client = UpstreamClient::new(
                cfg.upstream.endpoint.clone(),
                cfg.upstream.api_key.clone(),
                cfg.upstream.settings_endpoint.clone(),
                cache,
            )
            .context("Failed to build upstream client")?;

            let fetched = client.fetch_tasks(Some(&email), !no_cache).await?;
            match fetched.source {
                TaskSource::Cache { age_ms } => println!(
                    "{} tasks for {} (cached {}s ago)",
                    fetched.tasks.len(),
                    email,
                    age_ms / 1000
                ),
                TaskSource::Network => {
                    println!("{} tasks for {} (live)", fetched.tasks.len(), email)
                }
            }

            for task in &fetched.tasks {
                let marker = if task.completed { "x" } else { " " };
                let mut line = format!("  [{}] {}", marker, task.name);
                if !task.date.is_empty() {
                    line.push_str(&format!(" - {}", task.date));
                    if task.is_full_day {
                        line.push_str(" (all day)");
                    } else if !task.time.is_empty() {
                        line.push_str(&format!(" {}", task.time));
                    }
                }
                if task.is_urgent {
                    line.push_str(" ⚡");
                }
                println!("{}", line);
            }

            Ok(())
        }
    }
}

async fn run_server(config: Config) -> Result<()> {
    config.ensure_upstream()?;

    let cache = if config.cache.enabled {
        TaskCache::open_default(&config.cache.path)
    } else {
        TaskCache::disabled()
    };

    let client = UpstreamClient::new(
        config.upstream.endpoint.clone(),
        config.upstream.api_key.clone(),
        config.upstream.settings_endpoint.clone(),
        cache,
    )
    .context("Failed to build upstream client")?;

    let state = api::AppState::new(client, config.clone());
    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 ohmytasks gateway listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn generate_token() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    // Base64-like encoding but URL-safe
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    let token_body: String = bytes
        .iter()
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect();

    format!("omt_{}", token_body)
}
