//! RxDesk command line client.
//!
//! Drives the REST API: session management, prescription listing and status
//! changes, inventory queries. Point it at a running server with
//! `RXDESK_API_URL` (default `http://localhost:3000`).

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rxdesk")]
#[command(about = "RxDesk pharmacy dispensary CLI")]
struct Cli {
    /// Bearer token from a previous `login` (or set RXDESK_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a session and print its bearer token
    Login {
        /// Pharmacist id, e.g. PH001
        pharmacist_id: String,
        /// Password
        password: String,
    },
    /// Close the current session
    Logout,
    /// List prescriptions
    List {
        /// Substring search over patient, doctor, id and drug
        #[arg(long)]
        query: Option<String>,
        /// Filter by status (snake_case, e.g. partially_filled)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one prescription with its audit log
    Show {
        /// Prescription id
        id: String,
    },
    /// Set a prescription's status
    SetStatus {
        /// Prescription id
        id: String,
        /// New status (snake_case, e.g. dispensed)
        status: String,
        /// Optional note recorded in the audit log
        #[arg(long)]
        notes: Option<String>,
    },
    /// Pull prescriptions from the oncology system
    Sync,
    /// Query the inventory
    Inventory {
        /// Substring search over name, category and manufacturer
        #[arg(long)]
        query: Option<String>,
        /// Sort key (name, category, price, stock, expiry_date, manufacturer)
        #[arg(long)]
        sort: Option<String>,
        /// Sort direction: asc or desc
        #[arg(long)]
        dir: Option<String>,
        /// Page number (1-based)
        #[arg(long)]
        page: Option<usize>,
    },
    /// Show inventory overview counters
    Summary,
}

fn base_url() -> String {
    std::env::var("RXDESK_API_URL").unwrap_or_else(|_| "http://localhost:3000".into())
}

fn auth_header(token: Option<String>) -> anyhow::Result<String> {
    let token = token
        .or_else(|| std::env::var("RXDESK_TOKEN").ok())
        .context("no session token; run `rxdesk login` and pass --token or set RXDESK_TOKEN")?;
    Ok(format!("Bearer {token}"))
}

async fn expect_ok(response: reqwest::Response) -> anyhow::Result<serde_json::Value> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        bail!("server returned {status}: {body}");
    }
    serde_json::from_str(&body).context("unparseable response body")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let http = reqwest::Client::new();
    let base = base_url();

    match cli.command {
        Commands::Login {
            pharmacist_id,
            password,
        } => {
            let body = expect_ok(
                http.post(format!("{base}/login"))
                    .json(&serde_json::json!({
                        "pharmacist_id": pharmacist_id,
                        "password": password,
                    }))
                    .send()
                    .await?,
            )
            .await?;
            println!("{}", body["token"].as_str().unwrap_or_default());
        }
        Commands::Logout => {
            let auth = auth_header(cli.token)?;
            let body = expect_ok(
                http.post(format!("{base}/logout"))
                    .header("Authorization", auth)
                    .send()
                    .await?,
            )
            .await?;
            println!("logged out: {}", body["success"]);
        }
        Commands::List { query, status } => {
            let mut request = http.get(format!("{base}/prescriptions"));
            if let Some(query) = query {
                request = request.query(&[("q", query)]);
            }
            if let Some(status) = status {
                request = request.query(&[("status", status)]);
            }
            let body = expect_ok(request.send().await?).await?;
            for prescription in body.as_array().into_iter().flatten() {
                println!(
                    "{}  {:22}  {:22}  {}",
                    prescription["id"].as_str().unwrap_or("?"),
                    prescription["patient_name"].as_str().unwrap_or("?"),
                    prescription["doctor_name"].as_str().unwrap_or("?"),
                    prescription["status"].as_str().unwrap_or("?"),
                );
            }
        }
        Commands::Show { id } => {
            let body =
                expect_ok(http.get(format!("{base}/prescriptions/{id}")).send().await?).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::SetStatus { id, status, notes } => {
            let auth = auth_header(cli.token)?;
            let body = expect_ok(
                http.put(format!("{base}/prescriptions/{id}/status"))
                    .header("Authorization", auth)
                    .json(&serde_json::json!({ "status": status, "notes": notes }))
                    .send()
                    .await?,
            )
            .await?;
            println!(
                "{} -> {}",
                body["id"].as_str().unwrap_or("?"),
                body["status"].as_str().unwrap_or("?"),
            );
        }
        Commands::Sync => {
            let auth = auth_header(cli.token)?;
            let body = expect_ok(
                http.post(format!("{base}/prescriptions/sync"))
                    .header("Authorization", auth)
                    .send()
                    .await?,
            )
            .await?;
            println!("applied {} records", body["applied"]);
        }
        Commands::Inventory {
            query,
            sort,
            dir,
            page,
        } => {
            let mut request = http.get(format!("{base}/inventory"));
            if let Some(query) = query {
                request = request.query(&[("q", query)]);
            }
            if let Some(sort) = sort {
                request = request.query(&[("sort", sort)]);
            }
            if let Some(dir) = dir {
                request = request.query(&[("dir", dir)]);
            }
            if let Some(page) = page {
                request = request.query(&[("page", page.to_string())]);
            }
            let body = expect_ok(request.send().await?).await?;
            for medicine in body["items"].as_array().into_iter().flatten() {
                println!(
                    "{:24}  {:14}  {:>7}  stock {:>4}",
                    medicine["name"].as_str().unwrap_or("?"),
                    medicine["category"].as_str().unwrap_or("?"),
                    medicine["price"],
                    medicine["stock"],
                );
            }
            println!(
                "page {}/{} ({} total)",
                body["page"], body["total_pages"], body["total"]
            );
        }
        Commands::Summary => {
            let body = expect_ok(http.get(format!("{base}/inventory/summary")).send().await?)
                .await?;
            println!("total:       {}", body["total"]);
            println!("low stock:   {}", body["low_stock"]);
            println!("expired:     {}", body["expired"]);
            println!("near expiry: {}", body["near_expiry"]);
        }
    }

    Ok(())
}
