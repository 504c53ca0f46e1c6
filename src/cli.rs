use std::collections::BTreeMap;
use std::io::{self, Write};

use clap::Parser;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tickdb::parser::{self, Command};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Interactive client for a running TickDB server", long_about = None)]
struct Args {
    #[clap(long, default_value = "http://127.0.0.1:3000")]
    host: String,
}

#[derive(Deserialize)]
struct PricePoint {
    price: f64,
    #[serde(rename = "lastUpdatedAt")]
    last_updated_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AverageReply {
    average_stock_price: f64,
    price_history: Vec<PricePoint>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockLeg {
    average_price: f64,
    price_history: Vec<PricePoint>,
}

#[derive(Deserialize)]
struct CorrelationReply {
    correlation: f64,
    stocks: BTreeMap<String, StockLeg>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatrixReply {
    tickers: Vec<String>,
    matrix: BTreeMap<String, BTreeMap<String, f64>>,
    averages: BTreeMap<String, f64>,
    standard_deviations: BTreeMap<String, f64>,
}

struct Session {
    client: Client,
    host: String,
}

fn main() {
    let args = Args::parse();
    let session = Session {
        client: Client::new(),
        host: args.host.trim_end_matches('/').to_string(),
    };

    print_banner();

    match session.get::<Vec<String>>("/tickers", &[]) {
        Ok(tickers) => println!("[\u{2713}] Connected to TickDB at {} ({} tickers)", session.host, tickers.len()),
        Err(_) => {
            println!("[\u{2717}] Could not connect to server at {}.", session.host);
            println!("    Make sure to run 'cargo run --release --bin tickdb' in another terminal.");
            return;
        }
    }
    println!("Type 'HELP' for supported commands or 'EXIT' to quit.\n");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("tickdb> ");
        if io::stdout().flush().is_err() { break; }
        buffer.clear();

        match stdin.read_line(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if buffer.trim().is_empty() { continue; }

        match parser::parse_command(&buffer) {
            Ok(Command::Exit) => break,
            Ok(cmd) => {
                if let Err(e) = session.execute(cmd) {
                    println!("[\u{26a0}\u{fe0f} Error] {}", e);
                }
            }
            Err(e) => {
                println!("[\u{2717} Syntax Error] {}", e);
                println!("    \u{2139}\u{fe0f}  Hint: Try 'AVG AAPL 10', 'CORR AAPL MSFT 30' or 'MATRIX 15'");
            }
        }
    }
}

fn print_banner() {
    println!("\n==================================================");
    println!("   TickDB CLI - Windowed Price Statistics");
    println!("==================================================\n");
}

fn print_help() {
    println!("\n--- Available Commands ---");
    println!("1. TICKERS:     TICKERS");
    println!("2. AVERAGE:     AVG AAPL 10        (or AVG AAPL LAST 10)");
    println!("3. CORRELATION: CORR AAPL MSFT 30");
    println!("4. MATRIX:      MATRIX 15");
    println!("5. EXIT:        Quit\n");
    println!("Minutes must be between 1 and 60.\n");
}

impl Session {
    fn execute(&self, cmd: Command) -> Result<(), String> {
        match cmd {
            Command::Help => { print_help(); Ok(()) },
            Command::Tickers => self.perform_tickers(),
            Command::Average { ticker, minutes } => self.perform_average(&ticker, minutes),
            Command::Correlation { a, b, minutes } => self.perform_correlation(&a, &b, minutes),
            Command::Matrix { minutes } => self.perform_matrix(minutes),
            Command::Exit => Ok(()),
        }
    }

    // --- NETWORK HANDLERS ---

    fn get<T: for<'de> Deserialize<'de>>(&self, path: &str, query: &[(&str, String)]) -> Result<T, String> {
        let resp = self
        .client
        .get(format!("{}{}", self.host, path))
        .query(query)
        .send()
        .map_err(|e| e.to_string())?;

        let status = resp.status();
        let body: Value = resp.json().map_err(|e| e.to_string())?;

        if !status.is_success() {
            let msg = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Server Rejected Request");
            return Err(format!("{} ({})", msg, status));
        }
        serde_json::from_value(body).map_err(|e| e.to_string())
    }

    fn perform_tickers(&self) -> Result<(), String> {
        let tickers: Vec<String> = self.get("/tickers", &[])?;
        println!("Tickers: {}", tickers.join(", "));
        Ok(())
    }

    fn perform_average(&self, ticker: &str, minutes: u32) -> Result<(), String> {
        let path = format!("/stocks/{}", ticker);
        let reply: AverageReply = self.get(
            &path,
            &[("minutes", minutes.to_string()), ("aggregation", "average".to_string())],
        )?;

        println!("\n{} average over last {} min: {:.6}", ticker, minutes, reply.average_stock_price);
        println!("  {} samples", reply.price_history.len());
        if let (Some(first), Some(last)) = (reply.price_history.first(), reply.price_history.last()) {
            println!("  first: {:.4} @ {}", first.price, first.last_updated_at);
            println!("  last:  {:.4} @ {}", last.price, last.last_updated_at);
        }
        println!();
        Ok(())
    }

    fn perform_correlation(&self, a: &str, b: &str, minutes: u32) -> Result<(), String> {
        let reply: CorrelationReply = self.get(
            "/stockcorrelation",
            &[("minutes", minutes.to_string()), ("ticker", a.to_string()), ("ticker", b.to_string())],
        )?;

        println!("\nCorrelation {} / {} over last {} min: {:.4}", a, b, minutes, reply.correlation);
        for (ticker, leg) in &reply.stocks {
            println!("  \u{2022} {:<6} avg {:.6} ({} aligned samples)", ticker, leg.average_price, leg.price_history.len());
        }
        println!();
        Ok(())
    }

    fn perform_matrix(&self, minutes: u32) -> Result<(), String> {
        let reply: MatrixReply = self.get("/correlationmatrix", &[("minutes", minutes.to_string())])?;

        println!("\nCorrelation matrix, last {} min:", minutes);
        print!("{:>8}", "");
        for t in &reply.tickers {
            print!("{:>9}", t);
        }
        println!();

        for a in &reply.tickers {
            print!("{:>8}", a);
            for b in &reply.tickers {
                let r = reply.matrix.get(a).and_then(|row| row.get(b)).copied().unwrap_or(0.0);
                print!("{:>9.4}", r);
            }
            println!();
        }

        println!("\n{:>8}{:>14}{:>14}", "", "mean", "std dev");
        for t in &reply.tickers {
            let mean = reply.averages.get(t).copied().unwrap_or(0.0);
            let sd = reply.standard_deviations.get(t).copied().unwrap_or(0.0);
            println!("{:>8}{:>14.6}{:>14.6}", t, mean, sd);
        }
        println!();
        Ok(())
    }
}
