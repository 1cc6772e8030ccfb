use std::io::{self, Write};

use agent::DatabaseAgent;
use ai::openai::OpenAiClient;
use anyhow::Context;
use colored::Colorize;
use config::ScryConfig;
use db::postgres::PostgresDatabase;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const APOLOGY: &str = "I apologize, but I encountered an error processing your request.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let conf = ScryConfig::get_or_default();

    println!("Welcome to the Database AI Agent!");
    println!("You can ask questions about your database or request operations.");
    println!("Type 'exit' or 'quit' to end the session.");
    println!("Type 'clear' to clear the conversation history.");
    println!("{}", "-".repeat(50));

    let api_key = std::env::var(&conf.ai.api_key_env)
        .with_context(|| format!("{} is not set", conf.ai.api_key_env))?;
    let provider = OpenAiClient::new(conf.ai.url.clone(), api_key, conf.ai.model.clone());

    let database = PostgresDatabase::connect(conf.database_url())
        .await
        .context("Error connecting to the database")?;
    println!("Successfully connected to the database");

    let mut agent = DatabaseAgent::new(Box::new(provider), Box::new(database));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n{} ", "You:".green());
        io::stdout().flush()?;

        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input.eq_ignore_ascii_case("clear") {
            agent.reset();
            println!("\nConversation history cleared.");
            continue;
        }
        if input.is_empty() {
            continue;
        }

        print!("\n{} ", "Agent:".blue());
        io::stdout().flush()?;

        match agent.respond(input).await {
            Ok(answer) if !answer.is_empty() => println!("{answer}"),
            Ok(_) => println!("{APOLOGY}"),
            Err(error) => {
                tracing::error!(%error, "turn failed");
                println!("{APOLOGY}");
            }
        }
    }

    println!("\nGoodbye!");

    match agent.close().await {
        Ok(()) => println!("Database connection closed"),
        Err(error) => tracing::warn!(%error, "failed to close the database connection"),
    }

    Ok(())
}
