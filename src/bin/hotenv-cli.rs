use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "hotenv-cli")]
#[command(about = "Management CLI for a running hotenv server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000", env = "HOTENV_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show database connection, port and mode
    Status,
    /// Re-read the .env file and apply changes
    Reload,
    /// List all rows of a resource
    List { resource: Resource },
    /// Fetch one row of a resource
    Get { resource: Resource, id: i64 },
}

#[derive(Clone, Copy, ValueEnum)]
enum Resource {
    Users,
    Products,
    Tasks,
    Posts,
}

impl Resource {
    fn path(self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Products => "products",
            Resource::Tasks => "tasks",
            Resource::Posts => "posts",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{base}/api/status")).send().await?,
        Commands::Reload => client.post(format!("{base}/api/reload-env")).send().await?,
        Commands::List { resource } => {
            client
                .get(format!("{base}/api/{}", resource.path()))
                .send()
                .await?
        }
        Commands::Get { resource, id } => {
            client
                .get(format!("{base}/api/{}/{id}", resource.path()))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let mock = res
        .headers()
        .get("x-data-source")
        .is_some_and(|v| v.as_bytes() == b"mock");

    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if mock {
        eprintln!("(database not connected, showing mock data)");
    }
    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
