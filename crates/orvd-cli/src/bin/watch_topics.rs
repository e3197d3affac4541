use anyhow::Result;
use clap::Parser;
use orvd_sdk::TopicStream;

#[derive(Parser, Debug)]
#[command(author, version, about = "Print relay publications", long_about = None)]
struct Args {
    /// ORVD Server URL
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,

    /// Topic patterns to follow
    #[arg(default_values_t = vec!["#".to_string()])]
    patterns: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut stream = TopicStream::connect(&args.url).await?;
    for pattern in &args.patterns {
        stream.subscribe(pattern).await?;
    }
    println!("Watching {}", args.patterns.join(", "));

    while let Some(publication) = stream.next_publication().await? {
        println!("{}  {}", publication.topic, publication.payload);
    }
    Ok(())
}
